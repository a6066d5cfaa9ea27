use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::api::validation::validate_limit;
use crate::models::UsageRecord;

#[derive(Deserialize)]
pub struct TrendingQuery {
    pub limit: Option<u64>,
}

/// `GET /api/trending?limit=`
pub async fn get_trending(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TrendingQuery>,
) -> Result<Json<ApiResponse<Vec<UsageRecord>>>, ApiError> {
    let limit = validate_limit(
        params
            .limit
            .unwrap_or(state.shared.config.search.trending_limit),
    )?;

    let records = state.shared.recorder.top_trending(limit).await;
    Ok(Json(ApiResponse::success(records)))
}
