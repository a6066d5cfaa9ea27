use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::api::validation::validate_query;
use crate::services::{SearchOrchestrator, UiState};

#[derive(Deserialize)]
pub struct MovieQuery {
    #[serde(default)]
    pub query: String,
}

/// `GET /api/movies?query=`
///
/// One-shot search without debouncing. An empty query returns the default listing.
/// Catalog failures come back as an `error` state, not as an HTTP error.
pub async fn search_movies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MovieQuery>,
) -> Result<Json<ApiResponse<UiState>>, ApiError> {
    let query = validate_query(&params.query)?;

    let orchestrator =
        SearchOrchestrator::new(state.shared.catalog.clone(), state.shared.recorder.clone());
    let result = orchestrator.search(query).await;

    Ok(Json(ApiResponse::success(result)))
}
