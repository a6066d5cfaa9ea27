//! Page session endpoints.
//!
//! A session stands in for one open search page: the client posts raw input values as
//! the user types, and follows the published UI state over server-sent events.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::sync::watch;

use super::{ApiError, ApiResponse, AppState, CreateSessionRequest, InputRequest, SessionDto};
use crate::api::validation::{validate_query, validate_session_id};
use crate::services::{PageSession, UiState};

async fn find_session(state: &AppState, id: &str) -> Result<Arc<PageSession>, ApiError> {
    let id = validate_session_id(id)?;
    state
        .shared
        .sessions
        .get(id)
        .await
        .ok_or_else(|| ApiError::session_not_found(id))
}

/// `POST /api/sessions`
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<SessionDto>>), ApiError> {
    // The body is optional.
    let request: CreateSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::validation(format!("Invalid request body: {e}")))?
    };
    if let Some(query) = &request.query {
        validate_query(query)?;
    }

    let session = state.shared.sessions.open(request.query).await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(SessionDto::from_session(&session))),
    ))
}

/// `GET /api/sessions/{id}`
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SessionDto>>, ApiError> {
    let session = find_session(&state, &id).await?;
    Ok(Json(ApiResponse::success(SessionDto::from_session(
        &session,
    ))))
}

/// `POST /api/sessions/{id}/input`
///
/// Accepted immediately; the search runs once input has been quiet for the debounce
/// period.
pub async fn push_input(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<InputRequest>,
) -> Result<(StatusCode, Json<ApiResponse<()>>), ApiError> {
    let session = find_session(&state, &id).await?;
    validate_query(&request.value)?;

    if !session.input(request.value) {
        return Err(ApiError::session_not_found(session.id()));
    }

    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(()))))
}

/// `DELETE /api/sessions/{id}`
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let id = validate_session_id(&id)?;
    if state.shared.sessions.close(id).await {
        Ok(Json(ApiResponse::success(())))
    } else {
        Err(ApiError::session_not_found(id))
    }
}

/// `GET /api/sessions/{id}/events`
///
/// Sends the current state first, then every published change. The stream ends when
/// the session is closed.
pub async fn session_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let rx = find_session(&state, &id).await?.subscribe();

    Ok(Sse::new(state_stream(rx)).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn state_stream(
    rx: watch::Receiver<UiState>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }

        let ui_state = rx.borrow_and_update().clone();
        let json = serde_json::to_string(&ui_state).unwrap_or_default();
        Some((Ok(Event::default().event("state").data(json)), (rx, false)))
    })
}
