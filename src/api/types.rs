use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::UsageRecord;
use crate::services::{PageSession, UiState};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InputRequest {
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct SessionDto {
    pub id: Uuid,
    pub opened_at: DateTime<Utc>,
    pub state: UiState,
    /// Absent while the trending snapshot is still loading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trending: Option<Vec<UsageRecord>>,
}

impl SessionDto {
    #[must_use]
    pub fn from_session(session: &PageSession) -> Self {
        Self {
            id: session.id(),
            opened_at: session.opened_at(),
            state: session.state(),
            trending: session.trending_loaded().then(|| session.trending()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime: u64,
    pub catalog_provider: String,
    pub usage_backend: String,
    pub usage_enabled: bool,
    pub open_sessions: usize,
}
