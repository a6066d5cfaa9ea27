pub mod appwrite;
pub mod omdb;
pub mod tmdb;

use crate::config::{CatalogConfig, CatalogProvider};
use crate::models::Movie;
use std::sync::Arc;
use thiserror::Error;

/// Failures talking to a movie catalog.
///
/// A catalog that is reachable but finds nothing is not an error; adapters return an empty
/// list for that case.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{service} API key is not configured")]
    MissingCredential { service: &'static str },

    #[error("{service} rejected the API key (status {status})")]
    Credential { service: &'static str, status: u16 },

    #[error("{service} API error: {status} - {message}")]
    Status {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    #[error("{service} reported an error: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned an unreadable response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

impl CatalogError {
    /// Whether the user has to fix their credential rather than retry.
    #[must_use]
    pub const fn is_credential(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential { .. } | Self::Credential { .. }
        )
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential { .. } => "missing_credential",
            Self::Credential { .. } => "credential",
            Self::Status { .. } => "status",
            Self::Transport { .. } => "transport",
            Self::Rejected { .. } => "rejected",
            Self::Decode { .. } => "decode",
        }
    }

    pub(crate) fn transport(service: &'static str, err: &reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode {
                service,
                message: err.to_string(),
            }
        } else {
            Self::Transport {
                service,
                message: err.to_string(),
            }
        }
    }
}

/// A movie catalog the search flow can query.
///
/// Implementations map their vendor schema onto [`Movie`].
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    /// Short provider name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Movies matching `query`, in the catalog's relevance order.
    async fn search(&self, query: &str) -> Result<Vec<Movie>, CatalogError>;

    /// The listing shown when no query has been typed.
    async fn list_default(&self) -> Result<Vec<Movie>, CatalogError>;

    /// Numbered steps shown to the user when the catalog rejects the credential.
    fn credential_help(&self) -> Vec<String>;
}

/// Build a shared HTTP client with reasonable defaults for API calls.
/// This client should be reused across all HTTP-based services to enable
/// connection pooling and avoid socket exhaustion.
pub fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .user_agent(concat!("Cinefind/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

/// Builds the configured catalog adapter.
#[must_use]
pub fn catalog_from_config(
    config: &CatalogConfig,
    http: reqwest::Client,
) -> Arc<dyn CatalogClient> {
    match config.provider {
        CatalogProvider::Tmdb => Arc::new(tmdb::TmdbClient::with_shared_client(http, config)),
        CatalogProvider::Omdb => Arc::new(omdb::OmdbClient::with_shared_client(http, config)),
    }
}
