use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::appwrite::AppwriteClient;
use crate::clients::{CatalogClient, build_shared_http_client, catalog_from_config};
use crate::config::{Config, UsageBackend};
use crate::constants::intervals::SESSION_SWEEP;
use crate::db::{MemoryUsageStore, Store};
use crate::services::{SessionOptions, SessionRegistry, UsageRecorder};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub catalog: Arc<dyn CatalogClient>,

    pub recorder: UsageRecorder,

    pub sessions: Arc<SessionRegistry>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // One pooled client for the catalog and the Appwrite store.
        let http_client = build_shared_http_client(config.catalog.request_timeout_seconds)?;

        let catalog = catalog_from_config(&config.catalog, http_client.clone());
        let recorder = build_recorder(&config, http_client).await?;

        info!(
            catalog = catalog.name(),
            usage = recorder.backend_name(),
            "Services initialized"
        );

        let state = Self::with_components(config, catalog, recorder);
        // Detached; the sweep ends once the registry is dropped.
        drop(state.sessions.spawn_idle_sweep(SESSION_SWEEP));

        Ok(state)
    }

    /// Assembles state from already built components.
    #[must_use]
    pub fn with_components(
        config: Config,
        catalog: Arc<dyn CatalogClient>,
        recorder: UsageRecorder,
    ) -> Self {
        let sessions = Arc::new(SessionRegistry::new(
            catalog.clone(),
            recorder.clone(),
            SessionOptions::from_config(&config.search),
        ));

        Self {
            config: Arc::new(config),
            catalog,
            recorder,
            sessions,
        }
    }
}

async fn build_recorder(
    config: &Config,
    http_client: reqwest::Client,
) -> anyhow::Result<UsageRecorder> {
    let usage = &config.usage;

    let recorder = match usage.backend {
        UsageBackend::Appwrite => {
            if let Some(client) = AppwriteClient::from_config(http_client, &usage.appwrite) {
                UsageRecorder::new(Arc::new(client))
            } else {
                warn!(
                    missing = ?usage.appwrite.missing_fields(),
                    "Appwrite is not configured, search counts will not be recorded"
                );
                UsageRecorder::disabled()
            }
        }
        UsageBackend::Sqlite => {
            let store = Store::with_pool_options(
                &usage.sqlite.database_path,
                usage.sqlite.max_connections,
                usage.sqlite.min_connections,
            )
            .await?;
            UsageRecorder::new(Arc::new(store))
        }
        UsageBackend::Memory => UsageRecorder::new(Arc::new(MemoryUsageStore::new())),
        UsageBackend::Disabled => UsageRecorder::disabled(),
    };

    Ok(recorder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_appwrite_disables_recording() {
        let state = SharedState::new(Config::default()).await.unwrap();
        assert!(!state.recorder.is_enabled());
        assert_eq!(state.catalog.name(), "TMDB");
    }

    #[tokio::test]
    async fn test_sqlite_backend() {
        let mut config = Config::default();
        config.usage.backend = UsageBackend::Sqlite;
        config.usage.sqlite.database_path = "sqlite::memory:".to_string();

        let state = SharedState::new(config).await.unwrap();
        assert_eq!(state.recorder.backend_name(), "sqlite");
        assert!(state.sessions.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_sessions_are_swept() {
        let mut config = Config::default();
        config.usage.backend = UsageBackend::Memory;
        config.search.session_idle_seconds = 90;

        let state = SharedState::new(config).await.unwrap();
        let session = state.sessions.open(None).await;
        assert_eq!(state.sessions.len().await, 1);

        tokio::time::sleep(std::time::Duration::from_secs(7 * 24 * 60 * 60)).await;

        assert!(state.sessions.is_empty().await);
        assert!(state.sessions.get(session.id()).await.is_none());
    }
}
