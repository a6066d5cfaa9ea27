//! Search orchestration: turns committed queries into catalog requests and owns the
//! resulting UI state.
//!
//! Requests may overlap. Each one takes a sequence number when it is issued and only the
//! most recently issued request is allowed to publish its outcome, so a slow response for
//! an older query can never overwrite the state of a newer one.

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::clients::{CatalogClient, CatalogError};
use crate::models::Movie;
use crate::services::usage::UsageRecorder;

const GENERIC_MESSAGE: &str = "Error fetching movies. Please try again later.";

/// Whether a failed search needs the user to fix a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Credential,
    Generic,
}

/// What the user sees when a search fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Numbered steps, only present for credential failures.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remediation: Vec<String>,
}

impl SearchFailure {
    fn from_error(err: &CatalogError, catalog: &dyn CatalogClient) -> Self {
        if err.is_credential() {
            Self {
                kind: FailureKind::Credential,
                message: format!(
                    "Invalid API key. Please check your {} API key configuration.",
                    catalog.name()
                ),
                remediation: catalog
                    .credential_help()
                    .into_iter()
                    .enumerate()
                    .map(|(i, step)| format!("{}. {step}", i + 1))
                    .collect(),
            }
        } else {
            Self {
                kind: FailureKind::Generic,
                message: GENERIC_MESSAGE.to_string(),
                remediation: Vec::new(),
            }
        }
    }
}

/// Page state for the latest query. The variants are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UiState {
    Loading { query: String },
    Error { query: String, error: SearchFailure },
    Loaded { query: String, movies: Vec<Movie> },
}

impl UiState {
    #[must_use]
    pub fn query(&self) -> &str {
        match self {
            Self::Loading { query } | Self::Error { query, .. } | Self::Loaded { query, .. } => {
                query
            }
        }
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    #[must_use]
    pub fn movies(&self) -> Option<&[Movie]> {
        match self {
            Self::Loaded { movies, .. } => Some(movies),
            _ => None,
        }
    }

    #[must_use]
    pub const fn failure(&self) -> Option<&SearchFailure> {
        match self {
            Self::Error { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Result of one [`SearchOrchestrator::execute`] call.
pub struct SearchRun {
    pub state: UiState,
    /// False when a newer request was issued before this one finished.
    pub published: bool,
    /// Detached usage recording, when one was started.
    pub usage: Option<JoinHandle<()>>,
}

pub struct SearchOrchestrator {
    catalog: Arc<dyn CatalogClient>,
    recorder: UsageRecorder,
    state: watch::Sender<UiState>,
    issued: AtomicU64,
}

impl SearchOrchestrator {
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogClient>, recorder: UsageRecorder) -> Self {
        let (state, _) = watch::channel(UiState::Loading {
            query: String::new(),
        });

        Self {
            catalog,
            recorder,
            state,
            issued: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.state.subscribe()
    }

    /// Number of live state subscribers.
    #[must_use]
    pub fn watchers(&self) -> usize {
        self.state.receiver_count()
    }

    #[must_use]
    pub fn current(&self) -> UiState {
        self.state.borrow().clone()
    }

    /// Searches for `query` (or lists the default set when it is blank) and returns the
    /// outcome of this request.
    pub async fn search(&self, query: &str) -> UiState {
        self.execute(query).await.state
    }

    pub async fn execute(&self, query: &str) -> SearchRun {
        let query = query.trim().to_string();

        let mut seq = 0;
        self.state.send_modify(|state| {
            seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            *state = UiState::Loading {
                query: query.clone(),
            };
        });

        let kind = if query.is_empty() { "default" } else { "search" };
        debug!(seq, query = %query, kind, "Issuing catalog request");

        let result = if query.is_empty() {
            self.catalog.list_default().await
        } else {
            self.catalog.search(&query).await
        };

        let state = match result {
            Ok(movies) => {
                metrics::counter!(
                    "catalog_requests_total",
                    "provider" => self.catalog.name(),
                    "kind" => kind,
                    "outcome" => "success"
                )
                .increment(1);
                info!(query = %query, results = movies.len(), "Catalog request finished");
                UiState::Loaded {
                    query: query.clone(),
                    movies,
                }
            }
            Err(e) => {
                metrics::counter!(
                    "catalog_requests_total",
                    "provider" => self.catalog.name(),
                    "kind" => kind,
                    "outcome" => e.kind()
                )
                .increment(1);
                error!(query = %query, error = %e, "Error fetching movies");
                UiState::Error {
                    query: query.clone(),
                    error: SearchFailure::from_error(&e, self.catalog.as_ref()),
                }
            }
        };

        let published = self.state.send_if_modified(|current| {
            if self.issued.load(Ordering::SeqCst) == seq {
                *current = state.clone();
                true
            } else {
                false
            }
        });

        if !published {
            metrics::counter!("stale_responses_discarded_total").increment(1);
            debug!(seq, query = %query, "Discarding response for superseded query");
            return SearchRun {
                state,
                published,
                usage: None,
            };
        }

        let usage = match &state {
            UiState::Loaded { movies, .. } if !query.is_empty() => movies
                .first()
                .map(|top| self.recorder.increment_detached(query.clone(), top.snapshot())),
            _ => None,
        };

        SearchRun {
            state,
            published,
            usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryUsageStore;
    use crate::services::usage::UsageStore;
    use std::collections::HashMap;
    use std::time::Duration;

    fn movie(id: &str, title: &str) -> Movie {
        Movie {
            id: id.to_string(),
            title: title.to_string(),
            poster_url: None,
            release: Some("2021-09-15".to_string()),
            overview: None,
            rating: None,
            language: None,
        }
    }

    enum Reply {
        Movies(Vec<Movie>),
        Unauthorized,
        ServerError,
    }

    /// Catalog answering from a table, optionally after a per-query delay.
    struct FakeCatalog {
        replies: HashMap<String, Reply>,
        delays: HashMap<String, Duration>,
    }

    impl FakeCatalog {
        fn new() -> Self {
            Self {
                replies: HashMap::new(),
                delays: HashMap::new(),
            }
        }

        fn reply(mut self, query: &str, reply: Reply) -> Self {
            self.replies.insert(query.to_string(), reply);
            self
        }

        fn delay(mut self, query: &str, ms: u64) -> Self {
            self.delays
                .insert(query.to_string(), Duration::from_millis(ms));
            self
        }

        async fn answer(&self, key: &str) -> Result<Vec<Movie>, CatalogError> {
            if let Some(delay) = self.delays.get(key) {
                tokio::time::sleep(*delay).await;
            }
            match self.replies.get(key) {
                Some(Reply::Movies(movies)) => Ok(movies.clone()),
                Some(Reply::Unauthorized) => Err(CatalogError::Credential {
                    service: "Fake",
                    status: 401,
                }),
                Some(Reply::ServerError) => Err(CatalogError::Status {
                    service: "Fake",
                    status: 500,
                    message: "Internal Server Error".to_string(),
                }),
                None => Ok(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl CatalogClient for FakeCatalog {
        fn name(&self) -> &'static str {
            "Fake"
        }

        async fn search(&self, query: &str) -> Result<Vec<Movie>, CatalogError> {
            self.answer(query).await
        }

        async fn list_default(&self) -> Result<Vec<Movie>, CatalogError> {
            self.answer("").await
        }

        fn credential_help(&self) -> Vec<String> {
            vec!["Get a key".to_string(), "Restart".to_string()]
        }
    }

    fn orchestrator(catalog: FakeCatalog) -> (SearchOrchestrator, Arc<MemoryUsageStore>) {
        let store = Arc::new(MemoryUsageStore::new());
        let recorder = UsageRecorder::new(store.clone());
        (SearchOrchestrator::new(Arc::new(catalog), recorder), store)
    }

    #[tokio::test]
    async fn test_initial_state_is_loading() {
        let (orchestrator, _) = orchestrator(FakeCatalog::new());
        assert!(orchestrator.current().is_loading());
    }

    #[tokio::test]
    async fn test_empty_query_lists_default_set() {
        let catalog = FakeCatalog::new().reply(
            "",
            Reply::Movies(vec![movie("1", "Popular One"), movie("2", "Popular Two")]),
        );
        let (orchestrator, store) = orchestrator(catalog);

        let run = orchestrator.execute("   ").await;

        assert!(run.published);
        assert!(run.usage.is_none());
        assert_eq!(run.state.movies().map(<[Movie]>::len), Some(2));
        assert_eq!(orchestrator.current(), run.state);
        assert!(store.top_by_count(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_records_first_result() {
        let catalog = FakeCatalog::new().reply(
            "dune",
            Reply::Movies(vec![movie("438631", "Dune"), movie("841", "Dune (1984)")]),
        );
        let (orchestrator, store) = orchestrator(catalog);

        let run = orchestrator.execute("dune").await;
        run.usage.expect("usage recording started").await.unwrap();

        let record = store.find_by_query("dune").await.unwrap().unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(record.movie.movie_id, "438631");
    }

    #[tokio::test]
    async fn test_empty_result_is_loaded_not_error() {
        let (orchestrator, store) = orchestrator(FakeCatalog::new());

        let run = orchestrator.execute("zzzzqqq").await;

        assert_eq!(run.state.movies(), Some(&[][..]));
        assert!(run.state.failure().is_none());
        assert!(run.usage.is_none());
        assert!(store.top_by_count(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credential_failure_has_remediation() {
        let catalog = FakeCatalog::new()
            .reply("dune", Reply::Unauthorized)
            .reply("heat", Reply::ServerError);
        let (orchestrator, _) = orchestrator(catalog);

        let credential = orchestrator.search("dune").await;
        let credential = credential.failure().unwrap().clone();
        assert_eq!(credential.kind, FailureKind::Credential);
        assert!(credential.message.contains("Invalid API key"));
        assert_eq!(credential.remediation, vec!["1. Get a key", "2. Restart"]);

        let generic = orchestrator.search("heat").await;
        let generic = generic.failure().unwrap();
        assert_eq!(generic.kind, FailureKind::Generic);
        assert_eq!(generic.message, GENERIC_MESSAGE);
        assert!(generic.remediation.is_empty());
        assert_ne!(generic.message, credential.message);
    }

    #[tokio::test]
    async fn test_error_then_success_replaces_state() {
        let catalog = FakeCatalog::new()
            .reply("heat", Reply::ServerError)
            .reply("alien", Reply::Movies(vec![movie("348", "Alien")]));
        let (orchestrator, _) = orchestrator(catalog);

        assert!(orchestrator.search("heat").await.failure().is_some());
        orchestrator.search("alien").await;

        let current = orchestrator.current();
        assert!(current.failure().is_none());
        assert_eq!(current.query(), "alien");
        assert_eq!(current.movies().unwrap()[0].title, "Alien");
    }

    #[tokio::test]
    async fn test_subscribers_see_loading_before_result() {
        let catalog = FakeCatalog::new()
            .reply("alien", Reply::Movies(vec![movie("348", "Alien")]))
            .delay("alien", 50);
        let (orchestrator, _) = orchestrator(catalog);
        let orchestrator = Arc::new(orchestrator);
        let mut rx = orchestrator.subscribe();

        let task = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.search("alien").await })
        };

        rx.changed().await.unwrap();
        assert_eq!(
            *rx.borrow_and_update(),
            UiState::Loading {
                query: "alien".to_string()
            }
        );

        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().movies().is_some());
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_discarded() {
        let catalog = FakeCatalog::new()
            .reply("a", Reply::Movies(vec![movie("1", "A Movie")]))
            .reply("ab", Reply::Movies(vec![movie("2", "AB Movie")]))
            .delay("a", 300)
            .delay("ab", 100);
        let (orchestrator, store) = orchestrator(catalog);
        let orchestrator = Arc::new(orchestrator);

        let first = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.execute("a").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.execute("ab").await })
        };

        let second = second.await.unwrap();
        let first = first.await.unwrap();

        assert!(second.published);
        assert!(!first.published);
        assert!(first.usage.is_none());
        assert_eq!(first.state.query(), "a");

        let current = orchestrator.current();
        assert_eq!(current.query(), "ab");
        assert_eq!(current.movies().unwrap()[0].id, "2");

        second.usage.unwrap().await.unwrap();
        assert!(store.find_by_query("a").await.unwrap().is_none());
        assert_eq!(store.find_by_query("ab").await.unwrap().unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_recorder_failure_does_not_touch_state() {
        let catalog = FakeCatalog::new().reply("dune", Reply::Movies(vec![movie("1", "Dune")]));
        let orchestrator = SearchOrchestrator::new(Arc::new(catalog), UsageRecorder::disabled());

        let run = orchestrator.execute("dune").await;
        run.usage.unwrap().await.unwrap();

        assert_eq!(orchestrator.current(), run.state);
        assert!(run.state.movies().is_some());
    }
}
