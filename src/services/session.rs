//! Page sessions: one debouncer, one orchestrator and one trending snapshot per open page.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{RwLock, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::clients::CatalogClient;
use crate::config::SearchConfig;
use crate::constants::limits::{DEFAULT_SESSION_IDLE_SECONDS, DEFAULT_TRENDING_LIMIT};
use crate::models::UsageRecord;
use crate::services::debounce::{DEFAULT_QUIET_PERIOD, Debouncer};
use crate::services::search::{SearchOrchestrator, UiState};
use crate::services::usage::UsageRecorder;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub quiet_period: Duration,
    pub trending_limit: u64,
    pub initial_query: String,
    pub idle_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
            trending_limit: DEFAULT_TRENDING_LIMIT,
            initial_query: String::new(),
            idle_timeout: Duration::from_secs(DEFAULT_SESSION_IDLE_SECONDS),
        }
    }
}

impl SessionOptions {
    #[must_use]
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            quiet_period: Duration::from_millis(config.debounce_ms),
            trending_limit: config.trending_limit,
            initial_query: config.initial_query.clone(),
            idle_timeout: Duration::from_secs(config.session_idle_seconds),
        }
    }
}

pub struct PageSession {
    id: Uuid,
    opened_at: DateTime<Utc>,
    started: Instant,
    /// Milliseconds after `started` of the last input or read.
    last_active_ms: AtomicU64,
    debouncer: Debouncer,
    orchestrator: Arc<SearchOrchestrator>,
    trending: watch::Receiver<Option<Vec<UsageRecord>>>,
    driver: JoinHandle<()>,
    trending_task: JoinHandle<()>,
}

impl PageSession {
    /// Starts the initial search and the trending load, then follows committed input.
    #[must_use]
    pub fn open(
        catalog: Arc<dyn CatalogClient>,
        recorder: UsageRecorder,
        options: SessionOptions,
    ) -> Self {
        let id = Uuid::new_v4();
        let orchestrator = Arc::new(SearchOrchestrator::new(catalog, recorder.clone()));
        let (debouncer, committed) = Debouncer::new(options.quiet_period);

        let driver = tokio::spawn(drive(
            orchestrator.clone(),
            committed,
            options.initial_query,
        ));

        let (trending_tx, trending) = watch::channel(None);
        let limit = options.trending_limit;
        let trending_task = tokio::spawn(async move {
            let records = recorder.top_trending(limit).await;
            debug!(count = records.len(), "Trending searches loaded");
            trending_tx.send_replace(Some(records));
        });

        info!(session = %id, "Page session opened");

        Self {
            id,
            opened_at: Utc::now(),
            started: Instant::now(),
            last_active_ms: AtomicU64::new(0),
            debouncer,
            orchestrator,
            trending,
            driver,
            trending_task,
        }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Feeds one raw keystroke value. Returns false once the session is closed.
    pub fn input(&self, raw: impl Into<String>) -> bool {
        self.touch();
        self.debouncer.push(raw)
    }

    /// Marks the session as in use now.
    pub fn touch(&self) {
        let elapsed = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_active_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    /// Time since the last input or read.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_active_ms.load(Ordering::Relaxed));
        self.started.elapsed().saturating_sub(last)
    }

    #[must_use]
    pub fn state(&self) -> UiState {
        self.orchestrator.current()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.orchestrator.subscribe()
    }

    /// True while an event stream follows this session.
    #[must_use]
    pub fn is_watched(&self) -> bool {
        self.orchestrator.watchers() > 0
    }

    /// Trending snapshot, empty until loaded.
    #[must_use]
    pub fn trending(&self) -> Vec<UsageRecord> {
        self.trending.borrow().clone().unwrap_or_default()
    }

    #[must_use]
    pub fn trending_loaded(&self) -> bool {
        self.trending.borrow().is_some()
    }

    pub fn close(&self) {
        self.debouncer.shutdown();
        self.driver.abort();
        self.trending_task.abort();
        debug!(session = %self.id, "Page session closed");
    }
}

impl Drop for PageSession {
    fn drop(&mut self) {
        self.driver.abort();
        self.trending_task.abort();
    }
}

/// Forwards committed values to the orchestrator. Each search runs as its own task so a
/// slow request never delays a newer one.
async fn drive(
    orchestrator: Arc<SearchOrchestrator>,
    mut committed: mpsc::UnboundedReceiver<String>,
    initial_query: String,
) {
    let mut searches = JoinSet::new();
    let mut last = initial_query.clone();
    spawn_search(&mut searches, &orchestrator, initial_query);

    loop {
        tokio::select! {
            value = committed.recv() => {
                let Some(value) = value else { break };
                if value == last {
                    debug!(query = %value, "Committed query unchanged, skipping search");
                    continue;
                }
                last.clone_from(&value);
                spawn_search(&mut searches, &orchestrator, value);
            }
            Some(result) = searches.join_next(), if !searches.is_empty() => {
                match result {
                    Err(e) if e.is_panic() => error!("Search task panicked: {}", e),
                    _ => {}
                }
            }
        }
    }

    while searches.join_next().await.is_some() {}
}

fn spawn_search(
    searches: &mut JoinSet<()>,
    orchestrator: &Arc<SearchOrchestrator>,
    query: String,
) {
    let orchestrator = orchestrator.clone();
    searches.spawn(async move {
        // Usage recording stays detached from the session.
        let _ = orchestrator.execute(&query).await;
    });
}

/// Open sessions keyed by id.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<PageSession>>>,
    catalog: Arc<dyn CatalogClient>,
    recorder: UsageRecorder,
    options: SessionOptions,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        recorder: UsageRecorder,
        options: SessionOptions,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            catalog,
            recorder,
            options,
        }
    }

    /// Opens a session, optionally overriding the configured initial query.
    pub async fn open(&self, initial_query: Option<String>) -> Arc<PageSession> {
        let mut options = self.options.clone();
        if let Some(query) = initial_query {
            options.initial_query = query;
        }

        let session = Arc::new(PageSession::open(
            self.catalog.clone(),
            self.recorder.clone(),
            options,
        ));
        self.sessions
            .write()
            .await
            .insert(session.id(), session.clone());
        session
    }

    /// Looks up a session and counts the lookup as activity.
    pub async fn get(&self, id: Uuid) -> Option<Arc<PageSession>> {
        let session = self.sessions.read().await.get(&id).cloned()?;
        session.touch();
        Some(session)
    }

    /// Removes and closes a session. Returns false when the id is unknown.
    pub async fn close(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id);
        removed.is_some_and(|session| {
            session.close();
            true
        })
    }

    /// Closes every unwatched session idle for at least the configured timeout. Returns how
    /// many were closed.
    pub async fn evict_idle(&self) -> usize {
        let timeout = self.options.idle_timeout;
        let expired: Vec<Uuid> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|session| !session.is_watched() && session.idle_for() >= timeout)
            .map(|session| session.id())
            .collect();

        let mut closed = 0;
        for id in expired {
            if self.close(id).await {
                info!(session = %id, "Idle page session closed");
                closed += 1;
            }
        }
        closed
    }

    /// Runs `evict_idle` every `period` until the registry is dropped.
    #[must_use]
    pub fn spawn_idle_sweep(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let registry: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else { break };
                let closed = registry.evict_idle().await;
                if closed > 0 {
                    metrics::counter!("sessions_evicted_total").increment(closed as u64);
                }
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::CatalogError;
    use crate::db::MemoryUsageStore;
    use crate::models::{Movie, MovieSnapshot};
    use crate::services::usage::UsageStore;
    use std::sync::Mutex;

    /// Returns one movie titled after the query and logs every call.
    #[derive(Default)]
    struct EchoCatalog {
        calls: Mutex<Vec<String>>,
    }

    impl EchoCatalog {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl CatalogClient for EchoCatalog {
        fn name(&self) -> &'static str {
            "Echo"
        }

        async fn search(&self, query: &str) -> Result<Vec<Movie>, CatalogError> {
            self.calls.lock().unwrap().push(query.to_string());
            Ok(vec![Movie {
                id: query.len().to_string(),
                title: query.to_string(),
                poster_url: None,
                release: None,
                overview: None,
                rating: None,
                language: None,
            }])
        }

        async fn list_default(&self) -> Result<Vec<Movie>, CatalogError> {
            self.search("").await.map(|mut movies| {
                movies[0].title = "Popular".to_string();
                movies
            })
        }

        fn credential_help(&self) -> Vec<String> {
            Vec::new()
        }
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    fn open(catalog: Arc<EchoCatalog>, store: Arc<MemoryUsageStore>) -> PageSession {
        PageSession::open(catalog, UsageRecorder::new(store), SessionOptions::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_starts_with_default_listing() {
        let catalog = Arc::new(EchoCatalog::default());
        let session = open(catalog.clone(), Arc::new(MemoryUsageStore::new()));

        advance(1).await;

        let state = session.state();
        assert_eq!(state.query(), "");
        assert_eq!(state.movies().unwrap()[0].title, "Popular");
        assert_eq!(catalog.calls(), vec![""]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_searches_once_after_pause() {
        let catalog = Arc::new(EchoCatalog::default());
        let store = Arc::new(MemoryUsageStore::new());
        let session = open(catalog.clone(), store.clone());
        advance(1).await;

        for value in ["b", "ba", "bat"] {
            assert!(session.input(value));
            advance(100).await;
        }
        assert_eq!(session.state().query(), "");

        advance(600).await;

        assert_eq!(catalog.calls(), vec!["", "bat"]);
        let state = session.state();
        assert_eq!(state.query(), "bat");
        assert_eq!(state.movies().unwrap()[0].title, "bat");

        let record = store.find_by_query("bat").await.unwrap().unwrap();
        assert_eq!(record.count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_committed_query_is_not_searched_again() {
        let catalog = Arc::new(EchoCatalog::default());
        let session = open(catalog.clone(), Arc::new(MemoryUsageStore::new()));
        advance(1).await;

        session.input("dune");
        advance(600).await;
        session.input("dun");
        session.input("dune");
        advance(600).await;

        assert_eq!(catalog.calls(), vec!["", "dune"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trending_loaded_once() {
        let store = Arc::new(MemoryUsageStore::with_records(vec![UsageRecord {
            id: "1".to_string(),
            query: "alien".to_string(),
            count: 3,
            movie: MovieSnapshot {
                movie_id: "348".to_string(),
                title: "Alien".to_string(),
                poster_url: None,
            },
        }]));
        let session = open(Arc::new(EchoCatalog::default()), store.clone());
        advance(1).await;

        assert!(session.trending_loaded());
        assert_eq!(session.trending()[0].query, "alien");

        session.input("heat");
        advance(600).await;

        // The snapshot is not refreshed by later searches.
        assert_eq!(session.trending().len(), 1);
        assert!(store.find_by_query("heat").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_session_rejects_input() {
        let session = open(
            Arc::new(EchoCatalog::default()),
            Arc::new(MemoryUsageStore::new()),
        );
        advance(1).await;

        session.close();
        advance(1).await;

        assert!(!session.input("heat"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_open_get_close() {
        let catalog = Arc::new(EchoCatalog::default());
        let registry = SessionRegistry::new(
            catalog.clone(),
            UsageRecorder::disabled(),
            SessionOptions::default(),
        );

        let session = registry.open(Some("matrix".to_string())).await;
        advance(1).await;

        assert_eq!(registry.len().await, 1);
        let found = registry.get(session.id()).await.unwrap();
        assert_eq!(found.state().query(), "matrix");
        assert_eq!(catalog.calls(), vec!["matrix"]);

        assert!(registry.close(session.id()).await);
        assert!(!registry.close(session.id()).await);
        assert!(registry.get(session.id()).await.is_none());
        assert!(registry.is_empty().await);
    }

    fn idle_registry(idle_secs: u64) -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(
            Arc::new(EchoCatalog::default()),
            UsageRecorder::disabled(),
            SessionOptions {
                idle_timeout: Duration::from_secs(idle_secs),
                ..SessionOptions::default()
            },
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_are_evicted_and_active_ones_kept() {
        let registry = idle_registry(60);
        let idle = registry.open(None).await;
        let typing = registry.open(None).await;
        let reading = registry.open(None).await;

        advance(40_000).await;
        assert!(typing.input("heat"));
        assert!(registry.get(reading.id()).await.is_some());
        advance(30_000).await;

        assert_eq!(registry.evict_idle().await, 1);
        assert!(registry.get(idle.id()).await.is_none());
        advance(1).await;
        assert!(!idle.input("late"));
        assert_eq!(registry.len().await, 2);

        advance(61_000).await;
        assert_eq!(registry.evict_idle().await, 2);
        assert!(registry.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watched_session_is_not_evicted() {
        let registry = idle_registry(60);
        let session = registry.open(None).await;
        let events = session.subscribe();

        advance(120_000).await;
        assert_eq!(registry.evict_idle().await, 0);
        assert_eq!(registry.len().await, 1);

        drop(events);
        assert_eq!(registry.evict_idle().await, 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sweep_empties_abandoned_registry() {
        let registry = idle_registry(1800);
        for _ in 0..1000 {
            registry.open(None).await;
        }
        let sweep = registry.spawn_idle_sweep(Duration::from_secs(60));

        advance(60 * 60 * 1000).await;

        assert!(registry.is_empty().await);
        assert!(!sweep.is_finished());
        sweep.abort();
    }
}
