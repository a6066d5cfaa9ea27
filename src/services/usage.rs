//! Per-query usage counting for the trending list.
//!
//! Recording never fails the caller: the recorder swallows and logs every persistence
//! error, and a recorder without a store is a no-op.

use crate::models::{MovieSnapshot, UsageRecord, normalize_query};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum UsageError {
    #[error("Usage store unavailable: {0}")]
    Unavailable(String),

    #[error("Usage store rejected the request: {status} - {message}")]
    Rejected { status: u16, message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid usage document: {0}")]
    Decode(String),

    #[error("Usage record not found: {0}")]
    NotFound(String),
}

impl From<sea_orm::DbErr> for UsageError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

/// Document store holding one [`UsageRecord`] per distinct query.
#[async_trait::async_trait]
pub trait UsageStore: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &'static str;

    /// Record whose query equals `query` exactly.
    async fn find_by_query(&self, query: &str) -> Result<Option<UsageRecord>, UsageError>;

    /// Inserts a new record with a count of 1.
    async fn create(
        &self,
        query: &str,
        movie: &MovieSnapshot,
    ) -> Result<UsageRecord, UsageError>;

    /// Overwrites the count of an existing record.
    async fn update_count(&self, id: &str, count: i64) -> Result<(), UsageError>;

    /// Up to `limit` records by descending count, ties in insertion order.
    async fn top_by_count(&self, limit: u64) -> Result<Vec<UsageRecord>, UsageError>;
}

#[derive(Clone)]
pub struct UsageRecorder {
    store: Option<Arc<dyn UsageStore>>,
    write_lock: Arc<Mutex<()>>,
}

impl UsageRecorder {
    #[must_use]
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self {
            store: Some(store),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Recorder for a missing or misconfigured backend.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            store: None,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.store.as_ref().map_or("disabled", |s| s.name())
    }

    /// Counts one more search for `query`, creating the record with `movie` on first use.
    pub async fn increment(&self, query: &str, movie: &MovieSnapshot) {
        let Some(store) = &self.store else {
            debug!("Usage store not configured, skipping search count update");
            return;
        };

        let query = normalize_query(query);
        if query.is_empty() {
            return;
        }

        if let Err(e) = self.try_increment(store.as_ref(), query, movie).await {
            metrics::counter!("usage_record_failures_total").increment(1);
            warn!(
                backend = store.name(),
                query,
                error = %e,
                "Failed to update search count"
            );
        }
    }

    async fn try_increment(
        &self,
        store: &dyn UsageStore,
        query: &str,
        movie: &MovieSnapshot,
    ) -> Result<(), UsageError> {
        // find-then-write is not atomic in the store; serialize it here.
        let _guard = self.write_lock.lock().await;

        if let Some(record) = store.find_by_query(query).await? {
            store.update_count(&record.id, record.count + 1).await?;
            metrics::counter!("usage_records_total", "op" => "update").increment(1);
            debug!(query, count = record.count + 1, "Search count updated");
        } else {
            store.create(query, movie).await?;
            metrics::counter!("usage_records_total", "op" => "create").increment(1);
            debug!(query, "Search count created");
        }

        Ok(())
    }

    /// Runs [`Self::increment`] on a detached task.
    pub fn increment_detached(&self, query: String, movie: MovieSnapshot) -> JoinHandle<()> {
        let recorder = self.clone();
        tokio::spawn(async move { recorder.increment(&query, &movie).await })
    }

    /// The most searched queries. Empty when the store is missing or failing.
    pub async fn top_trending(&self, limit: u64) -> Vec<UsageRecord> {
        let Some(store) = &self.store else {
            debug!("Usage store not configured, returning empty trending list");
            return Vec::new();
        };

        match store.top_by_count(limit).await {
            Ok(records) => records,
            Err(e) => {
                warn!(backend = store.name(), error = %e, "Failed to load trending searches");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryUsageStore;

    fn snapshot(id: &str, title: &str) -> MovieSnapshot {
        MovieSnapshot {
            movie_id: id.to_string(),
            title: title.to_string(),
            poster_url: None,
        }
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl UsageStore for FailingStore {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn find_by_query(&self, _query: &str) -> Result<Option<UsageRecord>, UsageError> {
            Err(UsageError::Unavailable("connection refused".to_string()))
        }

        async fn create(
            &self,
            _query: &str,
            _movie: &MovieSnapshot,
        ) -> Result<UsageRecord, UsageError> {
            Err(UsageError::Unavailable("connection refused".to_string()))
        }

        async fn update_count(&self, _id: &str, _count: i64) -> Result<(), UsageError> {
            Err(UsageError::Unavailable("connection refused".to_string()))
        }

        async fn top_by_count(&self, _limit: u64) -> Result<Vec<UsageRecord>, UsageError> {
            Err(UsageError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_increment_twice_keeps_first_snapshot() {
        let store = Arc::new(MemoryUsageStore::new());
        let recorder = UsageRecorder::new(store.clone());

        recorder.increment("dune", &snapshot("1", "Dune")).await;
        recorder
            .increment("dune", &snapshot("2", "Dune: Part Two"))
            .await;

        let records = store.top_by_count(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].query, "dune");
        assert_eq!(records[0].count, 2);
        assert_eq!(records[0].movie, snapshot("1", "Dune"));
    }

    #[tokio::test]
    async fn test_increment_normalizes_query() {
        let store = Arc::new(MemoryUsageStore::new());
        let recorder = UsageRecorder::new(store.clone());

        recorder.increment("  alien ", &snapshot("348", "Alien")).await;
        recorder.increment("alien", &snapshot("348", "Alien")).await;
        recorder.increment("Alien", &snapshot("348", "Alien")).await;
        recorder.increment("   ", &snapshot("348", "Alien")).await;

        let records = store.top_by_count(10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].query, "alien");
        assert_eq!(records[0].count, 2);
        assert_eq!(records[1].query, "Alien");
    }

    #[tokio::test]
    async fn test_concurrent_increments_do_not_lose_updates() {
        let store = Arc::new(MemoryUsageStore::new());
        let recorder = UsageRecorder::new(store.clone());

        let handles: Vec<_> = (0..8)
            .map(|_| recorder.increment_detached("heat".to_string(), snapshot("949", "Heat")))
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let record = store.find_by_query("heat").await.unwrap().unwrap();
        assert_eq!(record.count, 8);
    }

    #[tokio::test]
    async fn test_top_trending_orders_by_count() {
        let store = Arc::new(MemoryUsageStore::new());
        let recorder = UsageRecorder::new(store.clone());

        let counts = [("a", 9), ("b", 7), ("c", 7), ("d", 3), ("e", 3), ("f", 3), ("g", 1)];
        for (query, count) in counts {
            for _ in 0..count {
                recorder.increment(query, &snapshot(query, query)).await;
            }
        }

        let top = recorder.top_trending(5).await;
        let summary: Vec<(&str, i64)> = top.iter().map(|r| (r.query.as_str(), r.count)).collect();
        assert_eq!(
            summary,
            vec![("a", 9), ("b", 7), ("c", 7), ("d", 3), ("e", 3)]
        );
    }

    #[tokio::test]
    async fn test_disabled_recorder_is_noop() {
        let recorder = UsageRecorder::disabled();
        assert!(!recorder.is_enabled());
        assert_eq!(recorder.backend_name(), "disabled");

        recorder.increment("dune", &snapshot("1", "Dune")).await;
        assert!(recorder.top_trending(5).await.is_empty());
    }

    #[tokio::test]
    async fn test_failing_store_is_swallowed() {
        let recorder = UsageRecorder::new(Arc::new(FailingStore));

        recorder.increment("dune", &snapshot("1", "Dune")).await;
        recorder
            .increment_detached("dune".to_string(), snapshot("1", "Dune"))
            .await
            .unwrap();
        assert!(recorder.top_trending(5).await.is_empty());
    }
}
