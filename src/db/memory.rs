use crate::models::{MovieSnapshot, UsageRecord};
use crate::services::usage::{UsageError, UsageStore};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Process-local usage store. Records live as long as the process.
#[derive(Default)]
pub struct MemoryUsageStore {
    records: RwLock<Vec<UsageRecord>>,
    next_id: AtomicU64,
}

impl MemoryUsageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `records`, in insertion order.
    #[must_use]
    pub fn with_records(records: Vec<UsageRecord>) -> Self {
        let next_id = records.len() as u64;
        Self {
            records: RwLock::new(records),
            next_id: AtomicU64::new(next_id),
        }
    }
}

#[async_trait::async_trait]
impl UsageStore for MemoryUsageStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn find_by_query(&self, query: &str) -> Result<Option<UsageRecord>, UsageError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.query == query).cloned())
    }

    async fn create(&self, query: &str, movie: &MovieSnapshot) -> Result<UsageRecord, UsageError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = UsageRecord {
            id: id.to_string(),
            query: query.to_string(),
            count: 1,
            movie: movie.clone(),
        };

        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn update_count(&self, id: &str, count: i64) -> Result<(), UsageError> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| UsageError::NotFound(id.to_string()))?;
        record.count = count;
        Ok(())
    }

    async fn top_by_count(&self, limit: u64) -> Result<Vec<UsageRecord>, UsageError> {
        let mut records = self.records.read().await.clone();
        // Stable sort keeps insertion order among equal counts.
        records.sort_by(|a, b| b.count.cmp(&a.count));
        records.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(records)
    }
}
