use crate::models::{MovieSnapshot, UsageRecord};
use crate::services::usage::{UsageError, UsageStore};
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

mod memory;
pub mod migrator;
pub mod repositories;

pub use memory::MemoryUsageStore;

/// SQLite-backed usage store.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");
        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        // Every pooled connection to sqlite::memory: is a separate database.
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn usage_repo(&self) -> repositories::usage::UsageRepository {
        repositories::usage::UsageRepository::new(self.conn.clone())
    }
}

#[async_trait::async_trait]
impl UsageStore for Store {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn find_by_query(&self, query: &str) -> Result<Option<UsageRecord>, UsageError> {
        Ok(self.usage_repo().find_by_term(query).await?)
    }

    async fn create(&self, query: &str, movie: &MovieSnapshot) -> Result<UsageRecord, UsageError> {
        Ok(self.usage_repo().insert(query, movie).await?)
    }

    async fn update_count(&self, id: &str, count: i64) -> Result<(), UsageError> {
        let row_id: i32 = id
            .parse()
            .map_err(|_| UsageError::NotFound(id.to_string()))?;

        match self.usage_repo().set_count(row_id, count).await? {
            0 => Err(UsageError::NotFound(id.to_string())),
            _ => Ok(()),
        }
    }

    async fn top_by_count(&self, limit: u64) -> Result<Vec<UsageRecord>, UsageError> {
        Ok(self.usage_repo().top(limit).await?)
    }
}
