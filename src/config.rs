use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants::limits::{DEFAULT_SESSION_IDLE_SECONDS, DEFAULT_TRENDING_LIMIT};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub catalog: CatalogConfig,

    pub search: SearchConfig,

    pub usage: UsageConfig,

    pub server: ServerConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    #[serde(default)]
    pub suppress_connection_errors: bool,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            suppress_connection_errors: false,
            worker_threads: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogProvider {
    Tmdb,
    Omdb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub provider: CatalogProvider,

    /// TMDB read access token (v4) or v3 key, or the OMDb key.
    pub api_key: String,

    /// Overrides the provider's public endpoint.
    pub base_url: Option<String>,

    /// Prefix joined with TMDB `poster_path` values.
    pub image_base_url: String,

    /// Search term used as the default listing for catalogs without a popularity feed.
    pub default_query: String,

    pub request_timeout_seconds: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            provider: CatalogProvider::Tmdb,
            api_key: String::new(),
            base_url: None,
            image_base_url: "https://image.tmdb.org/t/p/w500".to_string(),
            default_query: "avengers".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Quiet period before typed input is committed as a query.
    pub debounce_ms: u64,

    pub trending_limit: u64,

    /// Query searched when a session opens without one.
    pub initial_query: String,

    /// Sessions without input or reads for this long are closed.
    pub session_idle_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            trending_limit: DEFAULT_TRENDING_LIMIT,
            initial_query: String::new(),
            session_idle_seconds: DEFAULT_SESSION_IDLE_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageBackend {
    Appwrite,
    Sqlite,
    Memory,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    pub backend: UsageBackend,

    pub appwrite: AppwriteConfig,

    pub sqlite: SqliteConfig,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            backend: UsageBackend::Appwrite,
            appwrite: AppwriteConfig::default(),
            sqlite: SqliteConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppwriteConfig {
    pub endpoint: String,

    pub project_id: String,

    pub database_id: String,

    pub collection_id: String,

    /// Server API key. Optional when the collection grants public document access.
    pub api_key: Option<String>,
}

impl Default for AppwriteConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://nyc.cloud.appwrite.io/v1".to_string(),
            project_id: String::new(),
            database_id: String::new(),
            collection_id: String::new(),
            api_key: None,
        }
    }
}

impl AppwriteConfig {
    /// Names of required identifiers that are not set.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("endpoint", &self.endpoint),
            ("project_id", &self.project_id),
            ("database_id", &self.database_id),
            ("collection_id", &self.collection_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    pub database_path: String,

    /// Maximum database connections (default: 5)
    pub max_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_connections: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/cinefind.db".to_string(),
            max_connections: 5,
            min_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 6790,
            cors_allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

impl Config {
    /// Loads the first config file found, then applies `.env` and process environment
    /// overrides.
    pub fn load() -> Result<Self> {
        // A missing .env is the common case.
        let _ = dotenvy::dotenv();

        let mut config = Self::load_file()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    /// Applies environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|&key| lookup(key))
                .find(|value| !value.trim().is_empty())
        };

        let key_vars: &[&str] = match self.catalog.provider {
            CatalogProvider::Tmdb => &["TMDB_API_KEY", "VITE_TMDB_API_KEY"],
            CatalogProvider::Omdb => &["OMDB_API_KEY", "VITE_OMDB_API_KEY"],
        };
        if let Some(key) = first(key_vars) {
            self.catalog.api_key = key;
        }

        let appwrite = &mut self.usage.appwrite;
        if let Some(endpoint) = first(&["APPWRITE_ENDPOINT", "VITE_APPWRITE_ENDPOINT"]) {
            appwrite.endpoint = endpoint;
        }
        if let Some(project) = first(&["APPWRITE_PROJECT_ID", "VITE_APPWRITE_PROJECT_ID"]) {
            appwrite.project_id = project;
        }
        if let Some(database) = first(&["APPWRITE_DATABASE_ID", "VITE_APPWRITE_DATABASE_ID"]) {
            appwrite.database_id = database;
        }
        if let Some(collection) =
            first(&["APPWRITE_COLLECTION_ID", "VITE_APPWRITE_COLLECTION_ID"])
        {
            appwrite.collection_id = collection;
        }
        if let Some(api_key) = first(&["APPWRITE_API_KEY"]) {
            appwrite.api_key = Some(api_key);
        }

        if let Some(level) = first(&["CINEFIND_LOG_LEVEL"]) {
            self.general.log_level = level;
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("cinefind").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".cinefind").join("config.toml"));
        }

        paths
    }

    #[must_use]
    pub fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            Self::default().save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.catalog.request_timeout_seconds == 0 {
            anyhow::bail!("Catalog request timeout must be > 0");
        }

        if self.search.trending_limit == 0 {
            anyhow::bail!("Trending limit must be > 0");
        }

        if self.search.session_idle_seconds == 0 {
            anyhow::bail!("Session idle timeout must be > 0");
        }

        if self.server.enabled && self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0 when the server is enabled");
        }

        if self.usage.backend == UsageBackend::Sqlite
            && self.usage.sqlite.database_path.trim().is_empty()
        {
            anyhow::bail!("SQLite database path cannot be empty when the sqlite backend is used");
        }

        Ok(())
    }
}
