use reqwest::{Client, StatusCode, header::ACCEPT};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{CatalogClient, CatalogError};
use crate::config::CatalogConfig;
use crate::models::Movie;

const TMDB_API: &str = "https://api.themoviedb.org/3";
const SERVICE: &str = "TMDB";

#[derive(Debug, Deserialize)]
struct TmdbPage {
    #[serde(default)]
    results: Vec<TmdbMovie>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovie {
    id: i64,
    #[serde(default)]
    title: String,
    poster_path: Option<String>,
    release_date: Option<String>,
    overview: Option<String>,
    vote_average: Option<f32>,
    original_language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbStatus {
    status_message: Option<String>,
}

/// How the credential is attached to requests.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TmdbAuth {
    /// v4 read access token, sent as a bearer header.
    Bearer(String),
    /// 32 character v3 key, sent as the `api_key` query parameter.
    ApiKey(String),
    Missing,
}

impl TmdbAuth {
    fn from_key(key: &str) -> Self {
        let key = key.trim();
        if key.is_empty() {
            Self::Missing
        } else if key.len() == 32 && key.chars().all(|c| c.is_ascii_hexdigit()) {
            Self::ApiKey(key.to_string())
        } else {
            Self::Bearer(key.to_string())
        }
    }
}

#[derive(Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    image_base_url: String,
    auth: TmdbAuth,
}

impl TmdbClient {
    #[must_use]
    pub fn with_shared_client(client: Client, config: &CatalogConfig) -> Self {
        Self {
            client,
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(TMDB_API)
                .trim_end_matches('/')
                .to_string(),
            image_base_url: config.image_base_url.trim_end_matches('/').to_string(),
            auth: TmdbAuth::from_key(&config.api_key),
        }
    }

    async fn fetch(&self, path: &str, params: &[(&str, &str)]) -> Result<Vec<Movie>, CatalogError> {
        let mut url = Url::parse(&format!("{}{path}", self.base_url)).map_err(|e| {
            CatalogError::Transport {
                service: SERVICE,
                message: format!("invalid URL: {e}"),
            }
        })?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.extend_pairs(params);
            if let TmdbAuth::ApiKey(key) = &self.auth {
                pairs.append_pair("api_key", key);
            }
        }

        debug!(path, "Fetching from TMDB");

        let mut request = self.client.get(url).header(ACCEPT, "application/json");
        match &self.auth {
            TmdbAuth::Bearer(token) => request = request.bearer_auth(token),
            TmdbAuth::ApiKey(_) => {}
            TmdbAuth::Missing => return Err(CatalogError::MissingCredential { service: SERVICE }),
        }

        let response = request
            .send()
            .await
            .map_err(|e| CatalogError::transport(SERVICE, &e))?;

        let status = response.status();
        debug!(status = status.as_u16(), "TMDB response");

        if status == StatusCode::UNAUTHORIZED {
            return Err(CatalogError::Credential {
                service: SERVICE,
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TmdbStatus>(&body)
                .ok()
                .and_then(|s| s.status_message)
                .unwrap_or(body);
            return Err(CatalogError::Status {
                service: SERVICE,
                status: status.as_u16(),
                message,
            });
        }

        let page: TmdbPage = response
            .json()
            .await
            .map_err(|e| CatalogError::transport(SERVICE, &e))?;

        Ok(page
            .results
            .into_iter()
            .map(|m| self.map_movie(m))
            .collect())
    }

    fn map_movie(&self, movie: TmdbMovie) -> Movie {
        Movie {
            id: movie.id.to_string(),
            title: movie.title,
            poster_url: non_empty(movie.poster_path)
                .map(|path| format!("{}/{}", self.image_base_url, path.trim_start_matches('/'))),
            release: non_empty(movie.release_date),
            overview: non_empty(movie.overview),
            rating: movie.vote_average,
            language: non_empty(movie.original_language),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[async_trait::async_trait]
impl CatalogClient for TmdbClient {
    fn name(&self) -> &'static str {
        SERVICE
    }

    async fn search(&self, query: &str) -> Result<Vec<Movie>, CatalogError> {
        self.fetch("/search/movie", &[("query", query)]).await
    }

    async fn list_default(&self) -> Result<Vec<Movie>, CatalogError> {
        self.fetch("/discover/movie", &[("sort_by", "popularity.desc")])
            .await
    }

    fn credential_help(&self) -> Vec<String> {
        vec![
            "Go to TMDB API Settings: https://www.themoviedb.org/settings/api".to_string(),
            "Copy your API Read Access Token (v4 auth)".to_string(),
            "Set catalog.api_key in config.toml or TMDB_API_KEY in your environment".to_string(),
            "Restart cinefind".to_string(),
        ]
    }
}
