use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{CatalogClient, CatalogError};
use crate::config::CatalogConfig;
use crate::models::Movie;

const OMDB_API: &str = "https://www.omdbapi.com/";
const SERVICE: &str = "OMDb";
const NOT_FOUND: &str = "Movie not found!";

#[derive(Debug, Deserialize)]
struct OmdbSearch {
    #[serde(rename = "Search", default)]
    search: Vec<OmdbMovie>,
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Error")]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OmdbMovie {
    #[serde(rename = "imdbID")]
    imdb_id: String,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Year", default)]
    year: String,
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(rename = "Poster")]
    poster: Option<String>,
}

impl OmdbMovie {
    fn into_movie(self) -> Movie {
        let year = (!self.year.is_empty() && self.year != "N/A").then_some(self.year);
        let overview = match (capitalize(&self.kind), year.as_deref()) {
            (Some(kind), Some(year)) => Some(format!("{kind} · {year}")),
            (Some(kind), None) => Some(kind),
            (None, Some(year)) => Some(year.to_string()),
            (None, None) => None,
        };

        Movie {
            id: self.imdb_id,
            title: self.title,
            poster_url: self.poster.filter(|p| p.starts_with("http")),
            release: year,
            overview,
            rating: None,
            language: None,
        }
    }
}

fn capitalize(value: &str) -> Option<String> {
    let mut chars = value.trim().chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

/// Interprets an OMDb payload. "Movie not found!" is an empty result, not a failure.
fn interpret(status: StatusCode, payload: OmdbSearch) -> Result<Vec<Movie>, CatalogError> {
    if payload.response.eq_ignore_ascii_case("true") {
        return Ok(payload.search.into_iter().map(OmdbMovie::into_movie).collect());
    }

    let message = payload.error.unwrap_or_else(|| "Unknown error".to_string());
    if message == NOT_FOUND {
        return Ok(Vec::new());
    }

    if message.to_lowercase().contains("api key") {
        return Err(CatalogError::Credential {
            service: SERVICE,
            status: status.as_u16(),
        });
    }

    Err(CatalogError::Rejected {
        service: SERVICE,
        message,
    })
}

#[derive(Clone)]
pub struct OmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    default_query: String,
}

impl OmdbClient {
    #[must_use]
    pub fn with_shared_client(client: Client, config: &CatalogConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone().unwrap_or_else(|| OMDB_API.to_string()),
            api_key: config.api_key.trim().to_string(),
            default_query: config.default_query.clone(),
        }
    }

    async fn fetch(&self, term: &str) -> Result<Vec<Movie>, CatalogError> {
        if self.api_key.is_empty() {
            return Err(CatalogError::MissingCredential { service: SERVICE });
        }

        let mut url = Url::parse(&self.base_url).map_err(|e| CatalogError::Transport {
            service: SERVICE,
            message: format!("invalid URL: {e}"),
        })?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.api_key)
            .append_pair("s", term)
            .append_pair("type", "movie");

        debug!(term, "Fetching from OMDb");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CatalogError::transport(SERVICE, &e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(CatalogError::Credential {
                service: SERVICE,
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status {
                service: SERVICE,
                status: status.as_u16(),
                message: body,
            });
        }

        let payload: OmdbSearch = response
            .json()
            .await
            .map_err(|e| CatalogError::transport(SERVICE, &e))?;

        interpret(status, payload)
    }
}

#[async_trait::async_trait]
impl CatalogClient for OmdbClient {
    fn name(&self) -> &'static str {
        SERVICE
    }

    async fn search(&self, query: &str) -> Result<Vec<Movie>, CatalogError> {
        self.fetch(query).await
    }

    async fn list_default(&self) -> Result<Vec<Movie>, CatalogError> {
        self.fetch(&self.default_query).await
    }

    fn credential_help(&self) -> Vec<String> {
        vec![
            "Request a key at https://www.omdbapi.com/apikey.aspx".to_string(),
            "Activate the key from the confirmation email".to_string(),
            "Set catalog.api_key in config.toml or OMDB_API_KEY in your environment".to_string(),
            "Restart cinefind".to_string(),
        ]
    }
}
