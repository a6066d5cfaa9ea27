//! Appwrite Databases REST client used as a usage store.

use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::config::AppwriteConfig;
use crate::models::{MovieSnapshot, UsageRecord};
use crate::services::usage::{UsageError, UsageStore};

#[derive(Debug, Deserialize)]
struct DocumentList {
    #[serde(default)]
    documents: Vec<UsageDocument>,
}

#[derive(Debug, Deserialize)]
struct UsageDocument {
    #[serde(rename = "$id")]
    id: String,
    #[serde(rename = "searchTerm")]
    search_term: String,
    count: i64,
    movie_id: Option<DocumentValue>,
    #[serde(default)]
    title: String,
    poster_url: Option<String>,
}

/// `movie_id` is numeric for TMDB-backed collections and textual for OMDb ones.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DocumentValue {
    Int(i64),
    Text(String),
}

impl UsageDocument {
    fn into_record(self) -> UsageRecord {
        let movie_id = match self.movie_id {
            Some(DocumentValue::Int(id)) => id.to_string(),
            Some(DocumentValue::Text(id)) => id,
            None => String::new(),
        };

        UsageRecord {
            id: self.id,
            query: self.search_term,
            count: self.count,
            movie: MovieSnapshot {
                movie_id,
                title: self.title,
                poster_url: self.poster_url,
            },
        }
    }
}

#[derive(Serialize)]
struct CreateDocument<'a> {
    #[serde(rename = "documentId")]
    document_id: &'a str,
    data: serde_json::Value,
}

#[derive(Clone)]
pub struct AppwriteClient {
    client: Client,
    documents_url: String,
    project_id: String,
    api_key: Option<String>,
}

impl AppwriteClient {
    /// Returns `None` when a required identifier is missing.
    #[must_use]
    pub fn from_config(client: Client, config: &AppwriteConfig) -> Option<Self> {
        if !config.missing_fields().is_empty() {
            return None;
        }

        let documents_url = format!(
            "{}/databases/{}/collections/{}/documents",
            config.endpoint.trim_end_matches('/'),
            config.database_id,
            config.collection_id
        );

        Some(Self {
            client,
            documents_url,
            project_id: config.project_id.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("X-Appwrite-Project", &self.project_id);
        match &self.api_key {
            Some(key) => request.header("X-Appwrite-Key", key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, UsageError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| UsageError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or(body);

        Err(UsageError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn list(&self, queries: &[serde_json::Value]) -> Result<Vec<UsageDocument>, UsageError> {
        let mut url =
            Url::parse(&self.documents_url).map_err(|e| UsageError::Unavailable(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            for query in queries {
                pairs.append_pair("queries[]", &query.to_string());
            }
        }

        debug!(url = %url, "Listing Appwrite documents");

        let list: DocumentList = self
            .send(self.client.get(url))
            .await?
            .json()
            .await
            .map_err(|e| UsageError::Decode(e.to_string()))?;

        Ok(list.documents)
    }
}

/// Appwrite's `movie_id` attribute is an integer for TMDB ids.
fn movie_id_value(movie_id: &str) -> serde_json::Value {
    movie_id
        .parse::<i64>()
        .map_or_else(|_| json!(movie_id), |id| json!(id))
}

#[async_trait::async_trait]
impl UsageStore for AppwriteClient {
    fn name(&self) -> &'static str {
        "appwrite"
    }

    async fn find_by_query(&self, query: &str) -> Result<Option<UsageRecord>, UsageError> {
        let documents = self
            .list(&[
                json!({"method": "equal", "attribute": "searchTerm", "values": [query]}),
                json!({"method": "limit", "values": [1]}),
            ])
            .await?;

        Ok(documents.into_iter().next().map(UsageDocument::into_record))
    }

    async fn create(&self, query: &str, movie: &MovieSnapshot) -> Result<UsageRecord, UsageError> {
        let body = CreateDocument {
            document_id: "unique()",
            data: json!({
                "searchTerm": query,
                "count": 1,
                "movie_id": movie_id_value(&movie.movie_id),
                "title": movie.title,
                "poster_url": movie.poster_url,
            }),
        };

        let document: UsageDocument = self
            .send(self.client.post(&self.documents_url).json(&body))
            .await?
            .json()
            .await
            .map_err(|e| UsageError::Decode(e.to_string()))?;

        Ok(document.into_record())
    }

    async fn update_count(&self, id: &str, count: i64) -> Result<(), UsageError> {
        let url = format!("{}/{}", self.documents_url, urlencoding::encode(id));
        let body = json!({ "data": { "count": count } });

        self.send(self.client.patch(url).json(&body)).await?;
        Ok(())
    }

    async fn top_by_count(&self, limit: u64) -> Result<Vec<UsageRecord>, UsageError> {
        let documents = self
            .list(&[
                json!({"method": "orderDesc", "attribute": "count"}),
                json!({"method": "limit", "values": [limit]}),
            ])
            .await?;

        Ok(documents
            .into_iter()
            .map(UsageDocument::into_record)
            .collect())
    }
}
