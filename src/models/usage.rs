use serde::{Deserialize, Serialize};

use super::movie::MovieSnapshot;

/// Per-query search counter with the top result captured when the record was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: String,
    pub query: String,
    pub count: i64,
    pub movie: MovieSnapshot,
}

/// Key under which a query is counted. Only surrounding whitespace is stripped; matching is
/// otherwise exact.
#[must_use]
pub fn normalize_query(query: &str) -> &str {
    query.trim()
}
