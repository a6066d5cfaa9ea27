use serde::{Deserialize, Serialize};

/// Catalog-independent movie summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub poster_url: Option<String>,
    pub release: Option<String>,
    pub overview: Option<String>,
    pub rating: Option<f32>,
    pub language: Option<String>,
}

impl Movie {
    #[must_use]
    pub fn snapshot(&self) -> MovieSnapshot {
        MovieSnapshot {
            movie_id: self.id.clone(),
            title: self.title.clone(),
            poster_url: self.poster_url.clone(),
        }
    }

    /// Year portion of the release field, if it starts with one.
    #[must_use]
    pub fn release_year(&self) -> Option<&str> {
        let release = self.release.as_deref()?;
        let year = release.get(..4)?;
        year.chars().all(|c| c.is_ascii_digit()).then_some(year)
    }
}

/// The part of a movie kept alongside a usage record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieSnapshot {
    pub movie_id: String,
    pub title: String,
    pub poster_url: Option<String>,
}
