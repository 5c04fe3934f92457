// src/ingest/types.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::FetchError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawPosting {
    pub source_id: String, // e.g. "arbeitnow", "weworkremotely"
    pub external_id: Option<String>,
    pub title: String,
    pub company: String,
    pub location_text: String,
    pub description_text: String,
    pub salary_text: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RawPosting {
    /// Postings without a title or a URL are dropped by adapters.
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && !self.url.trim().is_empty()
    }
}

/// Query knobs handed to `collect`. Each source reads the fields it understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    /// Free-text search terms ("data scientist").
    pub terms: Vec<String>,
    /// Cities or country codes, depending on the source.
    pub locations: Vec<String>,
    /// Tags or categories.
    pub tags: Vec<String>,
    pub max_pages: u32,
    pub per_page: u32,
    pub max_items: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            terms: Vec::new(),
            locations: Vec::new(),
            tags: Vec::new(),
            max_pages: 1,
            per_page: 50,
            max_items: 200,
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{source_id}: parse_error: {message}")]
    Parse { source_id: String, message: String },
}

impl SourceError {
    pub fn parse(source_id: &str, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            source_id: source_id.to_string(),
            message: message.to_string(),
        }
    }

    /// Taxonomy label used in logs and the run summary.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(e) => e.kind.as_str(),
            Self::Parse { .. } => "parse_error",
        }
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &str;

    /// One full collection pass. Zero results is `Ok(vec![])`.
    async fn collect(&self, params: &SearchParams) -> Result<Vec<RawPosting>, SourceError>;
}
