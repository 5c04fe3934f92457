// src/ingest/providers/arbeitnow.rs
use async_trait::async_trait;
use serde::Deserialize;

use crate::fetch::ResilientClient;
use crate::ingest::providers::{end_early, fetch_json, or_default};
use crate::ingest::types::{RawPosting, SearchParams, SourceAdapter, SourceError};
use crate::ingest::{from_unix, normalize_text, push_capped};

pub const SOURCE_ID: &str = "arbeitnow";
pub const BASE_URL: &str = "https://www.arbeitnow.com/api/job-board-api";

#[derive(Debug, Deserialize)]
struct Page {
    data: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Item {
    slug: String,
    title: String,
    company_name: String,
    location: String,
    remote: bool,
    url: String,
    description: String,
    tags: Vec<String>,
    created_at: Option<i64>,
}

impl Item {
    fn into_posting(self) -> RawPosting {
        let mut location = or_default(&self.location, "Germany");
        if self.remote {
            location.push_str(" (Remote)");
        }
        RawPosting {
            source_id: SOURCE_ID.to_string(),
            external_id: Some(self.slug).filter(|s| !s.trim().is_empty()),
            title: normalize_text(&self.title),
            company: or_default(&normalize_text(&self.company_name), "Unknown Company"),
            location_text: location,
            description_text: normalize_text(&self.description),
            salary_text: None,
            posted_at: self.created_at.and_then(from_unix),
            url: self.url.trim().to_string(),
            tags: self.tags,
        }
    }
}

/// Paged board API (`?page=N`, 1-based). Stops on the first empty page.
pub struct ArbeitnowAdapter {
    client: ResilientClient,
    base_url: String,
}

impl ArbeitnowAdapter {
    pub fn new(client: ResilientClient) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }
}

#[async_trait]
impl SourceAdapter for ArbeitnowAdapter {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    async fn collect(&self, params: &SearchParams) -> Result<Vec<RawPosting>, SourceError> {
        let mut out = Vec::new();
        let mut fetched_any = false;
        'pages: for page in 1..=params.max_pages.max(1) {
            let req = self.client.get(SOURCE_ID, &self.base_url).query("page", page);
            let parsed: Page = match fetch_json(&self.client, SOURCE_ID, &req).await {
                Ok(v) => v,
                Err(e) => {
                    end_early(SOURCE_ID, e, fetched_any)?;
                    break 'pages;
                }
            };
            fetched_any = true;
            if parsed.data.is_empty() {
                break;
            }
            for item in parsed.data {
                if !push_capped(&mut out, item.into_posting(), params.max_items) {
                    break 'pages;
                }
            }
        }
        Ok(out)
    }
}
