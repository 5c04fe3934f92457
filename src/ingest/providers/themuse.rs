// src/ingest/providers/themuse.rs
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::fetch::ResilientClient;
use crate::ingest::providers::{end_early, fetch_json, json_string, or_default};
use crate::ingest::types::{RawPosting, SearchParams, SourceAdapter, SourceError};
use crate::ingest::{normalize_text, parse_posted_at, push_capped};

pub const SOURCE_ID: &str = "themuse";
pub const BASE_URL: &str = "https://www.themuse.com/api/public/jobs";

#[derive(Debug, Deserialize)]
struct Page {
    results: Vec<Item>,
    #[serde(default)]
    page_count: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Named {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Refs {
    landing_page: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Item {
    id: Value,
    name: String,
    company: Named,
    locations: Vec<Named>,
    contents: String,
    publication_date: String,
    categories: Vec<Named>,
    levels: Vec<Named>,
    refs: Refs,
}

fn names(items: &[Named]) -> Vec<String> {
    items
        .iter()
        .map(|n| n.name.trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}

impl Item {
    fn into_posting(self) -> RawPosting {
        let id = json_string(&self.id);
        let url = match (self.refs.landing_page.trim(), &id) {
            ("", Some(id)) => format!("https://www.themuse.com/jobs/{id}"),
            (landing, _) => landing.to_string(),
        };
        let locations = names(&self.locations);
        let mut tags = names(&self.categories);
        tags.extend(names(&self.levels));
        RawPosting {
            source_id: SOURCE_ID.to_string(),
            external_id: id,
            title: normalize_text(&self.name),
            company: or_default(&normalize_text(&self.company.name), "Unknown Company"),
            location_text: if locations.is_empty() {
                "Not specified".to_string()
            } else {
                locations.join(", ")
            },
            description_text: normalize_text(&self.contents),
            salary_text: None,
            posted_at: parse_posted_at(&self.publication_date),
            url,
            tags,
        }
    }
}

/// Per category, pages `0..` until an empty page, `page_count` or `max_pages`.
pub struct TheMuseAdapter {
    client: ResilientClient,
    base_url: String,
}

impl TheMuseAdapter {
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
impl SourceAdapter for TheMuseAdapter {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    async fn collect(&self, params: &SearchParams) -> Result<Vec<RawPosting>, SourceError> {
        let mut out = Vec::new();
        let mut fetched_any = false;
        'categories: for category in &params.tags {
            for page in 0..params.max_pages.max(1) {
                let req = self
                    .client
                    .get(SOURCE_ID, &self.base_url)
                    .query("category", category)
                    .query("page", page);
                let parsed: Page = match fetch_json(&self.client, SOURCE_ID, &req).await {
                    Ok(v) => v,
                    Err(e) => {
                        end_early(SOURCE_ID, e, fetched_any)?;
                        break 'categories;
                    }
                };
                fetched_any = true;
                if parsed.results.is_empty() {
                    break;
                }
                for item in parsed.results {
                    if !push_capped(&mut out, item.into_posting(), params.max_items) {
                        break 'categories;
                    }
                }
                if parsed.page_count.is_some_and(|n| page + 1 >= n) {
                    break;
                }
            }
        }
        Ok(out)
    }
}
