// src/ingest/providers/remoteok.rs
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::fetch::ResilientClient;
use crate::ingest::providers::{end_early, fetch_json, json_f64, json_string, json_strings, or_default};
use crate::ingest::types::{RawPosting, SearchParams, SourceAdapter, SourceError};
use crate::ingest::{format_salary_range, normalize_text, parse_posted_at, push_capped};

pub const SOURCE_ID: &str = "remoteok";
pub const BASE_URL: &str = "https://remoteok.com/api";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Item {
    id: Value,
    position: String,
    company: String,
    location: String,
    description: String,
    tags: Value,
    url: String,
    date: String,
    salary_min: Value,
    salary_max: Value,
}

impl Item {
    fn into_posting(self) -> RawPosting {
        RawPosting {
            source_id: SOURCE_ID.to_string(),
            external_id: json_string(&self.id),
            title: normalize_text(&self.position),
            company: or_default(&normalize_text(&self.company), "Unknown Company"),
            location_text: or_default(&self.location, "Worldwide Remote"),
            description_text: normalize_text(&self.description),
            salary_text: format_salary_range(
                "USD",
                json_f64(&self.salary_min),
                json_f64(&self.salary_max),
            ),
            posted_at: parse_posted_at(&self.date),
            url: self.url.trim().to_string(),
            tags: json_strings(&self.tags),
        }
    }
}

/// One request per tag. The first array element is a legal notice, not a job.
pub struct RemoteOkAdapter {
    client: ResilientClient,
    base_url: String,
}

impl RemoteOkAdapter {
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
impl SourceAdapter for RemoteOkAdapter {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    async fn collect(&self, params: &SearchParams) -> Result<Vec<RawPosting>, SourceError> {
        let mut out = Vec::new();
        let mut fetched_any = false;
        'tags: for tag in &params.tags {
            let req = self.client.get(SOURCE_ID, &self.base_url).query("tag", tag);
            let items: Vec<Value> = match fetch_json(&self.client, SOURCE_ID, &req).await {
                Ok(v) => v,
                Err(e) => {
                    end_early(SOURCE_ID, e, fetched_any)?;
                    break 'tags;
                }
            };
            fetched_any = true;
            for raw in items.into_iter().skip(1) {
                let item: Item = match serde_json::from_value(raw) {
                    Ok(i) => i,
                    Err(e) => {
                        tracing::debug!(target: "ingest", source = SOURCE_ID, error = %e, "skipping malformed item");
                        continue;
                    }
                };
                if !push_capped(&mut out, item.into_posting(), params.max_items) {
                    break 'tags;
                }
            }
        }
        Ok(out)
    }
}
