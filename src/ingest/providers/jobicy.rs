// src/ingest/providers/jobicy.rs
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::fetch::ResilientClient;
use crate::ingest::providers::{end_early, fetch_json, json_f64, json_string, json_strings, or_default};
use crate::ingest::types::{RawPosting, SearchParams, SourceAdapter, SourceError};
use crate::ingest::{format_salary_range, normalize_text, parse_posted_at, push_capped};

pub const SOURCE_ID: &str = "jobicy";
pub const BASE_URL: &str = "https://jobicy.com/api/v2/remote-jobs";

#[derive(Debug, Deserialize)]
struct Response {
    // absent when a tag has no listings
    #[serde(default)]
    jobs: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Item {
    id: Value,
    url: String,
    job_title: String,
    company_name: String,
    job_industry: Value,
    job_geo: String,
    job_description: String,
    job_excerpt: String,
    annual_salary_min: Value,
    annual_salary_max: Value,
    salary_currency: String,
    pub_date: String,
}

impl Item {
    fn into_posting(self) -> RawPosting {
        let description = if self.job_description.trim().is_empty() {
            &self.job_excerpt
        } else {
            &self.job_description
        };
        let currency = or_default(&self.salary_currency, "USD");
        RawPosting {
            source_id: SOURCE_ID.to_string(),
            external_id: json_string(&self.id),
            title: normalize_text(&self.job_title),
            company: or_default(&normalize_text(&self.company_name), "Unknown Company"),
            location_text: or_default(&self.job_geo, "Remote"),
            description_text: normalize_text(description),
            salary_text: format_salary_range(
                &currency,
                json_f64(&self.annual_salary_min),
                json_f64(&self.annual_salary_max),
            ),
            posted_at: parse_posted_at(&self.pub_date),
            url: self.url.trim().to_string(),
            tags: json_strings(&self.job_industry)
                .iter()
                .map(|t| normalize_text(t))
                .collect(),
        }
    }
}

/// One request per tag, `count` results each.
pub struct JobicyAdapter {
    client: ResilientClient,
    base_url: String,
}

impl JobicyAdapter {
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
impl SourceAdapter for JobicyAdapter {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    async fn collect(&self, params: &SearchParams) -> Result<Vec<RawPosting>, SourceError> {
        let mut out = Vec::new();
        let mut fetched_any = false;
        'tags: for tag in &params.tags {
            let req = self
                .client
                .get(SOURCE_ID, &self.base_url)
                .query("count", params.per_page)
                .query("tag", tag);
            let parsed: Response = match fetch_json(&self.client, SOURCE_ID, &req).await {
                Ok(v) => v,
                Err(e) => {
                    end_early(SOURCE_ID, e, fetched_any)?;
                    break 'tags;
                }
            };
            fetched_any = true;
            for item in parsed.jobs {
                if !push_capped(&mut out, item.into_posting(), params.max_items) {
                    break 'tags;
                }
            }
        }
        Ok(out)
    }
}
