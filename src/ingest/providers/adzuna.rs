// src/ingest/providers/adzuna.rs
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::fetch::ResilientClient;
use crate::ingest::providers::{end_early, fetch_json, json_f64, json_string, or_default};
use crate::ingest::types::{RawPosting, SearchParams, SourceAdapter, SourceError};
use crate::ingest::{format_salary_range, normalize_text, parse_posted_at, push_capped};

pub const SOURCE_ID: &str = "adzuna";
pub const BASE_URL: &str = "https://api.adzuna.com/v1/api/jobs";

#[derive(Debug, Clone)]
pub struct AdzunaCredentials {
    pub app_id: String,
    pub app_key: String,
}

impl AdzunaCredentials {
    /// `ADZUNA_APP_ID` + `ADZUNA_APP_KEY`, both non-empty.
    pub fn from_env() -> Option<Self> {
        let app_id = std::env::var("ADZUNA_APP_ID").ok()?;
        let app_key = std::env::var("ADZUNA_APP_KEY").ok()?;
        if app_id.trim().is_empty() || app_key.trim().is_empty() {
            return None;
        }
        Some(Self { app_id, app_key })
    }
}

#[derive(Debug, Deserialize)]
struct Page {
    results: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Display {
    display_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Category {
    label: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Item {
    id: Value,
    title: String,
    company: Display,
    location: Display,
    description: String,
    redirect_url: String,
    salary_min: Value,
    salary_max: Value,
    created: String,
    category: Category,
}

fn currency_for(country: &str) -> &'static str {
    match country.to_ascii_lowercase().as_str() {
        "gb" => "GBP",
        "us" => "USD",
        "ch" => "CHF",
        "ca" => "CAD",
        "au" => "AUD",
        _ => "EUR",
    }
}

impl Item {
    fn into_posting(self, country: &str) -> RawPosting {
        RawPosting {
            source_id: SOURCE_ID.to_string(),
            external_id: json_string(&self.id),
            title: normalize_text(&self.title),
            company: or_default(&normalize_text(&self.company.display_name), "Unknown Company"),
            location_text: or_default(&self.location.display_name, &country.to_ascii_uppercase()),
            description_text: normalize_text(&self.description),
            salary_text: format_salary_range(
                currency_for(country),
                json_f64(&self.salary_min),
                json_f64(&self.salary_max),
            ),
            posted_at: parse_posted_at(&self.created),
            url: self.redirect_url.trim().to_string(),
            tags: Some(self.category.label)
                .filter(|l| !l.trim().is_empty())
                .into_iter()
                .collect(),
        }
    }
}

/// Country × term fan-out, `/search/{page}` 1-based. Without credentials the
/// source is skipped and yields nothing.
pub struct AdzunaAdapter {
    client: ResilientClient,
    base_url: String,
    credentials: Option<AdzunaCredentials>,
}

impl AdzunaAdapter {
    pub fn new(client: ResilientClient, credentials: Option<AdzunaCredentials>) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
            credentials,
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }
}

#[async_trait]
impl SourceAdapter for AdzunaAdapter {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    async fn collect(&self, params: &SearchParams) -> Result<Vec<RawPosting>, SourceError> {
        let Some(creds) = &self.credentials else {
            tracing::info!(target: "ingest", source = SOURCE_ID, "no API credentials; skipping");
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        let mut fetched_any = false;
        'all: for country in &params.locations {
            for term in &params.terms {
                for page in 1..=params.max_pages.max(1) {
                    let url = format!("{}/{}/search/{page}", self.base_url, country.to_ascii_lowercase());
                    let req = self
                        .client
                        .get(SOURCE_ID, url)
                        .query("app_id", &creds.app_id)
                        .query("app_key", &creds.app_key)
                        .query("what", term)
                        .query("results_per_page", params.per_page)
                        .header("accept", "application/json");
                    let parsed: Page = match fetch_json(&self.client, SOURCE_ID, &req).await {
                        Ok(v) => v,
                        Err(e) => {
                            end_early(SOURCE_ID, e, fetched_any)?;
                            break 'all;
                        }
                    };
                    fetched_any = true;
                    if parsed.results.is_empty() {
                        break;
                    }
                    for item in parsed.results {
                        if !push_capped(&mut out, item.into_posting(country), params.max_items) {
                            break 'all;
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}
