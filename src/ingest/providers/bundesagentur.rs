// src/ingest/providers/bundesagentur.rs
use async_trait::async_trait;
use serde::Deserialize;

use crate::fetch::ResilientClient;
use crate::ingest::providers::{end_early, fetch_json, or_default};
use crate::ingest::types::{RawPosting, SearchParams, SourceAdapter, SourceError};
use crate::ingest::{normalize_text, parse_posted_at, push_capped};

pub const SOURCE_ID: &str = "bundesagentur";
pub const BASE_URL: &str = "https://rest.arbeitsagentur.de/jobboerse/jobsuche-service/pc/v4/jobs";
pub const DETAIL_URL: &str = "https://www.arbeitsagentur.de/jobsuche/jobdetail";
/// Client id the public job search frontend sends.
pub const PUBLIC_API_KEY: &str = "jobboerse-jobsuche";

#[derive(Debug, Deserialize)]
struct Response {
    // absent on zero hits
    #[serde(default)]
    stellenangebote: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Arbeitsort {
    ort: String,
    plz: String,
    region: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Item {
    hash_id: String,
    refnr: String,
    titel: String,
    beruf: String,
    arbeitgeber: String,
    arbeitsort: Arbeitsort,
    modifikations_timestamp: String,
    aktuelle_veroeffentlichungsdatum: String,
}

impl Item {
    fn into_posting(self) -> RawPosting {
        let mut location = or_default(&self.arbeitsort.ort, "Germany");
        if !self.arbeitsort.plz.trim().is_empty() {
            location = format!("{} {location}", self.arbeitsort.plz.trim());
        }
        if !self.arbeitsort.region.trim().is_empty() {
            location = format!("{location}, {}", self.arbeitsort.region.trim());
        }
        let key = if self.hash_id.trim().is_empty() {
            self.refnr.trim()
        } else {
            self.hash_id.trim()
        };
        let url = if key.is_empty() {
            String::new()
        } else {
            format!("{DETAIL_URL}/{key}")
        };
        let posted = parse_posted_at(&self.modifikations_timestamp)
            .or_else(|| parse_posted_at(&self.aktuelle_veroeffentlichungsdatum));
        RawPosting {
            source_id: SOURCE_ID.to_string(),
            external_id: Some(self.refnr.trim().to_string())
                .filter(|r| !r.is_empty())
                .or_else(|| Some(key.to_string()).filter(|k| !k.is_empty())),
            title: normalize_text(&self.titel),
            company: or_default(&normalize_text(&self.arbeitgeber), "Unknown Company"),
            location_text: location,
            // the search endpoint carries no description; the occupation is the best we have
            description_text: normalize_text(&self.beruf),
            salary_text: None,
            posted_at: posted,
            url,
            tags: Vec::new(),
        }
    }
}

/// Federal employment agency job search: location × term, full-time offers only.
pub struct BundesagenturAdapter {
    client: ResilientClient,
    base_url: String,
    api_key: String,
    radius_km: u32,
}

impl BundesagenturAdapter {
    pub fn new(client: ResilientClient, api_key: Option<String>, radius_km: u32) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
            api_key: api_key
                .filter(|k| !k.trim().is_empty())
                .unwrap_or_else(|| PUBLIC_API_KEY.to_string()),
            radius_km,
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }
}

#[async_trait]
impl SourceAdapter for BundesagenturAdapter {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    async fn collect(&self, params: &SearchParams) -> Result<Vec<RawPosting>, SourceError> {
        let mut out = Vec::new();
        let mut fetched_any = false;
        'all: for location in &params.locations {
            for term in &params.terms {
                let req = self
                    .client
                    .get(SOURCE_ID, &self.base_url)
                    .query("was", term)
                    .query("wo", location)
                    .query("umkreis", self.radius_km)
                    .query("page", 1)
                    .query("size", params.per_page)
                    .query("angebotsart", 1)
                    .header("accept", "application/json")
                    .header("x-api-key", self.api_key.clone());
                let parsed: Response = match fetch_json(&self.client, SOURCE_ID, &req).await {
                    Ok(v) => v,
                    Err(e) => {
                        end_early(SOURCE_ID, e, fetched_any)?;
                        break 'all;
                    }
                };
                fetched_any = true;
                for item in parsed.stellenangebote {
                    if !push_capped(&mut out, item.into_posting(), params.max_items) {
                        break 'all;
                    }
                }
            }
        }
        Ok(out)
    }
}
