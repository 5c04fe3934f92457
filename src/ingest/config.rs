// src/ingest/config.rs
//! `[sources.<id>]` sections. Every source is enabled by default with the
//! query knobs the public APIs accept.

use serde::Deserialize;

use crate::ingest::types::SearchParams;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Trim, drop empties and duplicates, keep first-seen order.
pub fn clean_list(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o.eq_ignore_ascii_case(t)) {
            out.push(t.to_string());
        }
    }
    out
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub arbeitnow: ArbeitnowConfig,
    pub remoteok: RemoteOkConfig,
    pub jobicy: JobicyConfig,
    pub themuse: TheMuseConfig,
    pub adzuna: AdzunaConfig,
    pub bundesagentur: BundesagenturConfig,
    pub weworkremotely: WeWorkRemotelyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArbeitnowConfig {
    pub enabled: bool,
    pub min_expected: usize,
    pub max_items: usize,
    pub max_pages: u32,
}

impl Default for ArbeitnowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_expected: 1,
            max_items: 500,
            max_pages: 5,
        }
    }
}

impl ArbeitnowConfig {
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            max_pages: self.max_pages,
            max_items: self.max_items,
            ..SearchParams::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteOkConfig {
    pub enabled: bool,
    pub min_expected: usize,
    pub max_items: usize,
    pub tags: Vec<String>,
}

impl Default for RemoteOkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_expected: 1,
            max_items: 300,
            tags: strings(&["data", "machine-learning", "python"]),
        }
    }
}

impl RemoteOkConfig {
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            tags: clean_list(&self.tags),
            max_items: self.max_items,
            ..SearchParams::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobicyConfig {
    pub enabled: bool,
    pub min_expected: usize,
    pub max_items: usize,
    pub tags: Vec<String>,
    /// `count` query parameter, per tag.
    pub per_tag: u32,
}

impl Default for JobicyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_expected: 1,
            max_items: 300,
            tags: strings(&["data-science", "machine-learning", "python"]),
            per_tag: 50,
        }
    }
}

impl JobicyConfig {
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            tags: clean_list(&self.tags),
            per_page: self.per_tag,
            max_items: self.max_items,
            ..SearchParams::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TheMuseConfig {
    pub enabled: bool,
    pub min_expected: usize,
    pub max_items: usize,
    pub categories: Vec<String>,
    pub max_pages: u32,
}

impl Default for TheMuseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_expected: 1,
            max_items: 300,
            categories: strings(&["Data Science", "Data and Analytics", "Software Engineering"]),
            max_pages: 3,
        }
    }
}

impl TheMuseConfig {
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            tags: clean_list(&self.categories),
            max_pages: self.max_pages,
            max_items: self.max_items,
            ..SearchParams::default()
        }
    }
}

/// Credentials come from `ADZUNA_APP_ID` / `ADZUNA_APP_KEY`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdzunaConfig {
    pub enabled: bool,
    pub min_expected: usize,
    pub max_items: usize,
    pub countries: Vec<String>,
    pub terms: Vec<String>,
    pub max_pages: u32,
    pub per_page: u32,
}

impl Default for AdzunaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_expected: 0,
            max_items: 400,
            countries: strings(&["de", "gb"]),
            terms: strings(&["data scientist", "machine learning engineer"]),
            max_pages: 2,
            per_page: 50,
        }
    }
}

impl AdzunaConfig {
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            terms: clean_list(&self.terms),
            locations: clean_list(&self.countries),
            max_pages: self.max_pages,
            per_page: self.per_page,
            max_items: self.max_items,
            ..SearchParams::default()
        }
    }
}

/// The API key comes from `BUNDESAGENTUR_API_KEY`, falling back to the
/// public client id the job search frontend uses.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BundesagenturConfig {
    pub enabled: bool,
    pub min_expected: usize,
    pub max_items: usize,
    pub locations: Vec<String>,
    pub terms: Vec<String>,
    pub radius_km: u32,
    pub per_page: u32,
}

impl Default for BundesagenturConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_expected: 1,
            max_items: 400,
            locations: strings(&["München", "Berlin"]),
            terms: strings(&["Data Scientist", "Machine Learning"]),
            radius_km: 50,
            per_page: 100,
        }
    }
}

impl BundesagenturConfig {
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            terms: clean_list(&self.terms),
            locations: clean_list(&self.locations),
            per_page: self.per_page,
            max_items: self.max_items,
            ..SearchParams::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeWorkRemotelyConfig {
    pub enabled: bool,
    /// Applies to each feed separately.
    pub min_expected: usize,
    pub max_items: usize,
    pub feeds: Vec<String>,
}

impl Default for WeWorkRemotelyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_expected: 1,
            max_items: 200,
            feeds: strings(&[
                "https://weworkremotely.com/categories/remote-programming-jobs.rss",
                "https://weworkremotely.com/categories/remote-data-science-jobs.rss",
            ]),
        }
    }
}

impl WeWorkRemotelyConfig {
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            max_items: self.max_items,
            ..SearchParams::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_list_trims_and_dedups_case_insensitively() {
        let items = strings(&[" Data ", "", "data", "Python", "python "]);
        assert_eq!(clean_list(&items), strings(&["Data", "Python"]));
    }

    #[test]
    fn sections_merge_with_defaults() {
        let cfg: SourcesConfig = toml::from_str(
            r#"
[remoteok]
tags = ["rust", " rust "]

[adzuna]
enabled = false
"#,
        )
        .unwrap();
        assert_eq!(cfg.remoteok.search_params().tags, strings(&["rust"]));
        assert!(cfg.remoteok.enabled);
        assert!(!cfg.adzuna.enabled);
        assert_eq!(cfg.jobicy.per_tag, 50);
        assert_eq!(cfg.weworkremotely.feeds.len(), 2);
    }
}
