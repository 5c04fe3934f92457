// src/ingest/providers/weworkremotely_rss.rs
use std::time::Instant;

use async_trait::async_trait;
use metrics::histogram;
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;

use crate::fetch::ResilientClient;
use crate::ingest::types::{RawPosting, SearchParams, SourceAdapter, SourceError};
use crate::ingest::{normalize_text, parse_posted_at, push_capped};

pub const SOURCE_ID: &str = "weworkremotely";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    region: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<String>,
}

const REGION_HINTS: [&str; 11] = [
    "Europe", "EU", "EMEA", "US", "USA", "Americas", "APAC", "Germany", "UK", "Worldwide",
    "Global",
];

fn region_hints() -> &'static [(&'static str, Regex)] {
    static RE: OnceCell<Vec<(&'static str, Regex)>> = OnceCell::new();
    RE.get_or_init(|| {
        REGION_HINTS
            .iter()
            .map(|r| {
                // upper-case codes only match as written, so "join us" is not "US"
                let flags = if r.chars().all(|c| c.is_ascii_uppercase()) { "" } else { "(?i)" };
                (*r, Regex::new(&format!(r"{flags}\b{}\b", regex::escape(r))).unwrap())
            })
            .collect()
    })
}

/// Listings are remote by definition; refine with an explicit region or a hint
/// found in the title/description.
fn location_for(region: Option<&str>, title: &str, description: &str) -> String {
    if let Some(r) = region.map(str::trim).filter(|r| !r.is_empty()) {
        return format!("Remote ({r})");
    }
    let haystack = format!("{title} {description}");
    region_hints()
        .iter()
        .find(|(_, re)| re.is_match(&haystack))
        .map(|(name, _)| format!("Remote ({name})"))
        .unwrap_or_else(|| "Remote".to_string())
}

/// Titles come as "Company: Job Title".
fn split_title(raw: &str) -> (String, String) {
    match raw.split_once(':') {
        Some((company, title)) if !title.trim().is_empty() => {
            (company.trim().to_string(), title.trim().to_string())
        }
        _ => ("Unknown Company".to_string(), raw.trim().to_string()),
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

pub(crate) fn parse_feed(xml: &str, max_items: usize) -> Result<Vec<RawPosting>, SourceError> {
    let t0 = Instant::now();
    let rss: Rss = from_str(&scrub_html_entities_for_xml(xml))
        .map_err(|e| SourceError::parse(SOURCE_ID, format!("rss: {e}")))?;

    let mut out = Vec::with_capacity(rss.channel.item.len().min(max_items));
    for it in rss.channel.item {
        let (company, title) = split_title(&normalize_text(it.title.as_deref().unwrap_or_default()));
        let description = normalize_text(it.description.as_deref().unwrap_or_default());
        let posting = RawPosting {
            source_id: SOURCE_ID.to_string(),
            external_id: it.guid.map(|g| g.trim().to_string()).filter(|g| !g.is_empty()),
            location_text: location_for(it.region.as_deref(), &title, &description),
            title,
            company,
            description_text: description,
            salary_text: None,
            posted_at: it.pub_date.as_deref().and_then(parse_posted_at),
            url: it.link.unwrap_or_default().trim().to_string(),
            tags: it.categories.iter().map(|c| normalize_text(c)).collect(),
        };
        if !push_capped(&mut out, posting, max_items) {
            break;
        }
    }

    histogram!("ingest_parse_ms", "source" => SOURCE_ID).record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

/// One instance per configured feed URL; all share the `weworkremotely` id.
pub struct WeWorkRemotelyFeed {
    client: ResilientClient,
    feed_url: String,
}

impl WeWorkRemotelyFeed {
    pub fn new(client: ResilientClient, feed_url: &str) -> Self {
        Self {
            client,
            feed_url: feed_url.to_string(),
        }
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }
}

#[async_trait]
impl SourceAdapter for WeWorkRemotelyFeed {
    fn source_id(&self) -> &str {
        SOURCE_ID
    }

    async fn collect(&self, params: &SearchParams) -> Result<Vec<RawPosting>, SourceError> {
        let req = self
            .client
            .get(SOURCE_ID, &self.feed_url)
            .header("accept", "application/rss+xml, application/xml");
        let resp = self.client.fetch(&req).await?;
        parse_feed(&resp.body, params.max_items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_split_and_region_hint() {
        assert_eq!(
            split_title("Acme GmbH: Senior Data Engineer"),
            ("Acme GmbH".to_string(), "Senior Data Engineer".to_string())
        );
        assert_eq!(split_title("Data Engineer").0, "Unknown Company");
        assert_eq!(location_for(None, "Data Engineer (EMEA)", ""), "Remote (EMEA)");
        // "us" inside "focus" is not a hint
        assert_eq!(location_for(None, "Focus on growth", ""), "Remote");
        assert_eq!(location_for(None, "Data Engineer", "Come join us!"), "Remote");
        assert_eq!(location_for(None, "Data Engineer", "Remote, US hours"), "Remote (US)");
        assert_eq!(location_for(None, "Data Engineer", "anywhere in europe"), "Remote (Europe)");
        assert_eq!(location_for(Some("Anywhere in the World"), "x", ""), "Remote (Anywhere in the World)");
    }

    #[test]
    fn entities_outside_cdata_do_not_break_parsing() {
        let xml = r#"<rss><channel><title>x</title>
<item><title>Acme: ML&nbsp;Engineer</title><link>https://wwr.example/1</link>
<pubDate>Thu, 27 Feb 2025 08:00:00 +0000</pubDate>
<description><![CDATA[<p>Python &amp; PyTorch</p>]]></description>
<category>Programming</category><category>Data</category></item>
</channel></rss>"#;
        let out = parse_feed(xml, 10).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "ML Engineer");
        assert_eq!(out[0].description_text, "Python & PyTorch");
        assert_eq!(out[0].tags, vec!["Programming".to_string(), "Data".to_string()]);
        assert!(out[0].posted_at.is_some());
    }
}
