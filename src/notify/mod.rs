// src/notify/mod.rs
//! Digest delivery. Cards are packed into chunks that respect the channel's
//! size limits; a chunk's postings are reported as sent only once the chunk
//! itself went through.

pub mod log;
pub mod telegram;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::dedup::Fingerprint;
use crate::fetch::{FetchError, ResilientClient};
use crate::store::StoredJob;

pub use log::LogNotifier;
pub use telegram::TelegramNotifier;

pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━";
const TITLE_CAP: usize = 300;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub max_message_chars: usize,
    pub max_jobs_per_message: usize,
    pub pause_between_ms: u64,
    pub telegram_api_base: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_message_chars: 4000,
            max_jobs_per_message: 15,
            pause_between_ms: 500,
            telegram_api_base: "https://api.telegram.org".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier not configured: {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("message rejected: {0}")]
    Rejected(String),

    #[error("could not encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub chunks_sent: usize,
    pub chunks_failed: usize,
    /// Postings acknowledged through `on_sent`.
    pub delivered: usize,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Push `digest` (already ranked) and a problem report. `on_sent` is
    /// invoked once per posting whose chunk was delivered.
    async fn deliver(
        &self,
        digest: &[StoredJob],
        problems: &[String],
        on_sent: &mut (dyn for<'f> FnMut(&'f Fingerprint) + Send),
    ) -> Result<DeliveryReport, NotifyError>;
}

/// One outbound message and the postings it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub fingerprints: Vec<Fingerprint>,
}

fn esc(s: &str) -> String {
    html_escape::encode_text(s).into_owned()
}

fn stars(score: f64) -> &'static str {
    if score >= 8.0 {
        "⭐⭐⭐"
    } else if score >= 6.0 {
        "⭐⭐"
    } else if score >= 4.0 {
        "⭐"
    } else {
        ""
    }
}

/// HTML card for one posting (Telegram's HTML subset).
pub fn format_card(job: &StoredJob) -> String {
    let s = &job.scored;
    let p = &s.posting;
    let title: String = p.title.chars().take(TITLE_CAP).collect();

    let mut card = format!("📊 <b>Score: {:.1}/10</b> {}\n", s.total_score, stars(s.total_score));
    card.push_str(&format!("<b>{}</b>\n", esc(&title)));
    card.push_str(&format!("🏢 {}\n", esc(&p.company)));
    card.push_str(&format!("📍 {}\n", esc(&p.location_text)));
    if let Some(salary) = p.salary_text.as_deref().filter(|s| !s.is_empty()) {
        card.push_str(&format!("💰 {}\n", esc(salary)));
    }
    card.push_str(&format!(
        "🔗 <a href=\"{}\">Apply</a>\n",
        html_escape::encode_double_quoted_attribute(&p.url)
    ));

    let mut hints = Vec::new();
    if s.passion_score >= 6.0 {
        hints.push("🤖 ML/AI");
    }
    if s.location_score >= 8.0 {
        hints.push("📍 Preferred Location");
    }
    if s.money_score >= 7.0 {
        hints.push("💰 Good Pay");
    }
    if !hints.is_empty() {
        card.push_str(&format!("💡 {}\n", hints.join(" | ")));
    }
    if let Some(at) = p.posted_at {
        card.push_str(&format!("📅 Posted: {}\n", at.format("%Y-%m-%d")));
    }
    card
}

fn header(total: usize, date: NaiveDate) -> String {
    format!(
        "🎯 <b>Daily Job Report - {}</b>\nFound <b>{total} new jobs</b> matching your criteria!\n\n{RULE}\n\n",
        date.format("%B %d, %Y")
    )
}

fn continued(from: usize) -> String {
    format!("📋 <b>Continued...</b> (Jobs {from}+)\n\n{RULE}\n\n")
}

/// Pack cards into chunks of at most `max_chars` characters and `max_jobs`
/// postings. A card that alone exceeds the limit still gets its own chunk.
pub fn chunk_cards(digest: &[StoredJob], cfg: &NotifyConfig, date: NaiveDate) -> Vec<Chunk> {
    if digest.is_empty() {
        return Vec::new();
    }
    let max_jobs = cfg.max_jobs_per_message.max(1);

    let mut chunks = Vec::new();
    let mut current = Chunk {
        text: header(digest.len(), date),
        fingerprints: Vec::new(),
    };
    for (i, job) in digest.iter().enumerate() {
        let card = format!("{}\n{RULE}\n\n", format_card(job));
        let would_be = current.text.chars().count() + card.chars().count();
        if !current.fingerprints.is_empty()
            && (would_be > cfg.max_message_chars || current.fingerprints.len() >= max_jobs)
        {
            chunks.push(std::mem::replace(
                &mut current,
                Chunk {
                    text: continued(i + 1),
                    fingerprints: Vec::new(),
                },
            ));
        }
        current.text.push_str(&card);
        current.fingerprints.push(job.fingerprint().clone());
    }
    chunks.push(current);
    chunks
}

/// Trailing statistics message.
pub fn summary(digest: &[StoredJob]) -> String {
    let n = digest.len();
    let count = |f: &dyn Fn(&StoredJob) -> bool| digest.iter().filter(|j| f(j)).count();
    let ml = count(&|j| j.scored.passion_score >= 5.0);
    let bavaria = count(&|j| j.scored.location_score >= 10.0);
    let germany = count(&|j| j.scored.location_score >= 6.0);
    let salary = count(&|j| j.scored.posting.salary_text.is_some());

    let mut out = format!("📈 <b>Summary:</b>\n\n✅ {n} new jobs found\n");
    out.push_str(&format!("🤖 {ml} ML/AI focused\n"));
    out.push_str(&format!("📍 {bavaria} in Bavaria, {germany} in Germany\n"));
    out.push_str(&format!("💰 {salary} with salary info\n"));
    if n > 0 {
        let top = digest
            .iter()
            .map(|j| j.scored.total_score)
            .fold(f64::MIN, f64::max);
        let avg = digest.iter().map(|j| j.scored.total_score).sum::<f64>() / n as f64;
        out.push_str(&format!("🏆 Top score: {top:.1}/10\n📊 Average score: {avg:.1}/10\n"));
    }

    let mut by_source: BTreeMap<&str, usize> = BTreeMap::new();
    for j in digest {
        *by_source.entry(j.scored.posting.source_id.as_str()).or_default() += 1;
    }
    let sources: Vec<String> = by_source.iter().map(|(s, c)| format!("{s} ({c})")).collect();
    out.push_str(&format!("\n🔍 Sources: {}\n", esc(&sources.join(", "))));
    out
}

pub fn problems_message(problems: &[String]) -> String {
    let mut out = String::from("⚠️ <b>Job digest alert</b>\n\nThe run completed with problems:\n\n");
    for p in problems {
        out.push_str(&format!("❌ {}\n", esc(p)));
    }
    out.push_str("\nCheck logs for details.");
    out
}

/// Telegram when both credentials are set, the log otherwise.
pub fn build_notifier(cfg: &NotifyConfig, client: &ResilientClient) -> Box<dyn Notifier> {
    match TelegramNotifier::from_env(client.clone(), cfg.clone()) {
        Ok(t) => Box::new(t),
        Err(e) => {
            tracing::info!(target: "digest", reason = %e, "telegram unavailable; digest goes to the log");
            Box::new(LogNotifier::new(cfg.clone()))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{TimeZone, Utc};

    use crate::dedup::Fingerprint;
    use crate::ingest::types::RawPosting;
    use crate::scoring::ScoredPosting;
    use crate::store::StoredJob;

    pub fn job(fp: &str, title: &str, total: f64) -> StoredJob {
        StoredJob {
            scored: ScoredPosting {
                fingerprint: Fingerprint::from_raw(fp),
                posting: RawPosting {
                    source_id: "arbeitnow".into(),
                    external_id: Some(fp.into()),
                    title: title.into(),
                    company: "Stadtwerke <Nord>".into(),
                    location_text: "München".into(),
                    description_text: String::new(),
                    salary_text: Some("EUR 60,000 - 70,000".into()),
                    posted_at: Some(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()),
                    url: format!("https://jobs.example/{fp}?a=1&b=2"),
                    tags: vec![],
                },
                money_score: 8.0,
                passion_score: 6.5,
                location_score: 10.0,
                total_score: total,
                filtered_out: false,
                filter_reason: None,
                years_experience: None,
                matched_keywords: vec![],
            },
            first_seen_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
            sent_at: None,
        }
    }
}
