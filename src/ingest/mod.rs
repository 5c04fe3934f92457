// src/ingest/mod.rs
pub mod config;
pub mod harness;
pub mod providers;
pub mod registry;
pub mod types;

pub use harness::{Harness, RegisteredSource, SourceResult, SourceStatus};
pub use types::{RawPosting, SearchParams, SourceAdapter, SourceError};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;

/// Longest description we keep, in characters.
pub const TEXT_CAP: usize = 2000;

fn tag_re() -> &'static Regex {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    RE_TAGS.get_or_init(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>|</?[^>]+>").unwrap())
}

fn ws_re() -> &'static Regex {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Decode entities, strip markup, collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let decoded = html_escape::decode_html_entities(s);

    // 2) Strip tags; block-level tags become spaces so words don't glue together
    let mut out = tag_re().replace_all(&decoded, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ");

    // 4) Collapse whitespace
    out = ws_re().replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > TEXT_CAP {
        out = out.chars().take(TEXT_CAP).collect();
    }
    out
}

/// Best-effort timestamp parsing across the formats the sources emit:
/// RFC 3339, RFC 2822, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`, bare dates.
pub fn parse_posted_at(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    let date_part = s.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    Utc.timestamp_opt(secs, 0).single()
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Render numeric salary fields the way listings print them, so the money
/// scorer reads structured and free-text salaries the same way.
pub fn format_salary_range(currency: &str, min: Option<f64>, max: Option<f64>) -> Option<String> {
    let positive = |v: Option<f64>| v.filter(|x| x.is_finite() && *x > 0.0).map(|x| x.round() as u64);
    let cur = currency.trim().to_ascii_uppercase();
    let prefix = if cur.is_empty() { String::new() } else { format!("{cur} ") };
    match (positive(min), positive(max)) {
        (Some(lo), Some(hi)) if hi > lo => Some(format!(
            "{prefix}{} - {}",
            group_thousands(lo),
            group_thousands(hi)
        )),
        (Some(lo), _) => Some(format!("{prefix}{}+", group_thousands(lo))),
        (None, Some(hi)) => Some(format!("{prefix}up to {}", group_thousands(hi))),
        (None, None) => None,
    }
}

/// Push `p` unless it is invalid. Returns false once `max_items` is reached.
pub(crate) fn push_capped(out: &mut Vec<RawPosting>, p: RawPosting, max_items: usize) -> bool {
    if out.len() >= max_items {
        return false;
    }
    if p.is_valid() {
        out.push(p);
    }
    out.len() < max_items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_strips_markup_and_collapses_ws() {
        let s = "  <p>Hello,&nbsp;&nbsp;<b>world</b></p><ul><li>Rust</li></ul>  ";
        assert_eq!(normalize_text(s), "Hello, world Rust");
    }

    #[test]
    fn normalize_text_drops_script_bodies_and_caps_length() {
        let s = format!("<script>var x = 1;</script>{}", "a".repeat(3000));
        let out = normalize_text(&s);
        assert!(!out.contains("var x"));
        assert_eq!(out.chars().count(), TEXT_CAP);
    }

    #[test]
    fn posted_at_formats() {
        let a = parse_posted_at("2024-05-01T10:00:00Z").unwrap();
        let b = parse_posted_at("Wed, 01 May 2024 10:00:00 +0000").unwrap();
        let c = parse_posted_at("2024-05-01 10:00:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(parse_posted_at("2024-05-01").is_some());
        assert!(parse_posted_at("yesterday").is_none());
    }

    #[test]
    fn salary_range_rendering() {
        assert_eq!(
            format_salary_range("eur", Some(50000.0), Some(65000.0)).as_deref(),
            Some("EUR 50,000 - 65,000")
        );
        assert_eq!(
            format_salary_range("USD", Some(120000.0), None).as_deref(),
            Some("USD 120,000+")
        );
        assert_eq!(format_salary_range("USD", Some(0.0), None), None);
    }
}
