// src/digest.rs
//! Top-N selection. Deterministic for a given candidate set regardless of
//! input order.

use std::cmp::Ordering;

use serde::Serialize;

use crate::store::StoredJob;

/// total desc, then posted_at asc (undated last), then fingerprint asc.
pub fn digest_order(a: &StoredJob, b: &StoredJob) -> Ordering {
    b.scored
        .total_score
        .total_cmp(&a.scored.total_score)
        .then_with(|| match (a.scored.posting.posted_at, b.scored.posting.posted_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.fingerprint().cmp(b.fingerprint()))
}

/// Up to `n` eligible candidates (unsent, not filtered) in digest order.
pub fn select(candidates: &[StoredJob], n: usize) -> Vec<StoredJob> {
    let mut eligible: Vec<StoredJob> = candidates
        .iter()
        .filter(|j| j.is_eligible())
        .cloned()
        .collect();
    eligible.sort_by(digest_order);
    eligible.truncate(n);
    eligible
}

/// Flat, serializable view of one digest line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestItem {
    pub fingerprint: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub url: String,
    pub salary: Option<String>,
    pub source: String,
    pub total: f64,
    pub money: f64,
    pub passion: f64,
    pub location_score: f64,
    pub matched_keywords: Vec<String>,
}

impl From<&StoredJob> for DigestItem {
    fn from(j: &StoredJob) -> Self {
        let s = &j.scored;
        Self {
            fingerprint: s.fingerprint.to_string(),
            title: s.posting.title.clone(),
            company: s.posting.company.clone(),
            location: s.posting.location_text.clone(),
            url: s.posting.url.clone(),
            salary: s.posting.salary_text.clone(),
            source: s.posting.source_id.clone(),
            total: s.total_score,
            money: s.money_score,
            passion: s.passion_score,
            location_score: s.location_score,
            matched_keywords: s.matched_keywords.clone(),
        }
    }
}

pub fn items(digest: &[StoredJob]) -> Vec<DigestItem> {
    digest.iter().map(DigestItem::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::Fingerprint;
    use crate::ingest::types::RawPosting;
    use crate::scoring::ScoredPosting;
    use chrono::{TimeZone, Utc};

    fn job(fp: &str, total: f64, day: Option<u32>) -> StoredJob {
        StoredJob {
            scored: ScoredPosting {
                fingerprint: Fingerprint::from_raw(fp),
                posting: RawPosting {
                    source_id: "s".into(),
                    external_id: None,
                    title: fp.into(),
                    company: "c".into(),
                    location_text: "l".into(),
                    description_text: String::new(),
                    salary_text: None,
                    posted_at: day.map(|d| Utc.with_ymd_and_hms(2025, 3, d, 0, 0, 0).unwrap()),
                    url: format!("https://x/{fp}"),
                    tags: vec![],
                },
                money_score: 0.0,
                passion_score: 0.0,
                location_score: 0.0,
                total_score: total,
                filtered_out: false,
                filter_reason: None,
                years_experience: None,
                matched_keywords: vec![],
            },
            first_seen_at: Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap(),
            sent_at: None,
        }
    }

    #[test]
    fn ties_break_on_date_then_fingerprint() {
        let jobs = vec![
            job("c", 7.0, None),
            job("b", 7.0, Some(5)),
            job("a", 7.0, None),
            job("d", 7.0, Some(2)),
            job("e", 9.0, Some(9)),
        ];
        let picked: Vec<String> = select(&jobs, 10)
            .iter()
            .map(|j| j.fingerprint().to_string())
            .collect();
        assert_eq!(picked, vec!["e", "d", "b", "a", "c"]);
    }

    #[test]
    fn respects_n_and_eligibility() {
        let mut sent = job("sent", 9.9, None);
        sent.sent_at = Some(Utc::now());
        let mut filtered = job("filtered", 9.8, None);
        filtered.scored.filtered_out = true;
        let jobs = vec![sent, filtered, job("x", 1.0, None), job("y", 2.0, None)];
        assert_eq!(select(&jobs, 1).len(), 1);
        assert_eq!(select(&jobs, 1)[0].fingerprint().as_str(), "y");
        assert_eq!(select(&jobs, 50).len(), 2);
        assert!(select(&jobs, 0).is_empty());
    }
}
