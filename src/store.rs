// src/store.rs
//! Persistence collaborator: every scored posting ever seen, keyed by
//! fingerprint, plus its sent state.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dedup::{Fingerprint, SeenFingerprints};
use crate::error::StoreError;
use crate::scoring::{NormalizedWeights, ScoredPosting, Weights};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredJob {
    pub scored: ScoredPosting,
    pub first_seen_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl StoredJob {
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.scored.fingerprint
    }

    pub fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }

    /// Unsent and not filtered.
    pub fn is_eligible(&self) -> bool {
        !self.is_sent() && !self.scored.filtered_out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub unsent: usize,
    pub sent: usize,
    pub filtered: usize,
    pub by_source: BTreeMap<String, usize>,
    pub avg_total_score: f64,
}

pub trait JobStore: SeenFingerprints + Send + Sync {
    fn contains(&self, fp: &Fingerprint) -> bool {
        self.seen(fp)
    }

    fn get(&self, fp: &Fingerprint) -> Option<StoredJob>;

    /// Insert or replace the scored posting. Sent state and first-seen time
    /// of an existing record are kept. Returns true when the record is new.
    fn upsert(&mut self, scored: ScoredPosting, now: DateTime<Utc>) -> bool;

    fn all(&self) -> Vec<StoredJob>;

    /// Eligible postings, best total first.
    fn unsent_ranked(&self) -> Vec<StoredJob> {
        let mut out: Vec<StoredJob> = self.all().into_iter().filter(StoredJob::is_eligible).collect();
        out.sort_by(|a, b| {
            b.scored
                .total_score
                .total_cmp(&a.scored.total_score)
                .then_with(|| a.fingerprint().cmp(b.fingerprint()))
        });
        out
    }

    /// Idempotent; returns true only when the record went from unsent to sent.
    fn mark_sent(&mut self, fp: &Fingerprint, at: DateTime<Utc>) -> bool;

    /// Recompute every total from stored components. Returns the number of records.
    fn recompute_all(&mut self, w: &NormalizedWeights) -> usize;

    /// Weights saved by the last recompute. They take precedence over the
    /// configured weights when new postings are scored.
    fn weights(&self) -> Option<Weights>;

    fn set_weights(&mut self, w: Weights);

    /// Replace every scored record with `f(record)`, keeping sent state.
    fn rescore_all(&mut self, f: &mut dyn FnMut(&StoredJob) -> ScoredPosting) -> usize;

    /// Drop records first seen before `cutoff`. Returns how many were removed.
    fn purge_older_than(&mut self, cutoff: DateTime<Utc>) -> usize;

    fn stats(&self) -> StoreStats {
        let all = self.all();
        let mut st = StoreStats {
            total: all.len(),
            ..StoreStats::default()
        };
        let mut sum = 0.0;
        for j in &all {
            if j.is_sent() {
                st.sent += 1;
            } else if !j.scored.filtered_out {
                st.unsent += 1;
            }
            if j.scored.filtered_out {
                st.filtered += 1;
            }
            *st.by_source.entry(j.scored.posting.source_id.clone()).or_default() += 1;
            sum += j.scored.total_score;
        }
        if !all.is_empty() {
            st.avg_total_score = crate::scoring::round1(sum / all.len() as f64);
        }
        st
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    jobs: BTreeMap<Fingerprint, StoredJob>,
    weights: Option<Weights>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_jobs(jobs: Vec<StoredJob>) -> Self {
        Self {
            jobs: jobs
                .into_iter()
                .map(|j| (j.fingerprint().clone(), j))
                .collect(),
            weights: None,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn fingerprints(&self) -> HashSet<Fingerprint> {
        self.jobs.keys().cloned().collect()
    }
}

impl SeenFingerprints for MemoryStore {
    fn seen(&self, fp: &Fingerprint) -> bool {
        self.jobs.contains_key(fp)
    }
}

impl JobStore for MemoryStore {
    fn get(&self, fp: &Fingerprint) -> Option<StoredJob> {
        self.jobs.get(fp).cloned()
    }

    fn upsert(&mut self, scored: ScoredPosting, now: DateTime<Utc>) -> bool {
        match self.jobs.get_mut(&scored.fingerprint) {
            Some(existing) => {
                existing.scored = scored;
                false
            }
            None => {
                self.jobs.insert(
                    scored.fingerprint.clone(),
                    StoredJob {
                        scored,
                        first_seen_at: now,
                        sent_at: None,
                    },
                );
                true
            }
        }
    }

    fn all(&self) -> Vec<StoredJob> {
        self.jobs.values().cloned().collect()
    }

    fn mark_sent(&mut self, fp: &Fingerprint, at: DateTime<Utc>) -> bool {
        match self.jobs.get_mut(fp) {
            Some(j) if j.sent_at.is_none() => {
                j.sent_at = Some(at);
                true
            }
            _ => false,
        }
    }

    fn recompute_all(&mut self, w: &NormalizedWeights) -> usize {
        for j in self.jobs.values_mut() {
            j.scored.retotal(w);
        }
        self.jobs.len()
    }

    fn weights(&self) -> Option<Weights> {
        self.weights
    }

    fn set_weights(&mut self, w: Weights) {
        self.weights = Some(w);
    }

    fn rescore_all(&mut self, f: &mut dyn FnMut(&StoredJob) -> ScoredPosting) -> usize {
        for j in self.jobs.values_mut() {
            let rescored = f(j);
            j.scored = rescored;
        }
        self.jobs.len()
    }

    fn purge_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, j| j.first_seen_at >= cutoff);
        before - self.jobs.len()
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    weights: Option<Weights>,
    jobs: Vec<StoredJob>,
}

/// On-disk shapes. Early snapshots were a bare array of jobs.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Current(Snapshot),
    JobsOnly(Vec<StoredJob>),
}

impl From<SnapshotFile> for MemoryStore {
    fn from(file: SnapshotFile) -> Self {
        match file {
            SnapshotFile::Current(snap) => {
                let mut store = MemoryStore::from_jobs(snap.jobs);
                store.weights = snap.weights;
                store
            }
            SnapshotFile::JobsOnly(jobs) => MemoryStore::from_jobs(jobs),
        }
    }
}

/// `MemoryStore` persisted as one JSON snapshot. Writes go to a temp file
/// that is renamed over the snapshot, so a crash never leaves half a file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
    dirty: bool,
}

impl JsonFileStore {
    /// Open `path`, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            let bytes = fs::read(&path).map_err(|source| StoreError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let file: SnapshotFile = serde_json::from_slice(&bytes).map_err(|source| {
                StoreError::Corrupt {
                    path: path.display().to_string(),
                    source,
                }
            })?;
            MemoryStore::from(file)
        } else {
            MemoryStore::new()
        };
        tracing::debug!(path = %path.display(), records = inner.len(), "store opened");
        Ok(Self {
            path,
            inner,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl SeenFingerprints for JsonFileStore {
    fn seen(&self, fp: &Fingerprint) -> bool {
        self.inner.seen(fp)
    }
}

impl JobStore for JsonFileStore {
    fn get(&self, fp: &Fingerprint) -> Option<StoredJob> {
        self.inner.get(fp)
    }

    fn upsert(&mut self, scored: ScoredPosting, now: DateTime<Utc>) -> bool {
        self.dirty = true;
        self.inner.upsert(scored, now)
    }

    fn all(&self) -> Vec<StoredJob> {
        self.inner.all()
    }

    fn mark_sent(&mut self, fp: &Fingerprint, at: DateTime<Utc>) -> bool {
        let changed = self.inner.mark_sent(fp, at);
        self.dirty |= changed;
        changed
    }

    fn recompute_all(&mut self, w: &NormalizedWeights) -> usize {
        self.dirty = true;
        self.inner.recompute_all(w)
    }

    fn weights(&self) -> Option<Weights> {
        self.inner.weights()
    }

    fn set_weights(&mut self, w: Weights) {
        self.dirty = true;
        self.inner.set_weights(w);
    }

    fn rescore_all(&mut self, f: &mut dyn FnMut(&StoredJob) -> ScoredPosting) -> usize {
        self.dirty = true;
        self.inner.rescore_all(f)
    }

    fn purge_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let n = self.inner.purge_older_than(cutoff);
        self.dirty |= n > 0;
        n
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let snapshot = Snapshot {
            weights: self.inner.weights(),
            jobs: self.inner.all(),
        };
        let json = serde_json::to_vec_pretty(&snapshot).map_err(|source| StoreError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), records = self.inner.len(), "store flushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::RawPosting;
    use chrono::Duration;

    fn scored(id: &str, total: f64, filtered: bool) -> ScoredPosting {
        ScoredPosting {
            fingerprint: Fingerprint::from_raw(id),
            posting: RawPosting {
                source_id: "src".into(),
                external_id: Some(id.into()),
                title: "t".into(),
                company: "c".into(),
                location_text: "l".into(),
                description_text: String::new(),
                salary_text: None,
                posted_at: None,
                url: "https://x".into(),
                tags: vec![],
            },
            money_score: total,
            passion_score: total,
            location_score: total,
            total_score: total,
            filtered_out: filtered,
            filter_reason: filtered.then(|| "nope".to_string()),
            years_experience: None,
            matched_keywords: vec![],
        }
    }

    #[test]
    fn upsert_keeps_sent_state_and_first_seen() {
        let t0 = Utc::now();
        let mut s = MemoryStore::new();
        assert!(s.upsert(scored("a", 5.0, false), t0));
        assert!(s.mark_sent(&Fingerprint::from_raw("a"), t0));
        assert!(!s.mark_sent(&Fingerprint::from_raw("a"), t0));
        assert!(!s.upsert(scored("a", 9.0, false), t0 + Duration::hours(1)));
        let j = s.get(&Fingerprint::from_raw("a")).unwrap();
        assert_eq!(j.first_seen_at, t0);
        assert!(j.is_sent());
        assert_eq!(j.scored.total_score, 9.0);
    }

    #[test]
    fn unsent_ranked_excludes_sent_and_filtered() {
        let now = Utc::now();
        let mut s = MemoryStore::new();
        s.upsert(scored("a", 5.0, false), now);
        s.upsert(scored("b", 8.0, false), now);
        s.upsert(scored("c", 9.0, true), now);
        s.upsert(scored("d", 7.0, false), now);
        s.mark_sent(&Fingerprint::from_raw("d"), now);
        let ids: Vec<String> = s
            .unsent_ranked()
            .iter()
            .map(|j| j.fingerprint().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);

        let st = s.stats();
        assert_eq!((st.total, st.unsent, st.sent, st.filtered), (4, 2, 1, 1));
        assert_eq!(st.by_source.get("src"), Some(&4));
    }

    #[test]
    fn purge_uses_first_seen() {
        let now = Utc::now();
        let mut s = MemoryStore::new();
        s.upsert(scored("old", 5.0, false), now - Duration::days(100));
        s.upsert(scored("new", 5.0, false), now);
        assert_eq!(s.purge_older_than(now - Duration::days(90)), 1);
        assert!(s.seen(&Fingerprint::from_raw("new")));
        assert!(!s.seen(&Fingerprint::from_raw("old")));
    }
}
