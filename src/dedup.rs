// src/dedup.rs
//! Exact-key deduplication. A fingerprint depends only on the source id and
//! the posting's native id (or its URL), never on mutable text.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ingest::types::RawPosting;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(p: &RawPosting) -> Self {
        let source = p.source_id.trim().to_lowercase();
        let key = match p.external_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => format!("id:{id}"),
            _ => format!("url:{}", normalize_url(&p.url)),
        };
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update(b"|");
        hasher.update(key.as_bytes());
        let digest = hasher.finalize();
        let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
        Self(format!("{source}-{hex}"))
    }

    /// Wrap an already-computed fingerprint (e.g. read back from a store).
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-case scheme and host, drop the fragment and a trailing slash.
/// Path and query keep their case.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let url = url.split_once('#').map_or(url, |(head, _)| head);
    let (scheme, rest) = match url.split_once("://") {
        Some((s, r)) => (s.to_ascii_lowercase(), r),
        None => (String::new(), url),
    };
    let (host, tail) = match rest.find(['/', '?']) {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };
    let mut out = if scheme.is_empty() {
        host.to_ascii_lowercase()
    } else {
        format!("{scheme}://{}", host.to_ascii_lowercase())
    };
    out.push_str(tail);
    while out.ends_with('/') {
        out.pop();
    }
    out
}

/// Cross-run memory consulted by the gate.
pub trait SeenFingerprints {
    fn seen(&self, fp: &Fingerprint) -> bool;
}

impl SeenFingerprints for HashSet<Fingerprint> {
    fn seen(&self, fp: &Fingerprint) -> bool {
        self.contains(fp)
    }
}

/// Per-run gate: prior runs via `history`, earlier postings of this run via
/// the in-run set. First sighting wins.
pub struct DedupGate<'a, S: SeenFingerprints + ?Sized> {
    history: &'a S,
    in_run: HashSet<Fingerprint>,
}

impl<'a, S: SeenFingerprints + ?Sized> DedupGate<'a, S> {
    pub fn new(history: &'a S) -> Self {
        Self {
            history,
            in_run: HashSet::new(),
        }
    }

    /// True exactly once per fingerprint not already known to `history`.
    pub fn is_new(&mut self, fp: &Fingerprint) -> bool {
        if self.in_run.contains(fp) || self.history.seen(fp) {
            return false;
        }
        self.in_run.insert(fp.clone());
        true
    }

    pub fn admitted(&self) -> usize {
        self.in_run.len()
    }
}
