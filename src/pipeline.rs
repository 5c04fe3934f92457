// src/pipeline.rs
//! One ingest run, end to end: harness → dedup → filter → score → store →
//! digest → notify → retention.

use std::borrow::Cow;
use std::fmt;

use anyhow::Context;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::dedup::{DedupGate, Fingerprint};
use crate::digest;
use crate::error::ConfigError;
use crate::ingest::harness::{Harness, RegisteredSource, SourceResult, SourceStatus};
use crate::notify::{DeliveryReport, Notifier};
use crate::relevance::RelevanceFilter;
use crate::scoring::{ScoringEngine, Weights};
use crate::store::{JobStore, StoredJob};

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source_id: String,
    pub status: SourceStatus,
    pub postings: usize,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl From<&SourceResult> for SourceReport {
    fn from(r: &SourceResult) -> Self {
        Self {
            source_id: r.source_id.clone(),
            status: r.status,
            postings: r.postings.len(),
            error: r.error.clone(),
            elapsed_ms: r.elapsed.as_millis() as u64,
        }
    }
}

/// Counts from the dedup/filter/score/store stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestCounts {
    pub fetched: usize,
    pub duplicates: usize,
    pub new_postings: usize,
    pub filtered: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    pub counts: IngestCounts,
    pub digest: Vec<Fingerprint>,
    pub delivered: usize,
    pub chunks_failed: usize,
    pub purged: usize,
    pub problems: Vec<String>,
}

impl RunSummary {
    pub fn source(&self, id: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source_id == id)
    }

    pub fn log(&self) {
        for s in &self.sources {
            info!(
                target: "ingest",
                source = %s.source_id,
                status = s.status.as_str(),
                postings = s.postings,
                elapsed_ms = s.elapsed_ms,
                error = ?s.error,
                "source result"
            );
        }
        info!(
            target: "digest",
            fetched = self.counts.fetched,
            duplicates = self.counts.duplicates,
            new = self.counts.new_postings,
            filtered = self.counts.filtered,
            digest = self.digest.len(),
            delivered = self.delivered,
            purged = self.purged,
            problems = self.problems.len(),
            "run finished"
        );
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run started {}", self.started_at.to_rfc3339())?;
        for s in &self.sources {
            write!(
                f,
                "  {:<16} {:<9} {:>5} posting(s) {:>6} ms",
                s.source_id,
                s.status.as_str(),
                s.postings,
                s.elapsed_ms
            )?;
            match &s.error {
                Some(e) => writeln!(f, "  {e}")?,
                None => writeln!(f)?,
            }
        }
        writeln!(
            f,
            "fetched {} | duplicates {} | new {} | filtered {}",
            self.counts.fetched, self.counts.duplicates, self.counts.new_postings, self.counts.filtered
        )?;
        write!(
            f,
            "digest {} | delivered {} | purged {}",
            self.digest.len(),
            self.delivered,
            self.purged
        )
    }
}

/// Human-readable lines for failed and degraded sources.
pub fn source_problems(results: &[SourceResult]) -> Vec<String> {
    results
        .iter()
        .filter(|r| r.status != SourceStatus::Ok)
        .map(|r| match &r.error {
            Some(e) => format!("{}: {} ({e})", r.source_id, r.status.as_str()),
            None => format!("{}: {}", r.source_id, r.status.as_str()),
        })
        .collect()
}

pub struct Pipeline {
    cfg: AppConfig,
    filter: RelevanceFilter,
    engine: ScoringEngine,
    harness: Harness,
}

impl Pipeline {
    /// Validates the whole configuration and compiles every keyword list.
    pub fn new(cfg: AppConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let filter = RelevanceFilter::new(&cfg.filter)?;
        let engine = ScoringEngine::new(&cfg.scoring)?;
        let harness = Harness::new().with_deadline(cfg.run.run_timeout());
        Ok(Self {
            cfg,
            filter,
            engine,
            harness,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    pub fn filter(&self) -> &RelevanceFilter {
        &self.filter
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    /// The engine new scores are computed with: weights saved in `store` by a
    /// recompute replace the configured ones.
    pub fn engine_for(&self, store: &dyn JobStore) -> Cow<'_, ScoringEngine> {
        let Some(saved) = store.weights() else {
            return Cow::Borrowed(&self.engine);
        };
        let mut engine = self.engine.clone();
        match engine.set_weights(&saved) {
            Ok(()) => Cow::Owned(engine),
            Err(e) => {
                warn!(target: "digest", error = %e, "stored weights rejected; using configured weights");
                Cow::Borrowed(&self.engine)
            }
        }
    }

    /// Dedup, filter, score and upsert everything the harness collected.
    /// Cross-source duplicates resolve to the first source in adapter order.
    pub fn ingest(
        &self,
        results: &[SourceResult],
        store: &mut dyn JobStore,
        now: DateTime<Utc>,
    ) -> IngestCounts {
        let engine = self.engine_for(&*store);
        let mut counts = IngestCounts::default();
        let mut fresh = Vec::new();
        {
            let mut gate = DedupGate::new(&*store);
            for r in results {
                for p in &r.postings {
                    counts.fetched += 1;
                    let fp = Fingerprint::of(p);
                    if gate.is_new(&fp) {
                        fresh.push((fp, p.clone()));
                    } else {
                        counts.duplicates += 1;
                    }
                }
            }
        }

        for (fp, posting) in fresh {
            let verdict = self.filter.evaluate(&posting);
            if !verdict.keep {
                counts.filtered += 1;
                tracing::debug!(
                    target: "ingest",
                    fingerprint = %fp,
                    reason = ?verdict.reason,
                    "filtered"
                );
            }
            let scored = engine.score(fp, posting, &verdict);
            if store.upsert(scored, now) {
                counts.new_postings += 1;
            }
        }

        counter!("ingest_dedup_total").increment(counts.duplicates as u64);
        counter!("ingest_filtered_total").increment(counts.filtered as u64);
        counts
    }

    /// Current top-N without sending anything.
    pub fn preview(&self, store: &dyn JobStore) -> Vec<StoredJob> {
        digest::select(&store.all(), self.cfg.run.digest_size)
    }

    /// Run every source once and hand the digest to `notifier`. With no
    /// notifier (dry run) nothing is marked as sent.
    pub async fn run_once(
        &self,
        sources: &[RegisteredSource],
        store: &mut dyn JobStore,
        notifier: Option<&dyn Notifier>,
    ) -> anyhow::Result<RunSummary> {
        let started_at = Utc::now();
        info!(target: "ingest", sources = sources.len(), "run started");

        let results = self.harness.run(sources).await;
        let counts = self.ingest(&results, store, started_at);
        let mut problems = source_problems(&results);

        let picked = self.preview(&*store);
        let mut report = DeliveryReport::default();
        if let Some(n) = notifier {
            let sent_at = Utc::now();
            let mut mark = |fp: &Fingerprint| {
                store.mark_sent(fp, sent_at);
            };
            match n.deliver(&picked, &problems, &mut mark).await {
                Ok(r) => report = r,
                Err(e) => {
                    warn!(target: "digest", notifier = n.name(), error = %e, "delivery failed");
                    problems.push(format!("{}: delivery failed ({e})", n.name()));
                }
            }
            counter!("digest_sent_total").increment(report.delivered as u64);
        } else {
            info!(target: "digest", candidates = picked.len(), "dry run; nothing sent");
        }

        let cutoff = ChronoDuration::try_days(self.cfg.run.retention_days)
            .and_then(|d| started_at.checked_sub_signed(d))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let purged = store.purge_older_than(cutoff);
        store.flush().context("flushing job store")?;
        gauge!("pipeline_last_run_ts").set(started_at.timestamp() as f64);

        let summary = RunSummary {
            started_at,
            sources: results.iter().map(SourceReport::from).collect(),
            counts,
            digest: picked.iter().map(|j| j.fingerprint().clone()).collect(),
            delivered: report.delivered,
            chunks_failed: report.chunks_failed,
            purged,
            problems,
        };
        summary.log();
        Ok(summary)
    }

    /// Recompute every component from stored raw fields with this pipeline's
    /// filter and engine. Sent state is kept.
    pub fn rescore(&self, store: &mut dyn JobStore) -> usize {
        let engine = self.engine_for(&*store);
        rescore_all(store, &self.filter, &engine)
    }
}

/// Rescale every stored total under new weights and keep the weights for
/// later runs. Components are untouched.
pub fn recompute_scores(store: &mut dyn JobStore, weights: &Weights) -> Result<usize, ConfigError> {
    let w = weights.normalized()?;
    store.set_weights(*weights);
    let n = store.recompute_all(&w);
    info!(
        target: "digest",
        records = n,
        money = w.money(),
        passion = w.passion(),
        location = w.location(),
        "totals recomputed"
    );
    Ok(n)
}

pub fn rescore_all(
    store: &mut dyn JobStore,
    filter: &RelevanceFilter,
    engine: &ScoringEngine,
) -> usize {
    let n = store.rescore_all(&mut |job: &StoredJob| {
        let posting = job.scored.posting.clone();
        let verdict = filter.evaluate(&posting);
        engine.score(job.fingerprint().clone(), posting, &verdict)
    });
    info!(target: "digest", records = n, "postings rescored");
    n
}
