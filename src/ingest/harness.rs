// src/ingest/harness.rs
//! Runs every adapter in its own task and turns whatever happens into one
//! `SourceResult` per adapter, in registration order.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::Serialize;
use tokio::task::JoinHandle;

use super::types::{RawPosting, SearchParams, SourceAdapter, SourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Degraded,
    Failed,
}

impl SourceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceResult {
    pub source_id: String,
    pub status: SourceStatus,
    #[serde(skip)]
    pub postings: Vec<RawPosting>,
    pub error: Option<String>,
    pub elapsed: Duration,
}

/// An adapter plus the parameters it is called with and its health floor.
#[derive(Clone)]
pub struct RegisteredSource {
    pub adapter: Arc<dyn SourceAdapter>,
    pub params: SearchParams,
    /// Fewer postings than this marks the source `degraded`. 0 disables the check.
    pub min_expected: usize,
}

impl RegisteredSource {
    pub fn new(adapter: Arc<dyn SourceAdapter>, params: SearchParams) -> Self {
        Self {
            adapter,
            params,
            min_expected: 0,
        }
    }

    pub fn min_expected(mut self, n: usize) -> Self {
        self.min_expected = n;
        self
    }
}

pub const ABANDONED: &str = "abandoned after run deadline";

type Collected = (Result<Vec<RawPosting>, SourceError>, Duration);

#[derive(Debug, Clone, Default)]
pub struct Harness {
    deadline: Option<Duration>,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whole-run budget. Adapters still running when it expires are aborted.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub async fn run(&self, sources: &[RegisteredSource]) -> Vec<SourceResult> {
        let started = Instant::now();
        let deadline = self
            .deadline
            .map(|d| tokio::time::Instant::now() + d);

        let handles: Vec<JoinHandle<Collected>> = sources
            .iter()
            .map(|s| {
                let adapter = Arc::clone(&s.adapter);
                let params = s.params.clone();
                tokio::spawn(async move {
                    let t0 = Instant::now();
                    let res = adapter.collect(&params).await;
                    (res, t0.elapsed())
                })
            })
            .collect();

        let mut results = Vec::with_capacity(sources.len());
        for (src, mut handle) in sources.iter().zip(handles) {
            let source_id = src.adapter.source_id().to_string();
            let joined = match deadline {
                Some(at) => match tokio::time::timeout_at(at, &mut handle).await {
                    Ok(j) => Some(j),
                    Err(_) => {
                        handle.abort();
                        None
                    }
                },
                None => Some((&mut handle).await),
            };

            let result = match joined {
                None => failed(source_id, ABANDONED.to_string(), started.elapsed()),
                Some(Err(join_err)) => {
                    let reason = if join_err.is_panic() {
                        let payload = panic_message(join_err.into_panic());
                        tracing::error!(
                            target: "ingest",
                            source = %source_id,
                            panic = %payload,
                            "adapter panicked"
                        );
                        format!("adapter panicked: {payload}")
                    } else {
                        tracing::error!(target: "ingest", source = %source_id, error = %join_err, "adapter task cancelled");
                        format!("adapter task cancelled: {join_err}")
                    };
                    failed(source_id, reason, started.elapsed())
                }
                Some(Ok((Err(e), elapsed))) => {
                    tracing::warn!(
                        target: "ingest",
                        source = %source_id,
                        classification = e.kind(),
                        error = %e,
                        "source failed"
                    );
                    failed(source_id, e.to_string(), elapsed)
                }
                Some(Ok((Ok(mut postings), elapsed))) => {
                    let before = postings.len();
                    postings.retain(RawPosting::is_valid);
                    if postings.len() < before {
                        tracing::debug!(
                            target: "ingest",
                            source = %source_id,
                            dropped = before - postings.len(),
                            "dropped postings without title or url"
                        );
                    }
                    classify(source_id, postings, src.min_expected, elapsed)
                }
            };

            histogram!("ingest_source_ms", "source" => result.source_id.clone())
                .record(result.elapsed.as_secs_f64() * 1_000.0);
            counter!("ingest_postings_total", "source" => result.source_id.clone())
                .increment(result.postings.len() as u64);
            if result.status == SourceStatus::Failed {
                counter!("ingest_source_failures_total", "source" => result.source_id.clone())
                    .increment(1);
            }
            results.push(result);
        }
        results
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn failed(source_id: String, reason: String, elapsed: Duration) -> SourceResult {
    SourceResult {
        source_id,
        status: SourceStatus::Failed,
        postings: Vec::new(),
        error: Some(reason),
        elapsed,
    }
}

fn classify(
    source_id: String,
    postings: Vec<RawPosting>,
    min_expected: usize,
    elapsed: Duration,
) -> SourceResult {
    if min_expected > 0 && postings.len() < min_expected {
        tracing::warn!(
            target: "ingest",
            source = %source_id,
            count = postings.len(),
            min_expected,
            "source degraded"
        );
        return SourceResult {
            error: Some(format!(
                "only {} posting(s), expected at least {min_expected}",
                postings.len()
            )),
            source_id,
            status: SourceStatus::Degraded,
            postings,
            elapsed,
        };
    }
    tracing::info!(
        target: "ingest",
        source = %source_id,
        count = postings.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "source ok"
    );
    SourceResult {
        source_id,
        status: SourceStatus::Ok,
        postings,
        error: None,
        elapsed,
    }
}
