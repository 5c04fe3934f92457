// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn install() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        describe();
        Ok(Self { handle })
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("fetch_attempts_total", "HTTP attempts per source");
    describe_counter!("fetch_retries_total", "Attempts followed by a backoff");
    describe_counter!("fetch_failures_total", "Requests that gave up");
    describe_counter!("ingest_postings_total", "Valid postings collected per source");
    describe_counter!("ingest_dedup_total", "Postings dropped as already seen");
    describe_counter!("ingest_filtered_total", "Postings rejected by the relevance filter");
    describe_counter!("ingest_source_failures_total", "Adapters that ended failed");
    describe_histogram!("ingest_source_ms", Unit::Milliseconds, "Wall time per adapter");
    describe_histogram!("ingest_parse_ms", Unit::Milliseconds, "Response decode time");
    describe_counter!("digest_sent_total", "Postings marked as sent");
    describe_gauge!("pipeline_last_run_ts", Unit::Seconds, "Unix time of the last completed run");
}
