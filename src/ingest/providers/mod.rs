// src/ingest/providers/mod.rs
pub mod adzuna;
pub mod arbeitnow;
pub mod bundesagentur;
pub mod jobicy;
pub mod remoteok;
pub mod themuse;
pub mod weworkremotely_rss;

pub use adzuna::AdzunaAdapter;
pub use arbeitnow::ArbeitnowAdapter;
pub use bundesagentur::BundesagenturAdapter;
pub use jobicy::JobicyAdapter;
pub use remoteok::RemoteOkAdapter;
pub use themuse::TheMuseAdapter;
pub use weworkremotely_rss::WeWorkRemotelyFeed;

use std::time::Instant;

use metrics::{counter, histogram};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::fetch::{FetchRequest, FetchResponse, ResilientClient};
use crate::ingest::types::SourceError;

/// Decode a JSON body; shape mismatches become `parse_error`.
pub(crate) fn decode<T: DeserializeOwned>(source_id: &str, resp: &FetchResponse) -> Result<T, SourceError> {
    let t0 = Instant::now();
    let out = resp.json::<T>().map_err(|e| SourceError::parse(source_id, e));
    histogram!("ingest_parse_ms", "source" => source_id.to_string())
        .record(t0.elapsed().as_secs_f64() * 1_000.0);
    out
}

pub(crate) async fn fetch_json<T: DeserializeOwned>(
    client: &ResilientClient,
    source_id: &str,
    req: &FetchRequest,
) -> Result<T, SourceError> {
    let resp = client.fetch(req).await?;
    decode(source_id, &resp)
}

/// A failure before any request succeeded is the source's failure. After that,
/// collection stops and the postings gathered so far are kept.
pub(crate) fn end_early(source_id: &str, err: SourceError, fetched_any: bool) -> Result<(), SourceError> {
    if !fetched_any {
        return Err(err);
    }
    counter!("ingest_partial_total", "source" => source_id.to_string()).increment(1);
    tracing::warn!(
        target: "ingest",
        source = source_id,
        classification = err.kind(),
        error = %err,
        "request failed mid-collection; keeping partial results"
    );
    Ok(())
}

/// Strings and numbers both show up as ids; anything else is absent.
pub(crate) fn json_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn json_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

/// A single string or an array of strings.
pub(crate) fn json_strings(v: &Value) -> Vec<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Value::Array(items) => items.iter().filter_map(json_string).collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn or_default(s: &str, fallback: &str) -> String {
    let t = s.trim();
    if t.is_empty() {
        fallback.to_string()
    } else {
        t.to_string()
    }
}
