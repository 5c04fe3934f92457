// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod dedup;
pub mod digest;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod relevance;
pub mod scoring;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::config::AppConfig;
pub use crate::dedup::Fingerprint;
pub use crate::error::{ConfigError, StoreError};
pub use crate::ingest::types::{RawPosting, SearchParams, SourceAdapter, SourceError};
pub use crate::pipeline::{Pipeline, RunSummary};
pub use crate::scoring::{ScoredPosting, Weights};
pub use crate::store::{JobStore, JsonFileStore, MemoryStore, StoredJob};
