// src/error.rs
//! Errors shared across modules. Fetch, source and notify errors live next to
//! the code that raises them.

use thiserror::Error;

/// Invalid configuration. Always fatal at startup, before any fetching begins.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("scoring weights must be finite and non-negative (money={money}, passion={passion}, location={location})")]
    InvalidWeight { money: f64, passion: f64, location: f64 },

    #[error("scoring weights are all zero; at least one must be positive")]
    ZeroWeights,

    #[error("keyword `{term}` in {list} is not a valid pattern: {message}")]
    BadPattern {
        list: String,
        term: String,
        message: String,
    },

    #[error("{field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Store (persistence collaborator) failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store snapshot at {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
