// src/config.rs
//! Application configuration: one TOML document, every section optional.
//!
//! Resolution order for the file:
//! 1) $DIGEST_CONFIG_PATH (must exist)
//! 2) config/digest.toml
//! 3) built-in defaults

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::fetch::RetryPolicy;
use crate::ingest::config::SourcesConfig;
use crate::notify::NotifyConfig;
use crate::relevance::FilterConfig;
use crate::scoring::ScoringConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/digest.toml";
pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";
/// About a century; larger windows are rejected.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub run: RunConfig,
    pub fetch: FetchConfig,
    pub sources: SourcesConfig,
    pub filter: FilterConfig,
    pub scoring: ScoringConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Daily digest ceiling `n`.
    pub digest_size: usize,
    /// Whole-run deadline for the fetch stage.
    pub run_timeout_secs: u64,
    /// Stored postings older than this are purged after each run.
    pub retention_days: i64,
    pub store_path: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            digest_size: 15,
            run_timeout_secs: 600,
            retention_days: 90,
            store_path: PathBuf::from("data/jobs.json"),
        }
    }
}

impl RunConfig {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Per-call timeout.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!("job-digest/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing config TOML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Load using env var + fallbacks (see module docs).
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        tracing::info!("no config file found; using built-in defaults");
        Ok(Self::default())
    }

    /// Scalar sanity checks. Keyword patterns and weights are validated when
    /// the filter and scoring engine are built from this config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.digest_size == 0 {
            return Err(ConfigError::invalid("run.digest_size", "must be at least 1"));
        }
        if !(1..=MAX_RETENTION_DAYS).contains(&self.run.retention_days) {
            return Err(ConfigError::invalid(
                "run.retention_days",
                format!("must be within 1..={MAX_RETENTION_DAYS}"),
            ));
        }
        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::invalid("fetch.max_attempts", "must be at least 1"));
        }
        if self.fetch.base_delay_ms > self.fetch.max_delay_ms {
            return Err(ConfigError::invalid(
                "fetch.base_delay_ms",
                "must not exceed fetch.max_delay_ms",
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::invalid("fetch.timeout_secs", "must be positive"));
        }
        if self.notify.max_message_chars < 200 {
            return Err(ConfigError::invalid(
                "notify.max_message_chars",
                "must be at least 200",
            ));
        }
        if self.notify.max_jobs_per_message == 0 {
            return Err(ConfigError::invalid(
                "notify.max_jobs_per_message",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.run.digest_size, 15);
        assert_eq!(cfg.fetch.max_attempts, 4);
        assert!(cfg.sources.arbeitnow.enabled);
    }

    #[test]
    fn retry_policy_from_fetch_section() {
        let cfg = AppConfig::from_toml_str(
            r#"
[fetch]
max_attempts = 3
base_delay_ms = 10
max_delay_ms = 80
"#,
        )
        .unwrap();
        let p = cfg.fetch.retry_policy();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.base_delay, Duration::from_millis(10));
        assert_eq!(p.max_delay, Duration::from_millis(80));
    }

    #[test]
    fn zero_digest_size_is_rejected() {
        let err = AppConfig::from_toml_str("[run]\ndigest_size = 0\n").unwrap_err();
        assert!(format!("{err:#}").contains("digest_size"));
    }

    #[test]
    fn inverted_backoff_bounds_are_rejected() {
        let err = AppConfig::from_toml_str("[fetch]\nbase_delay_ms = 900\nmax_delay_ms = 100\n")
            .unwrap_err();
        assert!(format!("{err:#}").contains("base_delay_ms"));
    }
}
