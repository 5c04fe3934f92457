// src/ingest/registry.rs
//! Builds the enabled adapters, in a fixed order, from `[sources]`.

use std::sync::Arc;

use crate::fetch::ResilientClient;
use crate::ingest::config::SourcesConfig;
use crate::ingest::harness::RegisteredSource;
use crate::ingest::providers::adzuna::AdzunaCredentials;
use crate::ingest::providers::{
    AdzunaAdapter, ArbeitnowAdapter, BundesagenturAdapter, JobicyAdapter, RemoteOkAdapter,
    TheMuseAdapter, WeWorkRemotelyFeed,
};

pub const ENV_BUNDESAGENTUR_KEY: &str = "BUNDESAGENTUR_API_KEY";

/// Secrets read from the environment, kept separate so tests can inject them.
#[derive(Debug, Clone, Default)]
pub struct SourceSecrets {
    pub adzuna: Option<AdzunaCredentials>,
    pub bundesagentur_key: Option<String>,
}

impl SourceSecrets {
    pub fn from_env() -> Self {
        Self {
            adzuna: AdzunaCredentials::from_env(),
            bundesagentur_key: std::env::var(ENV_BUNDESAGENTUR_KEY).ok(),
        }
    }
}

pub fn build_adapters(
    cfg: &SourcesConfig,
    client: &ResilientClient,
    secrets: &SourceSecrets,
) -> Vec<RegisteredSource> {
    let mut out = Vec::new();

    if cfg.arbeitnow.enabled {
        out.push(
            RegisteredSource::new(
                Arc::new(ArbeitnowAdapter::new(client.clone())),
                cfg.arbeitnow.search_params(),
            )
            .min_expected(cfg.arbeitnow.min_expected),
        );
    }
    if cfg.remoteok.enabled {
        out.push(
            RegisteredSource::new(
                Arc::new(RemoteOkAdapter::new(client.clone())),
                cfg.remoteok.search_params(),
            )
            .min_expected(cfg.remoteok.min_expected),
        );
    }
    if cfg.jobicy.enabled {
        out.push(
            RegisteredSource::new(
                Arc::new(JobicyAdapter::new(client.clone())),
                cfg.jobicy.search_params(),
            )
            .min_expected(cfg.jobicy.min_expected),
        );
    }
    if cfg.themuse.enabled {
        out.push(
            RegisteredSource::new(
                Arc::new(TheMuseAdapter::new(client.clone())),
                cfg.themuse.search_params(),
            )
            .min_expected(cfg.themuse.min_expected),
        );
    }
    if cfg.adzuna.enabled {
        // without credentials the adapter returns nothing; don't flag that as degraded
        let min_expected = if secrets.adzuna.is_some() {
            cfg.adzuna.min_expected
        } else {
            0
        };
        out.push(
            RegisteredSource::new(
                Arc::new(AdzunaAdapter::new(client.clone(), secrets.adzuna.clone())),
                cfg.adzuna.search_params(),
            )
            .min_expected(min_expected),
        );
    }
    if cfg.bundesagentur.enabled {
        out.push(
            RegisteredSource::new(
                Arc::new(BundesagenturAdapter::new(
                    client.clone(),
                    secrets.bundesagentur_key.clone(),
                    cfg.bundesagentur.radius_km,
                )),
                cfg.bundesagentur.search_params(),
            )
            .min_expected(cfg.bundesagentur.min_expected),
        );
    }
    if cfg.weworkremotely.enabled {
        for feed in crate::ingest::config::clean_list(&cfg.weworkremotely.feeds) {
            out.push(
                RegisteredSource::new(
                    Arc::new(WeWorkRemotelyFeed::new(client.clone(), &feed)),
                    cfg.weworkremotely.search_params(),
                )
                .min_expected(cfg.weworkremotely.min_expected),
            );
        }
    }

    tracing::info!(
        target: "ingest",
        adapters = out.len(),
        sources = ?out.iter().map(|s| s.adapter.source_id().to_string()).collect::<Vec<_>>(),
        "adapters registered"
    );
    out
}
