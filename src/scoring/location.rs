// src/scoring/location.rs
use serde::Deserialize;

use crate::error::ConfigError;
use crate::relevance::KeywordSet;

use super::check_range;

#[derive(Debug, Clone, Deserialize)]
pub struct LocationTier {
    pub name: String,
    pub score: f64,
    pub patterns: Vec<String>,
}

/// Tiers are checked in order; the first matching tier wins.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub tiers: Vec<LocationTier>,
    pub default_score: f64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        let tier = |name: &str, score: f64, patterns: &[&str]| LocationTier {
            name: name.to_string(),
            score,
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
        };
        Self {
            tiers: vec![
                tier(
                    "bavaria",
                    10.0,
                    &[
                        "münchen", "munich", "nürnberg", "nuremberg", "augsburg", "regensburg",
                        "ingolstadt", "würzburg", "erlangen", "bavaria", "bayern",
                    ],
                ),
                tier(
                    "preferred_germany",
                    8.0,
                    &["berlin", "hamburg", "frankfurt", "köln", "cologne", "stuttgart", "karlsruhe"],
                ),
                // before plain germany so "Germany (Remote)" counts as remote
                tier(
                    "remote",
                    7.0,
                    &["remote", "worldwide", "anywhere", "home office", "homeoffice"],
                ),
                tier("germany", 6.0, &["germany", "deutschland"]),
                tier(
                    "europe",
                    4.0,
                    &["europe", "eu", "emea", "austria", "österreich", "switzerland", "netherlands"],
                ),
            ],
            default_score: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocationScorer {
    tiers: Vec<(String, f64, KeywordSet)>,
    default_score: f64,
}

impl LocationScorer {
    pub fn new(cfg: &LocationConfig) -> Result<Self, ConfigError> {
        check_range("scoring.location.default_score", cfg.default_score)?;
        let tiers = cfg
            .tiers
            .iter()
            .map(|t| {
                check_range(&format!("scoring.location.tiers.{}.score", t.name), t.score)?;
                let ks = KeywordSet::compile(&format!("scoring.location.tiers.{}", t.name), &t.patterns)?;
                Ok((t.name.clone(), t.score, ks))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self {
            tiers,
            default_score: cfg.default_score,
        })
    }

    /// Score and the name of the tier that matched.
    pub fn score(&self, location: &str) -> (f64, Option<&str>) {
        self.tiers
            .iter()
            .find(|(_, _, ks)| ks.is_match(location))
            .map_or((self.default_score, None), |(name, score, _)| {
                (*score, Some(name.as_str()))
            })
    }
}
