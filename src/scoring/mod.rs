// src/scoring/mod.rs
//! Preference scoring: three components in [0, 10] and a weighted total.
//!
//! total = w_money * money + w_passion * passion + w_location * location
//! with weights rescaled to sum to 1.0 and the result rounded to one decimal.

pub mod location;
pub mod money;
pub mod passion;
pub mod weights;

pub use location::{LocationConfig, LocationScorer, LocationTier};
pub use money::{parse_salary, MoneyConfig, MoneyScorer, ParsedSalary};
pub use passion::{PassionConfig, PassionCurve, PassionScorer};
pub use weights::{load_weights_file, NormalizedWeights, Weights};

use serde::{Deserialize, Serialize};

use crate::dedup::Fingerprint;
use crate::error::ConfigError;
use crate::ingest::types::RawPosting;
use crate::relevance::FilterVerdict;

pub const MAX_SCORE: f64 = 10.0;

pub(crate) fn clamp_score(x: f64) -> f64 {
    if x.is_nan() {
        return 0.0;
    }
    x.clamp(0.0, MAX_SCORE)
}

pub(crate) fn check_range(field: &str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && (0.0..=MAX_SCORE).contains(&v) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "must be within 0..=10"))
    }
}

pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: Weights,
    pub money: MoneyConfig,
    pub passion: PassionConfig,
    pub location: LocationConfig,
}

/// The three components, enough to recompute a total under any weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub money: f64,
    pub passion: f64,
    pub location: f64,
}

impl ScoreCard {
    pub fn total(&self, w: &NormalizedWeights) -> f64 {
        round1(clamp_score(
            w.money() * self.money + w.passion() * self.passion + w.location() * self.location,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPosting {
    pub fingerprint: Fingerprint,
    pub posting: RawPosting,
    pub money_score: f64,
    pub passion_score: f64,
    pub location_score: f64,
    pub total_score: f64,
    pub filtered_out: bool,
    pub filter_reason: Option<String>,
    pub years_experience: Option<u32>,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
}

impl ScoredPosting {
    pub fn card(&self) -> ScoreCard {
        ScoreCard {
            money: self.money_score,
            passion: self.passion_score,
            location: self.location_score,
        }
    }

    /// Recompute the total from the stored components.
    pub fn retotal(&mut self, w: &NormalizedWeights) {
        self.total_score = self.card().total(w);
    }
}

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    weights: NormalizedWeights,
    money: MoneyScorer,
    passion: PassionScorer,
    location: LocationScorer,
}

impl ScoringEngine {
    pub fn new(cfg: &ScoringConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            weights: cfg.weights.normalized()?,
            money: MoneyScorer::new(&cfg.money)?,
            passion: PassionScorer::new(&cfg.passion)?,
            location: LocationScorer::new(&cfg.location)?,
        })
    }

    pub fn weights(&self) -> &NormalizedWeights {
        &self.weights
    }

    pub fn set_weights(&mut self, w: &Weights) -> Result<(), ConfigError> {
        self.weights = w.normalized()?;
        Ok(())
    }

    pub fn card(&self, p: &RawPosting, years: Option<u32>) -> (ScoreCard, Vec<String>) {
        let money = self.money.score(&p.title, p.salary_text.as_deref(), years);
        let (passion, matched) = self.passion.score(p);
        let (location, _) = self.location.score(&p.location_text);
        (
            ScoreCard {
                money,
                passion,
                location,
            },
            matched,
        )
    }

    /// Score one posting. Filtered postings are scored too; the verdict is
    /// carried along so that they stay out of the digest.
    pub fn score(&self, fingerprint: Fingerprint, posting: RawPosting, verdict: &FilterVerdict) -> ScoredPosting {
        let (card, matched) = self.card(&posting, verdict.years_experience);
        ScoredPosting {
            fingerprint,
            money_score: card.money,
            passion_score: card.passion,
            location_score: card.location,
            total_score: card.total(&self.weights),
            filtered_out: !verdict.keep,
            filter_reason: if verdict.keep { None } else { verdict.reason.clone() },
            years_experience: verdict.years_experience,
            matched_keywords: matched,
            posting,
        }
    }
}
