// src/scoring/passion.rs
use serde::Deserialize;

use crate::error::ConfigError;
use crate::ingest::types::RawPosting;
use crate::relevance::KeywordSet;

use super::clamp_score;

/// Maps the effective match count onto [0, 10].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PassionCurve {
    /// `10 * (1 - e^(-x / scale))`
    Exponential { scale: f64 },
    /// `min(10, x * per_match)`
    Linear { per_match: f64 },
}

impl Default for PassionCurve {
    fn default() -> Self {
        Self::Exponential { scale: 4.0 }
    }
}

impl PassionCurve {
    pub fn apply(&self, x: f64) -> f64 {
        let x = x.max(0.0);
        let raw = match *self {
            Self::Exponential { scale } => 10.0 * (1.0 - (-x / scale).exp()),
            Self::Linear { per_match } => x * per_match,
        };
        clamp_score(raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Exponential { scale } if !(scale.is_finite() && scale > 0.0) => Err(
                ConfigError::invalid("scoring.passion.curve.scale", "must be positive"),
            ),
            Self::Linear { per_match } if !(per_match.is_finite() && per_match >= 0.0) => Err(
                ConfigError::invalid("scoring.passion.curve.per_match", "must be non-negative"),
            ),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PassionConfig {
    /// Industry/domain terms (energy, climate, ...).
    pub domain_keywords: Vec<String>,
    /// Craft terms (python, machine learning, ...).
    pub skill_keywords: Vec<String>,
    pub domain_weight: f64,
    pub skill_weight: f64,
    /// Applied when the description is too short to be informative.
    pub title_only_multiplier: f64,
    /// Descriptions of at most this many characters count as short.
    pub min_description_chars: usize,
    pub curve: PassionCurve,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for PassionConfig {
    fn default() -> Self {
        Self {
            domain_keywords: strings(&[
                "energy",
                "energie",
                "renewable",
                "solar",
                "wind",
                "battery",
                "smart grid",
                "grid",
                "climate",
                "sustainability",
                "photovoltaic",
                "utility",
            ]),
            skill_keywords: strings(&[
                "machine learning",
                "ml",
                "ai",
                "deep learning",
                "data science",
                "forecasting",
                "time series",
                "python",
                "pytorch",
                "tensorflow",
                "sql",
                "optimization",
            ]),
            domain_weight: 2.0,
            skill_weight: 1.0,
            title_only_multiplier: 2.0,
            min_description_chars: 50,
            curve: PassionCurve::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PassionScorer {
    domain: KeywordSet,
    skill: KeywordSet,
    domain_weight: f64,
    skill_weight: f64,
    title_only_multiplier: f64,
    min_description_chars: usize,
    curve: PassionCurve,
}

impl PassionScorer {
    pub fn new(cfg: &PassionConfig) -> Result<Self, ConfigError> {
        for (field, v) in [
            ("scoring.passion.domain_weight", cfg.domain_weight),
            ("scoring.passion.skill_weight", cfg.skill_weight),
            ("scoring.passion.title_only_multiplier", cfg.title_only_multiplier),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::invalid(field, "must be non-negative"));
            }
        }
        cfg.curve.validate()?;
        Ok(Self {
            domain: KeywordSet::compile("scoring.passion.domain_keywords", &cfg.domain_keywords)?,
            skill: KeywordSet::compile("scoring.passion.skill_keywords", &cfg.skill_keywords)?,
            domain_weight: cfg.domain_weight,
            skill_weight: cfg.skill_weight,
            title_only_multiplier: cfg.title_only_multiplier,
            min_description_chars: cfg.min_description_chars,
            curve: cfg.curve,
        })
    }

    /// Score plus the distinct terms that matched (domain first).
    pub fn score(&self, p: &RawPosting) -> (f64, Vec<String>) {
        let short = p.description_text.trim().chars().count() <= self.min_description_chars;
        let text = format!("{} {} {}", p.title, p.description_text, p.tags.join(" "));

        let domain = self.domain.matches(&text);
        let skill = self.skill.matches(&text);
        let mut effective =
            domain.len() as f64 * self.domain_weight + skill.len() as f64 * self.skill_weight;
        if short {
            effective *= self.title_only_multiplier;
        }

        let mut matched: Vec<String> = Vec::with_capacity(domain.len() + skill.len());
        for term in domain.into_iter().chain(skill) {
            if !matched.iter().any(|m| m.eq_ignore_ascii_case(term)) {
                matched.push(term.to_string());
            }
        }
        (self.curve.apply(effective), matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(title: &str, description: &str) -> RawPosting {
        RawPosting {
            source_id: "t".into(),
            external_id: None,
            title: title.into(),
            company: "c".into(),
            location_text: "Berlin".into(),
            description_text: description.into(),
            salary_text: None,
            posted_at: None,
            url: "https://x".into(),
            tags: vec![],
        }
    }

    #[test]
    fn curve_is_monotone_and_saturates() {
        for curve in [
            PassionCurve::Exponential { scale: 4.0 },
            PassionCurve::Linear { per_match: 1.5 },
        ] {
            let mut prev = curve.apply(0.0);
            assert_eq!(prev, 0.0);
            for i in 1..200 {
                let v = curve.apply(i as f64 * 0.5);
                assert!(v >= prev, "{curve:?} decreased at {i}");
                assert!(v <= 10.0);
                prev = v;
            }
            assert!((prev - 10.0).abs() < 1e-6);
        }
    }

    #[test]
    fn short_descriptions_use_the_multiplier() {
        let cfg = PassionConfig {
            curve: PassionCurve::Linear { per_match: 1.0 },
            ..PassionConfig::default()
        };
        let s = PassionScorer::new(&cfg).unwrap();
        let (short, _) = s.score(&posting("Python Developer", "tbd"));
        let long_desc = "We build internal tooling for finance teams and need someone careful.";
        let (long, _) = s.score(&posting("Python Developer", long_desc));
        assert_eq!(short, 2.0);
        assert_eq!(long, 1.0);
    }

    #[test]
    fn description_at_the_threshold_counts_as_short() {
        let cfg = PassionConfig {
            curve: PassionCurve::Linear { per_match: 1.0 },
            ..PassionConfig::default()
        };
        let s = PassionScorer::new(&cfg).unwrap();
        let (at, _) = s.score(&posting("Python Developer", &"x".repeat(50)));
        let (over, _) = s.score(&posting("Python Developer", &"x".repeat(51)));
        assert_eq!(at, 2.0);
        assert_eq!(over, 1.0);
    }

    #[test]
    fn reports_distinct_matches() {
        let s = PassionScorer::new(&PassionConfig::default()).unwrap();
        let (_, matched) = s.score(&posting(
            "ML Engineer, Solar",
            "Solar forecasting with Python and more Python and ML",
        ));
        assert_eq!(matched, vec!["solar", "ml", "forecasting", "python"]);
    }

    #[test]
    fn invalid_curve_is_a_config_error() {
        let cfg = PassionConfig {
            curve: PassionCurve::Exponential { scale: 0.0 },
            ..PassionConfig::default()
        };
        assert!(PassionScorer::new(&cfg).is_err());
    }
}
