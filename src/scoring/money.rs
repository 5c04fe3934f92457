// src/scoring/money.rs
//! Money component: salary text -> annual amount in the base currency ->
//! threshold band, then seniority and experience adjustments.

use std::collections::BTreeMap;

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::relevance::KeywordSet;

use super::{check_range, clamp_score};

const HOURS_PER_YEAR: f64 = 2080.0;

#[derive(Debug, Clone, Deserialize)]
pub struct SalaryBand {
    pub min_amount: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeniorityRule {
    pub keywords: Vec<String>,
    /// Signed adjustment; direction is a preference, not a rule.
    pub delta: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MoneyConfig {
    /// Score when there is no parseable salary.
    pub neutral: f64,
    pub base_currency: String,
    /// Multiplier converting one unit of the key currency into the base currency.
    pub currency_rates: BTreeMap<String, f64>,
    pub bands: Vec<SalaryBand>,
    pub below_bands: f64,
    pub seniority: Vec<SeniorityRule>,
    pub penalty_above_years: Option<u32>,
    pub penalty_points: f64,
}

impl Default for MoneyConfig {
    fn default() -> Self {
        let band = |min_amount: f64, score: f64| SalaryBand { min_amount, score };
        let rule = |kw: &[&str], delta: f64| SeniorityRule {
            keywords: kw.iter().map(|s| s.to_string()).collect(),
            delta,
        };
        Self {
            neutral: 5.0,
            base_currency: "EUR".to_string(),
            currency_rates: [("USD", 0.92), ("GBP", 1.17), ("CHF", 1.04), ("CAD", 0.68), ("AUD", 0.61)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            bands: vec![
                band(80_000.0, 10.0),
                band(65_000.0, 8.0),
                band(50_000.0, 6.0),
                band(40_000.0, 4.0),
            ],
            below_bands: 2.0,
            seniority: vec![
                rule(&["senior", "lead", "staff", "sr."], -2.0),
                rule(&["junior", "entry level", "graduate", "werkstudent", "trainee"], 1.5),
            ],
            penalty_above_years: Some(5),
            penalty_points: 2.0,
        }
    }
}

/// Annualized lower bound found in a salary string.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSalary {
    pub amount: f64,
    /// ISO code if a symbol or code was present.
    pub currency: Option<String>,
}

fn amount_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d{1,3}(?:[.,' ]\d{3})+|\d+(?:[.,]\d{1,2})?)\s*(k\b)?").unwrap()
    })
}

fn monthly_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(per\s+month|/\s*mo\b|/\s*month|monthly|monatlich|pro\s+monat|\bp\.?\s?m\.?(?:\s|$))").unwrap()
    })
}

fn hourly_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(per\s+hour|/\s*h(?:ou)?r\b|/\s*h\b|hourly|stündlich|pro\s+stunde)").unwrap()
    })
}

fn currency_code_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    // letters must not continue the code ("Europe", "Broadcast"); digits may ("EUR60k")
    RE.get_or_init(|| Regex::new(r"(?i)(?:^|[^a-z])(eur|gbp|chf|cad|aud|usd)(?:[^a-z]|$)").unwrap())
}

fn detect_currency(text: &str) -> Option<String> {
    let codes: Vec<String> = currency_code_re()
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
        .collect();
    let has = |code: &str| codes.iter().any(|c| c == code);
    let code = if text.contains('€') || has("EUR") {
        "EUR"
    } else if text.contains('£') || has("GBP") {
        "GBP"
    } else if has("CHF") {
        "CHF"
    } else if has("CAD") {
        "CAD"
    } else if has("AUD") {
        "AUD"
    } else if text.contains('$') || has("USD") {
        "USD"
    } else {
        return None;
    };
    Some(code.to_string())
}

/// Parse the first amount in `text`. Ranges resolve to their lower bound;
/// monthly figures are ×12 and hourly ×2080. Bare numbers below 1000 without
/// a `k` suffix or a period marker are not treated as salaries.
pub fn parse_salary(text: &str) -> Option<ParsedSalary> {
    let caps = amount_re().captures(text)?;
    let digits = caps.get(1)?.as_str();
    let has_k = caps.get(2).is_some();

    let grouped = digits.len() > 4
        && digits
            .chars()
            .rev()
            .nth(3)
            .is_some_and(|c| matches!(c, '.' | ',' | '\'' | ' '));
    let mut amount: f64 = if grouped {
        digits
            .chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .ok()?
    } else {
        digits.replace(',', ".").parse().ok()?
    };
    if has_k {
        amount *= 1000.0;
    }

    let monthly = monthly_re().is_match(text);
    let hourly = !monthly && hourly_re().is_match(text);
    if monthly {
        amount *= 12.0;
    } else if hourly {
        amount *= HOURS_PER_YEAR;
    } else if amount < 1000.0 {
        return None;
    }
    if amount <= 0.0 || !amount.is_finite() {
        return None;
    }
    Some(ParsedSalary {
        amount,
        currency: detect_currency(text),
    })
}

#[derive(Debug, Clone)]
pub struct MoneyScorer {
    neutral: f64,
    base_currency: String,
    rates: BTreeMap<String, f64>,
    bands: Vec<SalaryBand>,
    below_bands: f64,
    seniority: Vec<(KeywordSet, f64)>,
    penalty_above_years: Option<u32>,
    penalty_points: f64,
}

impl MoneyScorer {
    pub fn new(cfg: &MoneyConfig) -> Result<Self, ConfigError> {
        check_range("scoring.money.neutral", cfg.neutral)?;
        check_range("scoring.money.below_bands", cfg.below_bands)?;
        for b in &cfg.bands {
            check_range("scoring.money.bands.score", b.score)?;
            if !b.min_amount.is_finite() || b.min_amount < 0.0 {
                return Err(ConfigError::invalid(
                    "scoring.money.bands.min_amount",
                    "must be a non-negative number",
                ));
            }
        }
        for (code, rate) in &cfg.currency_rates {
            if !rate.is_finite() || *rate <= 0.0 {
                return Err(ConfigError::invalid(
                    format!("scoring.money.currency_rates.{code}"),
                    "must be positive",
                ));
            }
        }
        if !cfg.penalty_points.is_finite() || cfg.penalty_points < 0.0 {
            return Err(ConfigError::invalid(
                "scoring.money.penalty_points",
                "must be non-negative",
            ));
        }
        let mut bands = cfg.bands.clone();
        bands.sort_by(|a, b| b.min_amount.total_cmp(&a.min_amount));

        let seniority = cfg
            .seniority
            .iter()
            .map(|r| {
                if !r.delta.is_finite() {
                    return Err(ConfigError::invalid("scoring.money.seniority.delta", "must be finite"));
                }
                Ok((KeywordSet::compile("scoring.money.seniority", &r.keywords)?, r.delta))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            neutral: cfg.neutral,
            base_currency: cfg.base_currency.trim().to_ascii_uppercase(),
            rates: cfg
                .currency_rates
                .iter()
                .map(|(k, v)| (k.trim().to_ascii_uppercase(), *v))
                .collect(),
            bands,
            below_bands: cfg.below_bands,
            seniority,
            penalty_above_years: cfg.penalty_above_years,
            penalty_points: cfg.penalty_points,
        })
    }

    /// Convert to the base currency. Unknown currencies pass through unchanged.
    pub fn to_base(&self, s: &ParsedSalary) -> f64 {
        match s.currency.as_deref() {
            None => s.amount,
            Some(c) if c == self.base_currency => s.amount,
            Some(c) => s.amount * self.rates.get(c).copied().unwrap_or(1.0),
        }
    }

    fn band_score(&self, amount: f64) -> f64 {
        self.bands
            .iter()
            .find(|b| amount >= b.min_amount)
            .map_or(self.below_bands, |b| b.score)
    }

    pub fn score(&self, title: &str, salary_text: Option<&str>, years: Option<u32>) -> f64 {
        let mut score = match salary_text.and_then(parse_salary) {
            Some(parsed) => self.band_score(self.to_base(&parsed)),
            None => self.neutral,
        };
        if let Some((_, delta)) = self.seniority.iter().find(|(ks, _)| ks.is_match(title)) {
            score += delta;
        }
        if let (Some(y), Some(limit)) = (years, self.penalty_above_years) {
            if y > limit {
                score -= self.penalty_points;
            }
        }
        clamp_score(score)
    }
}
