// src/relevance.rs
//! Relevance gate: word-boundary keyword sets, experience extraction and the
//! keep/reject verdict.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::ingest::types::RawPosting;

/// Prefix marking a term as a raw regular expression.
pub const RAW_PREFIX: &str = "re:";

/// Case-insensitive term matcher anchored on non-word boundaries, so that
/// `ml` never matches inside `html` while `c++` and `.net` still work.
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    terms: Vec<(String, Regex)>,
}

fn boundary_pattern(term: &str) -> String {
    format!(r"(?i)(?:^|\W){}(?:\W|$)", regex::escape(term))
}

impl KeywordSet {
    /// Compile `terms`. Blank and duplicate (case-insensitive) terms are dropped.
    /// `list` names the config list in error messages.
    pub fn compile(list: &str, terms: &[String]) -> Result<Self, ConfigError> {
        let mut compiled: Vec<(String, Regex)> = Vec::with_capacity(terms.len());
        for raw in terms {
            let term = raw.trim();
            if term.is_empty() || compiled.iter().any(|(t, _)| t.eq_ignore_ascii_case(term)) {
                continue;
            }
            let pattern = match term.strip_prefix(RAW_PREFIX) {
                Some(re) => format!("(?i){re}"),
                None => boundary_pattern(term),
            };
            let re = Regex::new(&pattern).map_err(|e| ConfigError::BadPattern {
                list: list.to_string(),
                term: term.to_string(),
                message: e.to_string(),
            })?;
            compiled.push((term.to_string(), re));
        }
        Ok(Self { terms: compiled })
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.terms.iter().any(|(_, re)| re.is_match(text))
    }

    pub fn first_match(&self, text: &str) -> Option<&str> {
        self.terms
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(t, _)| t.as_str())
    }

    /// Distinct matching terms, in configuration order. Each term counts once
    /// however often it occurs.
    pub fn matches(&self, text: &str) -> Vec<&str> {
        self.terms
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(t, _)| t.as_str())
            .collect()
    }
}

fn experience_patterns() -> &'static [Regex] {
    static RE: OnceCell<Vec<Regex>> = OnceCell::new();
    RE.get_or_init(|| {
        let years = r"(?:years?|yrs?|jahre?n?)";
        let exp = r"(?:experience|erfahrung|berufserfahrung)";
        [
            // "5+ years of experience", "3 Jahre Berufserfahrung"
            format!(r"(?i)\b(\d{{1,2}})\s*\+?\s*{years}\s*(?:of\s+)?(?:\w+\s+)?{exp}"),
            // "experience of 5 years"
            format!(r"(?i){exp}\s*(?:of\s+)?(?:at\s+least\s+)?(\d{{1,2}})\s*\+?\s*{years}"),
            // "minimum 4 years", "at least 4 years", "mindestens 4 Jahre"
            format!(r"(?i)(?:minimum|min\.|at\s+least|mindestens|wenigstens)\s*(?:of\s+)?(\d{{1,2}})\s*\+?\s*{years}"),
            // "3-5 years", "3 to 5 years", "3 bis 5 Jahre": lower bound
            format!(r"(?i)\b(\d{{1,2}})\s*(?:-|–|to|bis)\s*\d{{1,2}}\s*\+?\s*{years}"),
            // "10+ years"
            format!(r"(?i)\b(\d{{1,2}})\s*\+\s*{years}"),
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

/// Required years of experience stated in `text`, if any. Patterns are tried
/// in order of specificity; the first hit wins.
pub fn extract_years(text: &str) -> Option<u32> {
    experience_patterns().iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Off-topic markers, matched against title + description.
    pub exclusions: Vec<String>,
    /// Roles too senior for the profile, matched against the title only.
    pub title_exclusions: Vec<String>,
    /// Postings requiring more years than this are rejected.
    pub max_years: Option<u32>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            exclusions: strings(&[
                "driver",
                "fahrer",
                "nurse",
                "pflege",
                "warehouse",
                "lager",
                "cashier",
                "kassierer",
                "call center",
                "cleaner",
                "reinigung",
                "sales representative",
                "koch",
            ]),
            title_exclusions: strings(&[
                "head of",
                "director",
                "vp",
                "vice president",
                "chief",
                "cto",
                "principal",
            ]),
            max_years: Some(9),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterVerdict {
    pub keep: bool,
    /// Set iff `keep` is false.
    pub reason: Option<String>,
    pub years_experience: Option<u32>,
}

impl FilterVerdict {
    fn keep(years: Option<u32>) -> Self {
        Self {
            keep: true,
            reason: None,
            years_experience: years,
        }
    }

    fn reject(reason: String, years: Option<u32>) -> Self {
        Self {
            keep: false,
            reason: Some(reason),
            years_experience: years,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    exclusions: KeywordSet,
    title_exclusions: KeywordSet,
    max_years: Option<u32>,
}

impl RelevanceFilter {
    pub fn new(cfg: &FilterConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            exclusions: KeywordSet::compile("filter.exclusions", &cfg.exclusions)?,
            title_exclusions: KeywordSet::compile("filter.title_exclusions", &cfg.title_exclusions)?,
            max_years: cfg.max_years,
        })
    }

    /// Build from a standalone `[filter]`-shaped TOML document.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let cfg: FilterConfig = toml::from_str(toml_str)?;
        Ok(Self::new(&cfg)?)
    }

    pub fn evaluate(&self, p: &RawPosting) -> FilterVerdict {
        let text = format!("{} {}", p.title, p.description_text);
        let years = extract_years(&text);

        if let Some(term) = self.exclusions.first_match(&text) {
            debug!(target: "relevance", title = %p.title, term, "irrelevant keyword");
            return FilterVerdict::reject(format!("Irrelevant keyword: {term}"), years);
        }
        if let Some(term) = self.title_exclusions.first_match(&p.title) {
            debug!(target: "relevance", title = %p.title, term, "too senior");
            return FilterVerdict::reject(format!("Too senior role: {term}"), years);
        }
        if let (Some(y), Some(max)) = (years, self.max_years) {
            if y > max {
                debug!(target: "relevance", title = %p.title, years = y, max, "experience above ceiling");
                return FilterVerdict::reject(
                    format!("Requires {y} years of experience (ceiling {max})"),
                    years,
                );
            }
        }
        FilterVerdict::keep(years)
    }
}
