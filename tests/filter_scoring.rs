// tests/filter_scoring.rs
//
// Relevance filter and scoring engine driven together, configured from
// inline TOML the way config/digest.toml does it.

use job_digest::dedup::Fingerprint;
use job_digest::ingest::types::RawPosting;
use job_digest::relevance::{extract_years, FilterConfig, KeywordSet, RelevanceFilter};
use job_digest::scoring::{
    PassionConfig, PassionCurve, PassionScorer, ScoringConfig, ScoringEngine, Weights,
};

fn posting(title: &str, description: &str) -> RawPosting {
    RawPosting {
        source_id: "arbeitnow".into(),
        external_id: Some("x1".into()),
        title: title.into(),
        company: "Acme".into(),
        location_text: "Berlin".into(),
        description_text: description.into(),
        salary_text: None,
        posted_at: None,
        url: "https://arbeitnow.test/x1".into(),
        tags: vec![],
    }
}

#[test]
fn experience_above_ceiling_is_filtered_with_both_figures() {
    let filter = RelevanceFilter::from_toml_str(
        r#"
exclusions = ["driver"]
title_exclusions = []
max_years = 5
"#,
    )
    .unwrap();

    let p = posting("Frontend dev (HTML)", "we use html and require 10+ years");
    let verdict = filter.evaluate(&p);

    assert!(!verdict.keep);
    let reason = verdict.reason.unwrap();
    assert!(reason.contains("10"), "{reason}");
    assert!(reason.contains('5'), "{reason}");
    assert_eq!(verdict.years_experience, Some(10));

    // filtered postings are still scored, but carry the verdict
    let engine = ScoringEngine::new(&ScoringConfig::default()).unwrap();
    let scored = engine.score(Fingerprint::of(&p), p.clone(), &filter.evaluate(&p));
    assert!(scored.filtered_out);
    assert!(scored.filter_reason.is_some());
}

#[test]
fn no_experience_figure_means_no_rejection() {
    let filter = RelevanceFilter::new(&FilterConfig {
        max_years: Some(5),
        ..FilterConfig::default()
    })
    .unwrap();
    let verdict = filter.evaluate(&posting("Data Analyst", "solid experience with SQL required"));
    assert!(verdict.keep);
    assert_eq!(verdict.reason, None);
    assert_eq!(verdict.years_experience, None);
}

#[test]
fn ml_does_not_match_inside_html_and_html_counts_once() {
    let cfg = PassionConfig {
        domain_keywords: vec![],
        skill_keywords: vec!["ml".into(), "html".into()],
        curve: PassionCurve::Linear { per_match: 1.0 },
        title_only_multiplier: 1.0,
        ..PassionConfig::default()
    };
    let scorer = PassionScorer::new(&cfg).unwrap();

    let p = posting(
        "Frontend dev (HTML)",
        "we use html daily; HTML5 certificate and html certification preferred",
    );
    let (score, matched) = scorer.score(&p);
    assert_eq!(matched, vec!["html"]);
    assert_eq!(score, 1.0);
}

#[test]
fn word_boundaries_for_exclusions() {
    let set = KeywordSet::compile("t", &["driver".into(), "c++".into()]).unwrap();
    assert!(set.is_match("Truck Driver (m/w/d)"));
    assert!(!set.is_match("Screwdriver assembly robotics"));
    assert!(!set.is_match("drivers license optional"));
    assert!(set.is_match("Modern C++ engineer"));
}

#[test]
fn experience_phrasings() {
    assert_eq!(extract_years("at least 3 years of experience"), Some(3));
    assert_eq!(extract_years("3-5 years in a similar role"), Some(3));
    assert_eq!(extract_years("7+ yrs in data"), Some(7));
    assert_eq!(extract_years("we were founded 12 years ago"), None);
}

#[test]
fn total_follows_weights() {
    let engine_money_only = {
        let mut cfg = ScoringConfig::default();
        cfg.weights = Weights::new(1.0, 0.0, 0.0);
        ScoringEngine::new(&cfg).unwrap()
    };
    let engine_location_only = {
        let mut cfg = ScoringConfig::default();
        cfg.weights = Weights::new(0.0, 0.0, 5.0);
        ScoringEngine::new(&cfg).unwrap()
    };

    let mut p = posting("Data Scientist", "Forecasting for renewable energy with Python.");
    p.location_text = "München".into();
    p.salary_text = Some("€70.000 - €80.000".into());
    let keep = RelevanceFilter::new(&FilterConfig::default())
        .unwrap()
        .evaluate(&p);

    let a = engine_money_only.score(Fingerprint::of(&p), p.clone(), &keep);
    let b = engine_location_only.score(Fingerprint::of(&p), p.clone(), &keep);
    assert_eq!(a.total_score, a.money_score);
    assert_eq!(b.total_score, 10.0);
    assert!(a.passion_score > 0.0);
    assert!(a.matched_keywords.contains(&"renewable".to_string()));
}
