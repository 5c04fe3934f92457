// tests/harness_isolation.rs
//
// One adapter's failure, panic or overrun never affects the others, and each
// adapter is collected at most once per run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use job_digest::fetch::{FailureKind, FetchError};
use job_digest::ingest::harness::{Harness, RegisteredSource, SourceStatus, ABANDONED};
use job_digest::ingest::types::{RawPosting, SearchParams, SourceAdapter, SourceError};

fn posting(source: &str, n: usize) -> RawPosting {
    RawPosting {
        source_id: source.into(),
        external_id: Some(n.to_string()),
        title: format!("Data Engineer {n}"),
        company: "Acme".into(),
        location_text: "Berlin".into(),
        description_text: String::new(),
        salary_text: None,
        posted_at: None,
        url: format!("https://{source}.test/{n}"),
        tags: vec![],
    }
}

enum Behaviour {
    Returns(usize),
    Fails,
    Panics,
    Sleeps(Duration),
}

struct ScriptedAdapter {
    id: &'static str,
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl ScriptedAdapter {
    fn new(id: &'static str, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            id,
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn source_id(&self) -> &str {
        self.id
    }

    async fn collect(&self, _params: &SearchParams) -> Result<Vec<RawPosting>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::Returns(n) => Ok((0..*n).map(|i| posting(self.id, i)).collect()),
            Behaviour::Fails => Err(SourceError::Fetch(FetchError {
                kind: FailureKind::AuthBlocked,
                source_id: self.id.into(),
                url: "https://blocked.test".into(),
                attempts: 1,
                status: Some(403),
                detail: "HTTP 403".into(),
            })),
            Behaviour::Panics => panic!("adapter blew up"),
            Behaviour::Sleeps(d) => {
                tokio::time::sleep(*d).await;
                Ok(vec![posting(self.id, 0)])
            }
        }
    }
}

fn register(a: &Arc<ScriptedAdapter>) -> RegisteredSource {
    RegisteredSource::new(a.clone(), SearchParams::default())
}

#[tokio::test]
async fn one_failing_adapter_leaves_the_others_untouched() {
    let a = ScriptedAdapter::new("a", Behaviour::Returns(3));
    let b = ScriptedAdapter::new("b", Behaviour::Fails);
    let c = ScriptedAdapter::new("c", Behaviour::Returns(2));

    let results = Harness::new()
        .run(&[register(&a), register(&b), register(&c)])
        .await;

    assert_eq!(results.len(), 3);
    let ids: Vec<&str> = results.iter().map(|r| r.source_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    assert_eq!(results[0].status, SourceStatus::Ok);
    assert_eq!(results[0].postings.len(), 3);
    assert_eq!(results[1].status, SourceStatus::Failed);
    assert!(results[1].postings.is_empty());
    assert!(results[1].error.as_deref().unwrap().contains("auth_blocked"));
    assert_eq!(results[2].status, SourceStatus::Ok);
    assert_eq!(results[2].postings.len(), 2);

    for adapter in [&a, &b, &c] {
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1, "collect called once");
    }
}

#[tokio::test]
async fn panic_becomes_failed_result() {
    let a = ScriptedAdapter::new("a", Behaviour::Panics);
    let b = ScriptedAdapter::new("b", Behaviour::Returns(1));

    let results = Harness::new().run(&[register(&a), register(&b)]).await;

    assert_eq!(results[0].status, SourceStatus::Failed);
    assert_eq!(
        results[0].error.as_deref(),
        Some("adapter panicked: adapter blew up"),
        "panic payload is kept in the reason"
    );
    assert_eq!(results[1].status, SourceStatus::Ok);
}

#[tokio::test]
async fn too_few_postings_is_degraded_but_kept() {
    let a = ScriptedAdapter::new("a", Behaviour::Returns(2));
    let results = Harness::new()
        .run(&[register(&a).min_expected(5)])
        .await;

    assert_eq!(results[0].status, SourceStatus::Degraded);
    assert_eq!(results[0].postings.len(), 2, "postings still flow");
    assert!(results[0].error.is_some());
}

#[tokio::test]
async fn deadline_abandons_only_the_slow_adapter() {
    let fast = ScriptedAdapter::new("fast", Behaviour::Returns(4));
    let slow = ScriptedAdapter::new("slow", Behaviour::Sleeps(Duration::from_secs(30)));

    let started = std::time::Instant::now();
    let results = Harness::new()
        .with_deadline(Duration::from_millis(150))
        .run(&[register(&slow), register(&fast)])
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(results[0].source_id, "slow");
    assert_eq!(results[0].status, SourceStatus::Failed);
    assert_eq!(results[0].error.as_deref(), Some(ABANDONED));
    assert!(results[0].postings.is_empty());
    assert_eq!(results[1].status, SourceStatus::Ok);
    assert_eq!(results[1].postings.len(), 4);
}

#[tokio::test]
async fn invalid_postings_are_dropped() {
    struct Sloppy;

    #[async_trait]
    impl SourceAdapter for Sloppy {
        fn source_id(&self) -> &str {
            "sloppy"
        }

        async fn collect(&self, _: &SearchParams) -> Result<Vec<RawPosting>, SourceError> {
            let mut no_url = posting("sloppy", 1);
            no_url.url.clear();
            let mut no_title = posting("sloppy", 2);
            no_title.title = "   ".into();
            Ok(vec![posting("sloppy", 0), no_url, no_title])
        }
    }

    let results = Harness::new()
        .run(&[RegisteredSource::new(Arc::new(Sloppy), SearchParams::default())])
        .await;
    assert_eq!(results[0].postings.len(), 1);
}
