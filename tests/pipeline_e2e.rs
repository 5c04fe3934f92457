// tests/pipeline_e2e.rs
//
// Whole runs over in-process adapters, an in-memory store and a recording
// notifier: what reaches the notifier, what gets marked sent, and what the
// next run sees.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use job_digest::dedup::Fingerprint;
use job_digest::ingest::harness::{RegisteredSource, SourceStatus};
use job_digest::ingest::types::{RawPosting, SearchParams, SourceAdapter, SourceError};
use job_digest::notify::{DeliveryReport, Notifier, NotifyError};
use job_digest::store::{JobStore, MemoryStore, StoredJob};
use job_digest::{AppConfig, Pipeline};

fn posting(source: &str, id: &str, title: &str, location: &str, description: &str) -> RawPosting {
    RawPosting {
        source_id: source.into(),
        external_id: Some(id.into()),
        title: title.into(),
        company: "Stadtwerke".into(),
        location_text: location.into(),
        description_text: description.into(),
        salary_text: None,
        posted_at: None,
        url: format!("https://{source}.test/{id}"),
        tags: vec![],
    }
}

struct Fixed(Vec<RawPosting>);

#[async_trait]
impl SourceAdapter for Fixed {
    fn source_id(&self) -> &str {
        "board"
    }

    async fn collect(&self, _: &SearchParams) -> Result<Vec<RawPosting>, SourceError> {
        Ok(self.0.clone())
    }
}

struct Broken;

#[async_trait]
impl SourceAdapter for Broken {
    fn source_id(&self) -> &str {
        "broken"
    }

    async fn collect(&self, _: &SearchParams) -> Result<Vec<RawPosting>, SourceError> {
        Err(SourceError::parse("broken", "unexpected payload"))
    }
}

fn sources() -> Vec<RegisteredSource> {
    let board = Fixed(vec![
        posting(
            "board",
            "1",
            "Data Scientist",
            "München",
            "Forecasting for renewable energy with Python and machine learning.",
        ),
        posting("board", "2", "ML Engineer", "Remote", "PyTorch models for grid operators."),
        posting("board", "3", "Warehouse Operative", "Berlin", "Forklift licence."),
        posting("board", "4", "Data Analyst", "Hamburg", "SQL dashboards."),
    ]);
    vec![
        RegisteredSource::new(Arc::new(board), SearchParams::default()),
        RegisteredSource::new(Arc::new(Broken), SearchParams::default()),
    ]
}

struct Call {
    digest: Vec<String>,
    problems: Vec<String>,
}

/// Acknowledges up to `ack_limit` postings per call, or rejects everything.
#[derive(Default)]
struct RecordingNotifier {
    ack_limit: Option<usize>,
    reject: bool,
    calls: Mutex<Vec<Call>>,
}

impl RecordingNotifier {
    fn calls(&self) -> std::sync::MutexGuard<'_, Vec<Call>> {
        self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(
        &self,
        digest: &[StoredJob],
        problems: &[String],
        on_sent: &mut (dyn for<'f> FnMut(&'f Fingerprint) + Send),
    ) -> Result<DeliveryReport, NotifyError> {
        self.calls.lock().unwrap().push(Call {
            digest: digest.iter().map(|j| j.fingerprint().to_string()).collect(),
            problems: problems.to_vec(),
        });
        if self.reject {
            return Err(NotifyError::Rejected("chat not found".into()));
        }
        let n = self.ack_limit.unwrap_or(digest.len()).min(digest.len());
        for j in &digest[..n] {
            on_sent(j.fingerprint());
        }
        Ok(DeliveryReport {
            chunks_sent: 1,
            chunks_failed: 0,
            delivered: n,
        })
    }
}

fn pipeline(digest_size: usize) -> Pipeline {
    let cfg = AppConfig::from_toml_str(&format!("[run]\ndigest_size = {digest_size}\n")).unwrap();
    Pipeline::new(cfg).unwrap()
}

#[tokio::test]
async fn first_run_delivers_top_n_and_reports_the_broken_source() {
    let p = pipeline(2);
    let mut store = MemoryStore::new();
    let notifier = RecordingNotifier::default();

    let summary = p
        .run_once(&sources(), &mut store, Some(&notifier))
        .await
        .unwrap();

    assert_eq!(summary.source("board").unwrap().status, SourceStatus::Ok);
    assert_eq!(summary.source("broken").unwrap().status, SourceStatus::Failed);
    assert_eq!(summary.counts.fetched, 4);
    assert_eq!(summary.counts.new_postings, 4);
    assert_eq!(summary.counts.filtered, 1);
    assert_eq!(summary.digest.len(), 2);
    assert_eq!(summary.delivered, 2);

    let calls = notifier.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].digest.len(), 2);
    assert!(calls[0].problems.iter().any(|l| l.starts_with("broken: failed")));

    let sent: Vec<StoredJob> = store.all().into_iter().filter(StoredJob::is_sent).collect();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|j| !j.scored.filtered_out));
}

#[tokio::test]
async fn second_run_only_offers_what_was_not_sent() {
    let p = pipeline(2);
    let mut store = MemoryStore::new();
    let notifier = RecordingNotifier::default();

    p.run_once(&sources(), &mut store, Some(&notifier)).await.unwrap();
    let again = p
        .run_once(&sources(), &mut store, Some(&notifier))
        .await
        .unwrap();

    assert_eq!(again.counts.new_postings, 0);
    assert_eq!(again.counts.duplicates, 4);
    assert_eq!(again.digest.len(), 1, "one relevant posting left");

    let calls = notifier.calls();
    let first: Vec<&String> = calls[0].digest.iter().collect();
    assert!(calls[1].digest.iter().all(|fp| !first.contains(&fp)));
    assert_eq!(store.all().iter().filter(|j| j.is_sent()).count(), 3);
}

#[tokio::test]
async fn dry_run_marks_nothing() {
    let p = pipeline(5);
    let mut store = MemoryStore::new();

    let summary = p.run_once(&sources(), &mut store, None).await.unwrap();

    assert_eq!(summary.digest.len(), 3);
    assert_eq!(summary.delivered, 0);
    assert!(store.all().iter().all(|j| !j.is_sent()));
    assert_eq!(p.preview(&store).len(), 3);
}

#[tokio::test]
async fn unacknowledged_postings_stay_eligible() {
    let p = pipeline(3);
    let mut store = MemoryStore::new();
    let partial = RecordingNotifier {
        ack_limit: Some(1),
        ..RecordingNotifier::default()
    };

    let summary = p
        .run_once(&sources(), &mut store, Some(&partial))
        .await
        .unwrap();
    assert_eq!(summary.digest.len(), 3);
    assert_eq!(summary.delivered, 1);

    let left: Vec<Fingerprint> = p
        .preview(&store)
        .iter()
        .map(|j| j.fingerprint().clone())
        .collect();
    assert_eq!(left, summary.digest[1..].to_vec());
}

#[tokio::test]
async fn delivery_failure_is_a_problem_not_an_error() {
    let p = pipeline(2);
    let mut store = MemoryStore::new();
    let failing = RecordingNotifier {
        reject: true,
        ..RecordingNotifier::default()
    };

    let summary = p
        .run_once(&sources(), &mut store, Some(&failing))
        .await
        .unwrap();

    assert_eq!(summary.delivered, 0);
    assert!(summary
        .problems
        .iter()
        .any(|l| l.starts_with("recording: delivery failed")));
    assert!(store.all().iter().all(|j| !j.is_sent()));
}

#[tokio::test]
async fn recompute_then_rescore_keep_sent_state() {
    let p = pipeline(1);
    let mut store = MemoryStore::new();
    let notifier = RecordingNotifier::default();
    let summary = p
        .run_once(&sources(), &mut store, Some(&notifier))
        .await
        .unwrap();
    let sent = summary.digest[0].clone();

    job_digest::pipeline::recompute_scores(&mut store, &job_digest::Weights::new(0.0, 0.0, 1.0))
        .unwrap();
    assert_eq!(p.rescore(&mut store), 4);

    assert!(store.get(&sent).unwrap().is_sent());
    assert_eq!(store.len(), 4);
}

#[tokio::test]
async fn recomputed_weights_apply_to_later_runs() {
    let p = pipeline(10);
    let mut store = MemoryStore::new();
    p.run_once(&sources(), &mut store, None).await.unwrap();

    let location_only = job_digest::Weights::new(0.0, 0.0, 1.0);
    job_digest::pipeline::recompute_scores(&mut store, &location_only).unwrap();
    assert_eq!(store.weights(), Some(location_only));

    let later = Fixed(vec![
        posting("board", "5", "Energy Data Scientist", "München", "Python forecasting for wind parks."),
        posting("board", "6", "BI Developer", "Remote", "Power BI reports."),
    ]);
    let summary = p
        .run_once(
            &[RegisteredSource::new(Arc::new(later), SearchParams::default())],
            &mut store,
            None,
        )
        .await
        .unwrap();
    assert_eq!(summary.counts.new_postings, 2);

    for j in store.all() {
        assert_eq!(
            j.scored.total_score,
            job_digest::scoring::round1(j.scored.location_score),
            "{} scored under the saved weights",
            j.fingerprint()
        );
    }
}
