// tests/fetch_retry.rs
//
// Resilient client behaviour over a scripted transport: which failures are
// retried, how many backoffs happen and what surfaces when retries run out.

use std::sync::Arc;
use std::time::Duration;

use job_digest::fetch::mock::{
    fast_policy, rate_limited, respond, scripted_client, status, transport_failure,
    RecordingObserver, ScriptedTransport,
};
use job_digest::fetch::{FailureKind, ResilientClient};

#[tokio::test]
async fn two_rate_limits_then_success_backs_off_twice() {
    let transport = Arc::new(ScriptedTransport::sequence(vec![
        status(429),
        status(429),
        respond(200, r#"{"data":[]}"#),
    ]));
    let (client, observer) = scripted_client(transport.clone());

    let resp = client
        .fetch(&client.get("arbeitnow", "https://api.test/jobs"))
        .await
        .expect("third attempt succeeds");

    assert_eq!(resp.status, 200);
    assert_eq!(observer.backoffs().len(), 2, "exactly two waits");
    assert_eq!(transport.requests().len(), 3);
    let kinds: Vec<_> = observer.events().iter().map(|e| e.failure).collect();
    assert_eq!(
        kinds,
        vec![Some(FailureKind::RateLimited), Some(FailureKind::RateLimited), None]
    );
}

#[tokio::test]
async fn forbidden_is_not_retried() {
    let transport = Arc::new(ScriptedTransport::sequence(vec![status(403), status(200)]));
    let (client, observer) = scripted_client(transport.clone());

    let err = client
        .fetch(&client.get("remoteok", "https://api.test/remote"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::AuthBlocked);
    assert_eq!(err.attempts, 1);
    assert_eq!(err.status, Some(403));
    assert!(observer.backoffs().is_empty());
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let transport = Arc::new(ScriptedTransport::sequence(vec![status(404)]));
    let (client, _) = scripted_client(transport);
    let err = client
        .fetch(&client.get("themuse", "https://api.test/missing"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::ClientError);
    assert_eq!(err.attempts, 1);
}

#[tokio::test]
async fn exhaustion_surfaces_last_classification() {
    let transport = Arc::new(ScriptedTransport::sequence(vec![
        status(503),
        transport_failure("connection reset"),
        status(502),
    ]));
    let (client, observer) = scripted_client(transport);

    let err = client
        .fetch(&client.get("jobicy", "https://api.test/jobs"))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::ServerError);
    assert_eq!(err.attempts, 3);
    assert_eq!(err.source_id, "jobicy");
    // a backoff after attempts 1 and 2, none after the last
    assert_eq!(observer.backoffs().len(), 2);
}

#[tokio::test]
async fn retry_after_hint_is_capped_by_policy() {
    let transport = Arc::new(ScriptedTransport::sequence(vec![
        rate_limited(7),
        respond(200, "ok"),
    ]));
    let (client, observer) = scripted_client(transport);

    client
        .fetch(&client.get("adzuna", "https://api.test/search/1"))
        .await
        .unwrap();
    // fast_policy caps every delay at 5ms
    assert_eq!(observer.backoffs(), vec![Duration::from_millis(5)]);
}

#[tokio::test]
async fn backoff_grows_exponentially() {
    let transport = Arc::new(ScriptedTransport::sequence(vec![
        status(500),
        status(500),
        status(500),
        respond(200, "ok"),
    ]));
    let observer = Arc::new(RecordingObserver::default());
    let client = ResilientClient::new(transport, fast_policy(4)).with_observer(observer.clone());

    client.fetch(&client.get("s", "https://api.test/")).await.unwrap();
    assert_eq!(
        observer.backoffs(),
        vec![
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::from_millis(4)
        ]
    );
}

#[tokio::test]
async fn query_and_headers_reach_the_transport() {
    let transport = Arc::new(ScriptedTransport::new().route("page=2", vec![respond(200, "two")]));
    let (client, _) = scripted_client(transport.clone());

    let req = client
        .get("bundesagentur", "https://api.test/jobs")
        .query("page", 2)
        .header("x-api-key", "k");
    let resp = client.fetch(&req).await.unwrap();

    assert_eq!(resp.body, "two");
    assert_eq!(transport.request_lines(), vec!["https://api.test/jobs?page=2"]);
    assert_eq!(transport.requests()[0].headers, vec![("x-api-key".to_string(), "k".to_string())]);
}

#[tokio::test]
async fn transport_failure_text_carries_no_credentials() {
    let transport = Arc::new(ScriptedTransport::new().route(
        "tg.test",
        vec![transport_failure(
            "error sending request for url (https://tg.test/bot123:SECRET/sendMessage?app_key=k3y-value)",
        )],
    ));
    let (client, _) = scripted_client(transport);
    let req = client
        .get("telegram", "https://tg.test/bot123:SECRET/sendMessage")
        .query("app_key", "k3y-value")
        .header("x-api-key", "hdr-secret");

    let err = client.fetch(&req).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::TransportError);
    let text = err.to_string();
    assert!(!text.contains("SECRET"), "{text}");
    assert!(!text.contains("k3y-value"), "{text}");
    assert!(text.contains("https://tg.test"), "{text}");
}

#[test]
fn redaction_keeps_origin_only() {
    let req = job_digest::fetch::FetchRequest::get("adzuna", "https://api.test/v1/de/search/1")
        .query("app_key", "abcdef")
        .header("x-api-key", "zz-top-secret");
    assert_eq!(req.origin(), "https://api.test");
    assert_eq!(
        req.redact("failed: https://api.test/v1/de/search/1?app_key=abcdef, key zz-top-secret"),
        "failed: https://api.test?app_key=***, key ***"
    );
}
