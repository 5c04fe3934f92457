// src/fetch/mod.rs
//! Resilient outbound HTTP: failure classification, bounded retries with
//! exponential backoff, and a per-attempt observer hook.

pub mod mock;
pub mod retry;
pub mod transport;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub use retry::{AttemptOutcome, RetryPolicy, RetryState};
pub use transport::{ReqwestTransport, Transport, TransportFailure};

use crate::config::FetchConfig;

/// Failure taxonomy of the fetch layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// HTTP 401 / 403
    AuthBlocked,
    /// HTTP 429
    RateLimited,
    /// HTTP >= 500
    ServerError,
    /// Connection, TLS, DNS, timeout, truncated body
    TransportError,
    /// Any other 4xx
    ClientError,
}

impl FailureKind {
    /// `None` for statuses that count as success (< 400).
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            401 | 403 => Some(Self::AuthBlocked),
            429 => Some(Self::RateLimited),
            s if s >= 500 => Some(Self::ServerError),
            s if s >= 400 => Some(Self::ClientError),
            _ => None,
        }
    }

    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::TransportError
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthBlocked => "auth_blocked",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::TransportError => "transport_error",
            Self::ClientError => "client_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Label used in logs and metrics (usually the adapter's source id).
    pub source: String,
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn get(source: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn post_json<T: Serialize>(
        source: impl Into<String>,
        url: impl Into<String>,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        let mut req = Self::get(source, url);
        req.method = Method::Post;
        req.body = Some(serde_json::to_string(body)?);
        Ok(req)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Scheme and host only. Paths and query strings may carry credentials.
    pub fn origin(&self) -> &str {
        let after_scheme = self.url.find("://").map_or(0, |i| i + 3);
        match self.url[after_scheme..].find(['/', '?']) {
            Some(i) => &self.url[..after_scheme + i],
            None => &self.url,
        }
    }

    /// Strip the URL path, query values and header values from a transport
    /// message before it reaches logs or chat reports.
    pub fn redact(&self, message: &str) -> String {
        let mut out = message.replace(&self.url, self.origin());
        let path = &self.url[self.origin().len()..];
        if path.len() > 1 {
            out = out.replace(path, "/***");
        }
        for (_, value) in self.query.iter().chain(&self.headers) {
            if value.len() >= 4 {
                out = out.replace(value.as_str(), "***");
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    /// Header names are lower-cased.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl FetchResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `Retry-After` in delta-seconds form. HTTP-date hints are ignored.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// The classified failure surfaced once retries are exhausted (or skipped).
#[derive(Debug, Clone, Error)]
#[error("{kind} from {source_id} after {attempts} attempt(s): {detail}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub source_id: String,
    pub url: String,
    pub attempts: u32,
    pub status: Option<u16>,
    pub detail: String,
}

/// What happened on one attempt. `delay` is set when a backoff follows.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptEvent {
    pub source: String,
    pub url: String,
    pub attempt: u32,
    /// `None` on success.
    pub failure: Option<FailureKind>,
    pub status: Option<u16>,
    pub delay: Option<Duration>,
}

/// Hook invoked after every attempt.
pub trait AttemptObserver: Send + Sync {
    fn on_attempt(&self, event: &AttemptEvent);
}

/// Default observer: structured log line + counters.
pub struct TracingObserver;

impl AttemptObserver for TracingObserver {
    fn on_attempt(&self, ev: &AttemptEvent) {
        let source = ev.source.clone();
        counter!("fetch_attempts_total", "source" => source.clone()).increment(1);
        match (ev.failure, ev.delay) {
            (None, _) => tracing::debug!(
                target: "fetch",
                source = %ev.source,
                attempt = ev.attempt,
                status = ?ev.status,
                "fetch ok"
            ),
            (Some(kind), Some(delay)) => {
                counter!("fetch_retries_total", "source" => source, "kind" => kind.as_str())
                    .increment(1);
                tracing::warn!(
                    target: "fetch",
                    source = %ev.source,
                    attempt = ev.attempt,
                    classification = kind.as_str(),
                    status = ?ev.status,
                    delay_ms = delay.as_millis() as u64,
                    "fetch failed; backing off"
                );
            }
            (Some(kind), None) => {
                counter!("fetch_failures_total", "source" => source, "kind" => kind.as_str())
                    .increment(1);
                tracing::warn!(
                    target: "fetch",
                    source = %ev.source,
                    attempt = ev.attempt,
                    classification = kind.as_str(),
                    status = ?ev.status,
                    "fetch failed; giving up"
                );
            }
        }
    }
}

/// Outbound client shared by all adapters. Cheap to clone.
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    observer: Arc<dyn AttemptObserver>,
    request_timeout: Duration,
}

impl ResilientClient {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            observer: Arc::new(TracingObserver),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Production client over `reqwest`.
    pub fn from_config(cfg: &FetchConfig) -> Result<Self, reqwest::Error> {
        let transport =
            ReqwestTransport::new(&cfg.user_agent, Duration::from_secs(cfg.connect_timeout_secs))?;
        Ok(Self::new(Arc::new(transport), cfg.retry_policy())
            .with_request_timeout(cfg.request_timeout()))
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// GET request pre-filled with this client's per-call timeout.
    pub fn get(&self, source: &str, url: impl Into<String>) -> FetchRequest {
        FetchRequest::get(source, url).timeout(self.request_timeout)
    }

    pub fn with_observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `req`, retrying retryable failures per the policy.
    /// Returns only 2xx/3xx responses; everything else becomes a `FetchError`.
    pub async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let mut state = RetryState::start();
        loop {
            let attempt = state.attempt();
            let result = self.transport.execute(req).await;

            let (outcome, status, detail) = match &result {
                Ok(resp) => match FailureKind::from_status(resp.status) {
                    None => (AttemptOutcome::Success, Some(resp.status), String::new()),
                    Some(kind) => {
                        let retry_after = if kind == FailureKind::RateLimited {
                            resp.retry_after()
                        } else {
                            None
                        };
                        (
                            AttemptOutcome::Failure { kind, retry_after },
                            Some(resp.status),
                            format!("HTTP {}", resp.status),
                        )
                    }
                },
                Err(f) => (
                    AttemptOutcome::Failure {
                        kind: FailureKind::TransportError,
                        retry_after: None,
                    },
                    None,
                    if f.timed_out {
                        format!("timed out: {}", req.redact(&f.message))
                    } else {
                        req.redact(&f.message)
                    },
                ),
            };

            let next = state.on_outcome(&self.policy, outcome);
            let (failure, delay) = match next {
                RetryState::BackingOff { kind, delay, .. } => (Some(kind), Some(delay)),
                RetryState::Exhausted { kind, .. } => (Some(kind), None),
                _ => (None, None),
            };
            self.observer.on_attempt(&AttemptEvent {
                source: req.source.clone(),
                url: req.url.clone(),
                attempt,
                failure,
                status,
                delay,
            });

            match next {
                RetryState::Succeeded { attempt } => {
                    return result.map_err(|f| FetchError {
                        kind: FailureKind::TransportError,
                        source_id: req.source.clone(),
                        url: req.url.clone(),
                        attempts: attempt,
                        status: None,
                        detail: req.redact(&f.message),
                    });
                }
                RetryState::BackingOff { delay, .. } => {
                    tokio::time::sleep(delay).await;
                    state = next.resume();
                }
                RetryState::Exhausted { attempt, kind } => {
                    return Err(FetchError {
                        kind,
                        source_id: req.source.clone(),
                        url: req.url.clone(),
                        attempts: attempt,
                        status,
                        detail,
                    });
                }
                RetryState::Attempting { .. } => state = next,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(FailureKind::from_status(200), None);
        assert_eq!(FailureKind::from_status(304), None);
        assert_eq!(FailureKind::from_status(401), Some(FailureKind::AuthBlocked));
        assert_eq!(FailureKind::from_status(403), Some(FailureKind::AuthBlocked));
        assert_eq!(FailureKind::from_status(404), Some(FailureKind::ClientError));
        assert_eq!(FailureKind::from_status(429), Some(FailureKind::RateLimited));
        assert_eq!(FailureKind::from_status(503), Some(FailureKind::ServerError));
    }

    #[test]
    fn retry_after_parses_delta_seconds_only() {
        let mut r = FetchResponse {
            status: 429,
            headers: vec![("retry-after".into(), " 7 ".into())],
            body: String::new(),
        };
        assert_eq!(r.retry_after(), Some(Duration::from_secs(7)));
        r.headers = vec![("retry-after".into(), "Wed, 21 Oct 2015 07:28:00 GMT".into())];
        assert_eq!(r.retry_after(), None);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let r = FetchResponse {
            status: 200,
            headers: vec![("content-type".into(), "application/json".into())],
            body: "{}".into(),
        };
        assert_eq!(r.header("Content-Type"), Some("application/json"));
    }
}
