// src/fetch/mock.rs
//! Test helpers: a scripted `Transport` and a recording `AttemptObserver`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    AttemptEvent, AttemptObserver, FetchRequest, FetchResponse, ResilientClient, RetryPolicy,
    Transport, TransportFailure,
};

pub type Scripted = Result<FetchResponse, TransportFailure>;

pub fn respond(status: u16, body: impl Into<String>) -> Scripted {
    Ok(FetchResponse {
        status,
        headers: Vec::new(),
        body: body.into(),
    })
}

pub fn status(status: u16) -> Scripted {
    respond(status, "")
}

pub fn rate_limited(retry_after_secs: u64) -> Scripted {
    Ok(FetchResponse {
        status: 429,
        headers: vec![("retry-after".into(), retry_after_secs.to_string())],
        body: String::new(),
    })
}

pub fn transport_failure(message: &str) -> Scripted {
    Err(TransportFailure {
        message: message.to_string(),
        timed_out: false,
    })
}

/// Renders `url?k=v&...` without percent-encoding, for route matching only.
pub fn request_line(req: &FetchRequest) -> String {
    if req.query.is_empty() {
        return req.url.clone();
    }
    let q: Vec<String> = req.query.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{}?{}", req.url, q.join("&"))
}

/// Replies from a global FIFO, or from per-route queues matched by substring
/// of the request line. The last reply of a route queue repeats.
/// Unmatched requests get a 404.
#[derive(Default)]
pub struct ScriptedTransport {
    sequence: Mutex<VecDeque<Scripted>>,
    routes: Mutex<Vec<(String, VecDeque<Scripted>)>>,
    seen: Mutex<Vec<FetchRequest>>,
}

impl ScriptedTransport {
    pub fn sequence(replies: Vec<Scripted>) -> Self {
        Self {
            sequence: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, pattern: &str, replies: Vec<Scripted>) -> Self {
        if let Ok(mut routes) = self.routes.lock() {
            routes.push((pattern.to_string(), replies.into()));
        }
        self
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.seen.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn request_lines(&self) -> Vec<String> {
        self.requests().iter().map(request_line).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, req: &FetchRequest) -> Result<FetchResponse, TransportFailure> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(req.clone());
        }
        let line = request_line(req);
        if let Ok(mut routes) = self.routes.lock() {
            if let Some((_, queue)) = routes.iter_mut().find(|(p, _)| line.contains(p.as_str())) {
                let reply = if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                };
                if let Some(r) = reply {
                    return r;
                }
            }
        }
        if let Ok(mut seq) = self.sequence.lock() {
            if let Some(r) = seq.pop_front() {
                return r;
            }
        }
        respond(404, format!("no scripted reply for {line}"))
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<AttemptEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<AttemptEvent> {
        self.events.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Delays actually slept, in order.
    pub fn backoffs(&self) -> Vec<Duration> {
        self.events().iter().filter_map(|e| e.delay).collect()
    }
}

impl AttemptObserver for RecordingObserver {
    fn on_attempt(&self, event: &AttemptEvent) {
        if let Ok(mut v) = self.events.lock() {
            v.push(event.clone());
        }
    }
}

/// Millisecond-scale policy so retry paths run fast under test.
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

/// Client over `transport` with a recording observer and `fast_policy(3)`.
pub fn scripted_client(
    transport: Arc<ScriptedTransport>,
) -> (ResilientClient, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::default());
    let client = ResilientClient::new(transport, fast_policy(3)).with_observer(observer.clone());
    (client, observer)
}
