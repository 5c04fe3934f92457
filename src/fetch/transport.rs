// src/fetch/transport.rs
//! Single-attempt HTTP execution. Retries live one level up in `ResilientClient`.

use std::time::Duration;

use async_trait::async_trait;

use super::{FetchRequest, FetchResponse, Method};

/// A request that never produced an HTTP status (DNS, connect, TLS, timeout, body read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub message: String,
    pub timed_out: bool,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform exactly one attempt. Any HTTP status, including 4xx/5xx, is `Ok`.
    async fn execute(&self, req: &FetchRequest) -> Result<FetchResponse, TransportFailure>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str, connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }
}

/// reqwest's Display embeds the request URL, which may carry a bot token or API key.
fn failure(e: reqwest::Error) -> TransportFailure {
    TransportFailure {
        timed_out: e.is_timeout(),
        message: e.without_url().to_string(),
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, req: &FetchRequest) -> Result<FetchResponse, TransportFailure> {
        let mut builder = match req.method {
            Method::Get => self.client.get(&req.url),
            Method::Post => self.client.post(&req.url),
        };
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &req.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let resp = builder.timeout(req.timeout).send().await.map_err(failure)?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = resp.text().await.map_err(failure)?;

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}
