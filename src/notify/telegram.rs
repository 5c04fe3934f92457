// src/notify/telegram.rs
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{
    chunk_cards, problems_message, summary, DeliveryReport, Notifier, NotifyConfig, NotifyError,
    ENV_TELEGRAM_BOT_TOKEN, ENV_TELEGRAM_CHAT_ID,
};
use crate::dedup::Fingerprint;
use crate::fetch::{FetchRequest, ResilientClient};
use crate::store::StoredJob;

const SOURCE: &str = "telegram";

/// Bot API `sendMessage` with HTML parse mode, sent through the resilient client.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: ResilientClient,
    token: String,
    chat_id: String,
    cfg: NotifyConfig,
}

impl TelegramNotifier {
    pub fn new(
        client: ResilientClient,
        token: impl Into<String>,
        chat_id: impl Into<String>,
        cfg: NotifyConfig,
    ) -> Self {
        Self {
            client,
            token: token.into(),
            chat_id: chat_id.into(),
            cfg,
        }
    }

    pub fn from_env(client: ResilientClient, cfg: NotifyConfig) -> Result<Self, NotifyError> {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| NotifyError::NotConfigured(format!("{name} is not set")))
        };
        Ok(Self::new(
            client,
            read(ENV_TELEGRAM_BOT_TOKEN)?,
            read(ENV_TELEGRAM_CHAT_ID)?,
            cfg,
        ))
    }

    pub async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.cfg.telegram_api_base.trim_end_matches('/'),
            self.token
        );
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let req = FetchRequest::post_json(SOURCE, url, &payload)?
            .timeout(self.client.request_timeout());
        let resp = self.client.fetch(&req).await?;

        let ack: SendAck = resp
            .json()
            .map_err(|e| NotifyError::Rejected(format!("unreadable reply: {e}")))?;
        if ack.ok {
            Ok(())
        } else {
            Err(NotifyError::Rejected(
                ack.description.unwrap_or_else(|| "ok=false".to_string()),
            ))
        }
    }

    async fn pause(&self) {
        if self.cfg.pause_between_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.cfg.pause_between_ms)).await;
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn deliver(
        &self,
        digest: &[StoredJob],
        problems: &[String],
        on_sent: &mut (dyn for<'f> FnMut(&'f Fingerprint) + Send),
    ) -> Result<DeliveryReport, NotifyError> {
        let mut report = DeliveryReport::default();
        if digest.is_empty() && problems.is_empty() {
            tracing::info!(target: "digest", "nothing to send");
            return Ok(report);
        }

        if !digest.is_empty() {
            let chunks = chunk_cards(digest, &self.cfg, Utc::now().date_naive());
            tracing::info!(target: "digest", jobs = digest.len(), chunks = chunks.len(), "sending digest");
            for (i, chunk) in chunks.iter().enumerate() {
                if i > 0 {
                    self.pause().await;
                }
                match self.send_message(&chunk.text).await {
                    Ok(()) => {
                        report.chunks_sent += 1;
                        for fp in &chunk.fingerprints {
                            on_sent(fp);
                            report.delivered += 1;
                        }
                    }
                    Err(e) => {
                        report.chunks_failed += 1;
                        tracing::warn!(target: "digest", chunk = i, error = %e, "chunk not delivered");
                    }
                }
            }
            self.pause().await;
            if let Err(e) = self.send_message(&summary(digest)).await {
                tracing::warn!(target: "digest", error = %e, "summary not delivered");
            }
        }

        if !problems.is_empty() {
            if let Err(e) = self.send_message(&problems_message(problems)).await {
                tracing::warn!(target: "digest", error = %e, "problem report not delivered");
            }
        }
        Ok(report)
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct SendAck {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}
