// src/notify/log.rs
use async_trait::async_trait;
use chrono::Utc;

use super::{chunk_cards, DeliveryReport, Notifier, NotifyConfig, NotifyError};
use crate::dedup::Fingerprint;
use crate::store::StoredJob;

/// Writes the digest to the tracing log. Logged postings count as delivered.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    cfg: NotifyConfig,
}

impl LogNotifier {
    pub fn new(cfg: NotifyConfig) -> Self {
        Self { cfg }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(
        &self,
        digest: &[StoredJob],
        problems: &[String],
        on_sent: &mut (dyn for<'f> FnMut(&'f Fingerprint) + Send),
    ) -> Result<DeliveryReport, NotifyError> {
        let mut report = DeliveryReport::default();
        let chunks = chunk_cards(digest, &self.cfg, Utc::now().date_naive());
        for (i, chunk) in chunks.iter().enumerate() {
            tracing::info!(target: "digest", chunk = i, jobs = chunk.fingerprints.len(), "\n{}", chunk.text);
            report.chunks_sent += 1;
            for fp in &chunk.fingerprints {
                on_sent(fp);
                report.delivered += 1;
            }
        }
        for p in problems {
            tracing::warn!(target: "digest", problem = %p, "run problem");
        }
        Ok(report)
    }
}
