use std::path::PathBuf;
use std::sync::Arc;

use orchestrator_broker::{keys, Broker};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::TxLogError;
use crate::event::day_bucket_for;
use crate::file_sink::compress_rotated_file;

/// Drops out-of-retention-window day keys (belt-and-suspenders alongside
/// the per-key TTL applied at flush time) and compresses the previous
/// day's rotated JSON-lines file once it's done being written to.
pub struct CleanupJob {
    broker: Arc<dyn Broker>,
    retention_days: u32,
    file_sink_dir: Option<PathBuf>,
}

impl CleanupJob {
    pub fn new(broker: Arc<dyn Broker>, retention_days: u32, file_sink_dir: Option<PathBuf>) -> Self {
        Self { broker, retention_days, file_sink_dir }
    }

    pub async fn run_once(&self, now_ms: u64) -> Result<(), TxLogError> {
        let cutoff_ms = now_ms.saturating_sub(self.retention_days as u64 * 86_400_000);
        let cutoff_day = day_bucket_for(cutoff_ms);

        for key in self.broker.keys("txlog:*").await? {
            if let Some(day) = extract_day(&key) {
                if day.as_str() < cutoff_day.as_str() {
                    self.broker.del(&key).await?;
                }
            }
        }

        if let Some(dir) = &self.file_sink_dir {
            let yesterday_ms = now_ms.saturating_sub(86_400_000);
            let yesterday = day_bucket_for(yesterday_ms);
            let path = dir.join(format!("{yesterday}.jsonl"));
            if path.exists() {
                if let Err(err) = compress_rotated_file(&path) {
                    warn!(error = %err, path = %path.display(), "failed to compress rotated transaction log file");
                }
            }
        }

        info!(cutoff_day, "transaction log cleanup pass complete");
        Ok(())
    }

    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> anyhow::Result<()> {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(86_400));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now_ms = orchestrator_core::now_ms();
                    if let Err(err) = self.run_once(now_ms).await {
                        warn!(error = %err, "transaction log cleanup failed");
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        Ok(())
    }
}

fn extract_day(key: &str) -> Option<String> {
    // Matches "txlog:{day}", "txlog:type:{t}:{day}", "txlog:queue:{q}:{day}",
    // and their ":payload" hash companions — the day bucket is always the
    // trailing component.
    let trimmed = key.strip_suffix(":payload").unwrap_or(key);
    trimmed.rsplit(':').next().map(String::from).filter(|s| s.len() == 10 && s.chars().nth(4) == Some('-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_broker::InMemoryBroker;

    #[tokio::test]
    async fn run_once_drops_keys_older_than_retention() {
        let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
        let now_ms = orchestrator_core::now_ms();
        let today = day_bucket_for(now_ms);
        broker.zadd(&keys::txlog_day("2001-01-01"), "e1", 1.0).await.unwrap();
        broker.zadd(&keys::txlog_day(&today), "e2", 1.0).await.unwrap();

        let job = CleanupJob::new(broker.clone(), 30, None);
        job.run_once(now_ms).await.unwrap();

        assert_eq!(broker.zcard(&keys::txlog_day("2001-01-01")).await.unwrap(), 0);
        assert_eq!(broker.zcard(&keys::txlog_day(&today)).await.unwrap(), 1);
    }

    #[test]
    fn extract_day_reads_trailing_date_component() {
        assert_eq!(extract_day("txlog:2024-01-15"), Some("2024-01-15".to_string()));
        assert_eq!(extract_day("txlog:type:code_review:2024-01-15"), Some("2024-01-15".to_string()));
        assert_eq!(extract_day("txlog:queue:agent-a:2024-01-15:payload"), Some("2024-01-15".to_string()));
        assert_eq!(extract_day("circuit:breakers"), None);
    }
}
