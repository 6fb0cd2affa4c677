use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TxLogConfig {
    pub flush_interval: Duration,
    pub max_batch_size: usize,
    pub retention_days: u32,
    pub file_sink_dir: Option<std::path::PathBuf>,
    pub subscribe_patterns: Vec<String>,
}

impl Default for TxLogConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(60),
            max_batch_size: 1000,
            retention_days: 30,
            file_sink_dir: None,
            subscribe_patterns: vec![
                "txlog:*".to_string(),
                "queue:*:enqueue".to_string(),
                "queue:*:dequeue".to_string(),
                "queue:*:complete".to_string(),
                "queue:*:failed".to_string(),
                "agent:*:task_assigned".to_string(),
                "agent:*:completed".to_string(),
                "agent:*:failed".to_string(),
                "dlq:*:retry".to_string(),
                "dlq:*:archive".to_string(),
                "health:correction".to_string(),
            ],
        }
    }
}
