use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("broker error: {0}")]
    Broker(#[from] orchestrator_broker::BrokerError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no dead-letter record found for task {0}")]
    NotInDeadLetterQueue(String),

    #[error("task {0} has no retry record to force")]
    NoRetryRecord(String),
}
