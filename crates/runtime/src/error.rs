use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("broker error: {0}")]
    Broker(#[from] orchestrator_broker::BrokerError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task execution timed out")]
    Timeout,

    #[error("retry engine error: {0}")]
    Retry(#[from] orchestrator_retry::RetryError),

    #[error("router error: {0}")]
    Router(#[from] orchestrator_router::RouterError),
}
