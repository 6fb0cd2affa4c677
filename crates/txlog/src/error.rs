use thiserror::Error;

#[derive(Debug, Error)]
pub enum TxLogError {
    #[error("broker error: {0}")]
    Broker(#[from] orchestrator_broker::BrokerError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("log file error: {0}")]
    Io(#[from] std::io::Error),
}
