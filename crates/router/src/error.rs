use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("broker error: {0}")]
    Broker(#[from] orchestrator_broker::BrokerError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no routable agent is registered")]
    NoCandidates,
}
