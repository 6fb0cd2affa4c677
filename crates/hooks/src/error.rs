use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("broker error: {0}")]
    Broker(#[from] orchestrator_broker::BrokerError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("hook '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("hook '{0}' is not registered")]
    NotFound(String),
}
