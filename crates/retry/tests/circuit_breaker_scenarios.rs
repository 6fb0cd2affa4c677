use std::sync::Arc;
use std::time::Duration;

use orchestrator_broker::memory::InMemoryBroker;
use orchestrator_broker::Broker;
use orchestrator_core::ErrorClass;
use orchestrator_retry::CircuitBreakerRegistry;

#[tokio::test]
async fn opens_after_threshold_then_half_opens_past_cooldown() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let registry = CircuitBreakerRegistry::new(broker, 3, Duration::from_millis(50));

    assert!(registry.allow_attempt("claude-1", ErrorClass::Timeout));
    for _ in 0..3 {
        registry.record_failure("claude-1", ErrorClass::Timeout).await.unwrap();
    }
    assert!(!registry.allow_attempt("claude-1", ErrorClass::Timeout));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(registry.allow_attempt("claude-1", ErrorClass::Timeout));
}

#[tokio::test]
async fn half_open_success_closes_the_circuit() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let registry = CircuitBreakerRegistry::new(broker, 2, Duration::from_millis(20));

    registry.record_failure("deepseek", ErrorClass::Connection).await.unwrap();
    registry.record_failure("deepseek", ErrorClass::Connection).await.unwrap();
    assert!(!registry.allow_attempt("deepseek", ErrorClass::Connection));

    tokio::time::sleep(Duration::from_millis(25)).await;
    assert!(registry.allow_attempt("deepseek", ErrorClass::Connection));

    registry.record_success("deepseek", ErrorClass::Connection).await.unwrap();
    registry.record_failure("deepseek", ErrorClass::Connection).await.unwrap();
    assert!(registry.allow_attempt("deepseek", ErrorClass::Connection));
}

#[tokio::test]
async fn breakers_are_scoped_per_agent_and_error_class() {
    let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
    let registry = CircuitBreakerRegistry::new(broker, 1, Duration::from_secs(60));

    registry.record_failure("claude-1", ErrorClass::RateLimit).await.unwrap();
    assert!(!registry.allow_attempt("claude-1", ErrorClass::RateLimit));
    assert!(registry.allow_attempt("claude-1", ErrorClass::Timeout));
    assert!(registry.allow_attempt("deepseek", ErrorClass::RateLimit));
}
