//! Broker abstraction: the Redis-shaped contract every subsystem depends
//! on, a real Redis implementation, an in-process test double, and the
//! key-space conventions shared across the workspace.

pub mod client;
pub mod error;
pub mod keys;
pub mod memory;
pub mod redis_broker;

pub use client::{Broker, BrokerMessage, BrokerSubscription};
pub use error::BrokerError;
pub use memory::InMemoryBroker;
pub use redis_broker::RedisBroker;
