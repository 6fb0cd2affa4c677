//! The broker trait: the minimal Redis-shaped surface every subsystem
//! depends on (lists, sorted sets, hashes, sets, TTL'd strings, pub/sub,
//! and the atomic ready→in-flight list move).
//!
//! Components never talk to `redis` directly — they hold a `Arc<dyn
//! Broker>` so tests can swap in [`crate::memory::InMemoryBroker`] without
//! a live Redis instance.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::BrokerError;

/// A single pub/sub delivery: the concrete channel it arrived on (not the
/// subscribed pattern) and the raw payload.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    pub channel: String,
    pub payload: String,
}

/// A live pattern subscription. Consumers `recv().await` in a loop; the
/// stream ends (`None`) when the broker connection is torn down.
#[async_trait]
pub trait BrokerSubscription: Send {
    async fn recv(&mut self) -> Option<BrokerMessage>;
}

#[async_trait]
pub trait Broker: Send + Sync {
    // -- Lists --
    async fn rpush(&self, key: &str, value: String) -> Result<i64, BrokerError>;
    async fn lpush(&self, key: &str, value: String) -> Result<i64, BrokerError>;
    async fn lrem(&self, key: &str, count: i64, value: &str) -> Result<i64, BrokerError>;
    async fn llen(&self, key: &str) -> Result<i64, BrokerError>;
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, BrokerError>;

    /// Atomically moves one element from the tail of `source` to the head
    /// of `destination`, blocking up to `timeout` when `source` is empty.
    /// This is the primitive the queue fabric relies on for exactly-once
    /// ready→in-flight ownership transfer.
    async fn brpoplpush(
        &self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> Result<Option<String>, BrokerError>;

    // -- Sorted sets --
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), BrokerError>;
    async fn zrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, BrokerError>;
    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>, BrokerError>;
    async fn zrem(&self, key: &str, member: &str) -> Result<i64, BrokerError>;
    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<i64, BrokerError>;
    async fn zcard(&self, key: &str) -> Result<i64, BrokerError>;
    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, BrokerError>;

    // -- Hashes --
    async fn hset(&self, key: &str, field: &str, value: String) -> Result<(), BrokerError>;
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, BrokerError>;
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, BrokerError>;
    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64, BrokerError>;
    async fn hincrbyfloat(&self, key: &str, field: &str, delta: f64) -> Result<f64, BrokerError>;
    async fn hdel(&self, key: &str, field: &str) -> Result<i64, BrokerError>;

    // -- Sets --
    async fn sadd(&self, key: &str, member: &str) -> Result<i64, BrokerError>;
    async fn scard(&self, key: &str) -> Result<i64, BrokerError>;

    // -- Strings / TTL --
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), BrokerError>;
    async fn get(&self, key: &str) -> Result<Option<String>, BrokerError>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), BrokerError>;
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, BrokerError>;
    async fn del(&self, key: &str) -> Result<i64, BrokerError>;

    // -- Pub/sub --
    async fn publish(&self, channel: &str, payload: String) -> Result<(), BrokerError>;
    async fn psubscribe(&self, pattern: &str) -> Result<Box<dyn BrokerSubscription>, BrokerError>;
}
