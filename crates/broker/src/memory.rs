//! An in-process `Broker` implementation for tests and local development
//! without a live Redis instance. Mirrors Redis semantics closely enough
//! for the orchestrator's own logic to exercise: list ordering, sorted-set
//! scoring, hash field arithmetic, and pattern-filtered pub/sub.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use crate::client::{Broker, BrokerMessage, BrokerSubscription};
use crate::error::BrokerError;

#[derive(Default)]
struct Store {
    lists: HashMap<String, VecDeque<String>>,
    sorted_sets: HashMap<String, Vec<(String, f64)>>,
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, std::collections::HashSet<String>>,
    strings: HashMap<String, String>,
    expirations: HashMap<String, Instant>,
}

impl Store {
    fn expire_if_due(&mut self, key: &str) {
        if let Some(at) = self.expirations.get(key) {
            if Instant::now() >= *at {
                self.strings.remove(key);
                self.lists.remove(key);
                self.hashes.remove(key);
                self.sets.remove(key);
                self.sorted_sets.remove(key);
                self.expirations.remove(key);
            }
        }
    }
}

#[derive(Clone)]
pub struct InMemoryBroker {
    store: Arc<Mutex<Store>>,
    pubsub: broadcast::Sender<BrokerMessage>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        let (pubsub, _) = broadcast::channel(1024);
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            pubsub,
        }
    }
}

/// Translates a Redis glob pattern (`*` and `?` only, which is all this
/// codebase's key conventions use) into a matcher.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    fn inner(p: &[u8], c: &[u8]) -> bool {
        match (p.first(), c.first()) {
            (None, None) => true,
            (Some(b'*'), _) => inner(&p[1..], c) || (!c.is_empty() && inner(p, &c[1..])),
            (Some(b'?'), Some(_)) => inner(&p[1..], &c[1..]),
            (Some(pb), Some(cb)) if pb == cb => inner(&p[1..], &c[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), candidate.as_bytes())
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn rpush(&self, key: &str, value: String) -> Result<i64, BrokerError> {
        let mut store = self.store.lock();
        let list = store.lists.entry(key.to_string()).or_default();
        list.push_back(value);
        Ok(list.len() as i64)
    }

    async fn lpush(&self, key: &str, value: String) -> Result<i64, BrokerError> {
        let mut store = self.store.lock();
        let list = store.lists.entry(key.to_string()).or_default();
        list.push_front(value);
        Ok(list.len() as i64)
    }

    async fn lrem(&self, key: &str, count: i64, value: &str) -> Result<i64, BrokerError> {
        let mut store = self.store.lock();
        let Some(list) = store.lists.get_mut(key) else {
            return Ok(0);
        };
        let mut removed = 0i64;
        let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() as usize };
        if count >= 0 {
            list.retain(|v| {
                if removed as usize >= limit || v != value {
                    true
                } else {
                    removed += 1;
                    false
                }
            });
        } else {
            let mut kept: VecDeque<String> = VecDeque::with_capacity(list.len());
            for v in list.drain(..).rev() {
                if v == value && (removed as usize) < limit {
                    removed += 1;
                } else {
                    kept.push_front(v);
                }
            }
            *list = kept;
        }
        Ok(removed)
    }

    async fn llen(&self, key: &str) -> Result<i64, BrokerError> {
        let store = self.store.lock();
        Ok(store.lists.get(key).map(|l| l.len()).unwrap_or(0) as i64)
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, BrokerError> {
        let store = self.store.lock();
        let Some(list) = store.lists.get(key) else {
            return Ok(Vec::new());
        };
        Ok(slice_range(list.iter().cloned().collect::<Vec<_>>(), start, stop))
    }

    async fn brpoplpush(
        &self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> Result<Option<String>, BrokerError> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut store = self.store.lock();
                if let Some(list) = store.lists.get_mut(source) {
                    if let Some(value) = list.pop_back() {
                        store
                            .lists
                            .entry(destination.to_string())
                            .or_default()
                            .push_front(value.clone());
                        return Ok(Some(value));
                    }
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), BrokerError> {
        let mut store = self.store.lock();
        let set = store.sorted_sets.entry(key.to_string()).or_default();
        if let Some(entry) = set.iter_mut().find(|(m, _)| m == member) {
            entry.1 = score;
        } else {
            set.push((member.to_string(), score));
        }
        set.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(())
    }

    async fn zrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, BrokerError> {
        let store = self.store.lock();
        let Some(set) = store.sorted_sets.get(key) else {
            return Ok(Vec::new());
        };
        let members: Vec<String> = set.iter().map(|(m, _)| m.clone()).collect();
        Ok(slice_range(members, start, stop))
    }

    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>, BrokerError> {
        let store = self.store.lock();
        let Some(set) = store.sorted_sets.get(key) else {
            return Ok(Vec::new());
        };
        Ok(set
            .iter()
            .filter(|(_, score)| *score >= min && *score <= max)
            .map(|(m, _)| m.clone())
            .collect())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<i64, BrokerError> {
        let mut store = self.store.lock();
        let Some(set) = store.sorted_sets.get_mut(key) else {
            return Ok(0);
        };
        let before = set.len();
        set.retain(|(m, _)| m != member);
        Ok((before - set.len()) as i64)
    }

    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<i64, BrokerError> {
        let mut store = self.store.lock();
        let Some(set) = store.sorted_sets.get_mut(key) else {
            return Ok(0);
        };
        let before = set.len();
        set.retain(|(_, score)| !(*score >= min && *score <= max));
        Ok((before - set.len()) as i64)
    }

    async fn zcard(&self, key: &str) -> Result<i64, BrokerError> {
        let store = self.store.lock();
        Ok(store.sorted_sets.get(key).map(|s| s.len()).unwrap_or(0) as i64)
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, BrokerError> {
        let store = self.store.lock();
        Ok(store
            .sorted_sets
            .get(key)
            .and_then(|set| set.iter().find(|(m, _)| m == member).map(|(_, s)| *s)))
    }

    async fn hset(&self, key: &str, field: &str, value: String) -> Result<(), BrokerError> {
        let mut store = self.store.lock();
        store
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, BrokerError> {
        let store = self.store.lock();
        Ok(store.hashes.get(key).and_then(|h| h.get(field).cloned()))
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, BrokerError> {
        let store = self.store.lock();
        Ok(store.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64, BrokerError> {
        let mut store = self.store.lock();
        let hash = store.hashes.entry(key.to_string()).or_default();
        let current: i64 = hash.get(field).and_then(|v| v.parse().ok()).unwrap_or(0);
        let next = current + delta;
        hash.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    async fn hincrbyfloat(&self, key: &str, field: &str, delta: f64) -> Result<f64, BrokerError> {
        let mut store = self.store.lock();
        let hash = store.hashes.entry(key.to_string()).or_default();
        let current: f64 = hash.get(field).and_then(|v| v.parse().ok()).unwrap_or(0.0);
        let next = current + delta;
        hash.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<i64, BrokerError> {
        let mut store = self.store.lock();
        let Some(hash) = store.hashes.get_mut(key) else {
            return Ok(0);
        };
        Ok(if hash.remove(field).is_some() { 1 } else { 0 })
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<i64, BrokerError> {
        let mut store = self.store.lock();
        let set = store.sets.entry(key.to_string()).or_default();
        Ok(if set.insert(member.to_string()) { 1 } else { 0 })
    }

    async fn scard(&self, key: &str) -> Result<i64, BrokerError> {
        let store = self.store.lock();
        Ok(store.sets.get(key).map(|s| s.len()).unwrap_or(0) as i64)
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), BrokerError> {
        let mut store = self.store.lock();
        store.strings.insert(key.to_string(), value);
        store.expirations.insert(key.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BrokerError> {
        let mut store = self.store.lock();
        store.expire_if_due(key);
        Ok(store.strings.get(key).cloned())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), BrokerError> {
        let mut store = self.store.lock();
        store.expirations.insert(key.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, BrokerError> {
        let mut store = self.store.lock();
        let all_keys: Vec<String> = store
            .strings
            .keys()
            .chain(store.lists.keys())
            .chain(store.hashes.keys())
            .chain(store.sets.keys())
            .chain(store.sorted_sets.keys())
            .cloned()
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        for key in &all_keys {
            store.expire_if_due(key);
        }
        Ok(all_keys.into_iter().filter(|k| glob_match(pattern, k)).collect())
    }

    async fn del(&self, key: &str) -> Result<i64, BrokerError> {
        let mut store = self.store.lock();
        let mut removed = 0i64;
        if store.strings.remove(key).is_some() { removed = 1; }
        if store.lists.remove(key).is_some() { removed = 1; }
        if store.hashes.remove(key).is_some() { removed = 1; }
        if store.sets.remove(key).is_some() { removed = 1; }
        if store.sorted_sets.remove(key).is_some() { removed = 1; }
        Ok(removed)
    }

    async fn publish(&self, channel: &str, payload: String) -> Result<(), BrokerError> {
        let _ = self.pubsub.send(BrokerMessage {
            channel: channel.to_string(),
            payload,
        });
        Ok(())
    }

    async fn psubscribe(&self, pattern: &str) -> Result<Box<dyn BrokerSubscription>, BrokerError> {
        Ok(Box::new(InMemorySubscription {
            pattern: pattern.to_string(),
            rx: self.pubsub.subscribe(),
        }))
    }
}

fn slice_range(items: Vec<String>, start: isize, stop: isize) -> Vec<String> {
    let len = items.len() as isize;
    if len == 0 {
        return Vec::new();
    }
    let norm = |i: isize| -> isize {
        if i < 0 { (len + i).max(0) } else { i.min(len - 1).max(0) }
    };
    let start = norm(start);
    let stop = norm(stop);
    if start > stop || start >= len {
        return Vec::new();
    }
    items[start as usize..=(stop as usize).min(items.len() - 1)].to_vec()
}

struct InMemorySubscription {
    pattern: String,
    rx: broadcast::Receiver<BrokerMessage>,
}

#[async_trait]
impl BrokerSubscription for InMemorySubscription {
    async fn recv(&mut self) -> Option<BrokerMessage> {
        loop {
            match self.rx.recv().await {
                Ok(msg) if glob_match(&self.pattern, &msg.channel) => return Some(msg),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rpush_brpoplpush_moves_value_atomically() {
        let broker = InMemoryBroker::new();
        broker.rpush("ready", "task-1".into()).await.unwrap();
        let moved = broker
            .brpoplpush("ready", "in_flight", Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(moved.as_deref(), Some("task-1"));
        assert_eq!(broker.llen("ready").await.unwrap(), 0);
        assert_eq!(broker.llen("in_flight").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn brpoplpush_times_out_on_empty_source() {
        let broker = InMemoryBroker::new();
        let moved = broker
            .brpoplpush("empty", "dest", Duration::from_millis(30))
            .await
            .unwrap();
        assert!(moved.is_none());
    }

    #[tokio::test]
    async fn zrangebyscore_filters_inclusive_range() {
        let broker = InMemoryBroker::new();
        broker.zadd("z", "a", 1.0).await.unwrap();
        broker.zadd("z", "b", 5.0).await.unwrap();
        broker.zadd("z", "c", 10.0).await.unwrap();
        let members = broker.zrangebyscore("z", 1.0, 5.0).await.unwrap();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn hincrby_accumulates() {
        let broker = InMemoryBroker::new();
        broker.hincrby("h", "count", 3).await.unwrap();
        let total = broker.hincrby("h", "count", 4).await.unwrap();
        assert_eq!(total, 7);
    }

    #[tokio::test]
    async fn keys_glob_matches_wildcard() {
        let broker = InMemoryBroker::new();
        broker.rpush("queue:agent-a:p:4", "x".into()).await.unwrap();
        broker.rpush("queue:agent-b:p:2", "y".into()).await.unwrap();
        let mut matched = broker.keys("queue:*").await.unwrap();
        matched.sort();
        assert_eq!(matched, vec!["queue:agent-a:p:4".to_string(), "queue:agent-b:p:2".to_string()]);
    }

    #[tokio::test]
    async fn psubscribe_only_delivers_matching_channels() {
        let broker = InMemoryBroker::new();
        let mut sub = broker.psubscribe("hooks:*").await.unwrap();
        broker.publish("other:channel", "ignored".into()).await.unwrap();
        broker.publish("hooks:changed", "payload".into()).await.unwrap();
        let msg = sub.recv().await.unwrap();
        assert_eq!(msg.channel, "hooks:changed");
        assert_eq!(msg.payload, "payload");
    }
}
