use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::client::{Broker, BrokerMessage, BrokerSubscription};
use crate::error::BrokerError;

/// Production broker backed by a real Redis server, reached through
/// `ConnectionManager` so transient drops reconnect transparently instead
/// of surfacing as hard failures on every call.
#[derive(Clone)]
pub struct RedisBroker {
    conn: ConnectionManager,
    client: redis::Client,
}

impl RedisBroker {
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        let client = redis::Client::open(url).map_err(BrokerError::Redis)?;
        let conn = client.get_connection_manager().await.map_err(BrokerError::Redis)?;
        Ok(Self { conn, client })
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn rpush(&self, key: &str, value: String) -> Result<i64, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.rpush(key, value).await?)
    }

    async fn lpush(&self, key: &str, value: String) -> Result<i64, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.lpush(key, value).await?)
    }

    async fn lrem(&self, key: &str, count: i64, value: &str) -> Result<i64, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.lrem(key, count, value).await?)
    }

    async fn llen(&self, key: &str) -> Result<i64, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.llen(key).await?)
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.lrange(key, start, stop).await?)
    }

    async fn brpoplpush(
        &self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> Result<Option<String>, BrokerError> {
        let mut conn = self.conn.clone();
        let secs = timeout.as_secs_f64();
        let result: Option<String> = conn.brpoplpush(source, destination, secs).await?;
        Ok(result)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let _: () = conn.zadd(key, member, score).await?;
        Ok(())
    }

    async fn zrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.zrange(key, start, stop).await?)
    }

    async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.zrangebyscore(key, min, max).await?)
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<i64, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.zrem(key, member).await?)
    }

    async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<i64, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.zrembyscore(key, min, max).await?)
    }

    async fn zcard(&self, key: &str) -> Result<i64, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.zcard(key).await?)
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.zscore(key, member).await?)
    }

    async fn hset(&self, key: &str, field: &str, value: String) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.hget(key, field).await?)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.hgetall(key).await?)
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.hincr(key, field, delta).await?)
    }

    async fn hincrbyfloat(&self, key: &str, field: &str, delta: f64) -> Result<f64, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.hincr(key, field, delta).await?)
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<i64, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.hdel(key, field).await?)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<i64, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.sadd(key, member).await?)
    }

    async fn scard(&self, key: &str) -> Result<i64, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.scard(key).await?)
    }

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let _: () = conn.expire(key, ttl.as_secs() as i64).await?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.keys(pattern).await?)
    }

    async fn del(&self, key: &str) -> Result<i64, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.del(key).await?)
    }

    async fn publish(&self, channel: &str, payload: String) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let _: () = conn.publish(channel, payload).await?;
        Ok(())
    }

    async fn psubscribe(&self, pattern: &str) -> Result<Box<dyn BrokerSubscription>, BrokerError> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(BrokerError::Redis)?;
        pubsub.psubscribe(pattern).await.map_err(BrokerError::Redis)?;

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(async move {
            use futures::StreamExt;
            let mut stream = pubsub.into_on_message();
            while let Some(msg) = stream.next().await {
                let channel = msg.get_channel_name().to_string();
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                if tx.send(BrokerMessage { channel, payload }).await.is_err() {
                    break;
                }
            }
        });

        Ok(Box::new(RedisSubscription { rx }))
    }
}

struct RedisSubscription {
    rx: mpsc::Receiver<BrokerMessage>,
}

#[async_trait]
impl BrokerSubscription for RedisSubscription {
    async fn recv(&mut self) -> Option<BrokerMessage> {
        self.rx.recv().await
    }
}
