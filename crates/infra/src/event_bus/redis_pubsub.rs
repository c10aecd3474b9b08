//! Redis pub/sub-backed message bus (optional).
//!
//! Note: Redis pub/sub is not durable (messages are dropped if nobody is subscribed).
//! That matches the chat gateway's own delivery guarantees; payloads are carried as
//! raw strings and decoded by the consumer.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use dbtc_events::{BusError, MessageBus, Subscription};

/// Redis pub/sub bus for string payloads.
///
/// Publishing shares one multiplexed connection; every subscription gets its own
/// pub/sub connection and a forwarding task.
#[derive(Debug, Clone)]
pub struct RedisPubSubBus {
    client: redis::Client,
    connection: Arc<Mutex<Option<MultiplexedConnection>>>,
}

impl RedisPubSubBus {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, BusError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| BusError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            connection: Arc::new(Mutex::new(None)),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, BusError> {
        let mut guard = self.connection.lock().await;
        if let Some(connection) = guard.as_ref() {
            return Ok(connection.clone());
        }
        let connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
        *guard = Some(connection.clone());
        Ok(connection)
    }
}

#[async_trait]
impl MessageBus<String> for RedisPubSubBus {
    async fn publish(&self, topic: &str, message: String) -> Result<(), BusError> {
        let mut connection = self.connection().await?;
        let result: redis::RedisResult<i64> = redis::cmd("PUBLISH")
            .arg(topic)
            .arg(message)
            .query_async(&mut connection)
            .await;

        match result {
            Ok(receivers) => {
                debug!(topic, receivers, "published");
                Ok(())
            }
            Err(e) => {
                // Reconnect on next publish.
                *self.connection.lock().await = None;
                Err(BusError::Publish(e.to_string()))
            }
        }
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription<String>, BusError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
        pubsub
            .subscribe(topic)
            .await
            .map_err(|e| BusError::Subscribe(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let topic = topic.to_string();

        // Forward until the subscriber goes away or the connection drops.
        tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            while let Some(msg) = messages.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(%topic, error = %e, "dropping non-string pub/sub payload");
                        continue;
                    }
                };
                if tx.send(payload).is_err() {
                    return;
                }
            }
            warn!(%topic, "pub/sub connection closed");
        });

        Ok(Subscription::new(rx))
    }
}
