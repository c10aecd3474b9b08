//! Message publishing/subscription abstraction (mechanics only).
//!
//! The chat gateway and the game talk over named topics on a pub/sub bus: the gateway
//! publishes every chat message to an inbound topic and relays whatever is published on
//! an outbound topic back to the chat service.
//!
//! ## Delivery
//!
//! - **At-most-once**: pub/sub is not durable; messages published while nobody is
//!   subscribed are gone. Transport reliability is explicitly not our concern.
//! - **Per-topic fan-out**: every subscription to a topic gets its own copy.
//! - **Ordering**: messages from one publisher arrive in publish order.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// A subscription to one topic.
///
/// Designed for a single consumer task. The subscription ends (`recv` returns `None`)
/// once the bus side drops its sender, e.g. because the connection closed.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: mpsc::UnboundedReceiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: mpsc::UnboundedReceiver<M>) -> Self {
        Self { receiver }
    }

    /// Wait for the next message. `None` means the feed has closed.
    pub async fn recv(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    /// Try to receive a message without waiting.
    pub fn try_recv(&mut self) -> Result<M, mpsc::error::TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Bus operation error.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus connection error: {0}")]
    Connection(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("subscribe failed: {0}")]
    Subscribe(String),

    #[error("bus state poisoned")]
    Poisoned,
}

/// Topic-addressed pub/sub bus.
///
/// Implementations: [`crate::InMemoryMessageBus`] for tests/dev and the Redis pub/sub
/// bus in `dbtc-infra`.
#[async_trait]
pub trait MessageBus<M>: Send + Sync
where
    M: Send + 'static,
{
    async fn publish(&self, topic: &str, message: M) -> Result<(), BusError>;

    async fn subscribe(&self, topic: &str) -> Result<Subscription<M>, BusError>;
}

#[async_trait]
impl<M, B> MessageBus<M> for Arc<B>
where
    M: Send + 'static,
    B: MessageBus<M> + ?Sized,
{
    async fn publish(&self, topic: &str, message: M) -> Result<(), BusError> {
        (**self).publish(topic, message).await
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription<M>, BusError> {
        (**self).subscribe(topic).await
    }
}
