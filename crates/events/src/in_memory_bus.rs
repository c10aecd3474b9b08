//! In-memory pub/sub bus for tests/dev.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::bus::{BusError, MessageBus, Subscription};

/// In-memory topic bus.
///
/// - No IO
/// - Best-effort fan-out per topic
/// - Messages published to a topic without subscribers are dropped (like Redis pub/sub)
#[derive(Debug)]
pub struct InMemoryMessageBus<M> {
    topics: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<M>>>>,
}

impl<M> InMemoryMessageBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .map(|t| t.get(topic).map_or(0, |subs| subs.iter().filter(|s| !s.is_closed()).count()))
            .unwrap_or(0)
    }
}

impl<M> Default for InMemoryMessageBus<M> {
    fn default() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<M> MessageBus<M> for InMemoryMessageBus<M>
where
    M: Clone + Send + 'static,
{
    async fn publish(&self, topic: &str, message: M) -> Result<(), BusError> {
        let mut topics = self.topics.lock().map_err(|_| BusError::Poisoned)?;

        if let Some(subs) = topics.get_mut(topic) {
            // Drop any dead subscribers while publishing.
            subs.retain(|tx| tx.send(message.clone()).is_ok());
        }

        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription<M>, BusError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut topics = self.topics.lock().map_err(|_| BusError::Poisoned)?;
        topics.entry(topic.to_string()).or_default().push(tx);
        Ok(Subscription::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fans_out_to_every_subscriber_of_a_topic() {
        let bus = InMemoryMessageBus::<String>::new();
        let mut a = bus.subscribe("inbound").await.unwrap();
        let mut b = bus.subscribe("inbound").await.unwrap();
        let mut other = bus.subscribe("outbound").await.unwrap();

        bus.publish("inbound", "hello".to_string()).await.unwrap();

        assert_eq!(a.recv().await.as_deref(), Some("hello"));
        assert_eq!(b.recv().await.as_deref(), Some("hello"));
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_dropped() {
        let bus = InMemoryMessageBus::<String>::new();
        bus.publish("inbound", "lost".to_string()).await.unwrap();

        let mut late = bus.subscribe("inbound").await.unwrap();
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_subscriptions_are_pruned() {
        let bus = InMemoryMessageBus::<u32>::new();
        let sub = bus.subscribe("t").await.unwrap();
        assert_eq!(bus.subscriber_count("t"), 1);

        drop(sub);
        bus.publish("t", 1).await.unwrap();
        assert_eq!(bus.subscriber_count("t"), 0);
    }
}
