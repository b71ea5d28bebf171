//! In-process implementation of the bus, used by tests and by
//! single-machine deployments where every stage runs in one process.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{
    BusError, BusMessage, BusSubscription, DeliveredMessage, DeliveryLease, MessageBus,
};

/// A bus backed by per-topic in-memory queues.
///
/// Topics are created on first use. Delivery is at-least-once: a nacked
/// lease pushes the message back onto its topic queue, where the next
/// `next()` call picks it up again.
#[derive(Debug, Default)]
pub struct MemoryBus {
    topics: Mutex<HashMap<String, Arc<TopicQueue>>>,
}

#[derive(Debug, Default)]
struct TopicQueue {
    queue: Mutex<VecDeque<BusMessage>>,
    notify: Notify,
}

impl TopicQueue {
    fn push(&self, message: BusMessage) {
        self.queue.lock().push_back(message);
        self.notify.notify_one();
    }
}

impl MemoryBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn topic(&self, topic: &str) -> Arc<TopicQueue> {
        Arc::clone(
            self.topics
                .lock()
                .entry(topic.to_string())
                .or_default(),
        )
    }

    /// Snapshot of the messages currently queued on `topic`, in delivery
    /// order. Intended for tests.
    pub fn queued_messages(&self, topic: &str) -> Vec<BusMessage> {
        self.topic(topic).queue.lock().iter().cloned().collect()
    }

    /// Remove and return all messages currently queued on `topic`.
    /// Intended for tests.
    pub fn drain_topic(&self, topic: &str) -> Vec<BusMessage> {
        self.topic(topic).queue.lock().drain(..).collect()
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, topic: &str, message: BusMessage) -> Result<(), BusError> {
        self.topic(topic).push(message);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn BusSubscription>, BusError> {
        Ok(Box::new(MemorySubscription {
            topic: self.topic(topic),
        }))
    }

    fn type_name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Debug)]
struct MemorySubscription {
    topic: Arc<TopicQueue>,
}

#[async_trait]
impl BusSubscription for MemorySubscription {
    async fn next(&mut self) -> Option<DeliveredMessage> {
        loop {
            if let Some(message) = self.topic.queue.lock().pop_front() {
                let lease = MemoryLease {
                    topic: Arc::clone(&self.topic),
                };
                return Some(DeliveredMessage::new(message, Box::new(lease)));
            }
            self.topic.notify.notified().await;
        }
    }
}

#[derive(Debug)]
struct MemoryLease {
    topic: Arc<TopicQueue>,
}

impl DeliveryLease for MemoryLease {
    fn ack(self: Box<Self>) {}

    fn nack(self: Box<Self>, message: BusMessage) {
        self.topic.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use test_helpers::FutureTimeout;

    fn message(payload: &str) -> BusMessage {
        BusMessage::new(
            payload.as_bytes().to_vec(),
            BTreeMap::from([("outputBucket".to_string(), "out".to_string())]),
        )
    }

    #[tokio::test]
    async fn publish_then_subscribe_delivers() {
        let bus = MemoryBus::new();
        bus.publish("t", message("hello")).await.unwrap();

        let mut subscription = bus.subscribe("t").await.unwrap();
        let delivered = subscription
            .next()
            .with_timeout_panic(Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(delivered.message().payload(), b"hello");
        assert_eq!(delivered.message().attribute("outputBucket"), Some("out"));
        delivered.ack();

        assert!(bus.queued_messages("t").is_empty());
    }

    #[tokio::test]
    async fn each_message_is_leased_once() {
        let bus = MemoryBus::new();
        bus.publish("t", message("a")).await.unwrap();
        bus.publish("t", message("b")).await.unwrap();

        let mut sub = bus.subscribe("t").await.unwrap();
        let first = sub.next().with_timeout_panic(Duration::from_secs(1)).await.unwrap();
        let second = sub.next().with_timeout_panic(Duration::from_secs(1)).await.unwrap();

        assert_eq!(first.message().payload(), b"a");
        assert_eq!(second.message().payload(), b"b");
        assert!(bus.queued_messages("t").is_empty());
        first.ack();
        second.ack();
    }

    #[tokio::test]
    async fn nack_returns_message_to_topic() {
        let bus = MemoryBus::new();
        bus.publish("t", message("again")).await.unwrap();

        let mut sub = bus.subscribe("t").await.unwrap();
        let delivered = sub.next().with_timeout_panic(Duration::from_secs(1)).await.unwrap();
        delivered.nack();

        let redelivered = sub.next().with_timeout_panic(Duration::from_secs(1)).await.unwrap();
        assert_eq!(redelivered.message().payload(), b"again");
        redelivered.ack();
    }

    #[tokio::test]
    async fn subscriber_wakes_on_later_publish() {
        let bus = Arc::new(MemoryBus::new());
        let mut sub = bus.subscribe("t").await.unwrap();

        let publisher = Arc::clone(&bus);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            publisher.publish("t", message("late")).await.unwrap();
        });

        let delivered = sub
            .next()
            .with_timeout_panic(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(delivered.message().payload(), b"late");
        delivered.ack();
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = MemoryBus::new();
        bus.publish("a", message("for-a")).await.unwrap();

        assert_eq!(bus.queued_messages("a").len(), 1);
        assert!(bus.queued_messages("b").is_empty());
    }
}
