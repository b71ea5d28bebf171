//! The message bus contract that binds the pipeline stages together, plus an
//! in-memory implementation and the dispatch loop that drives stage handlers
//! off subscriptions.
//!
//! The bus is topic-scoped publish/subscribe with at-least-once delivery and
//! no ordering guarantees across messages. Payloads are opaque bytes; every
//! message additionally carries a string-to-string attribute map.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::future_not_send,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use observability_deps::tracing::warn;
use tokio_util::sync::CancellationToken;

mod memory;
pub use memory::MemoryBus;

/// Well-known topic names, one per pipeline stage.
pub mod topics {
    /// Split messages, published by the Starter.
    pub const SPLITTER: &str = "mapreduce-splitter";
    /// Map messages, published by the Splitter.
    pub const MAPPER: &str = "mapreduce-mapper";
    /// Combine messages, published by the Mapper.
    pub const COMBINER: &str = "mapreduce-combiner";
    /// Shuffle messages, published by the Combiner.
    pub const SHUFFLER: &str = "mapreduce-shuffler";
    /// Reduce messages, published by the Controller.
    pub const REDUCER: &str = "mapreduce-reducer";
    /// Control events, published by the Splitter and the Shuffler.
    pub const CONTROLLER: &str = "mapreduce-controller";
}

/// Ceiling on the payload size of a single message. The Splitter caps its
/// partitions at this size so every downstream message fits in one publish.
pub const MAX_MESSAGE_SIZE_BYTES: usize = 50_000;

/// Number of queued messages that forces a publish batch to be flushed.
pub const MAX_MESSAGE_COUNT: usize = 100;

/// Longest a publish batch may linger before being flushed.
pub const MAX_MESSAGE_DELAY: Duration = Duration::from_millis(50);

/// Generic boxed error type that is used in this crate.
///
/// The dynamic boxing makes it easier to deal with errors from different
/// implementations.
#[derive(Debug)]
pub struct BusError {
    inner: Box<dyn std::error::Error + Sync + Send>,
    kind: BusErrorKind,
}

impl BusError {
    /// Construct an error of the given kind.
    pub fn new(
        kind: BusErrorKind,
        e: impl Into<Box<dyn std::error::Error + Sync + Send>>,
    ) -> Self {
        Self {
            inner: e.into(),
            kind,
        }
    }

    /// The operation was provided with invalid input data.
    pub fn invalid_input(e: impl Into<Box<dyn std::error::Error + Sync + Send>>) -> Self {
        Self::new(BusErrorKind::InvalidInput, e)
    }

    /// The operation encountered data it could not interpret.
    pub fn invalid_data(e: impl Into<Box<dyn std::error::Error + Sync + Send>>) -> Self {
        Self::new(BusErrorKind::InvalidData, e)
    }

    /// The operation failed for an unclassified reason.
    pub fn unknown(e: impl Into<Box<dyn std::error::Error + Sync + Send>>) -> Self {
        Self::new(BusErrorKind::Unknown, e)
    }

    /// Returns the kind of error this was.
    pub fn kind(&self) -> BusErrorKind {
        self.kind
    }

    /// Returns the inner error.
    pub fn inner(&self) -> &dyn std::error::Error {
        self.inner.as_ref()
    }
}

impl Display for BusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "BusError({:?}): {}", self.kind, self.inner)
    }
}

impl std::error::Error for BusError {}

impl From<std::io::Error> for BusError {
    fn from(e: std::io::Error) -> Self {
        Self {
            inner: Box::new(e),
            kind: BusErrorKind::IO,
        }
    }
}

impl From<String> for BusError {
    fn from(e: String) -> Self {
        Self {
            inner: e.into(),
            kind: BusErrorKind::Unknown,
        }
    }
}

impl From<&'static str> for BusError {
    fn from(e: &'static str) -> Self {
        Self {
            inner: e.into(),
            kind: BusErrorKind::Unknown,
        }
    }
}

/// Classification of a [`BusError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BusErrorKind {
    /// This operation failed for an unknown reason.
    Unknown,

    /// This operation was provided with invalid input data.
    InvalidInput,

    /// This operation encountered invalid data.
    InvalidData,

    /// A fatal IO error occurred - non-fatal errors should be retried internally.
    IO,
}

/// One message on the bus: an opaque payload plus string attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusMessage {
    payload: Bytes,
    attributes: BTreeMap<String, String>,
}

impl BusMessage {
    /// Create a message from a payload and attribute map.
    pub fn new(payload: impl Into<Bytes>, attributes: BTreeMap<String, String>) -> Self {
        Self {
            payload: payload.into(),
            attributes,
        }
    }

    /// The message payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// All attributes riding on the message.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Look up a single attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Publish side of the bus.
///
/// `publish` resolves only once the message is acknowledged by the
/// transport, i.e. after return the message is durably queued and no longer
/// buffered by the publisher.
#[async_trait]
pub trait MessageBus: Debug + Send + Sync + 'static {
    /// Publish `message` to `topic` and await the acknowledgement.
    async fn publish(&self, topic: &str, message: BusMessage) -> Result<(), BusError>;

    /// Open a subscription on `topic`.
    ///
    /// Subscriptions on the same topic compete for messages: each queued
    /// message is leased to exactly one subscriber at a time, and returns to
    /// the topic if the lease is nacked.
    async fn subscribe(&self, topic: &str) -> Result<Box<dyn BusSubscription>, BusError>;

    /// Return type (like `"memory"` or `"pubsub"`) of this bus.
    fn type_name(&self) -> &'static str;
}

/// Consume side of one topic subscription.
#[async_trait]
pub trait BusSubscription: Debug + Send {
    /// Await the next message leased to this subscription.
    ///
    /// Returns `None` once the subscription is closed and fully drained.
    async fn next(&mut self) -> Option<DeliveredMessage>;
}

/// Transport-specific settlement of one delivered message.
pub trait DeliveryLease: Debug + Send {
    /// Settle positively; the message will not be redelivered.
    fn ack(self: Box<Self>);

    /// Return `message` to the topic for redelivery.
    fn nack(self: Box<Self>, message: BusMessage);
}

/// A message leased from a subscription.
///
/// At-least-once delivery: processing must end in [`ack`](Self::ack) or
/// [`nack`](Self::nack).
#[derive(Debug)]
pub struct DeliveredMessage {
    message: BusMessage,
    lease: Box<dyn DeliveryLease>,
}

impl DeliveredMessage {
    /// Pair a message with the lease that settles it.
    pub fn new(message: BusMessage, lease: Box<dyn DeliveryLease>) -> Self {
        Self { message, lease }
    }

    /// The leased message.
    pub fn message(&self) -> &BusMessage {
        &self.message
    }

    /// Settle positively.
    pub fn ack(self) {
        self.lease.ack();
    }

    /// Return the message to the topic for redelivery.
    pub fn nack(self) {
        self.lease.nack(self.message);
    }
}

/// A stage worker invoked once per delivered message.
///
/// Handlers hold no per-invocation state; everything they need rides in the
/// message payload and attributes, or in the clients they were constructed
/// with.
#[async_trait]
pub trait MessageHandler: Debug + Send + Sync {
    /// Error surfaced to the dispatch loop; triggers redelivery.
    type Error: std::error::Error + Send;

    /// Process one message.
    async fn handle(&self, message: BusMessage) -> Result<(), Self::Error>;
}

/// Drive `handler` off `subscription` until `shutdown` fires or the
/// subscription closes.
///
/// Messages are processed one at a time, in lease order: a handler error is
/// logged and the message is nacked back onto the topic, anything else is
/// acked. Running a single dispatch loop per topic therefore also serializes
/// all invocations of that topic's handler.
pub async fn dispatch<H>(
    mut subscription: Box<dyn BusSubscription>,
    handler: Arc<H>,
    shutdown: CancellationToken,
) where
    H: MessageHandler,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            delivered = subscription.next() => {
                let Some(delivered) = delivered else { break };
                match handler.handle(delivered.message().clone()).await {
                    Ok(()) => delivered.ack(),
                    Err(e) => {
                        warn!(error=%e, "stage handler failed; message returns to the topic");
                        delivered.nack();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use test_helpers::FutureTimeout;

    #[derive(Debug)]
    struct FlakyHandler {
        calls: AtomicUsize,
        done: tokio::sync::Notify,
    }

    #[async_trait]
    impl MessageHandler for FlakyHandler {
        type Error = std::io::Error;

        async fn handle(&self, _message: BusMessage) -> Result<(), Self::Error> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "transient"));
            }
            self.done.notify_one();
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatch_redelivers_after_handler_error() {
        let bus = Arc::new(MemoryBus::new());
        bus.publish("topic", BusMessage::new(&b"payload"[..], BTreeMap::new()))
            .await
            .unwrap();

        let handler = Arc::new(FlakyHandler {
            calls: AtomicUsize::new(0),
            done: tokio::sync::Notify::new(),
        });
        let shutdown = CancellationToken::new();

        let subscription = bus.subscribe("topic").await.unwrap();
        let task = tokio::spawn(dispatch(
            subscription,
            Arc::clone(&handler),
            shutdown.clone(),
        ));

        handler
            .done
            .notified()
            .with_timeout_panic(Duration::from_secs(5))
            .await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);

        shutdown.cancel();
        task.with_timeout_panic(Duration::from_secs(5))
            .await
            .unwrap();
    }
}
