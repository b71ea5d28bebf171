//! The Splitter: reads one input object, strips Gutenberg boilerplate,
//! deduplicates the lowercased tokens and fans the result out to the Mapper
//! in message-sized partitions.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use observability_deps::tracing::debug;
use snafu::{ResultExt, Snafu};

use bucket_store::BucketStore;
use data_types::{ControlEvent, ControlStatus, PartitionId, SplitRequest, ATTR_PARTITION_ID};
use message_bus::{topics, BusMessage, MessageBus, MessageHandler, MAX_MESSAGE_SIZE_BYTES};

/// Splitter error.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum Error {
    #[snafu(display("malformed split payload: {source}"))]
    MalformedPayload { source: serde_json::Error },

    #[snafu(display("error reading input object: {source}"))]
    ReadObject { source: bucket_store::Error },

    #[snafu(display("error encoding message payload: {source}"))]
    EncodePayload { source: serde_json::Error },

    #[snafu(display("error publishing partition: {source}"))]
    Publish { source: message_bus::BusError },
}

/// Handles one Split message per invocation.
///
/// Failure anywhere in the read/strip/publish sequence surfaces to the
/// dispatcher, which returns the Split message to the bus; no `started`
/// event and no Map message of a failed invocation are retracted, which is
/// safe because duplicate `started` events are set-idempotent downstream.
#[derive(Debug)]
pub struct Splitter {
    store: Arc<dyn BucketStore>,
    bus: Arc<dyn MessageBus>,
}

impl Splitter {
    /// Create a splitter over the given storage and bus clients.
    pub fn new(store: Arc<dyn BucketStore>, bus: Arc<dyn MessageBus>) -> Self {
        Self { store, bus }
    }

    /// Publish one partition: the `started` control event is acknowledged
    /// strictly before the Map message is handed to the bus, so the
    /// Controller can never see a `finished` for a partition whose
    /// `started` was never sent.
    async fn publish_partition(
        &self,
        partition: &[String],
        mut attributes: std::collections::BTreeMap<String, String>,
    ) -> Result<(), Error> {
        let partition_id = PartitionId::new();
        attributes.insert(ATTR_PARTITION_ID.to_string(), partition_id.to_string());

        let started = ControlEvent {
            id: partition_id.to_string(),
            status: ControlStatus::Started,
        };
        let payload = serde_json::to_vec(&started).context(EncodePayloadSnafu)?;
        self.bus
            .publish(
                topics::CONTROLLER,
                BusMessage::new(payload, attributes.clone()),
            )
            .await
            .context(PublishSnafu)?;

        let payload = serde_json::to_vec(&partition).context(EncodePayloadSnafu)?;
        self.bus
            .publish(topics::MAPPER, BusMessage::new(payload, attributes))
            .await
            .context(PublishSnafu)
    }
}

#[async_trait]
impl MessageHandler for Splitter {
    type Error = Error;

    async fn handle(&self, message: BusMessage) -> Result<(), Self::Error> {
        let request: SplitRequest =
            serde_json::from_slice(message.payload()).context(MalformedPayloadSnafu)?;

        let data = self
            .store
            .read_object(&request.bucket_name, &request.file_name)
            .await
            .context(ReadObjectSnafu)?;
        let text = String::from_utf8_lossy(&data);
        let body = text_prep::gutenberg::strip_header_and_footer(&text);

        let tokens = dedupe_lowercase(body);
        let partitions = partition_tokens(tokens, MAX_MESSAGE_SIZE_BYTES);
        debug!(
            file = %request.file_name,
            partitions = partitions.len(),
            "split input object"
        );

        try_join_all(partitions.iter().map(|partition| {
            self.publish_partition(partition, message.attributes().clone())
        }))
        .await?;
        Ok(())
    }
}

/// Lowercase all whitespace-separated tokens of `text` and keep one
/// occurrence of each.
///
/// Processing each distinct lowercased token once per file is sufficient
/// because the final output has set semantics per key; the order of the
/// surviving tokens is unspecified.
fn dedupe_lowercase(text: &str) -> Vec<String> {
    let unique: HashSet<String> = text
        .split_whitespace()
        .map(|token| token.to_lowercase())
        .collect();
    unique.into_iter().collect()
}

/// Slice `tokens` into ⌈size/max_bytes⌉ partitions of ⌈len/partitions⌉
/// tokens each, where size is the summed UTF-8 length of the tokens. The
/// final partition may be shorter; at most `max_bytes` of token bytes end
/// up in each partition's message.
fn partition_tokens(tokens: Vec<String>, max_bytes: usize) -> Vec<Vec<String>> {
    if tokens.is_empty() {
        return vec![];
    }
    let size: usize = tokens.iter().map(|t| t.len()).sum();
    let partitions = if size > max_bytes {
        (size + max_bytes - 1) / max_bytes
    } else {
        1
    };
    let chunk = (tokens.len() + partitions - 1) / partitions;
    tokens.chunks(chunk).map(<[String]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use bucket_store::InMemoryBuckets;
    use bytes::Bytes;
    use data_types::ATTR_OUTPUT_BUCKET;
    use message_bus::MemoryBus;
    use std::collections::BTreeMap;

    const BOOK: &str = "\
The Project Gutenberg EBook of Testing\n\
*** START OF THE PROJECT GUTENBERG EBOOK TESTING ***\n\
The Quick brown fox jumps over the quick dog\n\
End of the Project Gutenberg EBook of Testing\n";

    fn split_message() -> BusMessage {
        let request = SplitRequest {
            bucket_name: "in".to_string(),
            file_name: "book.txt".to_string(),
        };
        BusMessage::new(
            serde_json::to_vec(&request).unwrap(),
            BTreeMap::from([(ATTR_OUTPUT_BUCKET.to_string(), "out".to_string())]),
        )
    }

    async fn fixture() -> (Arc<InMemoryBuckets>, Arc<MemoryBus>, Splitter) {
        let store = Arc::new(InMemoryBuckets::new());
        store.create_bucket("in");
        store
            .write_object("in", "book.txt", Bytes::from(BOOK.as_bytes().to_vec()))
            .await
            .unwrap();
        let bus = Arc::new(MemoryBus::new());
        let splitter = Splitter::new(Arc::clone(&store) as _, Arc::clone(&bus) as _);
        (store, bus, splitter)
    }

    #[tokio::test]
    async fn publishes_deduped_tokens_and_started_event() {
        let (_store, bus, splitter) = fixture().await;
        splitter.handle(split_message()).await.unwrap();

        let mapped = bus.drain_topic(topics::MAPPER);
        assert_eq!(mapped.len(), 1);
        let mut tokens: Vec<String> = serde_json::from_slice(mapped[0].payload()).unwrap();
        tokens.sort();
        // boilerplate is stripped, tokens are lowercased and deduplicated
        assert_eq!(
            tokens,
            vec!["brown", "dog", "fox", "jumps", "over", "quick", "the"]
        );
        assert_eq!(mapped[0].attribute(ATTR_OUTPUT_BUCKET), Some("out"));

        let control = bus.drain_topic(topics::CONTROLLER);
        assert_eq!(control.len(), 1);
        let event: ControlEvent = serde_json::from_slice(control[0].payload()).unwrap();
        assert_eq!(event.status, ControlStatus::Started);
        // the same partition ID rides on both messages and in the event
        let partition_id = mapped[0].attribute(ATTR_PARTITION_ID).unwrap();
        assert_eq!(control[0].attribute(ATTR_PARTITION_ID), Some(partition_id));
        assert_eq!(event.id, partition_id);
    }

    #[tokio::test]
    async fn read_failure_publishes_nothing() {
        let (store, bus, splitter) = fixture().await;
        let request = SplitRequest {
            bucket_name: "in".to_string(),
            file_name: "missing.txt".to_string(),
        };
        let message = BusMessage::new(serde_json::to_vec(&request).unwrap(), BTreeMap::new());

        assert_matches!(
            splitter.handle(message).await,
            Err(Error::ReadObject { .. })
        );
        assert!(bus.queued_messages(topics::MAPPER).is_empty());
        assert!(bus.queued_messages(topics::CONTROLLER).is_empty());
        drop(store);
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected() {
        let (_store, _bus, splitter) = fixture().await;
        let message = BusMessage::new(&b"not json"[..], BTreeMap::new());
        assert_matches!(
            splitter.handle(message).await,
            Err(Error::MalformedPayload { .. })
        );
    }

    #[tokio::test]
    async fn empty_body_publishes_no_partitions() {
        let (store, bus, splitter) = fixture().await;
        store
            .write_object("in", "book.txt", Bytes::from_static(b"  \n\t "))
            .await
            .unwrap();

        splitter.handle(split_message()).await.unwrap();
        assert!(bus.queued_messages(topics::MAPPER).is_empty());
        assert!(bus.queued_messages(topics::CONTROLLER).is_empty());
    }

    #[test]
    fn small_input_is_a_single_partition() {
        let tokens = vec!["alpha".to_string(), "beta".to_string()];
        let partitions = partition_tokens(tokens.clone(), 50);
        assert_eq!(partitions, vec![tokens]);
    }

    #[test]
    fn oversized_input_splits_by_byte_size() {
        // 6 tokens x 10 bytes = 60 bytes, cap 25 => ceil(60/25) = 3
        // partitions of ceil(6/3) = 2 tokens each
        let tokens: Vec<String> = (0..6).map(|i| format!("token-{i:03}")).collect();
        let partitions = partition_tokens(tokens.clone(), 25);
        assert_eq!(partitions.len(), 3);
        assert!(partitions.iter().all(|p| p.len() == 2));
        assert_eq!(partitions.concat(), tokens);
    }

    #[test]
    fn final_partition_may_be_shorter() {
        // 5 tokens x 10 bytes = 50 bytes, cap 20 => 3 partitions of
        // ceil(5/3) = 2, so the last one holds the single leftover token
        let tokens: Vec<String> = (0..5).map(|i| format!("token-{i:03}")).collect();
        let partitions = partition_tokens(tokens.clone(), 20);
        assert_eq!(partitions.len(), 3);
        assert_eq!(partitions[2].len(), 1);
        assert_eq!(partitions.concat(), tokens);
    }

    #[test]
    fn empty_token_list_yields_no_partitions() {
        assert!(partition_tokens(vec![], 100).is_empty());
    }
}
