//! The Mapper: turns a partition's token list into key/value pairs of
//! sorted letters to word.

use std::sync::Arc;

use async_trait::async_trait;
use snafu::{ResultExt, Snafu};

use data_types::MappedPair;
use message_bus::{topics, BusMessage, MessageBus, MessageHandler};
use text_prep::{pre_process_word, sorted_letters};

/// Mapper error.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum Error {
    #[snafu(display("malformed map payload: {source}"))]
    MalformedPayload { source: serde_json::Error },

    #[snafu(display("error encoding mapped pairs: {source}"))]
    EncodePayload { source: serde_json::Error },

    #[snafu(display("error publishing mapped pairs: {source}"))]
    Publish { source: message_bus::BusError },
}

/// Handles one Map message per invocation: pre-processes every token, keys
/// the survivors by their sorted letters, and forwards the pair list in a
/// single Combine message that preserves all attributes.
///
/// Tokens rejected by pre-processing are dropped; duplicates are not: the
/// Combiner and Reducer own deduplication.
#[derive(Debug)]
pub struct Mapper {
    bus: Arc<dyn MessageBus>,
}

impl Mapper {
    /// Create a mapper publishing to the given bus.
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl MessageHandler for Mapper {
    type Error = Error;

    async fn handle(&self, message: BusMessage) -> Result<(), Self::Error> {
        let tokens: Vec<String> =
            serde_json::from_slice(message.payload()).context(MalformedPayloadSnafu)?;

        let pairs: Vec<MappedPair> = tokens
            .iter()
            .filter_map(|token| {
                let word = pre_process_word(token)?;
                Some(MappedPair::new(sorted_letters(&word), word))
            })
            .collect();

        let payload = serde_json::to_vec(&pairs).context(EncodePayloadSnafu)?;
        self.bus
            .publish(
                topics::COMBINER,
                BusMessage::new(payload, message.attributes().clone()),
            )
            .await
            .context(PublishSnafu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_types::ATTR_PARTITION_ID;
    use message_bus::MemoryBus;
    use std::collections::BTreeMap;

    fn map_message(tokens: &[&str]) -> BusMessage {
        BusMessage::new(
            serde_json::to_vec(tokens).unwrap(),
            BTreeMap::from([(ATTR_PARTITION_ID.to_string(), "p-1".to_string())]),
        )
    }

    async fn run_mapper(tokens: &[&str]) -> (Vec<MappedPair>, BusMessage) {
        let bus = Arc::new(MemoryBus::new());
        let mapper = Mapper::new(Arc::clone(&bus) as _);
        mapper.handle(map_message(tokens)).await.unwrap();

        let mut published = bus.drain_topic(topics::COMBINER);
        assert_eq!(published.len(), 1);
        let message = published.remove(0);
        let pairs = serde_json::from_slice(message.payload()).unwrap();
        (pairs, message)
    }

    #[tokio::test]
    async fn maps_tokens_to_sorted_letter_pairs() {
        let (pairs, message) =
            run_mapper(&["the", "quick", "brown", "fox", "quick"]).await;

        // "the" is a stopword; the duplicate "quick" is preserved
        assert_eq!(pairs.len(), 4);
        for expected in [
            MappedPair::new("cikqu", "quick"),
            MappedPair::new("bnorw", "brown"),
            MappedPair::new("fox", "fox"),
        ] {
            assert!(pairs.contains(&expected), "missing {expected:?}");
        }
        assert_eq!(
            pairs
                .iter()
                .filter(|p| p.sorted_word == "cikqu")
                .count(),
            2
        );

        // attributes ride through unchanged
        assert_eq!(message.attribute(ATTR_PARTITION_ID), Some("p-1"));
    }

    #[tokio::test]
    async fn sort_key_matches_every_anagram() {
        let (pairs, _) = run_mapper(&["race", "care", "trap", "part"]).await;
        for pair in pairs {
            for word in &pair.anagrams {
                assert_eq!(sorted_letters(word), pair.sorted_word);
            }
        }
    }

    #[tokio::test]
    async fn rejected_tokens_produce_no_pairs() {
        let (pairs, _) = run_mapper(&["the", "would've", "a1b2", "..."]).await;
        assert!(pairs.is_empty());
    }

    #[tokio::test]
    async fn empty_partition_still_flows_downstream() {
        let (pairs, message) = run_mapper(&[]).await;
        assert!(pairs.is_empty());
        assert_eq!(message.attribute(ATTR_PARTITION_ID), Some("p-1"));
    }
}
