//! The Combiner: a local merge of duplicate keys within one partition's
//! pair list, cutting the payload the Shuffler has to push into the K/V
//! shards.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use snafu::{ResultExt, Snafu};

use data_types::MappedPair;
use message_bus::{topics, BusMessage, MessageBus, MessageHandler};

/// Combiner error.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum Error {
    #[snafu(display("malformed combine payload: {source}"))]
    MalformedPayload { source: serde_json::Error },

    #[snafu(display("error encoding combined pairs: {source}"))]
    EncodePayload { source: serde_json::Error },

    #[snafu(display("error publishing combined pairs: {source}"))]
    Publish { source: message_bus::BusError },
}

/// Handles one Combine message per invocation: buckets pairs by sort key,
/// unioning the anagram sets, and forwards exactly one Shuffle message.
///
/// Purely an optimization; for each key the union of the output sets equals
/// the union of the input sets.
#[derive(Debug)]
pub struct Combiner {
    bus: Arc<dyn MessageBus>,
}

impl Combiner {
    /// Create a combiner publishing to the given bus.
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl MessageHandler for Combiner {
    type Error = Error;

    async fn handle(&self, message: BusMessage) -> Result<(), Self::Error> {
        let pairs: Vec<MappedPair> =
            serde_json::from_slice(message.payload()).context(MalformedPayloadSnafu)?;

        let mut combined: HashMap<String, HashSet<String>> = HashMap::new();
        for pair in pairs {
            combined
                .entry(pair.sorted_word)
                .or_default()
                .extend(pair.anagrams);
        }
        let combined: Vec<MappedPair> = combined
            .into_iter()
            .map(|(sorted_word, anagrams)| MappedPair {
                sorted_word,
                anagrams,
            })
            .collect();

        let payload = serde_json::to_vec(&combined).context(EncodePayloadSnafu)?;
        self.bus
            .publish(
                topics::SHUFFLER,
                BusMessage::new(payload, message.attributes().clone()),
            )
            .await
            .context(PublishSnafu)
    }
}
