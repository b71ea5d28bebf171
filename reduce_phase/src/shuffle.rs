//! The Shuffler: routes each pair to its reducer shard's K/V instance and
//! reports the partition finished to the Controller.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use observability_deps::tracing::warn;
use snafu::{ensure, OptionExt, ResultExt, Snafu};

use data_types::{ControlEvent, ControlStatus, MappedPair, ShardIndex, ATTR_PARTITION_ID};
use kv_store::{KeyValueStore, ShardedKv};
use message_bus::{topics, BusMessage, MessageBus, MessageHandler};
use sharder::ReducerSharder;

/// Shuffler error.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum Error {
    #[snafu(display("malformed shuffle payload: {source}"))]
    MalformedPayload { source: serde_json::Error },

    #[snafu(display("shuffle message carries no {ATTR_PARTITION_ID} attribute"))]
    MissingPartitionId,

    #[snafu(display("error encoding control event: {source}"))]
    EncodePayload { source: serde_json::Error },

    #[snafu(display("error publishing control event: {source}"))]
    Publish { source: message_bus::BusError },

    #[snafu(display(
        "{failures} key/value pushes failed; the partition was still reported finished"
    ))]
    KvPush { failures: usize },
}

/// Handles one Shuffle message per invocation.
///
/// Pairs are grouped by `FNV-1a-32(key) mod N` and appended to the
/// per-shard lists; pushes for distinct shards proceed concurrently, pushes
/// within one shard follow pair order (the lists carry no order the Reducer
/// relies on). A push error does not block sibling pushes and does not
/// suppress the `finished` control event, but is surfaced once the event is
/// acknowledged so the bus sees the failed invocation.
#[derive(Debug)]
pub struct Shuffler {
    kv: ShardedKv,
    sharder: ReducerSharder,
    bus: Arc<dyn MessageBus>,
}

impl Shuffler {
    /// Create a shuffler writing through `kv`, which must hold one instance
    /// per shard of `sharder`.
    pub fn new(kv: ShardedKv, sharder: ReducerSharder, bus: Arc<dyn MessageBus>) -> Self {
        assert_eq!(
            kv.shard_count(),
            sharder.shard_count() as usize,
            "key/value shard table must match the sharder's shard count",
        );
        Self { kv, sharder, bus }
    }

    /// Append every pair of one shard's group to that shard's lists,
    /// returning the number of failed pushes.
    async fn push_shard(&self, shard: ShardIndex, pairs: Vec<MappedPair>) -> usize {
        let store: &Arc<dyn KeyValueStore> = match self.kv.shard(shard) {
            Ok(store) => store,
            Err(e) => {
                warn!(%shard, error=%e, "no key/value instance for shard");
                return pairs.len();
            }
        };

        let mut failures = 0;
        for pair in pairs {
            let values: Vec<String> = pair.anagrams.into_iter().collect();
            if let Err(e) = store.list_left_push(&pair.sorted_word, values).await {
                warn!(%shard, key=%pair.sorted_word, error=%e, "key/value push failed");
                failures += 1;
            }
        }
        failures
    }
}

#[async_trait]
impl MessageHandler for Shuffler {
    type Error = Error;

    async fn handle(&self, message: BusMessage) -> Result<(), Self::Error> {
        let pairs: Vec<MappedPair> =
            serde_json::from_slice(message.payload()).context(MalformedPayloadSnafu)?;
        let partition_id = message
            .attribute(ATTR_PARTITION_ID)
            .context(MissingPartitionIdSnafu)?
            .to_string();

        let mut by_shard: HashMap<ShardIndex, Vec<MappedPair>> = HashMap::new();
        for pair in pairs {
            by_shard
                .entry(self.sharder.shard(&pair.sorted_word))
                .or_default()
                .push(pair);
        }

        let failures: usize = join_all(
            by_shard
                .into_iter()
                .map(|(shard, pairs)| self.push_shard(shard, pairs)),
        )
        .await
        .into_iter()
        .sum();

        let finished = ControlEvent {
            id: partition_id,
            status: ControlStatus::Finished,
        };
        let payload = serde_json::to_vec(&finished).context(EncodePayloadSnafu)?;
        self.bus
            .publish(
                topics::CONTROLLER,
                BusMessage::new(payload, message.attributes().clone()),
            )
            .await
            .context(PublishSnafu)?;

        ensure!(failures == 0, KvPushSnafu { failures });
        Ok(())
    }
}
