//! The Controller: tracks which partitions are in flight and releases the
//! reduce fan-out once the last one finishes.
//!
//! All state lives in a shared K/V set under [`IN_FLIGHT_SET_KEY`], so any
//! number of stateless Controller instances could serve the topic; the
//! barrier is only correct, however, if events are applied serially, which
//! the dispatcher guarantees by running a single consumer for the
//! controller topic.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use observability_deps::tracing::{debug, info};
use snafu::{ResultExt, Snafu};

use data_types::{ControlEvent, ControlStatus, ATTR_PARTITION_ID, ATTR_REDIS_NUM};
use kv_store::KeyValueStore;
use message_bus::{topics, BusMessage, MessageBus, MessageHandler};

/// The set of partition IDs that have `started` but not yet `finished`.
pub const IN_FLIGHT_SET_KEY: &str = "started-processing";

/// Controller error.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum Error {
    #[snafu(display("malformed control event: {source}"))]
    MalformedPayload { source: serde_json::Error },

    #[snafu(display("error updating in-flight set: {source}"))]
    KeyValue { source: kv_store::Error },

    #[snafu(display("error publishing reduce message: {source}"))]
    Publish { source: message_bus::BusError },
}

/// Applies one control event per invocation to the in-flight set.
///
/// A `started` event adds the partition ID to the set; a `finished` event
/// removes it and, if the set is then empty, publishes one Reduce message
/// per shard. The check-then-act on the cardinality is not atomic, so a
/// duplicated `finished` delivery can fan out twice; that is tolerated
/// because the Reducer overwrites its output object with identical
/// contents.
#[derive(Debug)]
pub struct Controller {
    kv: Arc<dyn KeyValueStore>,
    bus: Arc<dyn MessageBus>,
    reducers: NonZeroU32,
}

impl Controller {
    /// Create a controller over the given set store, fanning out to
    /// `reducers` shards.
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        bus: Arc<dyn MessageBus>,
        reducers: NonZeroU32,
    ) -> Self {
        Self { kv, bus, reducers }
    }

    /// Publish one Reduce message per shard, concurrently. Attributes of
    /// the triggering event ride along minus the partition ID, which no
    /// longer identifies anything meaningful to the Reducer.
    async fn fan_out_reducers(&self, message: &BusMessage) -> Result<(), Error> {
        info!(reducers = self.reducers.get(), "all partitions shuffled; starting reduce fan-out");

        let mut attributes = message.attributes().clone();
        attributes.remove(ATTR_PARTITION_ID);

        try_join_all((0..self.reducers.get()).map(|shard| {
            let mut attributes = attributes.clone();
            attributes.insert(ATTR_REDIS_NUM.to_string(), shard.to_string());
            async move {
                self.bus
                    .publish(topics::REDUCER, BusMessage::new(Vec::new(), attributes))
                    .await
                    .context(PublishSnafu)
            }
        }))
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for Controller {
    type Error = Error;

    async fn handle(&self, message: BusMessage) -> Result<(), Self::Error> {
        let event: ControlEvent =
            serde_json::from_slice(message.payload()).context(MalformedPayloadSnafu)?;

        match event.status {
            ControlStatus::Started => {
                self.kv
                    .set_add(IN_FLIGHT_SET_KEY, &event.id)
                    .await
                    .context(KeyValueSnafu)?;
                debug!(partition = %event.id, "partition started");
            }
            ControlStatus::Finished => {
                self.kv
                    .set_remove(IN_FLIGHT_SET_KEY, &event.id)
                    .await
                    .context(KeyValueSnafu)?;
                let in_flight = self
                    .kv
                    .set_cardinality(IN_FLIGHT_SET_KEY)
                    .await
                    .context(KeyValueSnafu)?;
                debug!(partition = %event.id, in_flight, "partition finished");

                if in_flight == 0 {
                    self.fan_out_reducers(&message).await?;
                }
            }
        }
        Ok(())
    }
}
