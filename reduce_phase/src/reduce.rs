//! The Reducer: drains one shard's K/V lists into the shard's output file.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::StreamExt;
use observability_deps::tracing::{info, warn};
use parking_lot::Mutex;
use snafu::{ensure, OptionExt, ResultExt, Snafu};

use bucket_store::BucketStore;
use data_types::{ShardIndex, ATTR_OUTPUT_BUCKET, ATTR_REDIS_NUM};
use kv_store::{KeyValueStore, ShardedKv};
use message_bus::{BusMessage, MessageHandler};

/// How many keys are read from the shard's K/V instance at a time.
const CONCURRENT_KEY_READS: usize = 10;

/// Reducer error.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum Error {
    #[snafu(display("reduce message carries no {attribute} attribute"))]
    MissingAttribute { attribute: &'static str },

    #[snafu(display("invalid shard number {value}: {source}"))]
    InvalidShard {
        value: String,
        source: std::num::ParseIntError,
    },

    #[snafu(display("shard lookup failed: {source}"))]
    ShardLookup { source: kv_store::Error },

    #[snafu(display("error scanning shard keys: {source}"))]
    ScanKeys { source: kv_store::Error },

    #[snafu(display("error writing output object: {source}"))]
    WriteObject { source: bucket_store::Error },

    #[snafu(display("{failures} keys could not be read from the shard"))]
    KeyReads { failures: usize },
}

/// Handles one Reduce message per invocation: scans all keys of the
/// addressed shard, deduplicates and sorts each key's values, writes one
/// line per true anagram group to `anagrams-part-{shard}.txt` in the output
/// bucket, and flushes the shard's K/V instance on the way out.
///
/// Keys with a single distinct value are omitted: every word is an anagram
/// of itself, so only groups of two or more are informative. Given the same
/// shard contents the invocation is idempotent; a duplicate Reduce message
/// rewrites the output object identically.
#[derive(Debug)]
pub struct Reducer {
    kv: ShardedKv,
    store: Arc<dyn BucketStore>,
}

impl Reducer {
    /// Create a reducer reading from `kv` and writing through `store`.
    pub fn new(kv: ShardedKv, store: Arc<dyn BucketStore>) -> Self {
        Self { kv, store }
    }

    /// Read one key's list, deduplicate, and format its output line if the
    /// key names a true anagram group.
    async fn reduce_key(
        kv: &Arc<dyn KeyValueStore>,
        key: &str,
    ) -> kv_store::Result<Option<String>> {
        let values = kv.list_range(key, 0, -1).await?;

        let distinct: HashSet<String> = values.into_iter().collect();
        if distinct.len() <= 1 {
            return Ok(None);
        }
        let mut words: Vec<String> = distinct.into_iter().collect();
        words.sort();
        Ok(Some(format!("{key}: {}\n", words.join(" "))))
    }

    async fn reduce_shard(
        &self,
        kv: &Arc<dyn KeyValueStore>,
        output_bucket: &str,
        file_name: &str,
    ) -> Result<(), Error> {
        let keys = kv.scan_keys().await.context(ScanKeysSnafu)?;
        let key_count = keys.len();

        // one shared writer; concurrent per-key tasks serialize on the lock
        let output = Mutex::new(Vec::<u8>::new());
        let output_ref = &output;
        let failures = futures::stream::iter(keys)
            .map(|key| async move {
                match Self::reduce_key(kv, &key).await {
                    Ok(Some(line)) => {
                        output_ref.lock().extend_from_slice(line.as_bytes());
                        0_usize
                    }
                    Ok(None) => 0,
                    Err(e) => {
                        warn!(%key, error=%e, "error reading key from shard");
                        1
                    }
                }
            })
            .buffer_unordered(CONCURRENT_KEY_READS)
            .fold(0_usize, |acc, failed| async move { acc + failed })
            .await;

        let output = output.into_inner();
        self.store
            .write_object(output_bucket, file_name, Bytes::from(output))
            .await
            .context(WriteObjectSnafu)?;
        info!(
            output_bucket,
            file_name,
            keys = key_count,
            "wrote shard output"
        );

        ensure!(failures == 0, KeyReadsSnafu { failures });
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for Reducer {
    type Error = Error;

    async fn handle(&self, message: BusMessage) -> Result<(), Self::Error> {
        let shard = message
            .attribute(ATTR_REDIS_NUM)
            .context(MissingAttributeSnafu {
                attribute: ATTR_REDIS_NUM,
            })?;
        let shard = ShardIndex::new(shard.parse().context(InvalidShardSnafu {
            value: shard.to_string(),
        })?);
        let output_bucket = message
            .attribute(ATTR_OUTPUT_BUCKET)
            .context(MissingAttributeSnafu {
                attribute: ATTR_OUTPUT_BUCKET,
            })?;
        let file_name = format!("anagrams-part-{shard}.txt");

        let kv = Arc::clone(self.kv.shard(shard).context(ShardLookupSnafu)?);
        let result = self.reduce_shard(&kv, output_bucket, &file_name).await;

        // the shard's data is dropped on every return path; a redelivered
        // Reduce message must start from an empty instance
        if let Err(e) = kv.flush_all().await {
            warn!(%shard, error=%e, "error flushing shard after reduce");
        }
        result
    }
}
