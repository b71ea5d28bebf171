//! The shared key/value store contract used for pipeline coordination.
//!
//! Two kinds of state live behind this interface: the Controller's in-flight
//! partition set, and the per-shard anagram lists written by the Shuffler
//! and consumed by the Reducer. The canonical deployment runs one store
//! instance per reducer shard (addressed through [`ShardedKv`]), with
//! instance 0 doubling as the Controller's set store.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

use std::fmt::Debug;
use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use data_types::ShardIndex;
use snafu::Snafu;

mod memory;
pub use memory::MemoryKv;

/// Error for key/value operations.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum Error {
    #[snafu(display("key/value backend error: {source}"))]
    Backend {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("value at key {key} has the wrong type for {operation}"))]
    WrongType { key: String, operation: &'static str },

    #[snafu(display("shard {shard} out of range, shard count is {count}"))]
    ShardOutOfRange { shard: ShardIndex, count: usize },
}

#[allow(missing_docs)]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// One key/value store instance.
///
/// Keys hold either a set of strings (mutated by the set operations) or an
/// ordered list of strings (mutated by the list operations); using the
/// wrong family on an existing key is an error. `flush_all` drops every key
/// of the instance.
#[async_trait]
pub trait KeyValueStore: Debug + Send + Sync + 'static {
    /// Add `member` to the set at `key`, creating the set if absent.
    /// Adding an existing member is a no-op.
    async fn set_add(&self, key: &str, member: &str) -> Result<()>;

    /// Remove `member` from the set at `key`. Removing an absent member is
    /// a no-op.
    async fn set_remove(&self, key: &str, member: &str) -> Result<()>;

    /// Number of members in the set at `key` (0 if the key is absent).
    async fn set_cardinality(&self, key: &str) -> Result<u64>;

    /// All members of the set at `key`, in unspecified order.
    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// Push `values` onto the head of the list at `key`, creating the list
    /// if absent. Values are inserted one at a time, so the last value ends
    /// up at the head.
    async fn list_left_push(&self, key: &str, values: Vec<String>) -> Result<()>;

    /// The elements of the list at `key` between `start` and `stop`
    /// inclusive. Negative indices count from the end of the list, so
    /// `(0, -1)` is the whole list. An absent key yields an empty range.
    async fn list_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>>;

    /// All keys currently present on the instance.
    async fn scan_keys(&self) -> Result<Vec<String>>;

    /// Drop all keys of the instance.
    async fn flush_all(&self) -> Result<()>;

    /// Return type (like `"memory"` or `"redis"`) of this store.
    fn type_name(&self) -> &'static str;
}

/// The table of per-shard store instances.
///
/// Shard `s` holds exactly the lists whose keys hash to `s`; the Controller
/// barrier guarantees the Shuffler (writer) and Reducer (reader) of one
/// shard never run concurrently.
#[derive(Debug, Clone)]
pub struct ShardedKv {
    shards: Vec<Arc<dyn KeyValueStore>>,
}

impl ShardedKv {
    /// Build the table from one instance per shard, indexed by position.
    pub fn new(shards: Vec<Arc<dyn KeyValueStore>>) -> Self {
        assert!(!shards.is_empty(), "shard table must not be empty");
        Self { shards }
    }

    /// Build a table of `n` independent in-memory instances.
    pub fn new_memory(n: NonZeroU32) -> Self {
        Self::new(
            (0..n.get())
                .map(|_| Arc::new(MemoryKv::new()) as _)
                .collect(),
        )
    }

    /// Number of shards in the table.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// The store instance serving `shard`.
    pub fn shard(&self, shard: ShardIndex) -> Result<&Arc<dyn KeyValueStore>> {
        self.shards
            .get(shard.get() as usize)
            .ok_or(Error::ShardOutOfRange {
                shard,
                count: self.shards.len(),
            })
    }
}
