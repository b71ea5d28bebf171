//! Shared data types for the anagram MapReduce pipeline.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Formatter;
use uuid::Uuid;

/// Message attribute carrying the name of the bucket output files are
/// written to. Present on every message from the Starter onwards.
pub const ATTR_OUTPUT_BUCKET: &str = "outputBucket";

/// Message attribute carrying the partition ID minted by the Splitter.
/// Present on every message from the Splitter through the Shuffler.
pub const ATTR_PARTITION_ID: &str = "partitionId";

/// Message attribute carrying the reducer shard a Reduce message targets.
pub const ATTR_REDIS_NUM: &str = "redisNum";

/// Unique ID for one partition of an input object's token stream, minted by
/// the Splitter and carried in message attributes until the partition's
/// `finished` control event reaches the Controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId(Uuid);

impl PartitionId {
    /// Mint a fresh random partition ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    pub fn get(&self) -> Uuid {
        self.0
    }
}

impl Default for PartitionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PartitionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a reducer shard, in the range `0..shard_count`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ShardIndex(u32);

impl ShardIndex {
    /// Create a new shard index.
    pub fn new(v: u32) -> Self {
        Self(v)
    }

    /// Returns the index as a plain integer.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ShardIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload of a Split message: one input object to be read, stripped,
/// deduplicated and partitioned by the Splitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRequest {
    /// Bucket holding the input object.
    pub bucket_name: String,
    /// Name of the input object.
    pub file_name: String,
}

/// Lifecycle status carried by a [`ControlEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlStatus {
    /// The Splitter has published the partition to the Mapper topic.
    Started,
    /// The Shuffler has finished pushing the partition's pairs into the
    /// per-shard K/V lists.
    Finished,
}

/// Progress message sent to the Controller by the Splitter (`started`) and
/// the Shuffler (`finished`), one of each per partition.
///
/// The ID is treated as an opaque string by the Controller; it only has to
/// match between the `started` and `finished` events of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEvent {
    /// The partition this event refers to.
    pub id: String,
    /// The lifecycle transition being reported.
    pub status: ControlStatus,
}

/// A key/value pair produced by the Mapper: the alphabetically-sorted
/// letters of a word, and the set of words seen that sort to them.
///
/// Invariant: every element of `anagrams` sorts to `sorted_word`, and the
/// set is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedPair {
    /// The letters of the word, sorted ascending.
    #[serde(rename = "sortedWord")]
    pub sorted_word: String,
    /// The distinct words mapping to `sorted_word` seen so far.
    #[serde(with = "word_set")]
    pub anagrams: HashSet<String>,
}

impl MappedPair {
    /// A pair holding a single word under its sort key.
    pub fn new(sorted_word: impl Into<String>, word: impl Into<String>) -> Self {
        Self {
            sorted_word: sorted_word.into(),
            anagrams: HashSet::from([word.into()]),
        }
    }

    /// Union `other`'s anagram set into this pair.
    ///
    /// Callers must only merge pairs with equal sort keys.
    pub fn merge(&mut self, other: Self) {
        self.anagrams.extend(other.anagrams);
    }
}

/// On the wire an anagram set is a JSON object whose keys are the words and
/// whose values are empty objects, e.g. `{"care":{},"race":{}}`.
pub mod word_set {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::{BTreeMap, HashSet};

    #[derive(Serialize, Deserialize)]
    struct Empty {}

    /// Serialize the set as a map of word to empty object, in sorted order
    /// so the encoding is deterministic.
    pub fn serialize<S>(set: &HashSet<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let map: BTreeMap<&str, Empty> = set.iter().map(|w| (w.as_str(), Empty {})).collect();
        map.serialize(serializer)
    }

    /// Deserialize a map of word to empty object back into a set.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<HashSet<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = BTreeMap::<String, Empty>::deserialize(deserializer)?;
        Ok(map.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_ids_are_unique() {
        let a = PartitionId::new();
        let b = PartitionId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 36);
    }

    #[test]
    fn split_request_wire_format() {
        let req = SplitRequest {
            bucket_name: "books-in".to_string(),
            file_name: "dracula.txt".to_string(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"bucketName":"books-in","fileName":"dracula.txt"}"#);
        assert_eq!(serde_json::from_str::<SplitRequest>(&json).unwrap(), req);
    }

    #[test]
    fn control_event_wire_format() {
        let event = ControlEvent {
            id: "12345".to_string(),
            status: ControlStatus::Started,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"id":"12345","status":"started"}"#);

        let event = serde_json::from_str::<ControlEvent>(
            r#"{"id":"12345","status":"finished"}"#,
        )
        .unwrap();
        assert_eq!(event.status, ControlStatus::Finished);
    }

    #[test]
    fn mapped_pair_wire_format() {
        let mut pair = MappedPair::new("acer", "care");
        pair.merge(MappedPair::new("acer", "race"));

        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(json, r#"{"sortedWord":"acer","anagrams":{"care":{},"race":{}}}"#);

        let back: MappedPair = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pair);
    }

    #[test]
    fn mapped_pair_merge_unions() {
        let mut pair = MappedPair::new("acer", "care");
        pair.merge(MappedPair::new("acer", "care"));
        assert_eq!(pair.anagrams.len(), 1);

        pair.merge(MappedPair::new("acer", "race"));
        assert_eq!(
            pair.anagrams,
            HashSet::from(["care".to_string(), "race".to_string()])
        );
    }
}
