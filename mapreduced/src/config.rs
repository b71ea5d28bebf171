//! Command line and environment configuration blocks, plus the factories
//! turning them into live clients.
//!
//! Backend selection follows the deployment surface of the pipeline: the
//! key/value layer is addressed through `REDIS_HOST` / `REDIS_HOSTS` /
//! `NO_OF_REDUCERS` regardless of which implementation serves it, and
//! selecting a backend this build does not provide fails at startup rather
//! than at first use.

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;

use snafu::{ensure, OptionExt, Snafu};

use bucket_store::{BucketStore, FileBuckets, InMemoryBuckets, TimeoutBuckets};
use kv_store::{KeyValueStore, MemoryKv, ShardedKv};
use message_bus::{MemoryBus, MessageBus};

/// Config error.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum ParseError {
    #[snafu(display("unknown message bus type: {bus_type}"))]
    UnknownBusType { bus_type: String },

    #[snafu(display("unknown key/value store type: {kv_type}"))]
    UnknownKvType { kv_type: String },

    #[snafu(display("unknown object store type: {store_type}"))]
    UnknownObjectStoreType { store_type: String },

    #[snafu(display("object store type \"file\" requires --data-dir"))]
    MissingDataDir,

    #[snafu(display("key/value store type \"redis\" requires --redis-host"))]
    MissingRedisHost,

    #[snafu(display("key/value store type \"redis\" requires --redis-hosts"))]
    MissingRedisHosts,

    #[snafu(display(
        "{hosts} hosts in --redis-hosts but --reducers is {reducers}; \
         exactly one host per reducer shard is required"
    ))]
    ShardHostMismatch { hosts: usize, reducers: u32 },

    #[snafu(display("this build provides no {kv_type} key/value transport"))]
    KvTypeNotBuilt { kv_type: String },
}

/// CLI config for the message bus.
#[derive(Debug, Clone, clap::Parser)]
pub struct BusConfig {
    /// Which message bus implementation to use.
    ///
    /// Possible values (case insensitive):
    ///
    /// * memory (default): in-process queues, only useful when every stage
    ///   runs in this process.
    #[clap(
        long = "--message-bus",
        env = "MAPREDUCE_MESSAGE_BUS",
        default_value = "memory",
        action
    )]
    pub message_bus: String,
}

/// Construct the configured bus.
pub fn make_bus(config: &BusConfig) -> Result<Arc<dyn MessageBus>, ParseError> {
    match config.message_bus.to_ascii_lowercase().as_str() {
        "memory" => Ok(Arc::new(MemoryBus::new())),
        other => UnknownBusTypeSnafu { bus_type: other }.fail(),
    }
}

/// CLI config for the key/value layer.
#[derive(Debug, Clone, clap::Parser)]
pub struct KvConfig {
    /// Which key/value implementation to use.
    ///
    /// Possible values (case insensitive):
    ///
    /// * memory (default): independent in-process instances, one per shard
    ///   plus one for the controller's in-flight set.
    /// * redis: one server per reducer shard, addressed via --redis-hosts,
    ///   with the in-flight set on --redis-host.
    #[clap(
        long = "--kv-store",
        env = "MAPREDUCE_KV_STORE",
        default_value = "memory",
        action
    )]
    pub kv_store: String,

    /// Host of the instance holding the controller's in-flight set.
    #[clap(long = "--redis-host", env = "REDIS_HOST", action)]
    pub redis_host: Option<String>,

    /// Space-separated hosts, exactly one per reducer shard.
    #[clap(long = "--redis-hosts", env = "REDIS_HOSTS", action)]
    pub redis_hosts: Option<String>,

    /// Number of reducer shards the key space is partitioned over.
    #[clap(
        long = "--reducers",
        env = "NO_OF_REDUCERS",
        default_value = "5",
        action
    )]
    pub reducers: NonZeroU32,
}

impl KvConfig {
    /// The per-shard hosts of `--redis-hosts`, split on whitespace.
    pub fn shard_hosts(&self) -> Option<Vec<&str>> {
        self.redis_hosts
            .as_deref()
            .map(|hosts| hosts.split_whitespace().collect())
    }
}

/// The key/value clients used by the pipeline: one store per reducer shard
/// and a separate store for the controller's in-flight set.
#[derive(Debug, Clone)]
pub struct KvClients {
    /// Per-shard instances written by the Shuffler and drained by the
    /// Reducer.
    pub shards: ShardedKv,
    /// The instance holding the in-flight set, mutated only by the
    /// Controller.
    pub control: Arc<dyn KeyValueStore>,
}

/// Construct the configured key/value clients.
pub fn make_kv(config: &KvConfig) -> Result<KvClients, ParseError> {
    match config.kv_store.to_ascii_lowercase().as_str() {
        "memory" => Ok(KvClients {
            shards: ShardedKv::new_memory(config.reducers),
            control: Arc::new(MemoryKv::new()),
        }),
        "redis" => {
            // validate the addressing before reporting the missing
            // transport, so configs can be checked on machines without it
            config.redis_host.as_ref().context(MissingRedisHostSnafu)?;
            let hosts = config.shard_hosts().context(MissingRedisHostsSnafu)?;
            ensure!(
                hosts.len() == config.reducers.get() as usize,
                ShardHostMismatchSnafu {
                    hosts: hosts.len(),
                    reducers: config.reducers.get(),
                }
            );
            KvTypeNotBuiltSnafu { kv_type: "redis" }.fail()
        }
        other => UnknownKvTypeSnafu { kv_type: other }.fail(),
    }
}

/// CLI config for object storage.
#[derive(Debug, Clone, clap::Parser)]
pub struct ObjectStoreConfig {
    /// Which object store implementation to use.
    ///
    /// Possible values (case insensitive):
    ///
    /// * memory (default): in-process, buckets must be created by the
    ///   embedding code.
    /// * file: buckets are directories under --data-dir.
    #[clap(
        long = "--object-store",
        env = "MAPREDUCE_OBJECT_STORE",
        default_value = "memory",
        action
    )]
    pub object_store: String,

    /// Root directory of the "file" object store.
    #[clap(long = "--data-dir", env = "MAPREDUCE_DATA_DIR", action)]
    pub data_dir: Option<PathBuf>,
}

/// Construct the configured bucket store, bounded by the standard
/// per-operation timeout.
pub fn make_bucket_store(config: &ObjectStoreConfig) -> Result<Arc<dyn BucketStore>, ParseError> {
    let inner: Arc<dyn BucketStore> = match config.object_store.to_ascii_lowercase().as_str() {
        "memory" => Arc::new(InMemoryBuckets::new()),
        "file" => {
            let data_dir = config.data_dir.as_ref().context(MissingDataDirSnafu)?;
            Arc::new(FileBuckets::new(data_dir))
        }
        other => {
            return UnknownObjectStoreTypeSnafu { store_type: other }.fail();
        }
    };
    Ok(Arc::new(TimeoutBuckets::new(inner)))
}
