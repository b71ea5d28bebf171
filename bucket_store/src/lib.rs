//! Bucket-scoped object storage: the contract through which the pipeline
//! reads input books and writes anagram output files.
//!
//! Implementations delegate to the `object_store` crate, one store per
//! bucket. The pipeline needs only three operations (list, read, write), so
//! that is all the trait exposes.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use snafu::Snafu;

mod local;
mod memory;
mod timeout;

pub use local::FileBuckets;
pub use memory::InMemoryBuckets;
pub use timeout::TimeoutBuckets;

/// Bound on each object store call; see [`TimeoutBuckets`].
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Error for bucket store operations.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
pub enum Error {
    #[snafu(display("bucket doesn't exist or isn't accessible: {bucket}"))]
    BucketNotFound { bucket: String },

    #[snafu(display("object {object} not found in bucket {bucket}"))]
    ObjectNotFound { bucket: String, object: String },

    #[snafu(display("object store operation {operation} timed out after {timeout:?}"))]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[snafu(display("object store error: {source}"))]
    Store { source: object_store::Error },
}

#[allow(missing_docs)]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Object storage addressed by `(bucket, object name)`.
#[async_trait]
pub trait BucketStore: Debug + Send + Sync + 'static {
    /// Names of all objects in `bucket`.
    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>>;

    /// The full contents of one object.
    async fn read_object(&self, bucket: &str, object: &str) -> Result<Bytes>;

    /// Write an object, replacing any previous contents.
    async fn write_object(&self, bucket: &str, object: &str, data: Bytes) -> Result<()>;

    /// Return type (like `"memory"` or `"file"`) of this store.
    fn type_name(&self) -> &'static str;
}

fn map_store_error(bucket: &str, object: &str, e: object_store::Error) -> Error {
    match e {
        object_store::Error::NotFound { .. } => Error::ObjectNotFound {
            bucket: bucket.to_string(),
            object: object.to_string(),
        },
        source => Error::Store { source },
    }
}
