//! In-memory implementation of [`BucketStore`], used by tests and local
//! runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::ObjectStore;
use parking_lot::RwLock;

use crate::{map_store_error, BucketStore, Error, Result};

/// A set of named buckets, each backed by an `object_store` in-memory
/// store. Buckets must be created explicitly; addressing an absent bucket
/// is an error, mirroring a real object store.
#[derive(Debug, Default)]
pub struct InMemoryBuckets {
    buckets: RwLock<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl InMemoryBuckets {
    /// Create a store with no buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `bucket` if it does not yet exist.
    pub fn create_bucket(&self, bucket: &str) {
        self.buckets
            .write()
            .entry(bucket.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()));
    }

    fn bucket(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        self.buckets
            .read()
            .get(bucket)
            .map(Arc::clone)
            .ok_or_else(|| Error::BucketNotFound {
                bucket: bucket.to_string(),
            })
    }
}

#[async_trait]
impl BucketStore for InMemoryBuckets {
    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>> {
        let store = self.bucket(bucket)?;
        let metas: Vec<_> = store
            .list(None)
            .await
            .map_err(|e| map_store_error(bucket, "", e))?
            .try_collect()
            .await
            .map_err(|e| map_store_error(bucket, "", e))?;
        Ok(metas.into_iter().map(|m| m.location.to_string()).collect())
    }

    async fn read_object(&self, bucket: &str, object: &str) -> Result<Bytes> {
        let store = self.bucket(bucket)?;
        store
            .get(&Path::from(object))
            .await
            .map_err(|e| map_store_error(bucket, object, e))?
            .bytes()
            .await
            .map_err(|e| map_store_error(bucket, object, e))
    }

    async fn write_object(&self, bucket: &str, object: &str, data: Bytes) -> Result<()> {
        let store = self.bucket(bucket)?;
        store
            .put(&Path::from(object), data)
            .await
            .map_err(|e| map_store_error(bucket, object, e))
    }

    fn type_name(&self) -> &'static str {
        "memory"
    }
}
