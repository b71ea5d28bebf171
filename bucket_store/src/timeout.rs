//! A decorator bounding every [`BucketStore`] call with a timeout, so a
//! hung storage backend cannot stall a stage invocation indefinitely.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{BucketStore, Error, Result, OPERATION_TIMEOUT};

/// Wraps another [`BucketStore`], failing any call that does not complete
/// within the configured timeout.
#[derive(Debug)]
pub struct TimeoutBuckets {
    inner: Arc<dyn BucketStore>,
    timeout: Duration,
}

impl TimeoutBuckets {
    /// Wrap `inner` with the default [`OPERATION_TIMEOUT`].
    pub fn new(inner: Arc<dyn BucketStore>) -> Self {
        Self::new_with_timeout(inner, OPERATION_TIMEOUT)
    }

    /// Wrap `inner` with an explicit timeout.
    pub fn new_with_timeout(inner: Arc<dyn BucketStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .unwrap_or(Err(Error::Timeout {
                operation,
                timeout: self.timeout,
            }))
    }
}

#[async_trait]
impl BucketStore for TimeoutBuckets {
    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>> {
        self.bounded("list_objects", self.inner.list_objects(bucket))
            .await
    }

    async fn read_object(&self, bucket: &str, object: &str) -> Result<Bytes> {
        self.bounded("read_object", self.inner.read_object(bucket, object))
            .await
    }

    async fn write_object(&self, bucket: &str, object: &str, data: Bytes) -> Result<()> {
        self.bounded("write_object", self.inner.write_object(bucket, object, data))
            .await
    }

    fn type_name(&self) -> &'static str {
        self.inner.type_name()
    }
}
