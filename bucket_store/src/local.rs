//! File-system implementation of [`BucketStore`]: every bucket is a
//! directory under a common root.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::ObjectStore;

use crate::{map_store_error, BucketStore, Error, Result};

/// Buckets mapped onto directories below `root`, with objects stored
/// through the `object_store` local file system backend.
#[derive(Debug)]
pub struct FileBuckets {
    root: PathBuf,
}

impl FileBuckets {
    /// Serve buckets from directories under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// A store rooted at the bucket directory, which must already exist.
    fn bucket(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        let dir = self.root.join(bucket);
        if !dir.is_dir() {
            return Err(Error::BucketNotFound {
                bucket: bucket.to_string(),
            });
        }
        let store = LocalFileSystem::new_with_prefix(dir)
            .map_err(|e| map_store_error(bucket, "", e))?;
        Ok(Arc::new(store))
    }

    /// Like [`bucket`](Self::bucket), but creates the directory first so
    /// output buckets come into existence on first write.
    fn bucket_mkdir(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        let dir = self.root.join(bucket);
        std::fs::create_dir_all(&dir).map_err(|source| Error::Store {
            source: object_store::Error::Generic {
                store: "LocalFileSystem",
                source: Box::new(source),
            },
        })?;
        self.bucket(bucket)
    }
}

#[async_trait]
impl BucketStore for FileBuckets {
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
        let store = self.bucket_mkdir(bucket)?;
        store
            .put(&Path::from(object), data)
            .await
            .map_err(|e| map_store_error(bucket, object, e))
    }

    fn type_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn buckets_are_directories() {
        let tmp = test_helpers::tmp_dir().unwrap();
        let store = FileBuckets::new(tmp.path());

        assert_matches!(
            store.list_objects("missing").await,
            Err(Error::BucketNotFound { .. })
        );

        store
            .write_object("out", "anagrams-part-0.txt", Bytes::from_static(b"acer: care race\n"))
            .await
            .unwrap();

        assert_eq!(
            store.list_objects("out").await.unwrap(),
            vec!["anagrams-part-0.txt"]
        );
        assert_eq!(
            store.read_object("out", "anagrams-part-0.txt").await.unwrap(),
            "acer: care race\n"
        );
    }

    #[tokio::test]
    async fn reads_input_written_out_of_band() {
        let tmp = test_helpers::tmp_dir().unwrap();
        std::fs::create_dir(tmp.path().join("books")).unwrap();
        std::fs::write(tmp.path().join("books").join("pg1.txt"), b"word soup").unwrap();

        let store = FileBuckets::new(tmp.path());
        assert_eq!(store.list_objects("books").await.unwrap(), vec!["pg1.txt"]);
        assert_eq!(store.read_object("books", "pg1.txt").await.unwrap(), "word soup");
    }
}
