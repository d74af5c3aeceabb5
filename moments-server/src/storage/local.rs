//! Filesystem object storage
//!
//! Layout: `<root>/<bucket>/<key>`. Writes go to a temporary file first and are
//! renamed into place so readers never see a partial object.

use std::io::ErrorKind;
use std::path::PathBuf;

use super::{StorageError, BUCKETS};

pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create the bucket directories under `root` if needed.
    pub async fn create(root: PathBuf) -> Result<Self, StorageError> {
        for bucket in BUCKETS {
            tokio::fs::create_dir_all(root.join(bucket)).await?;
        }
        Ok(Self { root })
    }

    fn path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }

    pub async fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.path(bucket, key);
        let tmp = self.root.join(bucket).join(format!(".{}.partial", key));
        tokio::fs::write(&tmp, data).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        match tokio::fs::read(self.path(bucket, key)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path(bucket, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
