//! Object storage for uploaded media
//!
//! Two buckets, `stamps` and `videos`. Objects are stored under `<uuid>.<ext>`
//! keys and served publicly from `{public_base_url}/media/{bucket}/{key}`.
//!
//! If `STORAGE_DIR` is not set, falls back to in-memory storage (useful for
//! development and tests, but objects are lost on restart).

mod local;
mod memory;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;

use std::path::PathBuf;

use uuid::Uuid;

/// Buckets objects can be stored in
pub const BUCKETS: &[&str] = &["stamps", "videos"];

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object {bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    #[error("Invalid object location: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where an uploaded object ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: &'static str,
    pub key: String,
    pub url: String,
}

/// Object bytes plus the content type they are served with
#[derive(Debug, Clone)]
pub struct ObjectData {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Storage backend
enum StorageBackend {
    /// Filesystem directory, one subdirectory per bucket
    Local(LocalObjectStore),
    /// In-memory storage (development fallback)
    Memory(MemoryObjectStore),
}

/// Bucketed object store handing out public URLs
pub struct ObjectStore {
    backend: StorageBackend,
    public_base_url: String,
}

impl ObjectStore {
    /// Create storage rooted at a filesystem directory
    pub async fn local(root: impl Into<PathBuf>, public_base_url: &str) -> Result<Self, StorageError> {
        let store = LocalObjectStore::create(root.into()).await?;
        Ok(Self {
            backend: StorageBackend::Local(store),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create in-memory storage (development only)
    pub fn in_memory(public_base_url: &str) -> Self {
        Self {
            backend: StorageBackend::Memory(MemoryObjectStore::default()),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Filesystem storage when `storage_dir` is set, otherwise in-memory.
    pub async fn from_config(config: &crate::Config) -> Result<Self, StorageError> {
        match &config.storage_dir {
            Some(dir) => {
                tracing::info!(dir = %dir.display(), "Using filesystem object storage");
                Self::local(dir.clone(), &config.public_base_url).await
            }
            None => {
                tracing::warn!("STORAGE_DIR not set, using in-memory object storage - uploads will be lost on restart!");
                Ok(Self::in_memory(&config.public_base_url))
            }
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Local(_))
    }

    /// Store `data` under a fresh `<uuid>.<ext>` key.
    pub async fn upload(
        &self,
        bucket: &'static str,
        extension: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        check_bucket(bucket)?;
        let key = format!("{}.{}", Uuid::new_v4(), extension);
        check_key(&key)?;
        let size = data.len();

        match &self.backend {
            StorageBackend::Local(store) => store.put(bucket, &key, &data).await?,
            StorageBackend::Memory(store) => store.put(bucket, &key, data, content_type),
        }

        tracing::debug!(bucket, key = %key, size, "Stored object");
        Ok(StoredObject {
            bucket,
            url: self.public_url(bucket, &key),
            key,
        })
    }

    pub fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/media/{}/{}", self.public_base_url, bucket, key)
    }

    pub async fn fetch(&self, bucket: &str, key: &str) -> Result<ObjectData, StorageError> {
        check_bucket(bucket)?;
        check_key(key)?;

        match &self.backend {
            StorageBackend::Local(store) => {
                let data = store.get(bucket, key).await?;
                Ok(ObjectData {
                    data,
                    content_type: content_type_for_key(key).to_string(),
                })
            }
            StorageBackend::Memory(store) => store.get(bucket, key),
        }
    }

    /// Remove an object. Removing a missing object is not an error.
    pub async fn remove(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        check_bucket(bucket)?;
        check_key(key)?;

        match &self.backend {
            StorageBackend::Local(store) => store.delete(bucket, key).await?,
            StorageBackend::Memory(store) => store.delete(bucket, key),
        }

        tracing::debug!(bucket, key, "Removed object");
        Ok(())
    }

    /// Best-effort removal used to undo earlier uploads after a later step failed.
    pub async fn remove_quietly(&self, bucket: &str, keys: &[&str]) {
        for key in keys {
            if let Err(e) = self.remove(bucket, key).await {
                tracing::warn!(bucket, key, error = %e, "Failed to remove orphaned object");
            }
        }
    }

    /// Number of stored objects (in-memory backend only; 0 for filesystem storage)
    pub fn object_count(&self) -> usize {
        match &self.backend {
            StorageBackend::Local(_) => 0,
            StorageBackend::Memory(store) => store.object_count(),
        }
    }
}

fn check_bucket(bucket: &str) -> Result<(), StorageError> {
    if BUCKETS.contains(&bucket) {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(format!("unknown bucket '{}'", bucket)))
    }
}

/// Keys are single path components.
fn check_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key.len() <= 128
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(format!("invalid key '{}'", key)))
    }
}

/// Content type served for a stored key, from its extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}
