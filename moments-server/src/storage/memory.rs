//! In-memory object storage

use dashmap::DashMap;

use super::{ObjectData, StorageError};

#[derive(Default)]
pub struct MemoryObjectStore {
    /// (bucket, key) -> object
    objects: DashMap<(String, String), ObjectData>,
}

impl MemoryObjectStore {
    pub fn put(&self, bucket: &str, key: &str, data: Vec<u8>, content_type: &str) {
        self.objects.insert(
            (bucket.to_string(), key.to_string()),
            ObjectData {
                data,
                content_type: content_type.to_string(),
            },
        );
    }

    pub fn get(&self, bucket: &str, key: &str) -> Result<ObjectData, StorageError> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    pub fn delete(&self, bucket: &str, key: &str) {
        self.objects.remove(&(bucket.to_string(), key.to_string()));
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}
