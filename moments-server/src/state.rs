//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::db::{Catalog, CatalogError, DeletePolicy};
use crate::storage::{ObjectStore, StorageError};

/// Failure to bring up a backing store
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Catalog initialization failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Object storage initialization failed: {0}")]
    Storage(#[from] StorageError),
}

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Stamp, video and association records
    pub catalog: Arc<Catalog>,
    /// Uploaded images and videos
    pub storage: Arc<ObjectStore>,
    /// What deleting a referenced stamp or video does
    pub delete_policy: DeletePolicy,
    /// Fingerprint Hamming threshold for `/api/recognize`
    pub recognition_max_distance: u32,
}

impl AppState {
    pub fn new(catalog: Catalog, storage: ObjectStore, config: &Config) -> Self {
        Self {
            catalog: Arc::new(catalog),
            storage: Arc::new(storage),
            delete_policy: config.delete_policy,
            recognition_max_distance: config.recognition_max_distance,
        }
    }

    /// In-memory catalog and storage (tests and local development)
    pub fn in_memory(config: &Config) -> Self {
        Self::new(
            Catalog::in_memory(),
            ObjectStore::in_memory(&config.public_base_url),
            config,
        )
    }

    /// Backends chosen from configuration: PostgreSQL when `DATABASE_URL`
    /// is set, filesystem storage when `STORAGE_DIR` is set.
    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        let catalog = Catalog::from_config(config).await?;
        let storage = ObjectStore::from_config(config).await?;
        Ok(Self::new(catalog, storage, config))
    }
}
