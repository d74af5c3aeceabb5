//! Catalog of stamps, videos and associations.
//!
//! Records live in PostgreSQL when `DATABASE_URL` is set, otherwise in memory
//! (development and tests; data is lost on restart).

mod memory;
mod postgres;

pub use memory::MemoryCatalog;
pub use postgres::PostgresCatalog;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moments_core::recognition::{FingerprintTarget, RecognitionError, StampLookup};
use moments_core::{Association, AssociationDetail, NewAssociation, Stamp, StampSummary, Video};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::config::Config;

/// Catalog errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),
}

impl CatalogError {
    fn stamp_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "Stamp", id }
    }

    fn video_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "Video", id }
    }

    fn association_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "Association",
            id,
        }
    }
}

/// What happens to associations when a referenced stamp or video is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Refuse to delete while associations reference the record
    #[default]
    Restrict,
    /// Delete the referencing associations along with the record
    Cascade,
}

impl FromStr for DeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "restrict" => Ok(Self::Restrict),
            "cascade" => Ok(Self::Cascade),
            other => Err(format!("unknown delete policy '{}'", other)),
        }
    }
}

impl fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restrict => f.write_str("restrict"),
            Self::Cascade => f.write_str("cascade"),
        }
    }
}

/// Stamp row, including the storage keys of its objects.
#[derive(Debug, Clone, FromRow)]
pub struct StampRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub image_key: String,
    pub image_url: String,
    pub processed_image_key: Option<String>,
    pub processed_image_url: Option<String>,
    pub fingerprint: Option<String>,
}

impl StampRow {
    /// Every storage key owned by this stamp.
    pub fn object_keys(&self) -> Vec<&str> {
        std::iter::once(self.image_key.as_str())
            .chain(self.processed_image_key.as_deref())
            .collect()
    }
}

impl From<StampRow> for Stamp {
    fn from(row: StampRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            name: row.name,
            image_url: row.image_url,
            processed_image_url: row.processed_image_url,
            fingerprint: row.fingerprint,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct VideoRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub video_key: String,
    pub video_url: String,
}

impl From<VideoRow> for Video {
    fn from(row: VideoRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            title: row.title,
            video_url: row.video_url,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AssociationRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub stamp_id: Uuid,
    pub video_id: Uuid,
}

impl From<AssociationRow> for Association {
    fn from(row: AssociationRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            stamp_id: row.stamp_id,
            video_id: row.video_id,
        }
    }
}

/// DTO for inserting a stamp after its objects have been stored
#[derive(Debug, Clone)]
pub struct CreateStamp {
    pub name: String,
    pub image_key: String,
    pub image_url: String,
    pub processed_image_key: Option<String>,
    pub processed_image_url: Option<String>,
    pub fingerprint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateVideo {
    pub title: String,
    pub video_key: String,
    pub video_url: String,
}

/// Catalog backend
pub enum Catalog {
    /// PostgreSQL storage (production)
    Postgres(PostgresCatalog),
    /// In-memory storage (development fallback)
    Memory(MemoryCatalog),
}

macro_rules! dispatch {
    ($self:ident, $method:ident ( $($arg:expr),* )) => {
        match $self {
            Catalog::Postgres(pg) => pg.$method($($arg),*).await,
            Catalog::Memory(mem) => mem.$method($($arg),*),
        }
    };
}

impl Catalog {
    pub fn in_memory() -> Self {
        Self::Memory(MemoryCatalog::new())
    }

    /// PostgreSQL when `database_url` is configured, otherwise in-memory.
    pub async fn from_config(config: &Config) -> Result<Self, CatalogError> {
        match config.database_url.as_deref() {
            Some(url) if !url.is_empty() => {
                tracing::info!("Using PostgreSQL catalog");
                let pg = PostgresCatalog::connect(
                    url,
                    config.database_max_connections,
                    config.database_min_connections,
                )
                .await?;
                pg.migrate().await?;
                Ok(Self::Postgres(pg))
            }
            _ => {
                tracing::warn!("DATABASE_URL not set, using in-memory catalog - records will be lost on restart!");
                Ok(Self::in_memory())
            }
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Postgres(_))
    }

    pub async fn check_health(&self) -> Result<(), CatalogError> {
        match self {
            Self::Postgres(pg) => pg.check_health().await,
            Self::Memory(_) => Ok(()),
        }
    }

    // ==================== Stamps ====================

    /// All stamps, newest first.
    pub async fn list_stamps(&self) -> Result<Vec<StampRow>, CatalogError> {
        dispatch!(self, list_stamps())
    }

    pub async fn get_stamp(&self, id: Uuid) -> Result<StampRow, CatalogError> {
        dispatch!(self, get_stamp(id))
    }

    pub async fn insert_stamp(&self, input: CreateStamp) -> Result<StampRow, CatalogError> {
        dispatch!(self, insert_stamp(input))
    }

    pub async fn rename_stamp(&self, id: Uuid, name: &str) -> Result<StampRow, CatalogError> {
        dispatch!(self, rename_stamp(id, name))
    }

    /// Delete a stamp and return the removed row so its objects can be cleaned up.
    pub async fn delete_stamp(&self, id: Uuid, policy: DeletePolicy) -> Result<StampRow, CatalogError> {
        dispatch!(self, delete_stamp(id, policy))
    }

    /// Stamps whose name contains `fragment`, case-insensitively.
    pub async fn search_stamps(&self, fragment: &str) -> Result<Vec<StampSummary>, CatalogError> {
        dispatch!(self, search_stamps(fragment))
    }

    /// Every stamp that has a fingerprint, as recognition targets.
    pub async fn fingerprint_targets(&self) -> Result<Vec<FingerprintTarget>, CatalogError> {
        let stamps = self.list_stamps().await?;
        Ok(stamps
            .into_iter()
            .filter_map(|s| {
                s.fingerprint.map(|fingerprint| FingerprintTarget {
                    stamp_id: s.id,
                    name: s.name,
                    fingerprint,
                })
            })
            .collect())
    }

    // ==================== Videos ====================

    pub async fn list_videos(&self) -> Result<Vec<VideoRow>, CatalogError> {
        dispatch!(self, list_videos())
    }

    pub async fn get_video(&self, id: Uuid) -> Result<VideoRow, CatalogError> {
        dispatch!(self, get_video(id))
    }

    pub async fn insert_video(&self, input: CreateVideo) -> Result<VideoRow, CatalogError> {
        dispatch!(self, insert_video(input))
    }

    pub async fn retitle_video(&self, id: Uuid, title: &str) -> Result<VideoRow, CatalogError> {
        dispatch!(self, retitle_video(id, title))
    }

    pub async fn delete_video(&self, id: Uuid, policy: DeletePolicy) -> Result<VideoRow, CatalogError> {
        dispatch!(self, delete_video(id, policy))
    }

    // ==================== Associations ====================

    /// All associations, newest first, with the linked records expanded.
    pub async fn list_associations(&self) -> Result<Vec<AssociationDetail>, CatalogError> {
        dispatch!(self, list_associations())
    }

    /// Both referenced records must exist and the pair must be new.
    pub async fn create_association(&self, input: NewAssociation) -> Result<AssociationRow, CatalogError> {
        dispatch!(self, create_association(input))
    }

    /// Removes exactly one association; the stamp and video are untouched.
    pub async fn delete_association(&self, id: Uuid) -> Result<(), CatalogError> {
        dispatch!(self, delete_association(id))
    }

    /// The video of the newest association for a stamp.
    pub async fn playback_for_stamp(&self, stamp_id: Uuid) -> Result<Option<VideoRow>, CatalogError> {
        dispatch!(self, playback_for_stamp(stamp_id))
    }
}

#[async_trait]
impl StampLookup for Catalog {
    async fn find_by_name_fragment(&self, fragment: &str) -> Result<Vec<StampSummary>, RecognitionError> {
        self.search_stamps(fragment)
            .await
            .map_err(|e| RecognitionError::Lookup(e.to_string()))
    }
}
