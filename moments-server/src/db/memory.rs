//! In-memory catalog (development fallback and tests).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use dashmap::DashMap;
use moments_core::{name_matches, AssociationDetail, NewAssociation, StampSummary};
use uuid::Uuid;

use super::{
    AssociationRow, CatalogError, CreateStamp, CreateVideo, DeletePolicy, StampRow, VideoRow,
};

/// A row plus its insertion sequence, which breaks `created_at` ties.
#[derive(Debug, Clone)]
struct Entry<T> {
    seq: u64,
    row: T,
}

pub struct MemoryCatalog {
    stamps: DashMap<Uuid, Entry<StampRow>>,
    videos: DashMap<Uuid, Entry<VideoRow>>,
    associations: DashMap<Uuid, Entry<AssociationRow>>,
    seq: AtomicU64,
    /// Serializes operations that read one table and write another
    relations: Mutex<()>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first<T: Clone>(map: &DashMap<Uuid, Entry<T>>) -> Vec<T> {
    let mut entries: Vec<Entry<T>> = map.iter().map(|e| e.value().clone()).collect();
    entries.sort_by(|a, b| b.seq.cmp(&a.seq));
    entries.into_iter().map(|e| e.row).collect()
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            stamps: DashMap::new(),
            videos: DashMap::new(),
            associations: DashMap::new(),
            seq: AtomicU64::new(0),
            relations: Mutex::new(()),
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    fn lock_relations(&self) -> MutexGuard<'_, ()> {
        self.relations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn references(&self, stamp_id: Option<Uuid>, video_id: Option<Uuid>) -> Vec<Uuid> {
        self.associations
            .iter()
            .filter(|e| {
                stamp_id.is_some_and(|id| e.row.stamp_id == id)
                    || video_id.is_some_and(|id| e.row.video_id == id)
            })
            .map(|e| *e.key())
            .collect()
    }

    fn release_references(
        &self,
        referencing: Vec<Uuid>,
        policy: DeletePolicy,
        what: &str,
    ) -> Result<(), CatalogError> {
        if referencing.is_empty() {
            return Ok(());
        }
        match policy {
            DeletePolicy::Restrict => Err(CatalogError::Conflict(format!(
                "{} is used by {} association(s)",
                what,
                referencing.len()
            ))),
            DeletePolicy::Cascade => {
                for id in referencing {
                    self.associations.remove(&id);
                }
                Ok(())
            }
        }
    }

    // ==================== Stamps ====================

    pub fn list_stamps(&self) -> Result<Vec<StampRow>, CatalogError> {
        Ok(newest_first(&self.stamps))
    }

    pub fn get_stamp(&self, id: Uuid) -> Result<StampRow, CatalogError> {
        self.stamps
            .get(&id)
            .map(|e| e.row.clone())
            .ok_or_else(|| CatalogError::stamp_not_found(id))
    }

    pub fn insert_stamp(&self, input: CreateStamp) -> Result<StampRow, CatalogError> {
        let row = StampRow {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            name: input.name,
            image_key: input.image_key,
            image_url: input.image_url,
            processed_image_key: input.processed_image_key,
            processed_image_url: input.processed_image_url,
            fingerprint: input.fingerprint,
        };
        self.stamps.insert(
            row.id,
            Entry {
                seq: self.next_seq(),
                row: row.clone(),
            },
        );
        Ok(row)
    }

    pub fn rename_stamp(&self, id: Uuid, name: &str) -> Result<StampRow, CatalogError> {
        let mut entry = self
            .stamps
            .get_mut(&id)
            .ok_or_else(|| CatalogError::stamp_not_found(id))?;
        entry.row.name = name.to_string();
        Ok(entry.row.clone())
    }

    pub fn delete_stamp(&self, id: Uuid, policy: DeletePolicy) -> Result<StampRow, CatalogError> {
        let _guard = self.lock_relations();
        if !self.stamps.contains_key(&id) {
            return Err(CatalogError::stamp_not_found(id));
        }
        self.release_references(self.references(Some(id), None), policy, "Stamp")?;
        self.stamps
            .remove(&id)
            .map(|(_, e)| e.row)
            .ok_or_else(|| CatalogError::stamp_not_found(id))
    }

    pub fn search_stamps(&self, fragment: &str) -> Result<Vec<StampSummary>, CatalogError> {
        Ok(newest_first(&self.stamps)
            .into_iter()
            .filter(|s| name_matches(&s.name, fragment))
            .map(|s| StampSummary {
                id: s.id,
                name: s.name,
            })
            .collect())
    }

    // ==================== Videos ====================

    pub fn list_videos(&self) -> Result<Vec<VideoRow>, CatalogError> {
        Ok(newest_first(&self.videos))
    }

    pub fn get_video(&self, id: Uuid) -> Result<VideoRow, CatalogError> {
        self.videos
            .get(&id)
            .map(|e| e.row.clone())
            .ok_or_else(|| CatalogError::video_not_found(id))
    }

    pub fn insert_video(&self, input: CreateVideo) -> Result<VideoRow, CatalogError> {
        let row = VideoRow {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            title: input.title,
            video_key: input.video_key,
            video_url: input.video_url,
        };
        self.videos.insert(
            row.id,
            Entry {
                seq: self.next_seq(),
                row: row.clone(),
            },
        );
        Ok(row)
    }

    pub fn retitle_video(&self, id: Uuid, title: &str) -> Result<VideoRow, CatalogError> {
        let mut entry = self
            .videos
            .get_mut(&id)
            .ok_or_else(|| CatalogError::video_not_found(id))?;
        entry.row.title = title.to_string();
        Ok(entry.row.clone())
    }

    pub fn delete_video(&self, id: Uuid, policy: DeletePolicy) -> Result<VideoRow, CatalogError> {
        let _guard = self.lock_relations();
        if !self.videos.contains_key(&id) {
            return Err(CatalogError::video_not_found(id));
        }
        self.release_references(self.references(None, Some(id)), policy, "Video")?;
        self.videos
            .remove(&id)
            .map(|(_, e)| e.row)
            .ok_or_else(|| CatalogError::video_not_found(id))
    }

    // ==================== Associations ====================

    pub fn list_associations(&self) -> Result<Vec<AssociationDetail>, CatalogError> {
        Ok(newest_first(&self.associations)
            .into_iter()
            .map(|row| AssociationDetail {
                stamp: self.stamps.get(&row.stamp_id).map(|e| e.row.clone().into()),
                video: self.videos.get(&row.video_id).map(|e| e.row.clone().into()),
                association: row.into(),
            })
            .collect())
    }

    pub fn create_association(&self, input: NewAssociation) -> Result<AssociationRow, CatalogError> {
        let _guard = self.lock_relations();
        if !self.stamps.contains_key(&input.stamp_id) {
            return Err(CatalogError::stamp_not_found(input.stamp_id));
        }
        if !self.videos.contains_key(&input.video_id) {
            return Err(CatalogError::video_not_found(input.video_id));
        }
        let duplicate = self
            .associations
            .iter()
            .any(|e| e.row.stamp_id == input.stamp_id && e.row.video_id == input.video_id);
        if duplicate {
            return Err(CatalogError::Conflict(
                "Stamp is already associated with this video".to_string(),
            ));
        }

        let row = AssociationRow {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            stamp_id: input.stamp_id,
            video_id: input.video_id,
        };
        self.associations.insert(
            row.id,
            Entry {
                seq: self.next_seq(),
                row: row.clone(),
            },
        );
        Ok(row)
    }

    pub fn delete_association(&self, id: Uuid) -> Result<(), CatalogError> {
        self.associations
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CatalogError::association_not_found(id))
    }

    pub fn playback_for_stamp(&self, stamp_id: Uuid) -> Result<Option<VideoRow>, CatalogError> {
        if !self.stamps.contains_key(&stamp_id) {
            return Err(CatalogError::stamp_not_found(stamp_id));
        }
        Ok(newest_first(&self.associations)
            .into_iter()
            .filter(|a| a.stamp_id == stamp_id)
            .find_map(|a| self.videos.get(&a.video_id).map(|e| e.row.clone())))
    }
}
