//! Catalog records shared by the server, the CLI and the recognition pipeline.
//!
//! Stamps, videos and associations are stored independently and linked by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named reference image the scanner tries to recognize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub image_url: String,
    /// Edge-enhanced PNG variant used for recognition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_image_url: Option<String>,
    /// Hex-encoded 64-bit fingerprint of the processed variant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl Stamp {
    /// The image the recognizer should compare against: the processed
    /// variant when it exists, the original otherwise.
    pub fn recognition_image_url(&self) -> &str {
        self.processed_image_url
            .as_deref()
            .unwrap_or(&self.image_url)
    }
}

/// The projection used by name lookups (`id`, `name`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampSummary {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub video_url: String,
}

/// A link meaning "when this stamp is recognized, play this video".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub stamp_id: Uuid,
    pub video_id: Uuid,
}

/// Input for creating an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAssociation {
    pub stamp_id: Uuid,
    pub video_id: Uuid,
}

/// Association with the related records expanded for display.
///
/// The related records are optional: a listing must still render when a
/// referenced row is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationDetail {
    #[serde(flatten)]
    pub association: Association,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stamp: Option<Stamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
}

/// Collapse runs of whitespace and trim, the form names are stored and
/// compared in.
pub fn normalize_label(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-insensitive substring lookup: does `name` contain `fragment`?
///
/// An empty fragment matches nothing.
pub fn name_matches(name: &str, fragment: &str) -> bool {
    let fragment = normalize_label(fragment).to_lowercase();
    !fragment.is_empty() && normalize_label(name).to_lowercase().contains(&fragment)
}
