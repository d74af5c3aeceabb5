//! Upload validation
//!
//! Every upload surface (HTTP multipart, CLI, browser) checks files with these
//! rules before touching storage: MIME type first, then size.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MomentsError, Result};
use crate::model::normalize_label;

/// Maximum stamp image size in bytes (5 MB)
pub const MAX_STAMP_IMAGE_SIZE: usize = 5 * 1024 * 1024;

/// Maximum video size in bytes (50 MB)
pub const MAX_VIDEO_SIZE: usize = 50 * 1024 * 1024;

const STAMP_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];
const VIDEO_TYPES: &[&str] = &["video/mp4", "video/webm", "video/quicktime"];

/// What is being uploaded; selects the allowed types and the size cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    StampImage,
    Video,
}

impl UploadKind {
    pub fn allowed_types(self) -> &'static [&'static str] {
        match self {
            Self::StampImage => STAMP_IMAGE_TYPES,
            Self::Video => VIDEO_TYPES,
        }
    }

    pub fn max_size(self) -> usize {
        match self {
            Self::StampImage => MAX_STAMP_IMAGE_SIZE,
            Self::Video => MAX_VIDEO_SIZE,
        }
    }

    /// Storage bucket holding this kind of object.
    pub fn bucket(self) -> &'static str {
        match self {
            Self::StampImage => "stamps",
            Self::Video => "videos",
        }
    }

    /// Human label of the form's text field (`name` for stamps, `title` for videos).
    pub fn label_field(self) -> &'static str {
        match self {
            Self::StampImage => "name",
            Self::Video => "title",
        }
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StampImage => write!(f, "Stamp image"),
            Self::Video => write!(f, "Video"),
        }
    }
}

/// Validate an upload's declared MIME type and size.
///
/// The type check runs first so an oversized file of the wrong type reports
/// the type problem. Parameters such as `; charset=` are ignored and the
/// comparison is case-insensitive.
pub fn validate_upload(kind: UploadKind, content_type: Option<&str>, size: usize) -> Result<()> {
    let mime = essence(content_type);

    if !kind.allowed_types().contains(&mime.as_str()) {
        return Err(MomentsError::UnsupportedType {
            kind,
            mime: if mime.is_empty() {
                "unknown".to_string()
            } else {
                mime
            },
            allowed: kind.allowed_types().join(", "),
        });
    }

    if size > kind.max_size() {
        return Err(MomentsError::FileTooLarge {
            kind,
            size,
            max: kind.max_size(),
        });
    }

    Ok(())
}

/// Validate and normalize a stamp name or video title.
pub fn validate_label(field: &'static str, raw: &str) -> Result<String> {
    let label = normalize_label(raw);
    if label.is_empty() {
        return Err(MomentsError::InvalidLabel {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if label.chars().count() > 200 {
        return Err(MomentsError::InvalidLabel {
            field,
            reason: "must be at most 200 characters".to_string(),
        });
    }
    Ok(label)
}

/// Storage extensions per accepted MIME type; the first one is canonical.
const EXTENSIONS: &[(&str, &[&str])] = &[
    ("image/jpeg", &["jpg", "jpeg"]),
    ("image/png", &["png"]),
    ("image/webp", &["webp"]),
    ("video/mp4", &["mp4"]),
    ("video/webm", &["webm"]),
    ("video/quicktime", &["mov"]),
];

/// Pick a storage file extension consistent with the declared MIME type.
///
/// The file name's extension is kept only when it fits the type, so the key
/// never advertises a different kind of content than was validated.
pub fn file_extension(file_name: Option<&str>, content_type: Option<&str>) -> String {
    let from_name = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    let mime = essence(content_type);
    match EXTENSIONS.iter().find(|(m, _)| *m == mime) {
        Some((_, exts)) => match from_name {
            Some(ext) if exts.contains(&ext.as_str()) => ext,
            _ => exts[0].to_string(),
        },
        None => from_name.unwrap_or_else(|| "bin".to_string()),
    }
}

/// `type/subtype` of a Content-Type header, lowercased, without parameters.
fn essence(content_type: Option<&str>) -> String {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default()
}
