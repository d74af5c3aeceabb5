use thiserror::Error;

use crate::upload::UploadKind;

#[derive(Error, Debug)]
pub enum MomentsError {
    #[error("Unsupported {kind} type '{mime}'. Allowed: {allowed}")]
    UnsupportedType {
        kind: UploadKind,
        mime: String,
        allowed: String,
    },

    #[error("{kind} too large: {size} bytes exceeds maximum of {max} bytes")]
    FileTooLarge {
        kind: UploadKind,
        size: usize,
        max: usize,
    },

    #[error("Invalid {field}: {reason}")]
    InvalidLabel { field: &'static str, reason: String },

    #[error("Image processing error: {0}")]
    ImageError(String),

    #[error("Fingerprint error: {0}")]
    FingerprintError(String),
}

pub type Result<T> = std::result::Result<T, MomentsError>;
