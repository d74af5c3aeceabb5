//! Upload validation module
//!
//! HTTP-side wrappers over the shared upload rules in `moments_core::upload`.
//! Every check here runs before any storage or catalog call.

use moments_core::{validate_label, validate_upload, UploadKind};

use crate::error::ApiError;

/// Validates the declared Content-Type of an upload before its body is read.
pub fn validate_content_type(kind: UploadKind, content_type: Option<&str>) -> Result<(), ApiError> {
    // Size zero never trips the size check, so only the type is tested here
    validate_upload(kind, content_type, 0).map_err(ApiError::from)
}

/// Validates the size of an upload (type already checked).
pub fn validate_file_size(kind: UploadKind, content_type: Option<&str>, size: usize) -> Result<(), ApiError> {
    validate_upload(kind, content_type, size).map_err(ApiError::from)
}

/// Validates a required text field (stamp name or video title) and returns
/// its normalized form.
pub fn require_label(kind: UploadKind, value: Option<&str>) -> Result<String, ApiError> {
    let field = kind.label_field();
    match value {
        Some(raw) => Ok(validate_label(field, raw)?),
        None => Err(ApiError::bad_request(format!(
            "Missing '{}' field in multipart form",
            field
        ))),
    }
}
