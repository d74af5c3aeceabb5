//! WebAssembly bindings for Epic Moments.
//!
//! Runs the stamp enhancement filter and perceptual fingerprinting in the
//! browser, on canvas pixels or on encoded image files, so the scanner page
//! and the upload form behave exactly like the server.

use base64::Engine;
use js_sys::Uint8ClampedArray;
use moments_core::{
    enhance_bytes, enhance_rgba_in_place, validate_upload, EnhanceParams, Fingerprint, Fingerprinter, UploadKind,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Result of a client-side upload check.
#[derive(Serialize, Deserialize)]
pub struct UploadCheck {
    /// Whether the file may be uploaded
    pub ok: bool,
    /// Reason the file was rejected
    pub error: Option<String>,
}

/// Enhance canvas `ImageData` pixels in place.
///
/// `data` is the `ImageData.data` array (RGBA, 4 bytes per pixel).
#[wasm_bindgen]
pub fn enhance_rgba(data: &Uint8ClampedArray, width: u32, height: u32) -> Result<(), JsValue> {
    let mut pixels = data.to_vec();
    enhance_pixels(&mut pixels, width, height).map_err(|e| fail(&e))?;
    data.copy_from(&pixels);
    Ok(())
}

/// Enhance an encoded image file and return the result as a PNG data URL.
#[wasm_bindgen]
pub fn enhance_to_data_url(image_bytes: &[u8]) -> Result<String, JsValue> {
    enhanced_data_url(image_bytes).map_err(|e| fail(&e))
}

/// Hex-encoded 64-bit fingerprint of an encoded image file.
#[wasm_bindgen]
pub fn fingerprint_hex(image_bytes: &[u8]) -> Result<String, JsValue> {
    fingerprint_internal(image_bytes).map_err(|e| fail(&e))
}

/// Hamming distance between two hex fingerprints.
#[wasm_bindgen]
pub fn fingerprint_distance(a: &str, b: &str) -> Result<u32, JsValue> {
    distance_internal(a, b).map_err(|e| fail(&e))
}

/// Whether a stamp name contains the recognized text (case and spacing insensitive).
#[wasm_bindgen]
pub fn name_matches(name: &str, text: &str) -> bool {
    moments_core::name_matches(name, text)
}

/// Check a file before uploading it.
///
/// # Arguments
/// * `kind` - `"stamp_image"` or `"video"`
/// * `content_type` - The file's MIME type
/// * `size` - The file size in bytes
///
/// # Returns
/// A JSON string `{ "ok": bool, "error": string | null }`
#[wasm_bindgen]
pub fn check_upload(kind: &str, content_type: &str, size: u32) -> String {
    let result = match check_internal(kind, content_type, size as usize) {
        Ok(()) => UploadCheck { ok: true, error: None },
        Err(e) => UploadCheck {
            ok: false,
            error: Some(e),
        },
    };
    serde_json::to_string(&result).unwrap_or_else(|_| r#"{"ok":false,"error":"Unknown error"}"#.to_string())
}

/// Get the library version.
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn fail(message: &str) -> JsValue {
    web_sys::console::warn_1(&JsValue::from_str(message));
    JsValue::from_str(message)
}

fn enhance_pixels(pixels: &mut [u8], width: u32, height: u32) -> Result<(), String> {
    enhance_rgba_in_place(pixels, width, height, &EnhanceParams::default()).map_err(|e| e.to_string())
}

fn enhanced_data_url(image_bytes: &[u8]) -> Result<String, String> {
    let png = enhance_bytes(image_bytes).map_err(|e| e.to_string())?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(png);
    Ok(format!("data:image/png;base64,{}", encoded))
}

fn fingerprint_internal(image_bytes: &[u8]) -> Result<String, String> {
    Fingerprinter
        .fingerprint_bytes(image_bytes)
        .map(|fp| fp.to_hex())
        .map_err(|e| e.to_string())
}

fn distance_internal(a: &str, b: &str) -> Result<u32, String> {
    let a = Fingerprint::from_hex(a).map_err(|e| e.to_string())?;
    let b = Fingerprint::from_hex(b).map_err(|e| e.to_string())?;
    a.distance(&b)
        .ok_or_else(|| "Fingerprints are empty".to_string())
}

fn check_internal(kind: &str, content_type: &str, size: usize) -> Result<(), String> {
    let kind: UploadKind = serde_json::from_value(serde_json::Value::String(kind.to_string()))
        .map_err(|_| format!("Unknown upload kind '{}'", kind))?;
    validate_upload(kind, Some(content_type), size).map_err(|e| e.to_string())
}
