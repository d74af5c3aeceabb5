//! Common utility functions shared across CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::RgbaImage;
use moments_core::{Fingerprint, FingerprintTarget};
use tracing::debug;
use url::Url;

/// Read a whole file, with the path in the error.
pub fn read_file(path: &Path, what: &str) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}: {}", what, path.display()))
}

pub fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    std::fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))
}

/// Build the enhanced output path from the input image path.
///
/// Transforms `dir/stamp.jpg` into `dir/stamp.enhanced.png`.
pub fn enhanced_path(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    image.with_file_name(format!("{}.enhanced.png", stem))
}

/// Decode an image file into an RGBA frame.
pub fn load_frame(path: &Path) -> Result<RgbaImage> {
    let data = read_file(path, "frame")?;
    let image = image::load_from_memory(&data)
        .with_context(|| format!("Failed to decode frame: {}", path.display()))?;
    debug!(path = %path.display(), width = image.width(), height = image.height(), "Loaded frame");
    Ok(image.to_rgba8())
}

/// Load a targets file written by `moments targets`, rejecting bad fingerprints up front.
pub fn load_targets(path: &Path) -> Result<Vec<FingerprintTarget>> {
    let data = read_file(path, "targets file")?;
    let targets: Vec<FingerprintTarget> = serde_json::from_slice(&data)
        .with_context(|| format!("Invalid targets file: {}", path.display()))?;

    for target in &targets {
        Fingerprint::from_hex(&target.fingerprint)
            .with_context(|| format!("Invalid fingerprint for stamp '{}'", target.name))?;
    }

    debug!(count = targets.len(), "Loaded targets");
    Ok(targets)
}

/// clap value parser for `--server`: an absolute http(s) URL, used as a base.
pub fn parse_server_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).with_context(|| format!("'{}' is not a valid URL", raw))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("server URL must use http or https");
    }
    // Joining against a base without a trailing slash would drop its last segment
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
