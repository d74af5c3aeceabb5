//! Fingerprint command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use moments_core::{enhance_bytes, Fingerprinter};
use tracing::debug;

use crate::utils::read_file;

/// Execute the fingerprint command. Prints only the hex fingerprint so the
/// output can be piped.
pub async fn execute(image: PathBuf, enhance: bool) -> Result<()> {
    let data = read_file(&image, "image")?;

    let data = if enhance {
        debug!("Enhancing before fingerprinting");
        enhance_bytes(&data).context("Failed to decode image")?
    } else {
        data
    };

    let fingerprint = Fingerprinter
        .fingerprint_bytes(&data)
        .context("Failed to decode image")?;

    println!("{}", fingerprint);
    Ok(())
}
