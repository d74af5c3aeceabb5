//! Enhance command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use moments_core::{enhance_bytes, Fingerprinter};
use tracing::info;

use crate::utils::{enhanced_path, read_file, write_file};

/// Execute the enhance command.
pub async fn execute(image: PathBuf, output: Option<PathBuf>, quiet: bool) -> Result<()> {
    let original = read_file(&image, "image")?;
    info!(path = %image.display(), bytes = original.len(), "Read image");

    let processed = enhance_bytes(&original).context("Failed to decode image")?;
    let fingerprint = Fingerprinter
        .fingerprint_bytes(&processed)
        .context("Failed to decode enhanced image")?;

    let output = output.unwrap_or_else(|| enhanced_path(&image));
    write_file(&output, &processed)?;
    info!(path = %output.display(), bytes = processed.len(), "Enhanced image saved");

    if !quiet {
        println!();
        println!("{}", "Image enhanced".green().bold());
        println!();
        println!("   {} {}", "Saved:".dimmed(), output.display());
        println!("   {} {} bytes", "Size:".dimmed(), processed.len());
        println!("   {} {}", "Fingerprint:".dimmed(), fingerprint);
    }

    Ok(())
}
