//! Perceptual fingerprints for stamp images.
//!
//! A fingerprint stays close (in Hamming distance) for visually similar images,
//! so a camera crop of a printed stamp can be compared against the stored
//! processed variant without any text recognition.
//!
//! # Algorithm
//!
//! Blockhash with a 64-bit (8 byte) output. The hash is robust against JPEG
//! compression, resizing and minor cropping.
//!
//! # Usage
//!
//! ```no_run
//! use moments_core::fingerprint::Fingerprinter;
//!
//! let stored = std::fs::read("stamp.png").unwrap();
//! let captured = std::fs::read("frame-crop.png").unwrap();
//! let hasher = Fingerprinter::default();
//! let a = hasher.fingerprint_bytes(&stored).unwrap();
//! let b = hasher.fingerprint_bytes(&captured).unwrap();
//! let same_stamp = a.distance(&b).unwrap() <= 12;
//! ```

use blockhash::{blockhash64, Blockhash64};
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::{MomentsError, Result};

/// Fixed fingerprint size in bytes (64 bits).
pub const FINGERPRINT_SIZE: usize = 8;

/// A computed 64-bit fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; FINGERPRINT_SIZE]);

impl Fingerprint {
    /// Number of differing bits between two fingerprints.
    pub fn distance(&self, other: &Self) -> Option<u32> {
        hamming_distance(&self.0, &other.0)
    }

    /// Whether two fingerprints are within `threshold` bits of each other.
    pub fn is_similar(&self, other: &Self, threshold: u32) -> bool {
        self.distance(other).is_some_and(|d| d <= threshold)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| MomentsError::FingerprintError(format!("Invalid hex string: {}", e)))?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; FINGERPRINT_SIZE] = bytes.try_into().map_err(|_| {
            MomentsError::FingerprintError(format!(
                "Expected {} bytes, got {}",
                FINGERPRINT_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Computes fingerprints from encoded or decoded images.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fingerprinter;

impl Fingerprinter {
    /// Fingerprint raw image bytes (JPEG, PNG, GIF or WebP).
    pub fn fingerprint_bytes(&self, image_data: &[u8]) -> Result<Fingerprint> {
        let image = image::load_from_memory(image_data).map_err(|e| {
            MomentsError::FingerprintError(format!("Failed to decode image: {}", e))
        })?;

        Ok(self.fingerprint_image(&image))
    }

    pub fn fingerprint_image(&self, image: &DynamicImage) -> Fingerprint {
        let hash: Blockhash64 = blockhash64(image);
        Fingerprint(hash.into())
    }

    /// Check whether the bytes look like a decodable image format.
    pub fn is_supported_format(data: &[u8]) -> bool {
        image::guess_format(data).is_ok()
    }
}

/// Hamming distance between two byte strings.
///
/// Strings of different length are compared over the overlapping part plus a
/// penalty of 8 bits per missing byte. Returns `None` if either is empty.
pub fn hamming_distance(hash1: &[u8], hash2: &[u8]) -> Option<u32> {
    if hash1.is_empty() || hash2.is_empty() {
        return None;
    }

    let min_len = hash1.len().min(hash2.len());

    let distance: u32 = hash1[..min_len]
        .iter()
        .zip(hash2[..min_len].iter())
        .map(|(a, b)| (a ^ b).count_ones())
        .sum();

    let size_penalty = (hash1.len().abs_diff(hash2.len()) * 8) as u32;

    Some(distance + size_penalty)
}
