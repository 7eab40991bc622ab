//! # Dedup Module
//!
//! Perceptual duplicate detection over a batch of downloaded images.
//!
//! ## How It Works
//! 1. Each image is downscaled to an 8x8 grid, greyscaled, and thresholded
//!    against its mean brightness, producing a 64-bit fingerprint
//! 2. Images are bucketed by exact fingerprint; the first image seen with a
//!    fingerprint is its representative, later ones are duplicates
//!
//! This is exact-bucket dedup, not nearest-neighbor search: fingerprints
//! are never compared by distance, and a collision between genuinely
//! different images counts as a duplicate.

mod detector;
mod fingerprint;
mod loader;

pub use detector::DuplicateScanner;
pub use fingerprint::{AverageFingerprinter, Fingerprint};
pub use loader::{DirectoryImageSource, ImageSource};

use serde::Serialize;
use std::collections::HashMap;

/// Outcome of one duplicate scan. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateScanResult {
    representatives: Vec<String>,
    duplicates: Vec<String>,
    by_fingerprint: HashMap<Fingerprint, String>,
}

impl DuplicateScanResult {
    pub(crate) fn from_parts(
        representatives: Vec<String>,
        duplicates: Vec<String>,
        by_fingerprint: HashMap<Fingerprint, String>,
    ) -> Self {
        Self {
            representatives,
            duplicates,
            by_fingerprint,
        }
    }

    /// Surviving image ids, ordered by first occurrence in the input.
    pub fn representatives(&self) -> &[String] {
        &self.representatives
    }

    /// Image ids whose fingerprint was already claimed by an earlier image.
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// The representative id recorded for a fingerprint, if any.
    pub fn representative_for(&self, fingerprint: &Fingerprint) -> Option<&str> {
        self.by_fingerprint.get(fingerprint).map(String::as_str)
    }

    /// Number of images classified (representatives + duplicates).
    pub fn total_scanned(&self) -> usize {
        self.representatives.len() + self.duplicates.len()
    }

    /// Fraction of the batch that was suppressed as duplicates.
    pub fn duplicate_ratio(&self) -> f64 {
        let total = self.total_scanned();
        if total == 0 {
            return 0.0;
        }
        self.duplicates.len() as f64 / total as f64
    }
}
