//! Average-hash fingerprinting.
//!
//! The fingerprint works by:
//! 1. Resizing the image to an 8x8 grid
//! 2. Converting to grayscale
//! 3. Computing the average brightness
//! 4. For each pixel: if brighter than average, set bit to 1, else 0
//!
//! The result is a 64-bit pattern used purely as an exact bucket key.

use image::DynamicImage;
use serde::{Serialize, Serializer};

/// Grid edge length; 8x8 yields the 64 bits of a [`Fingerprint`].
const GRID_SIZE: u32 = 8;

/// A 64-bit perceptual fingerprint.
///
/// Only equality and hashing are exposed; there is deliberately no
/// Hamming-distance API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub(crate) fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Hexadecimal rendering, for logs and serialized output.
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// Serialized as a hex string so fingerprints can key JSON maps.
impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Computes average-hash fingerprints.
#[derive(Debug, Clone, Default)]
pub struct AverageFingerprinter;

impl AverageFingerprinter {
    pub fn new() -> Self {
        Self
    }

    /// Fingerprint an already-decoded image.
    pub fn fingerprint(&self, image: &DynamicImage) -> Fingerprint {
        let resized = image.resize_exact(
            GRID_SIZE,
            GRID_SIZE,
            image::imageops::FilterType::Lanczos3,
        );
        let gray = resized.to_luma8();

        let total: u64 = gray.pixels().map(|p| p[0] as u64).sum();
        let count = (GRID_SIZE * GRID_SIZE) as u64;
        let average = (total / count) as u8;

        let mut bits: u64 = 0;
        for y in 0..GRID_SIZE {
            for x in 0..GRID_SIZE {
                bits <<= 1;
                if gray.get_pixel(x, y)[0] > average {
                    bits |= 1;
                }
            }
        }

        Fingerprint(bits)
    }
}
