//! Perceptual thumbnail hashes.
//!
//! A hash is stored and compared as lowercase hex. Live capture treats two
//! hashes as the same item only when equal; Hamming distance is for the
//! offline cleanup pass.

use image::{DynamicImage, RgbaImage};
use image_hasher::{HashAlg, Hasher, HasherConfig};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{HashAlgorithm, HashConfig};

/// Fixed-length hex digest of a card thumbnail.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ThumbHash(String);

impl ThumbHash {
    /// Accepts a non-empty even-length hex string; case is normalized.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() || s.len() % 2 != 0 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(s.to_ascii_lowercase()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn to_bytes(&self) -> Option<Vec<u8>> {
        (0..self.0.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(self.0.get(i..i + 2)?, 16).ok())
            .collect()
    }

    /// Number of differing bits, or `None` when the digests differ in length
    /// or are not valid hex.
    pub fn distance(&self, other: &ThumbHash) -> Option<u32> {
        let a = self.to_bytes()?;
        let b = other.to_bytes()?;
        if a.len() != b.len() {
            return None;
        }
        Some(a.iter().zip(&b).map(|(x, y)| (x ^ y).count_ones()).sum())
    }
}

impl TryFrom<String> for ThumbHash {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| format!("invalid thumbnail hash {:?}", s))
    }
}

impl From<ThumbHash> for String {
    fn from(hash: ThumbHash) -> Self {
        hash.0
    }
}

impl fmt::Display for ThumbHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes [`ThumbHash`]es with the configured algorithm and size.
pub struct ThumbHasher {
    hasher: Hasher,
}

impl ThumbHasher {
    pub fn new(config: &HashConfig) -> Self {
        let alg = match config.algorithm {
            HashAlgorithm::Mean => HashAlg::Mean,
            HashAlgorithm::Gradient => HashAlg::Gradient,
            HashAlgorithm::DoubleGradient => HashAlg::DoubleGradient,
            HashAlgorithm::Blockhash => HashAlg::Blockhash,
        };
        let hasher = HasherConfig::new()
            .hash_alg(alg)
            .hash_size(config.width, config.height)
            .to_hasher();
        Self { hasher }
    }

    pub fn hash(&self, thumbnail: &RgbaImage) -> ThumbHash {
        let img = DynamicImage::ImageRgba8(thumbnail.clone());
        ThumbHash::from_bytes(self.hasher.hash_image(&img).as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn hash(s: &str) -> ThumbHash {
        ThumbHash::parse(s).unwrap()
    }

    /// An icon-like crop: bright blob on a dark card, placed at `offset`.
    /// Both parts carry a horizontal ramp so no neighbouring cells tie.
    fn icon(offset: u32) -> RgbaImage {
        RgbaImage::from_fn(80, 60, |x, y| {
            let ramp = x as u8;
            let inside = x >= offset && x < offset + 30 && (15..45).contains(&y);
            if inside {
                Rgba([150 + ramp, 150 + ramp, 100 + ramp, 255])
            } else {
                Rgba([20 + ramp, 20 + ramp, 30 + ramp, 255])
            }
        })
    }

    #[test]
    fn test_parse_normalizes_case_and_rejects_garbage() {
        assert_eq!(hash("ABCdef01").as_str(), "abcdef01");
        assert!(ThumbHash::parse("").is_none());
        assert!(ThumbHash::parse("abc").is_none());
        assert!(ThumbHash::parse("zz00").is_none());
    }

    #[test]
    fn test_deserialize_goes_through_parse() {
        let parsed: ThumbHash = serde_json::from_str("\"00FF\"").unwrap();
        assert_eq!(parsed.as_str(), "00ff");
        assert!(serde_json::from_str::<ThumbHash>("\"zz00\"").is_err());
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"00ff\"");
    }

    #[test]
    fn test_distance() {
        assert_eq!(hash("ff00").distance(&hash("ff00")), Some(0));
        assert_eq!(hash("ff00").distance(&hash("ff01")), Some(1));
        assert_eq!(hash("0000000000000000").distance(&hash("000000000000001f")), Some(5));
        assert_eq!(hash("ff").distance(&hash("ff00")), None);
    }

    #[test]
    fn test_default_config_gives_16_hex_chars() {
        let hasher = ThumbHasher::new(&HashConfig::default());
        assert_eq!(hasher.hash(&icon(10)).as_str().len(), 16);
    }

    #[test]
    fn test_identical_crops_hash_identically() {
        let hasher = ThumbHasher::new(&HashConfig::default());
        assert_eq!(hasher.hash(&icon(10)), hasher.hash(&icon(10)));
    }

    #[test]
    fn test_minor_noise_stays_close() {
        let hasher = ThumbHasher::new(&HashConfig::default());
        let clean = icon(10);
        let mut noisy = clean.clone();
        for (x, y, p) in noisy.enumerate_pixels_mut() {
            if (x * 7 + y * 3) % 11 == 0 {
                p[0] = p[0].saturating_add(2);
            }
        }
        let d = hasher.hash(&clean).distance(&hasher.hash(&noisy)).unwrap();
        assert!(d <= 2, "distance was {}", d);
    }

    #[test]
    fn test_different_icons_differ() {
        let hasher = ThumbHasher::new(&HashConfig::default());
        assert_ne!(hasher.hash(&icon(5)), hasher.hash(&icon(45)));
    }
}
