//! Reference layout configuration.
//!
//! Every geometry-dependent stage receives a `LayoutConfig` explicitly. It is
//! loaded from `config.json`; missing fields fall back to the 1600x900
//! reference layout below.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::geometry::Rect;

/// Complete layout and tuning configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub grid: GridConfig,
    pub card: CardConfig,
    pub navigation: NavigationConfig,
    pub ocr: OcrConfig,
    /// Prices above this are treated as OCR misreads
    pub price_ceiling: u64,
    pub hash: HashConfig,
    /// Height of stored thumbnails in pixels (aspect ratio is kept)
    pub thumbnail_height: u32,
    /// Hamming distance at or below which cleanup merges two thumbnails
    pub cleanup_threshold: u32,
}

/// The scrolling item grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Visible scroll window of the grid, in frame pixels
    pub region: Rect,
    pub columns: u32,
    /// Horizontal distance between the left edges of adjacent cards
    pub column_pitch: u32,
    /// Vertical distance between the top edges of adjacent rows
    pub row_pitch: u32,
    /// Left edge of the first column, relative to `region.x`
    pub column_offset: i32,
}

/// Card size and the sub-regions inside a card, relative to its top-left.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CardConfig {
    pub width: u32,
    pub height: u32,
    /// Relative size tolerance when matching contours against the card size
    pub size_tolerance: f32,
    /// Two candidates overlapping by more than this fraction are one card
    pub overlap_fraction: f32,
    pub name: Rect,
    pub price: Rect,
    pub thumbnail: Rect,
    /// Pixels cut from the left of the price region (currency icon)
    pub price_left_crop: u32,
    /// Canny thresholds for card edge detection
    pub edge_low: f32,
    pub edge_high: f32,
}

/// Inclusive HSV range in OpenCV scale (H 0-180, S and V 0-255).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| hsv[i] >= self.lower[i] && hsv[i] <= self.upper[i])
    }
}

/// One row of the category navigation tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub label: String,
    /// Top of the row relative to the navigation region (inclusive)
    pub top: i32,
    /// Bottom of the row relative to the navigation region (exclusive)
    pub bottom: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub region: Rect,
    pub highlight: HsvRange,
    /// Highlight boxes smaller than this (in pixels) are noise
    pub min_mask_area: u64,
    pub entries: Vec<MenuEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Explicit Tesseract executable; searched for when absent
    pub tesseract_path: Option<PathBuf>,
    pub language: String,
    /// Tesseract page segmentation mode (7 = single text line)
    pub psm: u32,
    /// Tesseract engine mode (1 = LSTM only)
    pub oem: u32,
    /// Upscale factor applied before OCR
    pub upscale: f32,
    pub price_whitelist: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    Mean,
    Gradient,
    DoubleGradient,
    Blockhash,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HashConfig {
    pub algorithm: HashAlgorithm,
    pub width: u32,
    pub height: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            card: CardConfig::default(),
            navigation: NavigationConfig::default(),
            ocr: OcrConfig::default(),
            price_ceiling: 100_000_000,
            hash: HashConfig::default(),
            thumbnail_height: 96,
            cleanup_threshold: 8,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            region: Rect::new(330, 170, 1250, 710),
            columns: 7,
            column_pitch: 176,
            row_pitch: 232,
            column_offset: 4,
        }
    }
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            width: 168,
            height: 224,
            size_tolerance: 0.15,
            overlap_fraction: 0.5,
            name: Rect::new(0, 0, 168, 22),
            thumbnail: Rect::new(0, 22, 168, 156),
            price: Rect::new(0, 184, 168, 32),
            price_left_crop: 26,
            edge_low: 30.0,
            edge_high: 100.0,
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        let labels = [
            "Helmet",
            "Body Armor",
            "Chest Rig",
            "Backpack",
            "Weapon",
            "Ammo",
            "Medical",
            "Provisions",
            "Keys",
            "Valuables",
        ];
        let entries = labels
            .iter()
            .enumerate()
            .map(|(i, label)| MenuEntry {
                label: label.to_string(),
                top: i as i32 * 44,
                bottom: i as i32 * 44 + 40,
            })
            .collect();

        Self {
            region: Rect::new(20, 170, 290, 700),
            // Orange selection highlight
            highlight: HsvRange {
                lower: [5, 100, 100],
                upper: [25, 255, 255],
            },
            min_mask_area: 400,
            entries,
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: None,
            language: "eng".to_string(),
            psm: 7,
            oem: 1,
            upscale: 3.0,
            price_whitelist: "0123456789,.".to_string(),
        }
    }
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Gradient,
            width: 8,
            height: 8,
        }
    }
}

impl LayoutConfig {
    /// Reads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: LayoutConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if it exists and is valid, otherwise the reference layout.
    pub fn load_or_default(path: &Path) -> Self {
        log::info!("Looking for config at: {}", path.display());

        if !path.exists() {
            log::info!("{} not found. Using reference layout.", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => {
                log::info!("Config loaded from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("{:#}. Using reference layout.", e);
                Self::default()
            }
        }
    }

    /// Rejects layouts the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let card = &self.card;
        if card.width == 0 || card.height == 0 {
            bail!("card size must be non-zero");
        }
        let bounds = Rect::new(0, 0, card.width, card.height);
        for (name, rect) in [
            ("name", &card.name),
            ("price", &card.price),
            ("thumbnail", &card.thumbnail),
        ] {
            if rect.is_empty() || !bounds.contains(rect) {
                bail!("card {} region {:?} must lie inside the card", name, rect);
            }
        }
        if card.price_left_crop >= card.price.width {
            bail!("price_left_crop must be narrower than the price region");
        }
        if !(0.0..1.0).contains(&card.size_tolerance) {
            bail!("size_tolerance must be in [0, 1)");
        }
        if self.grid.columns == 0 || self.grid.column_pitch == 0 || self.grid.row_pitch == 0 {
            bail!("grid columns and pitch must be non-zero");
        }
        if self.hash.width == 0 || self.hash.height == 0 {
            bail!("hash size must be non-zero");
        }
        if self.ocr.upscale <= 0.0 {
            bail!("ocr upscale must be positive");
        }

        let mut seen = HashSet::new();
        for entry in &self.navigation.entries {
            let label = entry.label.trim();
            if label.is_empty() {
                bail!("menu entry labels must not be empty");
            }
            if label.eq_ignore_ascii_case("unknown") {
                bail!("\"{}\" is reserved and cannot be a menu entry", entry.label);
            }
            if entry.bottom <= entry.top {
                bail!("menu entry {:?} has an empty y-range", entry.label);
            }
            if !seen.insert(label.to_string()) {
                return Err(anyhow!("duplicate menu entry {:?}", entry.label));
            }
        }
        if self.navigation.entries.is_empty() {
            bail!("navigation needs at least one menu entry");
        }

        Ok(())
    }

    /// Number of hex characters in a thumbnail hash for this configuration.
    pub fn hash_hex_len(&self) -> usize {
        ((self.hash.width * self.hash.height) as usize).div_ceil(8) * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_layout_is_valid() {
        LayoutConfig::default().validate().unwrap();
        assert_eq!(LayoutConfig::default().hash_hex_len(), 16);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"price_ceiling": 5000, "card": {"width": 170}}"#).unwrap();

        let config = LayoutConfig::load(&path).unwrap();
        assert_eq!(config.price_ceiling, 5000);
        assert_eq!(config.card.width, 170);
        assert_eq!(config.card.height, CardConfig::default().height);
        assert_eq!(config.cleanup_threshold, 8);
    }

    #[test]
    fn test_load_or_default_on_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        let config = LayoutConfig::load_or_default(&path);
        assert_eq!(config.price_ceiling, LayoutConfig::default().price_ceiling);
    }

    #[test]
    fn test_reserved_and_duplicate_labels_rejected() {
        let mut config = LayoutConfig::default();
        config.navigation.entries[0].label = "Unknown".to_string();
        assert!(config.validate().is_err());

        let mut config = LayoutConfig::default();
        config.navigation.entries[1].label = config.navigation.entries[0].label.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_subregion_outside_card_rejected() {
        let mut config = LayoutConfig::default();
        config.card.price = Rect::new(0, 220, 168, 32);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hsv_range_contains() {
        let range = HsvRange {
            lower: [5, 100, 100],
            upper: [25, 255, 255],
        };
        assert!(range.contains([15, 200, 200]));
        assert!(!range.contains([30, 200, 200]));
        assert!(!range.contains([15, 50, 200]));
    }
}
