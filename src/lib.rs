//! Market Collector
//!
//! Turns screen captures of an in-game marketplace into a deduplicated catalog
//! of items with prices and thumbnails. Frames go through category
//! classification, card location, OCR and in-session deduplication; the
//! session is saved as a timestamped snapshot. An offline cleanup pass merges
//! near-identical thumbnails across snapshots.

pub mod config;
pub mod error;
pub mod geometry;
pub mod identity;
pub mod logging;
pub mod mapping;
pub mod ocr;
pub mod paths;
pub mod pipeline;
pub mod snapshot;
pub mod store;
pub mod vision;
