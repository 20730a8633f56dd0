//! Error kinds raised by the capture pipeline and the thumbnail cleanup pass.
//!
//! None of these abort a capture session. The pipeline reports them per card
//! or per frame and keeps going; cleanup reports them per snapshot entry.

use std::path::PathBuf;

use thiserror::Error;

/// Why a card's text could not be turned into a name/price pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("price text {raw:?} contains no digits")]
    EmptyPrice { raw: String },

    #[error("price {raw:?} is outside 0..={ceiling}")]
    PriceOutOfRange { raw: String, ceiling: u64 },

    #[error("name text is empty after normalization")]
    EmptyName,
}

/// Per-frame and per-card failures of the live capture pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Grid or navigation region not found in the frame.
    #[error("geometry: {0}")]
    Geometry(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("OCR engine failed: {0}")]
    Ocr(#[source] anyhow::Error),

    #[error("category could not be determined")]
    UnknownCategory,

    #[error("thumbnail asset {path}: {source}")]
    AssetIo {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

/// A manual price correction that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrectionError {
    #[error("no capture #{index} in this session ({len} recorded)")]
    NoSuchCapture { index: usize, len: usize },

    #[error("corrected price {price} exceeds the ceiling {ceiling}")]
    PriceOutOfRange { price: u64, ceiling: u64 },
}

/// A snapshot references a thumbnail hash that has no asset in the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{snapshot}: [{category}] {item_name} references missing thumbnail {thumb_hash}")]
pub struct CleanupIntegrityError {
    pub snapshot: PathBuf,
    pub category: String,
    pub item_name: String,
    pub thumb_hash: String,
}
