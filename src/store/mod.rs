//! Thumbnail assets on disk and the offline near-duplicate cleanup.

pub mod cleanup;
pub mod thumbs;

pub use cleanup::{plan_merges, run_cleanup, CleanupOptions, CleanupReport, PlannedMerge};
pub use thumbs::{list_assets, ThumbnailAsset, ThumbnailStore};
