//! Item identity and in-session deduplication.

pub mod audit;
pub mod hash;
pub mod session;

pub use audit::{audit_session, DuplicateAdvisory};
pub use hash::{ThumbHash, ThumbHasher};
pub use session::{CaptureRecord, CaptureSession, Observation};

use std::fmt;

use crate::vision::CategoryLabel;

/// Composite identity of an item: `category:cleanName#thumbHash`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub category: CategoryLabel,
    pub clean_name: String,
    pub thumb_hash: ThumbHash,
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.category, self.clean_name, self.thumb_hash)
    }
}

/// A validated item observation: named, priced, categorized and hashed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanonicalItem {
    pub category: CategoryLabel,
    pub clean_name: String,
    pub price: u64,
    pub thumb_hash: ThumbHash,
}

impl CanonicalItem {
    pub fn key(&self) -> ItemKey {
        ItemKey {
            category: self.category.clone(),
            clean_name: self.clean_name.clone(),
            thumb_hash: self.thumb_hash.clone(),
        }
    }
}
