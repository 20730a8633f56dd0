//! Post-session duplicate audit.
//!
//! OCR sometimes reads the same item two ways ("Aviator Helmet" and
//! "Aviotor Helmet"), which yields two keys. Within a category, pairs with the
//! same price and near-identical names are reported so the name mapping can be
//! extended. Nothing is merged here.

use strsim::normalized_levenshtein;

use super::{CaptureSession, ItemKey};

/// Names at or above this similarity are flagged.
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

#[derive(Clone, Debug, PartialEq)]
pub struct DuplicateAdvisory {
    pub first: ItemKey,
    pub second: ItemKey,
    pub price: u64,
    pub similarity: f64,
}

pub fn audit_session(session: &CaptureSession) -> Vec<DuplicateAdvisory> {
    let mut advisories = Vec::new();
    for (_, items) in session.categories() {
        for (i, a) in items.iter().enumerate() {
            let a_name = a.clean_name.to_lowercase();
            for b in &items[i + 1..] {
                if a.price != b.price {
                    continue;
                }
                let similarity = normalized_levenshtein(&a_name, &b.clean_name.to_lowercase());
                if similarity >= SIMILARITY_THRESHOLD {
                    advisories.push(DuplicateAdvisory {
                        first: a.key(),
                        second: b.key(),
                        price: a.price,
                        similarity,
                    });
                }
            }
        }
    }
    advisories
}
