//! Capture session: the accumulator every accepted card is folded into.

use chrono::{DateTime, Local};
use std::collections::{BTreeMap, HashMap};

use super::{CanonicalItem, ItemKey};
use crate::error::CorrectionError;
use crate::vision::CategoryLabel;

/// Whether an observation introduced a new item or repeated a known one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Observation {
    New,
    Duplicate,
}

/// One accepted capture, kept in arrival order for manual correction.
#[derive(Clone, Debug)]
pub struct CaptureRecord {
    pub raw_name: String,
    pub raw_price: String,
    pub item: CanonicalItem,
    pub captured_at: DateTime<Local>,
}

#[derive(Debug, Default)]
struct Bucket {
    items: Vec<CanonicalItem>,
    index: HashMap<ItemKey, usize>,
}

impl Bucket {
    fn upsert(&mut self, item: CanonicalItem) -> Observation {
        let key = item.key();
        match self.index.get(&key) {
            Some(&i) => {
                self.items[i].price = item.price;
                Observation::Duplicate
            }
            None => {
                self.index.insert(key, self.items.len());
                self.items.push(item);
                Observation::New
            }
        }
    }

    fn set_price(&mut self, key: &ItemKey, price: u64) {
        if let Some(&i) = self.index.get(key) {
            self.items[i].price = price;
        }
    }
}

/// Per-category item buckets plus the chronological capture list.
#[derive(Debug)]
pub struct CaptureSession {
    buckets: BTreeMap<CategoryLabel, Bucket>,
    captures: Vec<CaptureRecord>,
    price_ceiling: u64,
}

impl CaptureSession {
    pub fn new(price_ceiling: u64) -> Self {
        Self {
            buckets: BTreeMap::new(),
            captures: Vec::new(),
            price_ceiling,
        }
    }

    /// Folds one capture in. An unseen key is appended to its category's
    /// bucket; a seen key takes the new price.
    pub fn observe(&mut self, record: CaptureRecord) -> Observation {
        let observation = self
            .buckets
            .entry(record.item.category.clone())
            .or_default()
            .upsert(record.item.clone());
        log::debug!("{:?}: {} @ {}", observation, record.item.key(), record.item.price);
        self.captures.push(record);
        observation
    }

    /// The last `n` accepted captures in arrival order, with their indices.
    pub fn recent_captures(&self, n: usize) -> Vec<(usize, &CaptureRecord)> {
        let start = self.captures.len().saturating_sub(n);
        self.captures.iter().enumerate().skip(start).collect()
    }

    /// Overwrites the price of capture `index` and re-derives the stored
    /// price of its item from the most recent capture of the same key.
    pub fn correct_price(&mut self, index: usize, price: u64) -> Result<(), CorrectionError> {
        if price > self.price_ceiling {
            return Err(CorrectionError::PriceOutOfRange {
                price,
                ceiling: self.price_ceiling,
            });
        }
        let len = self.captures.len();
        let record = self
            .captures
            .get_mut(index)
            .ok_or(CorrectionError::NoSuchCapture { index, len })?;
        let old = record.item.price;
        record.item.price = price;
        let key = record.item.key();

        let latest = self
            .captures
            .iter()
            .rev()
            .find(|r| r.item.key() == key)
            .map(|r| r.item.price)
            .unwrap_or(price);
        if let Some(bucket) = self.buckets.get_mut(&key.category) {
            bucket.set_price(&key, latest);
        }
        log::info!("Corrected capture #{} ({}): {} -> {}", index, key, old, price);
        Ok(())
    }

    pub fn items(&self, category: &CategoryLabel) -> &[CanonicalItem] {
        self.buckets
            .get(category)
            .map(|b| b.items.as_slice())
            .unwrap_or(&[])
    }

    /// Non-empty buckets in label order.
    pub fn categories(&self) -> impl Iterator<Item = (&CategoryLabel, &[CanonicalItem])> {
        self.buckets
            .iter()
            .map(|(label, bucket)| (label, bucket.items.as_slice()))
    }

    pub fn item_count(&self) -> usize {
        self.buckets.values().map(|b| b.items.len()).sum()
    }

    pub fn capture_count(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::identity::ThumbHash;
    use crate::vision::category::tests::test_navigation;
    use crate::vision::CategoryTable;

    pub fn label(name: &str) -> CategoryLabel {
        CategoryTable::from_config(&test_navigation())
            .resolve(name)
            .unwrap()
    }

    pub fn record(category: &str, name: &str, price: u64, hash: &str) -> CaptureRecord {
        CaptureRecord {
            raw_name: name.to_string(),
            raw_price: price.to_string(),
            item: CanonicalItem {
                category: label(category),
                clean_name: name.to_string(),
                price,
                thumb_hash: ThumbHash::parse(hash).unwrap(),
            },
            captured_at: Local::now(),
        }
    }

    const H1: &str = "a1b2c3d4e5f60718";
    const H2: &str = "0f0f0f0f0f0f0f0f";

    #[test]
    fn test_same_key_collapses_with_last_price() {
        let mut session = CaptureSession::new(100_000_000);
        assert_eq!(session.observe(record("Helmet", "Aviator Helmet", 100, H1)), Observation::New);
        assert_eq!(
            session.observe(record("Helmet", "Aviator Helmet", 120, H1)),
            Observation::Duplicate
        );

        let items = session.items(&label("Helmet"));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].price, 120);
        assert_eq!(session.capture_count(), 2);
    }

    #[test]
    fn test_distinct_hash_does_not_collapse() {
        let mut session = CaptureSession::new(100_000_000);
        session.observe(record("Helmet", "Aviator Helmet", 100, H1));
        assert_eq!(session.observe(record("Helmet", "Aviator Helmet", 100, H2)), Observation::New);
        assert_eq!(session.items(&label("Helmet")).len(), 2);
    }

    #[test]
    fn test_categories_are_isolated() {
        let mut session = CaptureSession::new(100_000_000);
        session.observe(record("Helmet", "Ratnik", 100, H1));
        assert_eq!(session.observe(record("Body Armor", "Ratnik", 100, H1)), Observation::New);
        assert_eq!(session.items(&label("Helmet")).len(), 1);
        assert_eq!(session.items(&label("Body Armor")).len(), 1);
        assert_eq!(session.item_count(), 2);
    }

    #[test]
    fn test_later_duplicate_keeps_first_position() {
        // Scroll down past a card and back up again: it is recognized and
        // only its price moves.
        let mut session = CaptureSession::new(100_000_000);
        session.observe(record("Helmet", "Aviator Helmet", 43_400, H1));
        session.observe(record("Helmet", "Altyn", 90_000, H2));
        assert_eq!(
            session.observe(record("Helmet", "Aviator Helmet", 41_000, H1)),
            Observation::Duplicate
        );

        let items = session.items(&label("Helmet"));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].clean_name, "Aviator Helmet");
        assert_eq!(items[0].price, 41_000);
        assert_eq!(items[1].clean_name, "Altyn");
    }

    #[test]
    fn test_recent_captures() {
        let mut session = CaptureSession::new(100_000_000);
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            session.observe(record("Helmet", name, i as u64, H1));
        }
        let recent = session.recent_captures(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].0, 1);
        assert_eq!(recent[1].1.item.clean_name, "c");
        assert_eq!(session.recent_captures(10).len(), 3);
    }

    #[test]
    fn test_correct_latest_capture_updates_item() {
        let mut session = CaptureSession::new(100_000_000);
        session.observe(record("Helmet", "Aviator Helmet", 100, H1));
        session.observe(record("Helmet", "Aviator Helmet", 4_400, H1));
        session.correct_price(1, 43_400).unwrap();
        assert_eq!(session.items(&label("Helmet"))[0].price, 43_400);
    }

    #[test]
    fn test_correct_older_capture_keeps_latest_price() {
        let mut session = CaptureSession::new(100_000_000);
        session.observe(record("Helmet", "Aviator Helmet", 100, H1));
        session.observe(record("Helmet", "Aviator Helmet", 200, H1));
        session.correct_price(0, 150).unwrap();
        assert_eq!(session.items(&label("Helmet"))[0].price, 200);
        assert_eq!(session.recent_captures(2)[0].1.item.price, 150);
    }

    #[test]
    fn test_correct_rejects_bad_input() {
        let mut session = CaptureSession::new(1_000);
        session.observe(record("Helmet", "Aviator Helmet", 100, H1));
        assert_eq!(
            session.correct_price(5, 10),
            Err(CorrectionError::NoSuchCapture { index: 5, len: 1 })
        );
        assert!(matches!(
            session.correct_price(0, 5_000),
            Err(CorrectionError::PriceOutOfRange { .. })
        ));
        assert_eq!(session.items(&label("Helmet"))[0].price, 100);
    }
}
