//! User-maintained lookup tables: OCR text → clean name, item key → display
//! label.
//!
//! Both are flat JSON objects of strings. Keys starting with `_` hold notes
//! and are ignored, as are non-string values.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::snapshot::Snapshot;

fn load_table(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        log::info!("Mapping file {} not found, using an empty table", path.display());
        return Ok(HashMap::new());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read mapping file {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse mapping file {}", path.display()))?;
    let Value::Object(entries) = value else {
        anyhow::bail!("Mapping file {} is not a JSON object", path.display());
    };

    let table: HashMap<String, String> = entries
        .into_iter()
        .filter(|(key, _)| !key.starts_with('_'))
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key, s)),
            _ => None,
        })
        .collect();
    log::info!("Loaded {} mappings from {}", table.len(), path.display());
    Ok(table)
}

/// Exact-match OCR → clean name substitution.
#[derive(Debug, Clone, Default)]
pub struct NameMapping {
    table: HashMap<String, String>,
}

impl NameMapping {
    /// A missing file is an empty table.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            table: load_table(path)?,
        })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            table: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn canonicalize(&self, raw: &str) -> String {
        self.table
            .get(raw)
            .cloned()
            .unwrap_or_else(|| raw.to_string())
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Item key → human label, for display surfaces.
#[derive(Debug, Clone, Default)]
pub struct DisplayMapping {
    table: HashMap<String, String>,
}

impl DisplayMapping {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            table: load_table(path)?,
        })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            table: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Looks up the full key, then `category:name` without the hash, then
    /// falls back to the clean-name part of the key.
    pub fn display_name(&self, item_key: &str) -> String {
        if let Some(label) = self.lookup(item_key) {
            return label.to_string();
        }
        let without_hash = item_key.rsplit_once('#').map_or(item_key, |(head, _)| head);
        without_hash
            .split_once(':')
            .map_or(without_hash, |(_, name)| name)
            .to_string()
    }

    fn lookup(&self, item_key: &str) -> Option<&str> {
        if let Some(label) = self.table.get(item_key) {
            return Some(label);
        }
        let (head, _) = item_key.rsplit_once('#')?;
        self.table.get(head).map(String::as_str)
    }
}

/// An item name found in stored snapshots without a display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmappedName {
    pub item_name: String,
    pub price: u64,
}

/// Clean names that have no display mapping, grouped by category and sorted
/// by price (highest first). Each name is listed once, with the first price
/// seen; pass snapshots newest first to report current prices.
pub fn unmapped_names(
    snapshots: &[Snapshot],
    display: &DisplayMapping,
) -> BTreeMap<String, Vec<UnmappedName>> {
    let mut report: BTreeMap<String, Vec<UnmappedName>> = BTreeMap::new();
    for snapshot in snapshots {
        for (category, items) in &snapshot.categories {
            for item in items {
                let key = format!("{}:{}#{}", category, item.item_name, item.thumb_hash);
                if display.lookup(&key).is_some() {
                    continue;
                }
                let names = report.entry(category.clone()).or_default();
                if !names.iter().any(|n| n.item_name == item.item_name) {
                    names.push(UnmappedName {
                        item_name: item.item_name.clone(),
                        price: item.price,
                    });
                }
            }
        }
    }
    for names in report.values_mut() {
        names.sort_by(|a, b| b.price.cmp(&a.price).then_with(|| a.item_name.cmp(&b.item_name)));
    }
    report
}
