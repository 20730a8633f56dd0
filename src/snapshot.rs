//! Snapshot Assembler and snapshot file I/O.
//!
//! A snapshot is the persisted result of one capture session:
//!
//! ```json
//! {"timestamp": 1760860800,
//!  "categories": {"Helmet": [{"itemName": "Altyn", "price": 90000, "thumbHash": "…"}]}}
//! ```

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::identity::{CaptureSession, ThumbHash};

const FILE_NAME_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}_\d{2}-\d{2}(-\d{2})?\.json$";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotItem {
    pub item_name: String,
    pub price: u64,
    pub thumb_hash: ThumbHash,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unix seconds
    pub timestamp: i64,
    pub categories: BTreeMap<String, Vec<SnapshotItem>>,
}

impl Snapshot {
    /// Folds a session's buckets into a snapshot, keeping bucket order.
    pub fn assemble(session: &CaptureSession, timestamp: i64) -> Self {
        let categories = session
            .categories()
            .filter(|(_, items)| !items.is_empty())
            .map(|(label, items)| {
                let items = items
                    .iter()
                    .map(|item| SnapshotItem {
                        item_name: item.clean_name.clone(),
                        price: item.price,
                        thumb_hash: item.thumb_hash.clone(),
                    })
                    .collect();
                (label.to_string(), items)
            })
            .collect();
        Self {
            timestamp,
            categories,
        }
    }

    pub fn item_count(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    fn local_time(&self) -> Result<DateTime<Local>> {
        DateTime::from_timestamp(self.timestamp, 0)
            .map(|t| t.with_timezone(&Local))
            .ok_or_else(|| anyhow!("Snapshot timestamp {} out of range", self.timestamp))
    }

    /// `YYYY-MM-DD_HH-MM.json` in local time.
    pub fn file_name(&self) -> Result<String> {
        Ok(self.local_time()?.format("%Y-%m-%d_%H-%M.json").to_string())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))
    }

    fn write_temp(&self, dir: &Path) -> Result<NamedTempFile> {
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, self)?;
        tmp.flush()?;
        Ok(tmp)
    }

    /// Replaces `path` via a temp file in the same directory.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        self.write_temp(dir)?
            .persist(path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    /// Writes a new snapshot file into `dir`; never overwrites. A second
    /// session within the same minute gets a name with seconds.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let primary = dir.join(self.file_name()?);
        let tmp = self.write_temp(dir)?;
        let path = match tmp.persist_noclobber(&primary) {
            Ok(_) => primary,
            Err(e) => {
                let fallback = dir.join(self.local_time()?.format("%Y-%m-%d_%H-%M-%S.json").to_string());
                if fallback.exists() {
                    bail!("Snapshot {} already exists", fallback.display());
                }
                e.file
                    .persist_noclobber(&fallback)
                    .with_context(|| format!("Failed to write {}", fallback.display()))?;
                fallback
            }
        };
        log::info!("Saved snapshot {} ({} items)", path.display(), self.item_count());
        Ok(path)
    }

    /// Per-category counts and the `top_n` most expensive items.
    pub fn summary(&self, top_n: usize) -> SessionSummary {
        let counts = self
            .categories
            .iter()
            .map(|(category, items)| (category.clone(), items.len()))
            .collect();
        let mut top: Vec<(String, SnapshotItem)> = self
            .categories
            .iter()
            .flat_map(|(category, items)| items.iter().map(move |i| (category.clone(), i.clone())))
            .collect();
        top.sort_by(|a, b| {
            b.1.price
                .cmp(&a.1.price)
                .then_with(|| a.1.item_name.cmp(&b.1.item_name))
        });
        top.truncate(top_n);
        SessionSummary { counts, top }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub counts: Vec<(String, usize)>,
    pub top: Vec<(String, SnapshotItem)>,
}

impl SessionSummary {
    pub fn log(&self) {
        for (category, count) in &self.counts {
            log::info!("  {}: {} items", category, count);
        }
        for (i, (category, item)) in self.top.iter().enumerate() {
            log::info!("  #{} [{}] {} - {}", i + 1, category, item.item_name, item.price);
        }
    }
}

/// Snapshot files in `dir`, newest first by modification time.
pub fn list_snapshots(dir: &Path, limit: Option<usize>) -> Result<Vec<PathBuf>> {
    let pattern = Regex::new(FILE_NAME_PATTERN)?;
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !pattern.is_match(name) || !entry.file_type()?.is_file() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        found.push((modified, entry.path()));
    }
    found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    let limit = limit.unwrap_or(usize::MAX);
    Ok(found.into_iter().take(limit).map(|(_, path)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::session::tests::{label, record};
    use std::time::{Duration, SystemTime};

    fn sample_session() -> CaptureSession {
        let mut session = CaptureSession::new(100_000_000);
        session.observe(record("Helmet", "Aviator Helmet", 43_400, "a1b2c3d4e5f60718"));
        session.observe(record("Helmet", "Altyn", 90_000, "0f0f0f0f0f0f0f0f"));
        session.observe(record("Body Armor", "6B43", 250_000, "00ff00ff00ff00ff"));
        session
    }

    #[test]
    fn test_assemble_keeps_bucket_order() {
        let session = sample_session();
        let snapshot = Snapshot::assemble(&session, 1_760_860_800);
        assert_eq!(snapshot.item_count(), 3);
        let names: Vec<&str> = snapshot.categories["Helmet"]
            .iter()
            .map(|i| i.item_name.as_str())
            .collect();
        assert_eq!(names, ["Aviator Helmet", "Altyn"]);
        assert_eq!(session.items(&label("Helmet")).len(), 2);
    }

    #[test]
    fn test_json_shape_and_round_trip() {
        let snapshot = Snapshot::assemble(&sample_session(), 1_760_860_800);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["timestamp"], 1_760_860_800);
        assert_eq!(json["categories"]["Helmet"][0]["itemName"], "Aviator Helmet");
        assert_eq!(json["categories"]["Helmet"][0]["thumbHash"], "a1b2c3d4e5f60718");
        assert_eq!(json["categories"]["Body Armor"][0]["price"], 250_000);

        let dir = tempfile::tempdir().unwrap();
        let path = snapshot.save(dir.path()).unwrap();
        assert_eq!(Snapshot::load(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_file_name_format_and_no_overwrite() {
        let snapshot = Snapshot::assemble(&sample_session(), 1_760_860_800);
        let name = snapshot.file_name().unwrap();
        assert!(Regex::new(FILE_NAME_PATTERN).unwrap().is_match(&name), "{}", name);

        let dir = tempfile::tempdir().unwrap();
        let first = snapshot.save(dir.path()).unwrap();
        let second = snapshot.save(dir.path()).unwrap();
        assert_ne!(first, second);
        assert!(snapshot.save(dir.path()).is_err());
    }

    #[test]
    fn test_write_atomic_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2025-01-01_10-00.json");
        let mut snapshot = Snapshot::assemble(&sample_session(), 1_760_860_800);
        snapshot.write_atomic(&path).unwrap();
        snapshot.categories.remove("Body Armor");
        snapshot.write_atomic(&path).unwrap();
        assert_eq!(Snapshot::load(&path).unwrap().item_count(), 2);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_summary_top_by_price() {
        let snapshot = Snapshot::assemble(&sample_session(), 0);
        let summary = snapshot.summary(2);
        assert_eq!(
            summary.counts,
            vec![("Body Armor".to_string(), 1), ("Helmet".to_string(), 2)]
        );
        let top: Vec<&str> = summary.top.iter().map(|(_, i)| i.item_name.as_str()).collect();
        assert_eq!(top, ["6B43", "Altyn"]);
    }

    #[test]
    fn test_list_snapshots_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        for (i, name) in ["2025-01-01_10-00.json", "2025-01-02_10-00.json", "2025-01-03_10-00.json"]
            .iter()
            .enumerate()
        {
            let path = dir.path().join(name);
            let file = fs::File::create(&path).unwrap();
            file.set_modified(now - Duration::from_secs(3_600 * (3 - i as u64)))
                .unwrap();
        }
        fs::write(dir.path().join("notes.json"), "{}").unwrap();
        fs::create_dir(dir.path().join("thumbs")).unwrap();

        let all = list_snapshots(dir.path(), None).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].ends_with("2025-01-03_10-00.json"));
        assert_eq!(list_snapshots(dir.path(), Some(1)).unwrap().len(), 1);
    }
}
