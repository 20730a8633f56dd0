//! Offline thumbnail cleanup.
//!
//! The same item photographed twice can hash a few bits apart (scroll jitter,
//! hover effects), which leaves near-identical assets and split item keys.
//! Cleanup groups assets whose hashes are within a Hamming threshold, points
//! every snapshot at the canonical asset of each group, and deletes the rest.

use anyhow::Result;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use super::thumbs::{list_assets, ThumbnailAsset};
use crate::error::CleanupIntegrityError;
use crate::identity::ThumbHash;
use crate::snapshot::{list_snapshots, Snapshot, SnapshotItem};

#[derive(Debug, Clone)]
pub struct CleanupOptions {
    pub thumbs_dir: PathBuf,
    pub snapshots_dir: PathBuf,
    pub threshold: u32,
    /// Dry run when false
    pub apply: bool,
}

/// One asset folded into a canonical one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMerge {
    pub duplicate: ThumbHash,
    pub canonical: ThumbHash,
    pub distance: u32,
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub assets_scanned: usize,
    pub groups: usize,
    pub merges: Vec<PlannedMerge>,
    /// Snapshots whose references were (or would be) rewritten
    pub snapshots_changed: Vec<PathBuf>,
    pub snapshot_failures: Vec<(PathBuf, String)>,
    pub integrity_errors: Vec<CleanupIntegrityError>,
    pub deleted: Vec<ThumbHash>,
    pub kept_for_failed_snapshots: Vec<ThumbHash>,
    pub delete_failures: Vec<(PathBuf, String)>,
    pub applied: bool,
}

/// Groups assets greedily in canonical order (oldest first, then by file
/// name). Each asset not yet assigned becomes canonical and absorbs every
/// unassigned asset within `threshold` bits.
pub fn plan_merges(assets: &[ThumbnailAsset], threshold: u32) -> (usize, Vec<PlannedMerge>) {
    let mut order: Vec<usize> = (0..assets.len()).collect();
    order.sort_by(|&a, &b| {
        assets[a]
            .modified
            .cmp(&assets[b].modified)
            .then_with(|| assets[a].path.cmp(&assets[b].path))
    });
    let mut rank = vec![0usize; assets.len()];
    for (r, &i) in order.iter().enumerate() {
        rank[i] = r;
    }

    // Read-only, so the O(n²) distance scan is spread over all cores
    let neighbours: Vec<Vec<(usize, u32)>> = (0..assets.len())
        .into_par_iter()
        .map(|i| {
            let mut near: Vec<(usize, u32)> = (0..assets.len())
                .filter(|&j| j != i)
                .filter_map(|j| {
                    let d = assets[i].hash.distance(&assets[j].hash)?;
                    (d <= threshold).then_some((j, d))
                })
                .collect();
            near.sort_by_key(|&(j, _)| rank[j]);
            near
        })
        .collect();

    let mut assigned = vec![false; assets.len()];
    let mut groups = 0;
    let mut merges = Vec::new();
    for &i in &order {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        groups += 1;
        for &(j, distance) in &neighbours[i] {
            if !assigned[j] {
                assigned[j] = true;
                merges.push(PlannedMerge {
                    duplicate: assets[j].hash.clone(),
                    canonical: assets[i].hash.clone(),
                    distance,
                });
            }
        }
    }
    (groups, merges)
}

/// Outcome of rewriting one snapshot's references in memory.
struct Rewrite {
    snapshot: Snapshot,
    changed: bool,
    integrity_errors: Vec<CleanupIntegrityError>,
}

fn rewrite_snapshot(
    path: &Path,
    mut snapshot: Snapshot,
    remap: &HashMap<ThumbHash, ThumbHash>,
    known: &HashSet<ThumbHash>,
) -> Rewrite {
    let mut changed = false;
    let mut integrity_errors = Vec::new();

    for (category, items) in snapshot.categories.iter_mut() {
        let mut category_changed = false;
        for item in items.iter_mut() {
            if !known.contains(&item.thumb_hash) {
                integrity_errors.push(CleanupIntegrityError {
                    snapshot: path.to_path_buf(),
                    category: category.clone(),
                    item_name: item.item_name.clone(),
                    thumb_hash: item.thumb_hash.to_string(),
                });
                continue;
            }
            if let Some(canonical) = remap.get(&item.thumb_hash) {
                item.thumb_hash = canonical.clone();
                category_changed = true;
            }
        }
        if category_changed {
            collapse_duplicates(items);
            changed = true;
        }
    }

    Rewrite {
        snapshot,
        changed,
        integrity_errors,
    }
}

/// Items that now share name and hash collapse into the first position,
/// taking the later price.
fn collapse_duplicates(items: &mut Vec<SnapshotItem>) {
    let mut seen: HashMap<(String, ThumbHash), usize> = HashMap::new();
    let mut kept: Vec<SnapshotItem> = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        let key = (item.item_name.clone(), item.thumb_hash.clone());
        match seen.get(&key) {
            Some(&i) => kept[i].price = item.price,
            None => {
                seen.insert(key, kept.len());
                kept.push(item);
            }
        }
    }
    *items = kept;
}

/// Runs cleanup. Fails only if the thumbnail or snapshot directory cannot be
/// read; everything per-file lands in the report.
pub fn run_cleanup(options: &CleanupOptions) -> Result<CleanupReport> {
    let assets = list_assets(&options.thumbs_dir)?;
    let (groups, merges) = plan_merges(&assets, options.threshold);
    log::info!(
        "Cleanup: {} assets, {} groups, {} merges at threshold {}",
        assets.len(),
        groups,
        merges.len(),
        options.threshold
    );

    let mut report = CleanupReport {
        assets_scanned: assets.len(),
        groups,
        merges: merges.clone(),
        applied: options.apply,
        ..CleanupReport::default()
    };

    let known: HashSet<ThumbHash> = assets.iter().map(|a| a.hash.clone()).collect();
    let remap: HashMap<ThumbHash, ThumbHash> = merges
        .iter()
        .map(|m| (m.duplicate.clone(), m.canonical.clone()))
        .collect();
    let mut still_referenced: HashSet<ThumbHash> = HashSet::new();
    // An unreadable snapshot may reference any duplicate
    let mut unreadable = 0;

    for path in list_snapshots(&options.snapshots_dir, None)? {
        let snapshot = match Snapshot::load(&path) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Skipping unreadable snapshot {}: {:#}", path.display(), e);
                report.snapshot_failures.push((path, format!("{:#}", e)));
                unreadable += 1;
                continue;
            }
        };
        let original_refs: Vec<ThumbHash> = snapshot
            .categories
            .values()
            .flatten()
            .map(|i| i.thumb_hash.clone())
            .collect();

        let rewrite = rewrite_snapshot(&path, snapshot, &remap, &known);
        for err in &rewrite.integrity_errors {
            log::warn!("{}", err);
        }
        report.integrity_errors.extend(rewrite.integrity_errors);
        if !rewrite.changed {
            continue;
        }

        if options.apply {
            if let Err(e) = rewrite.snapshot.write_atomic(&path) {
                log::error!("Failed to rewrite {}: {:#}", path.display(), e);
                still_referenced.extend(original_refs);
                report.snapshot_failures.push((path, format!("{:#}", e)));
                continue;
            }
            log::info!("Rewrote {}", path.display());
        }
        report.snapshots_changed.push(path);
    }

    for merge in &merges {
        log::info!(
            "{} {} -> {} (distance {})",
            if options.apply { "Merge" } else { "Would merge" },
            merge.duplicate,
            merge.canonical,
            merge.distance
        );
    }
    if !options.apply {
        return Ok(report);
    }

    if unreadable > 0 {
        log::warn!(
            "{} snapshots could not be read; keeping all {} duplicates",
            unreadable,
            merges.len()
        );
        report.kept_for_failed_snapshots = merges.iter().map(|m| m.duplicate.clone()).collect();
        return Ok(report);
    }

    let paths: HashMap<&ThumbHash, &Path> = assets.iter().map(|a| (&a.hash, a.path.as_path())).collect();
    for merge in &merges {
        if still_referenced.contains(&merge.duplicate) {
            report.kept_for_failed_snapshots.push(merge.duplicate.clone());
            continue;
        }
        let Some(path) = paths.get(&merge.duplicate) else {
            continue;
        };
        match fs::remove_file(path) {
            Ok(()) => report.deleted.push(merge.duplicate.clone()),
            Err(e) => {
                log::error!("Failed to delete {}: {}", path.display(), e);
                report.delete_failures.push((path.to_path_buf(), e.to_string()));
            }
        }
    }
    log::info!("Cleanup: deleted {} duplicate thumbnails", report.deleted.len());
    Ok(report)
}
