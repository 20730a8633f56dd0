//! Market Collector
//!
//! Command-line front end: `collect` turns a directory of captured frames into
//! a snapshot, `cleanup` merges near-duplicate thumbnails, `unmapped` lists
//! item names still missing a display label.

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use market_collector::config::LayoutConfig;
use market_collector::identity::audit_session;
use market_collector::logging;
use market_collector::mapping::{unmapped_names, DisplayMapping, NameMapping};
use market_collector::ocr::TesseractEngine;
use market_collector::paths::DataDir;
use market_collector::pipeline::{Frame, Pipeline};
use market_collector::snapshot::{list_snapshots, Snapshot};
use market_collector::store::{list_assets, run_cleanup, CleanupOptions, ThumbnailStore};

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

#[derive(Parser, Debug)]
#[command(name = "market-collector")]
#[command(version)]
#[command(about = "Builds a price catalog from marketplace screenshots", long_about = None)]
struct Cli {
    /// Data directory (defaults to the executable's directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Layout configuration file (defaults to <data-dir>/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process a directory of frames into a snapshot
    Collect {
        /// Directory of captured frames, processed in file-name order
        frames: PathBuf,

        /// Items listed in the session summary
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Print the last N captures with their provisional prices
        #[arg(long, default_value_t = 0)]
        review: usize,
    },

    /// Merge near-duplicate thumbnails (dry run unless --apply)
    Cleanup {
        #[arg(long)]
        apply: bool,

        /// Maximum Hamming distance for a merge
        #[arg(long)]
        threshold: Option<u32>,

        #[arg(long)]
        thumbs: Option<PathBuf>,

        #[arg(long)]
        snapshots: Option<PathBuf>,
    },

    /// List item names in recent snapshots without a display label
    Unmapped {
        /// Number of newest snapshots to scan
        #[arg(long, default_value_t = 1)]
        last: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let data = cli
        .data_dir
        .clone()
        .map(DataDir::new)
        .unwrap_or_else(DataDir::beside_exe);
    if let Err(e) = data.ensure_directories() {
        eprintln!("Failed to prepare {}: {}", data.root().display(), e);
        return ExitCode::FAILURE;
    }
    logging::init(&data.logs_dir(), cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(|| data.config_file());
    let layout = LayoutConfig::load_or_default(&config_path);

    let result = match cli.command {
        Commands::Collect {
            frames,
            top,
            review,
        } => collect(&data, layout, &frames, top, review),
        Commands::Cleanup {
            apply,
            threshold,
            thumbs,
            snapshots,
        } => {
            let options = CleanupOptions {
                thumbs_dir: thumbs.unwrap_or_else(|| data.thumbs_dir()),
                snapshots_dir: snapshots.unwrap_or_else(|| data.snapshots_dir()),
                threshold: threshold.unwrap_or(layout.cleanup_threshold),
                apply,
            };
            cleanup(&options, &layout)
        }
        Commands::Unmapped { last } => unmapped(&data, last),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn frame_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read frames directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn collect(data: &DataDir, layout: LayoutConfig, frames_dir: &Path, top: usize, review: usize) -> Result<()> {
    let frames = frame_files(frames_dir)?;
    if frames.is_empty() {
        bail!("No frames found in {}", frames_dir.display());
    }

    let engine = TesseractEngine::from_config(&layout.ocr)?;
    let names = NameMapping::load(&data.ocr_mapping_file())?;
    let store = ThumbnailStore::new(data.thumbs_dir(), layout.thumbnail_height);
    let pipeline = Pipeline::new(layout, Box::new(engine), names, store);
    let mut session = pipeline.new_session();

    log::info!("Processing {} frames from {}", frames.len(), frames_dir.display());
    for path in &frames {
        let frame = match Frame::open(path) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("{:#}", e);
                continue;
            }
        };
        log::debug!("Frame {}", path.display());
        pipeline.process_frame(&mut session, &frame);
    }

    if review > 0 {
        for (index, record) in session.recent_captures(review) {
            log::info!(
                "  capture #{}: {} | raw {:?} -> {}",
                index,
                record.item.key(),
                record.raw_price,
                record.item.price
            );
        }
    }

    for advisory in audit_session(&session) {
        log::warn!(
            "Possible duplicate at {}: {} / {} (similarity {:.2})",
            advisory.price,
            advisory.first,
            advisory.second,
            advisory.similarity
        );
    }

    if session.item_count() == 0 {
        log::warn!("No items captured; no snapshot written");
        return Ok(());
    }

    let snapshot = Snapshot::assemble(&session, Local::now().timestamp());
    snapshot.save(&data.snapshots_dir())?;
    log::info!(
        "Session: {} items from {} captures",
        session.item_count(),
        session.capture_count()
    );
    snapshot.summary(top).log();
    Ok(())
}

fn cleanup(options: &CleanupOptions, layout: &LayoutConfig) -> Result<()> {
    let assets = list_assets(&options.thumbs_dir)?;
    if assets.is_empty() {
        return Err(anyhow!("No thumbnails in {}", options.thumbs_dir.display()));
    }
    let expected = layout.hash_hex_len();
    let odd = assets
        .iter()
        .filter(|a| a.hash.as_str().len() != expected)
        .count();
    if odd > 0 {
        log::warn!(
            "{} thumbnails do not have {}-character hashes and will not be merged",
            odd,
            expected
        );
    }

    let report = run_cleanup(options)?;
    log::info!(
        "{} assets in {} groups; {} merges; {} snapshots {}",
        report.assets_scanned,
        report.groups,
        report.merges.len(),
        report.snapshots_changed.len(),
        if report.applied { "rewritten" } else { "would change" }
    );
    if !report.integrity_errors.is_empty() {
        log::warn!("{} snapshot entries reference missing thumbnails", report.integrity_errors.len());
    }
    for (path, reason) in &report.snapshot_failures {
        log::warn!("Snapshot {} not processed: {}", path.display(), reason);
    }
    if !report.kept_for_failed_snapshots.is_empty() {
        log::warn!(
            "{} duplicates kept because a snapshot could not be rewritten",
            report.kept_for_failed_snapshots.len()
        );
    }
    if !report.applied && !report.merges.is_empty() {
        log::info!("Dry run. Re-run with --apply to rewrite snapshots and delete duplicates.");
    }
    Ok(())
}

fn unmapped(data: &DataDir, last: usize) -> Result<()> {
    let display = DisplayMapping::load(&data.display_mapping_file())?;
    let mut snapshots = Vec::new();
    for path in list_snapshots(&data.snapshots_dir(), Some(last))? {
        match Snapshot::load(&path) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(e) => log::warn!("{:#}", e),
        }
    }
    if snapshots.is_empty() {
        bail!("No snapshots in {}", data.snapshots_dir().display());
    }

    let report = unmapped_names(&snapshots, &display);
    if report.is_empty() {
        log::info!("Every item has a display label");
    }
    for (category, names) in &report {
        log::info!("{} ({} unmapped)", category, names.len());
        for name in names {
            log::info!("  {} - {}", name.item_name, name.price);
        }
    }
    Ok(())
}
