//! Content-addressed thumbnail files: `<dir>/<thumbHash>.png`.

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::PipelineError;
use crate::identity::ThumbHash;

/// One stored thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailAsset {
    pub hash: ThumbHash,
    pub path: PathBuf,
    pub modified: SystemTime,
}

pub struct ThumbnailStore {
    dir: PathBuf,
    height: u32,
}

impl ThumbnailStore {
    pub fn new(dir: impl Into<PathBuf>, height: u32) -> Self {
        Self {
            dir: dir.into(),
            height: height.max(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, hash: &ThumbHash) -> PathBuf {
        self.dir.join(format!("{}.png", hash))
    }

    /// Writes the thumbnail for `hash` unless one already exists. Existing
    /// assets are never touched.
    pub fn ensure(&self, hash: &ThumbHash, crop: &RgbaImage) -> Result<PathBuf, PipelineError> {
        let path = self.path_for(hash);
        if path.exists() {
            return Ok(path);
        }
        self.write_new(&path, crop)
            .map_err(|source| PipelineError::AssetIo {
                path: path.clone(),
                source,
            })?;
        log::debug!("Stored thumbnail {}", path.display());
        Ok(path)
    }

    fn write_new(&self, path: &Path, crop: &RgbaImage) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let resized = resize_to_height(crop, self.height);

        let mut tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile_in(&self.dir)?;
        resized.write_to(&mut tmp, ImageFormat::Png)?;
        if let Err(e) = tmp.persist_noclobber(path) {
            // Lost a race against an identical write
            if !path.exists() {
                return Err(e.error.into());
            }
        }
        Ok(())
    }
}

/// Keeps aspect ratio; the result is exactly `height` pixels tall.
fn resize_to_height(img: &RgbaImage, height: u32) -> RgbaImage {
    let (w, h) = img.dimensions();
    if h == height || w == 0 || h == 0 {
        return img.clone();
    }
    let width = ((w as f64 * height as f64 / h as f64).round() as u32).max(1);
    imageops::resize(img, width, height, FilterType::CatmullRom)
}

/// Every `<hex>.png` in `dir`. Other files are ignored.
pub fn list_assets(dir: &Path) -> Result<Vec<ThumbnailAsset>> {
    let mut assets = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("png") {
            continue;
        }
        let Some(hash) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(ThumbHash::parse)
        else {
            continue;
        };
        let modified = entry.metadata()?.modified()?;
        assets.push(ThumbnailAsset {
            hash,
            path,
            modified,
        });
    }
    Ok(assets)
}
