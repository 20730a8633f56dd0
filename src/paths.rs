use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// On-disk layout of the collector's data directory.
#[derive(Clone, Debug)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Data directory next to the executable.
    pub fn beside_exe() -> Self {
        Self::new(get_exe_dir().clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/config.json`
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// `<root>/logs/`
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// `<root>/snapshots/`
    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join("snapshots")
    }

    /// `<root>/snapshots/thumbs/`
    pub fn thumbs_dir(&self) -> PathBuf {
        self.snapshots_dir().join("thumbs")
    }

    /// `<root>/mappings/ocr_mappings.json`
    pub fn ocr_mapping_file(&self) -> PathBuf {
        self.root.join("mappings").join("ocr_mappings.json")
    }

    /// `<root>/mappings/display_mappings.json`
    pub fn display_mapping_file(&self) -> PathBuf {
        self.root.join("mappings").join("display_mappings.json")
    }

    /// Ensures all output directories exist. Call at startup.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.logs_dir())?;
        std::fs::create_dir_all(self.snapshots_dir())?;
        std::fs::create_dir_all(self.thumbs_dir())?;
        Ok(())
    }
}
