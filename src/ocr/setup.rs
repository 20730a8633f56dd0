use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

const EXE_NAME: &str = if cfg!(windows) { "tesseract.exe" } else { "tesseract" };

const COMMON_EXECUTABLES: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

const COMMON_TESSDATA: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

#[derive(Debug, Clone)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    /// `None` leaves the choice to Tesseract's compiled-in default
    pub tessdata: Option<PathBuf>,
}

/// Returns the per-user directory checked for a private Tesseract install
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("market-collector")
        .join("tesseract")
}

/// Finds Tesseract and the trained data for `language`.
pub fn locate_tesseract(explicit: Option<&Path>, language: &str) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(explicit)?;
    let tessdata = find_tessdata_dir(language);
    match &tessdata {
        Some(dir) => log::info!("Tesseract: {} (tessdata {})", executable.display(), dir.display()),
        None => log::info!("Tesseract: {} (default tessdata)", executable.display()),
    }
    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Finds the Tesseract executable: the configured path, our local dir, PATH,
/// then common install locations.
pub fn find_tesseract_executable(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(anyhow!("Configured Tesseract path {} does not exist", path.display()));
    }

    let local_exe = get_tesseract_dir().join(EXE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    // Check PATH
    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    COMMON_EXECUTABLES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("Tesseract not found. Please install Tesseract-OCR or set ocr.tesseract_path."))
}

/// Finds a tessdata directory holding `<language>.traineddata`.
pub fn find_tessdata_dir(language: &str) -> Option<PathBuf> {
    let mut candidates = vec![get_tesseract_dir().join("tessdata")];
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        candidates.push(PathBuf::from(prefix));
    }
    candidates.extend(COMMON_TESSDATA.iter().map(PathBuf::from));
    first_with_traineddata(candidates, language)
}

/// Accepts both a tessdata dir and its parent (the two TESSDATA_PREFIX
/// conventions).
fn first_with_traineddata(
    candidates: impl IntoIterator<Item = PathBuf>,
    language: &str,
) -> Option<PathBuf> {
    let file = format!("{}.traineddata", language);
    candidates.into_iter().find_map(|dir| {
        if dir.join(&file).exists() {
            Some(dir)
        } else {
            let nested = dir.join("tessdata");
            nested.join(&file).exists().then_some(nested)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_explicit_path_wins_or_fails() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("tess");
        fs::write(&exe, b"").unwrap();
        assert_eq!(find_tesseract_executable(Some(&exe)).unwrap(), exe);
        assert!(find_tesseract_executable(Some(&dir.path().join("missing"))).is_err());
    }

    #[test]
    fn test_traineddata_lookup_accepts_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let tessdata = dir.path().join("tessdata");
        fs::create_dir_all(&tessdata).unwrap();
        fs::write(tessdata.join("eng.traineddata"), b"").unwrap();

        let empty = tempfile::tempdir().unwrap();
        let found = first_with_traineddata(
            vec![empty.path().to_path_buf(), dir.path().to_path_buf()],
            "eng",
        );
        assert_eq!(found, Some(tessdata.clone()));
        assert_eq!(first_with_traineddata(vec![tessdata.clone()], "eng"), Some(tessdata));
        assert_eq!(first_with_traineddata(vec![dir.path().to_path_buf()], "jpn"), None);
    }
}
