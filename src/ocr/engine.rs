use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::{locate_tesseract, TesseractPaths};
use crate::config::OcrConfig;

/// Which card field an image holds; prices get a restricted charset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Name,
    Price,
}

/// Single-line text recognition on a preprocessed image.
pub trait OcrEngine {
    fn recognize(&self, img: &GrayImage, kind: TextKind) -> Result<String>;
}

/// Represents a line of OCR text with confidence score
#[derive(Debug, Clone)]
pub struct OcrLine {
    pub text: String,
    pub words: Vec<OcrWord>,
    pub confidence: f32,
}

/// Represents a single word from OCR with confidence score
#[derive(Debug, Clone)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
}

/// Runs the Tesseract CLI once per image.
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    language: String,
    psm: u32,
    oem: u32,
    price_whitelist: String,
}

impl TesseractEngine {
    pub fn new(paths: TesseractPaths, config: &OcrConfig) -> Self {
        Self {
            executable: paths.executable,
            tessdata: paths.tessdata,
            language: config.language.clone(),
            psm: config.psm,
            oem: config.oem,
            price_whitelist: config.price_whitelist.clone(),
        }
    }

    /// Locates Tesseract per the configuration.
    pub fn from_config(config: &OcrConfig) -> Result<Self> {
        let paths = locate_tesseract(config.tesseract_path.as_deref(), &config.language)?;
        Ok(Self::new(paths, config))
    }

    /// Returns structured output with lines and confidence scores.
    pub fn recognize_lines(&self, img: &GrayImage, kind: TextKind) -> Result<Vec<OcrLine>> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to write OCR input image")?;

        // Tesseract appends .tsv to the output base
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let mut command = Command::new(&self.executable);
        command.arg(temp_input.path()).arg(&output_base);
        if let Some(dir) = &self.tessdata {
            command.arg("--tessdata-dir").arg(dir);
        }
        command
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("--oem")
            .arg(self.oem.to_string());
        if kind == TextKind::Price && !self.price_whitelist.is_empty() {
            command
                .arg("-c")
                .arg(format!("tessedit_char_whitelist={}", self.price_whitelist));
        }
        let output = command
            .arg("tsv")
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;
        let _ = std::fs::remove_file(&tsv_path);

        Ok(parse_tsv_output(&tsv_content))
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, img: &GrayImage, kind: TextKind) -> Result<String> {
        let lines = self.recognize_lines(img, kind)?;
        for line in &lines {
            log::debug!("OCR {:?}: {:?} (conf {:.1})", kind, line.text, line.confidence);
        }
        Ok(lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join(" "))
    }
}

fn finish_line(words: Vec<OcrWord>) -> Option<OcrLine> {
    if words.is_empty() {
        return None;
    }
    let confidence = words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32;
    let text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    Some(OcrLine {
        text,
        words,
        confidence,
    })
}

/// Parses Tesseract TSV output into structured OcrLine data
fn parse_tsv_output(tsv: &str) -> Vec<OcrLine> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current_line: Option<(i32, i32, i32)> = None;
    let mut current_words: Vec<OcrWord> = Vec::new();

    for line in tsv.lines().skip(1) {
        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // Level 5 = word
        if fields[0].parse::<i32>().ok() != Some(5) {
            continue;
        }
        let text = fields[11].trim();
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            continue;
        }

        let id: (i32, i32, i32) = (
            fields[2].parse().unwrap_or(-1),
            fields[3].parse().unwrap_or(-1),
            fields[4].parse().unwrap_or(-1),
        );
        if current_line.is_some_and(|cur| cur != id) {
            lines.extend(finish_line(std::mem::take(&mut current_words)));
        }
        current_line = Some(id);
        current_words.push(OcrWord {
            text: text.to_string(),
            confidence: conf,
        });
    }

    lines.extend(finish_line(current_words));
    lines
}
