//! OCR of card text through Tesseract.

pub mod engine;
pub mod extract;
pub mod setup;

pub use engine::{OcrEngine, OcrLine, OcrWord, TesseractEngine, TextKind};
pub use extract::{extract_card_text, normalize_name, parse_price, CardText};
pub use setup::locate_tesseract;
