//! Text Extractor: OCR of a card's name and price strips.

use super::engine::{OcrEngine, TextKind};
use crate::config::LayoutConfig;
use crate::error::{ExtractionError, PipelineError};
use crate::geometry::Rect;
use crate::vision::preprocess::{crop_rect, prepare_name_image, prepare_price_image};
use crate::vision::CardRegion;

/// OCR output of one card after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardText {
    pub raw_name: String,
    pub name: String,
    pub raw_price: String,
    pub price: u64,
}

/// Parses an OCR'd price.
///
/// Every character that is not an ASCII digit is dropped: currency symbols,
/// `,`/`.` thousands separators, and misreads such as Cyrillic `З` for `3`.
pub fn parse_price(raw: &str, ceiling: u64) -> Result<u64, ExtractionError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(ExtractionError::EmptyPrice {
            raw: raw.to_string(),
        });
    }

    match digits.parse::<u64>() {
        Ok(value) if value <= ceiling => Ok(value),
        _ => Err(ExtractionError::PriceOutOfRange {
            raw: raw.to_string(),
            ceiling,
        }),
    }
}

/// Trims and collapses whitespace runs. Truncation markers stay as read.
pub fn normalize_name(raw: &str) -> Result<String, ExtractionError> {
    let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return Err(ExtractionError::EmptyName);
    }
    Ok(name)
}

/// The price strip minus the currency icon on its left.
fn price_text_rect(price: &Rect, left_crop: u32) -> Rect {
    let crop = left_crop.min(price.width.saturating_sub(1));
    Rect::new(
        price.x + crop as i32,
        price.y,
        price.width - crop,
        price.height,
    )
}

/// Reads a visible card's name and price.
pub fn extract_card_text(
    frame: &image::RgbaImage,
    card: &CardRegion,
    layout: &LayoutConfig,
    engine: &dyn OcrEngine,
) -> Result<CardText, PipelineError> {
    let factor = layout.ocr.upscale;

    let name_crop = crop_rect(frame, &card.name)
        .ok_or_else(|| PipelineError::Geometry(format!("name region {:?} off frame", card.name)))?;
    let raw_name = engine
        .recognize(&prepare_name_image(&name_crop, factor), TextKind::Name)
        .map_err(PipelineError::Ocr)?;
    let name = normalize_name(&raw_name)?;

    let price_rect = price_text_rect(&card.price, layout.card.price_left_crop);
    let price_crop = crop_rect(frame, &price_rect)
        .ok_or_else(|| PipelineError::Geometry(format!("price region {:?} off frame", price_rect)))?;
    let raw_price = engine
        .recognize(&prepare_price_image(&price_crop, factor), TextKind::Price)
        .map_err(PipelineError::Ocr)?;
    let price = parse_price(&raw_price, layout.price_ceiling)?;

    Ok(CardText {
        raw_name,
        name,
        raw_price,
        price,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::vision::locator::tests::{blank_frame, test_layout};
    use anyhow::anyhow;
    use image::GrayImage;
    use std::cell::RefCell;

    /// Returns canned text and remembers the image sizes it was shown.
    pub struct FakeOcr {
        pub name: String,
        pub price: String,
        pub seen: RefCell<Vec<(TextKind, u32, u32)>>,
    }

    impl FakeOcr {
        pub fn new(name: &str, price: &str) -> Self {
            Self {
                name: name.to_string(),
                price: price.to_string(),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl OcrEngine for FakeOcr {
        fn recognize(&self, img: &GrayImage, kind: TextKind) -> anyhow::Result<String> {
            self.seen.borrow_mut().push((kind, img.width(), img.height()));
            Ok(match kind {
                TextKind::Name => self.name.clone(),
                TextKind::Price => self.price.clone(),
            })
        }
    }

    struct BrokenOcr;

    impl OcrEngine for BrokenOcr {
        fn recognize(&self, _img: &GrayImage, _kind: TextKind) -> anyhow::Result<String> {
            Err(anyhow!("tesseract exited with status 1"))
        }
    }

    #[test]
    fn test_parse_price_strips_currency_and_separators() {
        assert_eq!(parse_price("43,400₿", 100_000_000), Ok(43_400));
        assert_eq!(parse_price("₽ 1.250.000", 100_000_000), Ok(1_250_000));
        assert_eq!(parse_price("  700 ", 100_000_000), Ok(700));
        assert_eq!(parse_price("0", 100_000_000), Ok(0));
    }

    #[test]
    fn test_parse_price_drops_misread_glyphs() {
        // Cyrillic Ze read in place of a 3 is simply dropped
        assert_eq!(parse_price("4З.400", 100_000_000), Ok(4_400));
    }

    #[test]
    fn test_parse_price_rejects_empty() {
        assert!(matches!(
            parse_price("З.,", 100_000_000),
            Err(ExtractionError::EmptyPrice { .. })
        ));
        assert!(matches!(
            parse_price("", 100_000_000),
            Err(ExtractionError::EmptyPrice { .. })
        ));
    }

    #[test]
    fn test_parse_price_rejects_out_of_range() {
        assert!(matches!(
            parse_price("100,000,001", 100_000_000),
            Err(ExtractionError::PriceOutOfRange { .. })
        ));
        // Overflows u64 entirely
        assert!(matches!(
            parse_price("99999999999999999999999", u64::MAX),
            Err(ExtractionError::PriceOutOfRange { .. })
        ));
        assert_eq!(parse_price("100,000,000", 100_000_000), Ok(100_000_000));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Aviator   Helmet \n").unwrap(), "Aviator Helmet");
        assert_eq!(normalize_name("Ops-Core FAST MT…").unwrap(), "Ops-Core FAST MT…");
        assert_eq!(normalize_name("Ops-Core FAST...").unwrap(), "Ops-Core FAST...");
        assert_eq!(normalize_name(" \t "), Err(ExtractionError::EmptyName));
    }

    #[test]
    fn test_price_text_rect_removes_icon() {
        let rect = price_text_rect(&Rect::new(16, 164, 80, 16), 10);
        assert_eq!(rect, Rect::new(26, 164, 70, 16));
        // Oversized crop keeps at least one column
        assert_eq!(price_text_rect(&Rect::new(0, 0, 8, 16), 10).width, 1);
    }

    #[test]
    fn test_extract_card_text_reads_both_strips() {
        let layout = test_layout();
        let frame = blank_frame();
        let card = CardRegion::at(16, 86, &layout.card);
        let ocr = FakeOcr::new(" Aviator  Helmet", "43,400₿");

        let text = extract_card_text(&frame, &card, &layout, &ocr).unwrap();
        assert_eq!(text.name, "Aviator Helmet");
        assert_eq!(text.raw_name, " Aviator  Helmet");
        assert_eq!(text.price, 43_400);

        // Upscaled 3x; the price strip loses its 10px icon column
        let seen = ocr.seen.borrow();
        assert_eq!(seen[0], (TextKind::Name, 240, 42));
        assert_eq!(seen[1], (TextKind::Price, 210, 48));
    }

    #[test]
    fn test_extract_card_text_failures() {
        let layout = test_layout();
        let frame = blank_frame();
        let card = CardRegion::at(16, 86, &layout.card);

        let err = extract_card_text(&frame, &card, &layout, &FakeOcr::new("", "100")).unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(ExtractionError::EmptyName)));

        let err = extract_card_text(&frame, &card, &layout, &FakeOcr::new("Altyn", "--")).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Extraction(ExtractionError::EmptyPrice { .. })
        ));

        let err = extract_card_text(&frame, &card, &layout, &BrokenOcr).unwrap_err();
        assert!(matches!(err, PipelineError::Ocr(_)));
    }
}
