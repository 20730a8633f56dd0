//! Per-frame capture pipeline.
//!
//! Classification and card location run on the same frame; each visible card
//! is then read, canonicalized, hashed and folded into the session. Failures
//! are logged and reported per card or per frame. Nothing here aborts a
//! session.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::RgbaImage;
use std::path::Path;

use crate::config::LayoutConfig;
use crate::error::{ExtractionError, PipelineError};
use crate::geometry::Rect;
use crate::identity::{
    CanonicalItem, CaptureRecord, CaptureSession, ItemKey, Observation, ThumbHasher,
};
use crate::mapping::NameMapping;
use crate::ocr::{extract_card_text, OcrEngine};
use crate::store::ThumbnailStore;
use crate::vision::preprocess::crop_rect;
use crate::vision::{
    classify_category, filter_visible, locate_cards, CardRegion, Category, CategoryLabel,
    CategoryTable,
};

/// A captured screen image.
pub struct Frame {
    pub image: RgbaImage,
    pub captured_at: DateTime<Local>,
}

impl Frame {
    pub fn new(image: RgbaImage, captured_at: DateTime<Local>) -> Self {
        Self { image, captured_at }
    }

    /// Loads an image file, dated by its modification time.
    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("Failed to open frame {}", path.display()))?
            .to_rgba8();
        let captured_at = std::fs::metadata(path)?
            .modified()
            .map(DateTime::<Local>::from)
            .unwrap_or_else(|_| Local::now());
        Ok(Self { image, captured_at })
    }
}

/// What happened to one visible card.
#[derive(Debug)]
pub struct CardOutcome {
    pub card: CardRegion,
    pub result: Result<(ItemKey, Observation), PipelineError>,
}

#[derive(Debug)]
pub struct FrameReport {
    pub category: Category,
    pub highlight: Option<Rect>,
    pub located: usize,
    pub outcomes: Vec<CardOutcome>,
    /// Set when the whole frame was dropped
    pub skipped: Option<PipelineError>,
}

impl FrameReport {
    fn skipped(category: Category, highlight: Option<Rect>, reason: PipelineError) -> Self {
        Self {
            category,
            highlight,
            located: 0,
            outcomes: Vec::new(),
            skipped: Some(reason),
        }
    }

    pub fn count(&self, observation: Observation) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(&o.result, Ok((_, obs)) if *obs == observation))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }
}

pub struct Pipeline {
    layout: LayoutConfig,
    table: CategoryTable,
    engine: Box<dyn OcrEngine>,
    names: NameMapping,
    hasher: ThumbHasher,
    store: ThumbnailStore,
}

impl Pipeline {
    pub fn new(
        layout: LayoutConfig,
        engine: Box<dyn OcrEngine>,
        names: NameMapping,
        store: ThumbnailStore,
    ) -> Self {
        let table = CategoryTable::from_config(&layout.navigation);
        let hasher = ThumbHasher::new(&layout.hash);
        Self {
            layout,
            table,
            engine,
            names,
            hasher,
            store,
        }
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn categories(&self) -> &CategoryTable {
        &self.table
    }

    pub fn new_session(&self) -> CaptureSession {
        CaptureSession::new(self.layout.price_ceiling)
    }

    pub fn process_frame(&self, session: &mut CaptureSession, frame: &Frame) -> FrameReport {
        let classification =
            match classify_category(&frame.image, &self.layout.navigation, &self.table) {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("Frame skipped: {}", e);
                    return FrameReport::skipped(Category::Unknown, None, e);
                }
            };
        let Category::Known(label) = &classification.category else {
            log::warn!("Frame skipped: category unknown");
            return FrameReport::skipped(
                Category::Unknown,
                classification.highlight,
                PipelineError::UnknownCategory,
            );
        };

        let cards = match locate_cards(&frame.image, &self.layout) {
            Ok(cards) if cards.is_empty() => {
                log::warn!("Frame skipped: no cards located");
                return FrameReport::skipped(
                    classification.category.clone(),
                    classification.highlight,
                    PipelineError::Geometry("no cards located".to_string()),
                );
            }
            Ok(cards) => cards,
            Err(e) => {
                log::warn!("Frame skipped: {}", e);
                return FrameReport::skipped(classification.category.clone(), classification.highlight, e);
            }
        };
        let located = cards.len();
        let visible = filter_visible(
            cards,
            &self.layout.grid.region,
            frame.image.width(),
            frame.image.height(),
        );

        let outcomes: Vec<CardOutcome> = visible
            .into_iter()
            .map(|card| {
                let result = self.process_card(session, frame, label, &card);
                if let Err(e) = &result {
                    log::warn!("Card at ({}, {}) dropped: {}", card.card.x, card.card.y, e);
                }
                CardOutcome { card, result }
            })
            .collect();

        let report = FrameReport {
            category: classification.category.clone(),
            highlight: classification.highlight,
            located,
            outcomes,
            skipped: None,
        };
        log::info!(
            "[{}] {} located, {} read: {} new, {} duplicate, {} dropped",
            label,
            located,
            report.outcomes.len(),
            report.count(Observation::New),
            report.count(Observation::Duplicate),
            report.failures()
        );
        report
    }

    fn process_card(
        &self,
        session: &mut CaptureSession,
        frame: &Frame,
        category: &CategoryLabel,
        card: &CardRegion,
    ) -> Result<(ItemKey, Observation), PipelineError> {
        let text = extract_card_text(&frame.image, card, &self.layout, self.engine.as_ref())?;
        // A mapping may point at a blank name
        let clean_name = self.names.canonicalize(&text.name).trim().to_string();
        if clean_name.is_empty() {
            return Err(ExtractionError::EmptyName.into());
        }

        let thumbnail = crop_rect(&frame.image, &card.thumbnail).ok_or_else(|| {
            PipelineError::Geometry(format!("thumbnail region {:?} off frame", card.thumbnail))
        })?;
        let thumb_hash = self.hasher.hash(&thumbnail);
        if let Err(e) = self.store.ensure(&thumb_hash, &thumbnail) {
            log::warn!("{}; retrying once", e);
            self.store.ensure(&thumb_hash, &thumbnail)?;
        }

        let item = CanonicalItem {
            category: category.clone(),
            clean_name,
            price: text.price,
            thumb_hash,
        };
        let key = item.key();
        let observation = session.observe(CaptureRecord {
            raw_name: text.raw_name,
            raw_price: text.raw_price,
            item,
            captured_at: frame.captured_at,
        });
        Ok((key, observation))
    }
}
