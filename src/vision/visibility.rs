//! Visibility Filter: only cards fully inside the scroll window are read.
//!
//! A card cut by the viewport yields truncated OCR text, which would poison
//! both the name mapping and the dedup key. Such cards are dropped without a
//! warning; they come back whole once scrolled into view.

use super::CardRegion;
use crate::geometry::Rect;

/// The readable window: the grid viewport intersected with the frame.
pub fn readable_window(viewport: &Rect, frame_width: u32, frame_height: u32) -> Option<Rect> {
    viewport.clamp_to(frame_width, frame_height)
}

/// True if the card and both of its text regions lie inside `window`.
pub fn is_visible(card: &CardRegion, window: &Rect) -> bool {
    window.contains(&card.card) && window.contains(&card.name) && window.contains(&card.price)
}

/// Keeps only fully visible cards, preserving order.
pub fn filter_visible(
    cards: Vec<CardRegion>,
    viewport: &Rect,
    frame_width: u32,
    frame_height: u32,
) -> Vec<CardRegion> {
    let Some(window) = readable_window(viewport, frame_width, frame_height) else {
        return Vec::new();
    };
    let total = cards.len();
    let visible: Vec<CardRegion> = cards
        .into_iter()
        .filter(|card| is_visible(card, &window))
        .collect();
    log::debug!("Visibility filter: {}/{} cards readable", visible.len(), total);
    visible
}
