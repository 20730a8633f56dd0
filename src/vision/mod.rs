//! Frame analysis: card location, visibility, and category classification.

pub mod category;
pub mod locator;
pub mod preprocess;
pub mod visibility;

pub use category::{classify_category, Category, CategoryLabel, CategoryTable, Classification};
pub use locator::locate_cards;
pub use visibility::{filter_visible, is_visible};

use crate::config::CardConfig;
use crate::geometry::Rect;

/// One item card in frame coordinates, with the sub-regions read from it.
///
/// Rectangles may extend past the grid viewport (and the frame) for cards
/// that are only partly scrolled into view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CardRegion {
    pub card: Rect,
    pub name: Rect,
    pub price: Rect,
    pub thumbnail: Rect,
}

impl CardRegion {
    /// Places the configured sub-regions on a card whose top-left is (x, y).
    pub fn at(x: i32, y: i32, layout: &CardConfig) -> Self {
        Self {
            card: Rect::new(x, y, layout.width, layout.height),
            name: layout.name.offset(x, y),
            price: layout.price.offset(x, y),
            thumbnail: layout.thumbnail.offset(x, y),
        }
    }
}
