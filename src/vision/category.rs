//! Category Classifier.
//!
//! The selected entry of the navigation tree is drawn with a colored
//! highlight. Segmenting that color and looking up which configured menu row
//! the highlight sits on gives the category being viewed.

use image::{GrayImage, Luma, RgbaImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use std::fmt;

use super::preprocess::{crop_rect, rgb_to_hsv};
use crate::config::NavigationConfig;
use crate::error::PipelineError;
use crate::geometry::Rect;

/// A category name known to the layout configuration.
///
/// Only [`CategoryTable`] hands these out, so a label can never be a typo.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryLabel(String);

impl CategoryLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of classification: a configured category, or `Unknown`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Category {
    Known(CategoryLabel),
    Unknown,
}

impl Category {
    pub fn label(&self) -> Option<&CategoryLabel> {
        match self {
            Category::Known(label) => Some(label),
            Category::Unknown => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Known(label) => label.fmt(f),
            Category::Unknown => f.write_str("Unknown"),
        }
    }
}

#[derive(Clone, Debug)]
struct Row {
    label: CategoryLabel,
    top: i32,
    bottom: i32,
}

/// The closed set of categories, with their menu rows.
#[derive(Clone, Debug)]
pub struct CategoryTable {
    rows: Vec<Row>,
}

impl CategoryTable {
    pub fn from_config(nav: &NavigationConfig) -> Self {
        let rows = nav
            .entries
            .iter()
            .map(|entry| Row {
                label: CategoryLabel(entry.label.trim().to_string()),
                top: entry.top,
                bottom: entry.bottom,
            })
            .collect();
        Self { rows }
    }

    /// Looks up a label by exact name.
    pub fn resolve(&self, name: &str) -> Option<CategoryLabel> {
        self.rows
            .iter()
            .find(|row| row.label.as_str() == name)
            .map(|row| row.label.clone())
    }

    pub fn labels(&self) -> impl Iterator<Item = &CategoryLabel> {
        self.rows.iter().map(|row| &row.label)
    }

    /// Maps a highlight box (navigation-relative) to a menu row.
    ///
    /// The row with the greatest vertical overlap wins; a tie for the best
    /// overlap is ambiguous. With no overlap at all the nearest row centre
    /// wins, again with ties ambiguous.
    fn lookup(&self, highlight: &Rect) -> Category {
        let mut overlaps: Vec<(u32, &Row)> = self
            .rows
            .iter()
            .map(|row| (highlight.vertical_overlap(row.top, row.bottom), row))
            .collect();
        overlaps.sort_by(|a, b| b.0.cmp(&a.0));

        match overlaps.as_slice() {
            [] => return Category::Unknown,
            [(best, row), rest @ ..] if *best > 0 => {
                if rest.first().is_some_and(|(second, _)| second == best) {
                    return Category::Unknown;
                }
                return Category::Known(row.label.clone());
            }
            _ => {}
        }

        let center = highlight.center_y();
        let mut distances: Vec<(f32, &Row)> = self
            .rows
            .iter()
            .map(|row| (((row.top + row.bottom) as f32 / 2.0 - center).abs(), row))
            .collect();
        distances.sort_by(|a, b| a.0.total_cmp(&b.0));

        match distances.as_slice() {
            [(best, row), rest @ ..] => {
                if rest.first().is_some_and(|(second, _)| second == best) {
                    Category::Unknown
                } else {
                    Category::Known(row.label.clone())
                }
            }
            [] => Category::Unknown,
        }
    }
}

/// Outcome of classifying one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub category: Category,
    /// Highlight bounding box in frame coordinates, if one was found
    pub highlight: Option<Rect>,
}

/// Classifies the category shown in `frame`.
///
/// Fails only if the navigation region lies outside the frame; every other
/// failure mode is `Category::Unknown`.
pub fn classify_category(
    frame: &RgbaImage,
    nav: &NavigationConfig,
    table: &CategoryTable,
) -> Result<Classification, PipelineError> {
    let roi = nav
        .region
        .clamp_to(frame.width(), frame.height())
        .ok_or_else(|| {
            PipelineError::Geometry(format!(
                "navigation region {:?} lies outside the frame",
                nav.region
            ))
        })?;
    let crop = crop_rect(frame, &roi)
        .ok_or_else(|| PipelineError::Geometry("empty navigation crop".to_string()))?;

    let mut mask = GrayImage::new(crop.width(), crop.height());
    let mut lit = 0usize;
    for (x, y, pixel) in crop.enumerate_pixels() {
        if nav.highlight.contains(rgb_to_hsv(pixel[0], pixel[1], pixel[2])) {
            mask.put_pixel(x, y, Luma([255]));
            lit += 1;
        }
    }

    if lit == 0 {
        log::debug!("Category: no highlight pixels");
        return Ok(Classification {
            category: Category::Unknown,
            highlight: None,
        });
    }

    // Largest highlight blob; stray orange pixels elsewhere are ignored
    let contours: Vec<Contour<i32>> = find_contours(&mask);
    let Some(bbox) = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .filter_map(contour_box)
        .max_by_key(|r| r.area())
    else {
        return Ok(Classification {
            category: Category::Unknown,
            highlight: None,
        });
    };

    let frame_box = bbox.offset(roi.x, roi.y);
    if bbox.area() < nav.min_mask_area {
        log::debug!(
            "Category: highlight {:?} below minimum area {}",
            frame_box,
            nav.min_mask_area
        );
        return Ok(Classification {
            category: Category::Unknown,
            highlight: Some(frame_box),
        });
    }

    let relative = frame_box.offset(-nav.region.x, -nav.region.y);
    let category = table.lookup(&relative);
    log::debug!("Category: {} (highlight {:?})", category, frame_box);

    Ok(Classification {
        category,
        highlight: Some(frame_box),
    })
}

fn contour_box(contour: &Contour<i32>) -> Option<Rect> {
    let first = contour.points.first()?;
    let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
    for p in &contour.points {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    Some(Rect::new(x0, y0, (x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{HsvRange, MenuEntry};
    use image::Rgba;

    pub const ORANGE: Rgba<u8> = Rgba([255, 140, 0, 255]);
    const PANEL: Rgba<u8> = Rgba([30, 30, 35, 255]);

    pub fn test_navigation() -> NavigationConfig {
        let entry = |label: &str, top: i32| MenuEntry {
            label: label.to_string(),
            top,
            bottom: top + 40,
        };
        NavigationConfig {
            region: Rect::new(0, 0, 200, 300),
            highlight: HsvRange {
                lower: [5, 100, 100],
                upper: [25, 255, 255],
            },
            min_mask_area: 400,
            entries: vec![entry("Helmet", 0), entry("Body Armor", 44), entry("Chest Rig", 88)],
        }
    }

    fn frame_with_highlight(rect: Option<Rect>, color: Rgba<u8>) -> RgbaImage {
        let mut frame = RgbaImage::from_pixel(200, 300, PANEL);
        if let Some(r) = rect {
            for y in r.y..r.bottom() {
                for x in r.x..r.right() {
                    frame.put_pixel(x as u32, y as u32, color);
                }
            }
        }
        frame
    }

    fn classify(rect: Option<Rect>, color: Rgba<u8>) -> Category {
        let nav = test_navigation();
        let table = CategoryTable::from_config(&nav);
        classify_category(&frame_with_highlight(rect, color), &nav, &table)
            .unwrap()
            .category
    }

    fn known(name: &str) -> Category {
        let table = CategoryTable::from_config(&test_navigation());
        Category::Known(table.resolve(name).unwrap())
    }

    #[test]
    fn test_highlight_inside_a_row() {
        assert_eq!(
            classify(Some(Rect::new(10, 50, 150, 30)), ORANGE),
            known("Body Armor")
        );
    }

    #[test]
    fn test_no_highlight_is_unknown() {
        assert_eq!(classify(None, ORANGE), Category::Unknown);
        // Wrong color: blue selection does not pass the orange range
        assert_eq!(
            classify(Some(Rect::new(10, 50, 150, 30)), Rgba([40, 80, 240, 255])),
            Category::Unknown
        );
    }

    #[test]
    fn test_small_highlight_is_noise() {
        assert_eq!(classify(Some(Rect::new(10, 50, 10, 10)), ORANGE), Category::Unknown);
    }

    #[test]
    fn test_straddling_picks_larger_overlap() {
        // Helmet overlap 30..40 = 10 rows, Body Armor 44..70 = 26 rows
        assert_eq!(
            classify(Some(Rect::new(10, 30, 150, 40)), ORANGE),
            known("Body Armor")
        );
    }

    #[test]
    fn test_equal_overlap_is_unknown() {
        // Helmet 32..40 = 8 rows, Body Armor 44..52 = 8 rows
        assert_eq!(classify(Some(Rect::new(10, 32, 150, 20)), ORANGE), Category::Unknown);
    }

    #[test]
    fn test_below_all_rows_uses_nearest() {
        assert_eq!(
            classify(Some(Rect::new(10, 200, 150, 40)), ORANGE),
            known("Chest Rig")
        );
    }

    #[test]
    fn test_highlight_box_reported_in_frame_coordinates() {
        let mut nav = test_navigation();
        nav.region = Rect::new(20, 10, 180, 290);
        let table = CategoryTable::from_config(&nav);
        let frame = frame_with_highlight(Some(Rect::new(30, 60, 100, 30)), ORANGE);

        let result = classify_category(&frame, &nav, &table).unwrap();
        assert_eq!(result.highlight, Some(Rect::new(30, 60, 100, 30)));
        // Relative y 50..80 → Body Armor
        assert_eq!(result.category, known("Body Armor"));
    }

    #[test]
    fn test_table_is_closed() {
        let table = CategoryTable::from_config(&test_navigation());
        assert!(table.resolve("Helmet").is_some());
        assert!(table.resolve("Helmte").is_none());
        assert!(table.resolve("Unknown").is_none());
        assert_eq!(table.labels().count(), 3);
        assert_eq!(Category::Unknown.to_string(), "Unknown");
    }
}
