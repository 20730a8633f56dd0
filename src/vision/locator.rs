//! Card Locator: finds occupied card slots inside the grid region.
//!
//! Edges and contours say where cards actually are; the configured card size,
//! column pitch and row pitch say what a card must look like. Every contour
//! box that fits the prior becomes a full-size candidate snapped to the grid.
//! Cards cut by the viewport are still returned; the visibility filter
//! decides what is readable.

use image::RgbaImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::morphology::dilate;

use super::preprocess::{crop_rect, to_grayscale};
use super::CardRegion;
use crate::config::LayoutConfig;
use crate::error::PipelineError;
use crate::geometry::Rect;

/// A box this close to the viewport edge counts as touching it.
const EDGE_MARGIN: i32 = 3;

/// A contour box accepted as a card, before overlap resolution.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    card: Rect,
    /// Relative deviation from the expected card shape (lower is better)
    error: f32,
    clipped: bool,
}

/// Finds candidate card regions in a frame.
///
/// Returns an empty list when the grid holds no card-shaped contours; fails
/// only when the grid region lies outside the frame.
pub fn locate_cards(
    frame: &RgbaImage,
    layout: &LayoutConfig,
) -> Result<Vec<CardRegion>, PipelineError> {
    let viewport = layout.grid.region;
    let roi = viewport
        .clamp_to(frame.width(), frame.height())
        .ok_or_else(|| {
            PipelineError::Geometry(format!(
                "grid region {:?} lies outside the {}x{} frame",
                viewport,
                frame.width(),
                frame.height()
            ))
        })?;
    let crop = crop_rect(frame, &roi)
        .ok_or_else(|| PipelineError::Geometry("empty grid crop".to_string()))?;

    let gray = to_grayscale(&crop);
    let edges = canny(&gray, layout.card.edge_low, layout.card.edge_high);
    // Close single-pixel gaps Canny leaves at card corners
    let closed = dilate(&edges, Norm::LInf, 1);
    let contours: Vec<Contour<i32>> = find_contours(&closed);

    let mut candidates = Vec::new();
    for contour in &contours {
        if contour.border_type != BorderType::Outer {
            continue;
        }
        let Some(bbox) = bounding_box(contour) else {
            continue;
        };
        if let Some(candidate) = classify_box(bbox.offset(roi.x, roi.y), &roi, layout) {
            candidates.push(candidate);
        }
    }

    log::debug!(
        "Card locator: {} contours, {} card-shaped",
        contours.len(),
        candidates.len()
    );

    snap_rows(&mut candidates, layout.grid.row_pitch);
    let kept = suppress_overlaps(candidates, layout.card.overlap_fraction);

    Ok(kept
        .into_iter()
        .map(|c| CardRegion::at(c.card.x, c.card.y, &layout.card))
        .collect())
}

/// Bounding box of a contour, shrunk back by the dilation radius.
fn bounding_box(contour: &Contour<i32>) -> Option<Rect> {
    let first = contour.points.first()?;
    let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
    for p in &contour.points {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    let (x0, y0, x1, y1) = (x0 + 1, y0 + 1, x1 - 1, y1 - 1);
    if x1 < x0 || y1 < y0 {
        return None;
    }
    Some(Rect::new(x0, y0, (x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32))
}

/// Matches a box against the card prior and snaps it to a grid column.
fn classify_box(bbox: Rect, roi: &Rect, layout: &LayoutConfig) -> Option<Candidate> {
    let card = &layout.card;
    let grid = &layout.grid;
    let (cw, ch) = (card.width as f32, card.height as f32);
    let (w, h) = (bbox.width as f32, bbox.height as f32);
    let tol = card.size_tolerance;

    let width_error = (w - cw).abs() / cw;
    if width_error > tol {
        return None;
    }
    // Short boxes are allowed down to half a card: rows cut by the scroll frame
    if h < ch * 0.5 || h > ch * (1.0 + tol) {
        return None;
    }

    let short = h < ch * (1.0 - tol);
    let touches_top = bbox.y <= roi.y + EDGE_MARGIN;
    let touches_bottom = bbox.bottom() >= roi.bottom() - EDGE_MARGIN;
    let clipped_top = short && touches_top;
    let clipped = short && (touches_top || touches_bottom);
    if short && !clipped {
        // A short box floating mid-grid is not a card
        return None;
    }

    let first_column = grid.region.x + grid.column_offset;
    let pitch = grid.column_pitch as f32;
    let column = ((bbox.x - first_column) as f32 / pitch).round();
    if column < 0.0 || column >= grid.columns as f32 {
        return None;
    }
    let x = first_column + (column * pitch) as i32;
    if (x - bbox.x).abs() as f32 > pitch / 4.0 {
        return None;
    }

    let y = if clipped_top {
        bbox.bottom() - card.height as i32
    } else {
        bbox.y
    };

    let error = if clipped {
        width_error
    } else {
        let expected = cw / ch;
        ((w / h) - expected).abs() / expected
    };

    Some(Candidate {
        card: Rect::new(x, y, card.width, card.height),
        error,
        clipped,
    })
}

/// Aligns candidate rows to the row pitch, using the best whole card as phase.
fn snap_rows(candidates: &mut [Candidate], row_pitch: u32) {
    let pitch = row_pitch as i32;
    let Some(anchor) = candidates
        .iter()
        .filter(|c| !c.clipped)
        .min_by(|a, b| a.error.total_cmp(&b.error))
        .map(|c| c.card.y)
    else {
        return;
    };

    for candidate in candidates.iter_mut() {
        let offset = candidate.card.y - anchor;
        let rows = (offset as f32 / pitch as f32).round() as i32;
        let snapped = anchor + rows * pitch;
        if (snapped - candidate.card.y).abs() <= pitch / 8 {
            candidate.card.y = snapped;
        }
    }
}

/// Resolves doubled detections at grid seams.
///
/// Candidates are taken best-first; one overlapping an already kept card by
/// more than `overlap_fraction` of its area is dropped. The result is ordered
/// top-to-bottom, left-to-right.
fn suppress_overlaps(mut candidates: Vec<Candidate>, overlap_fraction: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        a.error
            .total_cmp(&b.error)
            .then(a.card.y.cmp(&b.card.y))
            .then(a.card.x.cmp(&b.card.x))
    });

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let limit = candidate.card.area() as f32 * overlap_fraction;
        let duplicate = kept
            .iter()
            .any(|k| k.card.intersection_area(&candidate.card) as f32 > limit);
        if !duplicate {
            kept.push(candidate);
        }
    }

    kept.sort_by_key(|c| (c.card.y, c.card.x));
    kept
}
