//! Pixel rectangles in reference-layout coordinates.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in pixels.
///
/// `x`/`y` are signed: a card scrolled half out of the grid viewport has a
/// rectangle that starts above the viewport (and possibly above the frame).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn center_y(&self) -> f32 {
        self.y as f32 + self.height as f32 / 2.0
    }

    /// Returns the rectangle moved by (dx, dy).
    pub fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// True if `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32))
    }

    pub fn intersection_area(&self, other: &Rect) -> u64 {
        self.intersection(other).map_or(0, |r| r.area())
    }

    /// Length of the overlap of the two vertical spans.
    pub fn vertical_overlap(&self, top: i32, bottom: i32) -> u32 {
        let y0 = self.y.max(top);
        let y1 = self.bottom().min(bottom);
        (y1 - y0).max(0) as u32
    }

    /// Clips to an image of the given size. Returns `None` when nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        self.intersection(&Rect::new(0, 0, width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_inclusive_of_edges() {
        let outer = Rect::new(10, 10, 100, 50);
        assert!(outer.contains(&Rect::new(10, 10, 100, 50)));
        assert!(outer.contains(&Rect::new(20, 20, 10, 10)));
        assert!(!outer.contains(&Rect::new(9, 10, 10, 10)));
        assert!(!outer.contains(&Rect::new(100, 50, 11, 10)));
    }

    #[test]
    fn test_intersection() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersection(&b), Some(Rect::new(5, 5, 5, 5)));
        assert_eq!(a.intersection_area(&b), 25);
        assert_eq!(a.intersection(&Rect::new(10, 0, 5, 5)), None);
    }

    #[test]
    fn test_clamp_to_negative_origin() {
        let r = Rect::new(-5, -5, 20, 20);
        assert_eq!(r.clamp_to(100, 100), Some(Rect::new(0, 0, 15, 15)));
        assert_eq!(Rect::new(200, 0, 5, 5).clamp_to(100, 100), None);
    }

    #[test]
    fn test_vertical_overlap() {
        let r = Rect::new(0, 10, 5, 20);
        assert_eq!(r.vertical_overlap(0, 15), 5);
        assert_eq!(r.vertical_overlap(30, 40), 0);
        assert_eq!(r.vertical_overlap(12, 18), 6);
    }
}
