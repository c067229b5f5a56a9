//! Axis-aligned bounding box.

use super::Point;
use crate::{unscale, Coord};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 2D axis-aligned bounding box with scaled integer coordinates.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
    defined: bool,
}

impl BoundingBox {
    /// Create a new empty (undefined) bounding box.
    #[inline]
    pub fn new() -> Self {
        Self {
            min: Point::new(Coord::MAX, Coord::MAX),
            max: Point::new(Coord::MIN, Coord::MIN),
            defined: false,
        }
    }

    #[inline]
    pub fn from_points_minmax(min: Point, max: Point) -> Self {
        Self {
            min,
            max,
            defined: true,
        }
    }

    pub fn from_points(points: &[Point]) -> Self {
        let mut bb = Self::new();
        for p in points {
            bb.merge_point(*p);
        }
        bb
    }

    /// Check if the bounding box is defined (has been merged with at least one point).
    #[inline]
    pub fn is_defined(&self) -> bool {
        self.defined
    }

    pub fn merge_point(&mut self, p: Point) {
        if self.defined {
            self.min.x = self.min.x.min(p.x);
            self.min.y = self.min.y.min(p.y);
            self.max.x = self.max.x.max(p.x);
            self.max.y = self.max.y.max(p.y);
        } else {
            self.min = p;
            self.max = p;
            self.defined = true;
        }
    }

    pub fn merge(&mut self, other: &BoundingBox) {
        if other.defined {
            self.merge_point(other.min);
            self.merge_point(other.max);
        }
    }

    #[inline]
    pub fn width(&self) -> Coord {
        if self.defined {
            self.max.x - self.min.x
        } else {
            0
        }
    }

    #[inline]
    pub fn height(&self) -> Coord {
        if self.defined {
            self.max.y - self.min.y
        } else {
            0
        }
    }

    #[inline]
    pub fn size(&self) -> Point {
        Point::new(self.width(), self.height())
    }

    #[inline]
    pub fn contains_point(&self, p: &Point) -> bool {
        self.defined
            && p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
    }

    #[inline]
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.defined
            && other.defined
            && self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Expand the bounding box by a margin on all sides.
    pub fn expand(&mut self, margin: Coord) {
        if self.defined {
            self.min.x -= margin;
            self.min.y -= margin;
            self.max.x += margin;
            self.max.y += margin;
        }
    }

    pub fn expanded(&self, margin: Coord) -> Self {
        let mut result = *self;
        result.expand(margin);
        result
    }
}

impl fmt::Debug for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.defined {
            write!(
                f,
                "BoundingBox([{:.3}, {:.3}] - [{:.3}, {:.3}])",
                unscale(self.min.x),
                unscale(self.min.y),
                unscale(self.max.x),
                unscale(self.max.y)
            )
        } else {
            write!(f, "BoundingBox(undefined)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_merge() {
        let mut bb = BoundingBox::new();
        assert!(!bb.is_defined());
        assert_eq!(bb.width(), 0);

        bb.merge_point(Point::new(10, 20));
        bb.merge_point(Point::new(-5, 40));
        assert!(bb.is_defined());
        assert_eq!(bb.min, Point::new(-5, 20));
        assert_eq!(bb.max, Point::new(10, 40));
        assert_eq!(bb.size(), Point::new(15, 20));
    }

    #[test]
    fn test_bbox_contains_and_intersects() {
        let a = BoundingBox::from_points_minmax(Point::new(0, 0), Point::new(10, 10));
        let b = BoundingBox::from_points_minmax(Point::new(10, 10), Point::new(20, 20));
        let c = BoundingBox::from_points_minmax(Point::new(11, 0), Point::new(20, 5));
        assert!(a.contains_point(&Point::new(10, 0)));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(!BoundingBox::new().contains_point(&Point::zero()));
    }

    #[test]
    fn test_bbox_expanded() {
        let a = BoundingBox::from_points_minmax(Point::new(0, 0), Point::new(10, 10));
        let e = a.expanded(5);
        assert_eq!(e.min, Point::new(-5, -5));
        assert_eq!(e.max, Point::new(15, 15));
        // An undefined box stays undefined
        assert!(!BoundingBox::new().expanded(5).is_defined());
    }
}
