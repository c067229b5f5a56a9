//! Line segment type.

use super::Point;
use crate::{Coord, CoordF};
use serde::{Deserialize, Serialize};

/// A line segment between two points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Line {
    pub a: Point,
    pub b: Point,
}

impl Line {
    #[inline]
    pub const fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    /// Direction vector `b - a`.
    #[inline]
    pub fn vector(&self) -> Point {
        self.b - self.a
    }

    #[inline]
    pub fn length_squared(&self) -> i128 {
        self.a.distance_squared(&self.b)
    }

    #[inline]
    pub fn length(&self) -> CoordF {
        self.a.distance(&self.b)
    }

    /// True if both endpoints coincide.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.a == self.b
    }

    /// Midpoint (rounded toward negative infinity on odd sums).
    #[inline]
    pub fn midpoint(&self) -> Point {
        Point::new(
            (self.a.x + self.b.x).div_euclid(2),
            (self.a.y + self.b.y).div_euclid(2),
        )
    }

    /// Closest point on the segment to `p`.
    #[inline]
    pub fn project_point(&self, p: &Point) -> Point {
        p.project_onto_segment(self.a, self.b)
    }

    #[inline]
    pub fn distance_to_point_squared(&self, p: &Point) -> CoordF {
        p.distance_to_segment_squared(self.a, self.b)
    }

    #[inline]
    pub fn distance_to_point(&self, p: &Point) -> CoordF {
        self.distance_to_point_squared(p).sqrt()
    }

    /// Point at parameter `t` in [0, 1] along the segment.
    pub fn point_at(&self, t: CoordF) -> Point {
        let v = self.vector();
        Point::new(
            self.a.x + (v.x as CoordF * t).round() as Coord,
            self.a.y + (v.y as CoordF * t).round() as Coord,
        )
    }

    /// Intersection point with another segment, if they cross or touch.
    ///
    /// Orientation tests are exact; only the returned point is rounded.
    /// Collinear (parallel) segments return `None`.
    pub fn intersection(&self, other: &Line) -> Option<Point> {
        let r = self.vector();
        let s = other.vector();
        let denom = r.cross(&s);
        if denom == 0 {
            return None;
        }

        let qp = other.a - self.a;
        let t_num = qp.cross(&s);
        let u_num = qp.cross(&r);

        // 0 <= t_num/denom <= 1 and 0 <= u_num/denom <= 1
        let (t_num, u_num, denom) = if denom < 0 {
            (-t_num, -u_num, -denom)
        } else {
            (t_num, u_num, denom)
        };
        if t_num < 0 || t_num > denom || u_num < 0 || u_num > denom {
            return None;
        }

        let t = t_num as CoordF / denom as CoordF;
        Some(self.point_at(t))
    }

    /// True if the two segments cross or touch (collinear overlaps excluded).
    #[inline]
    pub fn intersects(&self, other: &Line) -> bool {
        self.intersection(other).is_some()
    }
}

pub type Lines = Vec<Line>;
