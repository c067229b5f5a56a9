//! Point types for 2D geometry.
//!
//! Points use scaled integer coordinates for exact predicates; `PointF` is
//! the floating-point companion used for directions and interpolation.

use crate::{scale, unscale, Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// A 2D point with scaled integer coordinates.
///
/// Points use integer coordinates scaled by `SCALING_FACTOR` to avoid
/// floating-point precision issues. 1 unit = 1 nanometer.
///
/// # Example
/// ```
/// use lightning_infill::geometry::Point;
/// use lightning_infill::scale;
///
/// // Create a point at (1mm, 2mm)
/// let p = Point::new(scale(1.0), scale(2.0));
/// assert_eq!(p, Point::new_scale(1.0, 2.0));
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: Coord,
    pub y: Coord,
}

impl Point {
    /// Create a new point with the given coordinates.
    #[inline]
    pub const fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }

    /// Create a new point from floating-point coordinates (in mm), scaling them.
    #[inline]
    pub fn new_scale(x: CoordF, y: CoordF) -> Self {
        Self {
            x: scale(x),
            y: scale(y),
        }
    }

    /// Create a point at the origin (0, 0).
    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0, y: 0 }
    }

    /// Convert to floating-point coordinates (in mm).
    #[inline]
    pub fn to_mm(&self) -> PointF {
        PointF {
            x: unscale(self.x),
            y: unscale(self.y),
        }
    }

    /// Calculate the squared distance to another point.
    /// Returns i128 to avoid overflow with large coordinates.
    #[inline]
    pub fn distance_squared(&self, other: &Point) -> i128 {
        let dx = (other.x - self.x) as i128;
        let dy = (other.y - self.y) as i128;
        dx * dx + dy * dy
    }

    /// Calculate the distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point) -> CoordF {
        (self.distance_squared(other) as CoordF).sqrt()
    }

    /// Calculate the squared length of this point as a vector.
    #[inline]
    pub fn length_squared(&self) -> i128 {
        (self.x as i128) * (self.x as i128) + (self.y as i128) * (self.y as i128)
    }

    /// Calculate the length of this point as a vector.
    #[inline]
    pub fn length(&self) -> CoordF {
        (self.length_squared() as CoordF).sqrt()
    }

    /// 2D pseudo-cross product.
    /// Positive if `other` is counter-clockwise from `self`.
    #[inline]
    pub fn cross(&self, other: &Point) -> i128 {
        (self.x as i128) * (other.y as i128) - (self.y as i128) * (other.x as i128)
    }

    /// Dot product with another point.
    #[inline]
    pub fn dot(&self, other: &Point) -> i128 {
        (self.x as i128) * (other.x as i128) + (self.y as i128) * (other.y as i128)
    }

    /// Orientation of `p1 -> self -> p2`; positive if counter-clockwise.
    #[inline]
    pub fn ccw(&self, p1: &Point, p2: &Point) -> i128 {
        let v1 = *p1 - *self;
        let v2 = *p2 - *self;
        v1.cross(&v2)
    }

    /// Project this point onto the segment `a`-`b`, clamped to the segment.
    pub fn project_onto_segment(&self, a: Point, b: Point) -> Point {
        let ab = b - a;
        let ap = *self - a;

        let ab_len_sq = ab.length_squared();
        if ab_len_sq == 0 {
            return a;
        }

        let t = (ap.dot(&ab) as CoordF / ab_len_sq as CoordF).clamp(0.0, 1.0);

        Point::new(
            (a.x as CoordF + t * ab.x as CoordF).round() as Coord,
            (a.y as CoordF + t * ab.y as CoordF).round() as Coord,
        )
    }

    /// Squared distance from this point to the segment `a`-`b`, computed in
    /// floating point so the foot of the perpendicular is not rounded.
    pub fn distance_to_segment_squared(&self, a: Point, b: Point) -> CoordF {
        let abx = (b.x - a.x) as CoordF;
        let aby = (b.y - a.y) as CoordF;
        let apx = (self.x - a.x) as CoordF;
        let apy = (self.y - a.y) as CoordF;

        let len_sq = abx * abx + aby * aby;
        if len_sq == 0.0 {
            return apx * apx + apy * apy;
        }

        let t = ((apx * abx + apy * aby) / len_sq).clamp(0.0, 1.0);
        let dx = apx - t * abx;
        let dy = apy - t * aby;
        dx * dx + dy * dy
    }

    /// Move this point toward `target` by at most `distance` units.
    /// Reaches `target` exactly when it is closer than `distance`.
    pub fn moved_toward(&self, target: Point, distance: CoordF) -> Point {
        let delta = PointF::from(target - *self);
        let len = delta.length();
        if len <= distance || len == 0.0 {
            return target;
        }
        *self + (delta * (distance / len)).round()
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point({}, {})", self.x, self.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", unscale(self.x), unscale(self.y))
    }
}

impl Add for Point {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for Point {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Point {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl SubAssign for Point {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.x -= other.x;
        self.y -= other.y;
    }
}

impl Neg for Point {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl Mul<Coord> for Point {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: Coord) -> Self {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

impl From<(Coord, Coord)> for Point {
    fn from((x, y): (Coord, Coord)) -> Self {
        Self::new(x, y)
    }
}

/// A 2D point (or direction) with floating-point coordinates.
///
/// Unlike `Point::to_mm`, converting with `From<Point>` keeps the scaled unit.
#[derive(Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointF {
    pub x: CoordF,
    pub y: CoordF,
}

impl PointF {
    /// Create a new point.
    #[inline]
    pub const fn new(x: CoordF, y: CoordF) -> Self {
        Self { x, y }
    }

    /// Squared length as a vector.
    #[inline]
    pub fn length_squared(&self) -> CoordF {
        self.x * self.x + self.y * self.y
    }

    /// Length as a vector.
    #[inline]
    pub fn length(&self) -> CoordF {
        self.length_squared().sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero vector.
    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len == 0.0 {
            return Self::default();
        }
        Self::new(self.x / len, self.y / len)
    }

    /// Dot product.
    #[inline]
    pub fn dot(&self, other: &PointF) -> CoordF {
        self.x * other.x + self.y * other.y
    }

    /// Round to the nearest integer point (same unit).
    #[inline]
    pub fn round(&self) -> Point {
        Point::new(self.x.round() as Coord, self.y.round() as Coord)
    }
}

impl fmt::Debug for PointF {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PointF({:.3}, {:.3})", self.x, self.y)
    }
}

impl Add for PointF {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for PointF {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for PointF {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<CoordF> for PointF {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: CoordF) -> Self {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

impl From<Point> for PointF {
    fn from(p: Point) -> Self {
        Self::new(p.x as CoordF, p.y as CoordF)
    }
}

/// Type alias for a vector of points.
pub type Points = Vec<Point>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let a = Point::new(0, 0);
        let b = Point::new(3, 4);
        assert_eq!(a.distance_squared(&b), 25);
        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_point_ops() {
        let a = Point::new(10, 20);
        let b = Point::new(1, 2);
        assert_eq!(a + b, Point::new(11, 22));
        assert_eq!(a - b, Point::new(9, 18));
        assert_eq!(-b, Point::new(-1, -2));
        assert_eq!(b * 3, Point::new(3, 6));
    }

    #[test]
    fn test_cross_and_ccw() {
        let o = Point::new(0, 0);
        assert!(o.ccw(&Point::new(10, 0), &Point::new(10, 10)) > 0);
        assert!(o.ccw(&Point::new(10, 10), &Point::new(10, 0)) < 0);
        assert_eq!(o.ccw(&Point::new(10, 10), &Point::new(20, 20)), 0);
    }

    #[test]
    fn test_project_onto_segment_clamps() {
        let a = Point::new(0, 0);
        let b = Point::new(100, 0);
        assert_eq!(Point::new(50, 30).project_onto_segment(a, b), Point::new(50, 0));
        assert_eq!(Point::new(-20, 30).project_onto_segment(a, b), a);
        assert_eq!(Point::new(150, -5).project_onto_segment(a, b), b);
    }

    #[test]
    fn test_distance_to_segment() {
        let a = Point::new(0, 0);
        let b = Point::new(0, 100);
        assert!((Point::new(30, 50).distance_to_segment_squared(a, b) - 900.0).abs() < 1e-9);
        // Beyond the end: distance to the end point
        assert!((Point::new(0, 130).distance_to_segment_squared(a, b) - 900.0).abs() < 1e-9);
        // Degenerate segment
        assert!((Point::new(3, 4).distance_to_segment_squared(a, a) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_moved_toward() {
        let p = Point::new(0, 0);
        assert_eq!(p.moved_toward(Point::new(100, 0), 30.0), Point::new(30, 0));
        assert_eq!(p.moved_toward(Point::new(10, 0), 30.0), Point::new(10, 0));
        assert_eq!(p.moved_toward(p, 5.0), p);
    }

    #[test]
    fn test_pointf_normalize() {
        let v = PointF::new(3.0, 4.0).normalize();
        assert!((v.length() - 1.0).abs() < 1e-12);
        assert_eq!(PointF::default().normalize(), PointF::default());
    }
}
