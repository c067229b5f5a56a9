//! Polygon type for closed contours.

use super::{BoundingBox, Line, Point};
use crate::{Coord, CoordF};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A closed polygon defined by a sequence of points.
///
/// The polygon is implicitly closed - the last point connects back to the first.
/// Points should be ordered counter-clockwise for outer contours (positive area)
/// and clockwise for holes (negative area).
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    /// Create a new empty polygon.
    #[inline]
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Create a polygon from a vector of points.
    #[inline]
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Edge `index`, wrapping from the last point back to the first.
    pub fn edge(&self, index: usize) -> Line {
        let n = self.points.len();
        Line::new(self.points[index], self.points[(index + 1) % n])
    }

    /// All edges, including the closing edge.
    pub fn edges(&self) -> Vec<Line> {
        if self.points.len() < 2 {
            return Vec::new();
        }
        (0..self.points.len()).map(|i| self.edge(i)).collect()
    }

    /// Calculate the signed area of the polygon.
    /// Positive for counter-clockwise (exterior), negative for clockwise (hole).
    pub fn signed_area(&self) -> CoordF {
        if self.points.len() < 3 {
            return 0.0;
        }

        let mut sum: i128 = 0;
        for i in 0..self.points.len() {
            let j = (i + 1) % self.points.len();
            sum += self.points[i].x as i128 * self.points[j].y as i128;
            sum -= self.points[j].x as i128 * self.points[i].y as i128;
        }

        sum as CoordF / 2.0
    }

    #[inline]
    pub fn area(&self) -> CoordF {
        self.signed_area().abs()
    }

    #[inline]
    pub fn is_counter_clockwise(&self) -> bool {
        self.signed_area() > 0.0
    }

    pub fn make_clockwise(&mut self) {
        if self.signed_area() > 0.0 {
            self.points.reverse();
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.points)
    }

    /// Even-odd point containment by ray casting toward +x.
    ///
    /// The crossing test is done with exact cross products, so points very
    /// close to an edge are classified consistently.
    pub fn contains_point(&self, p: &Point) -> bool {
        if self.points.len() < 3 {
            return false;
        }

        let mut inside = false;
        let mut j = self.points.len() - 1;

        for i in 0..self.points.len() {
            let pi = self.points[i];
            let pj = self.points[j];

            if (pi.y > p.y) != (pj.y > p.y) {
                // Side of p relative to the upward-oriented edge
                let (lo, hi) = if pi.y < pj.y { (pi, pj) } else { (pj, pi) };
                if lo.ccw(&hi, p) > 0 {
                    inside = !inside;
                }
            }
            j = i;
        }

        inside
    }

    /// Find the closest point on the polygon boundary to the given point.
    pub fn closest_point(&self, p: &Point) -> Point {
        match self.points.len() {
            0 => return Point::zero(),
            1 => return self.points[0],
            _ => {}
        }

        let mut closest = self.points[0];
        let mut min_dist = CoordF::MAX;

        for edge in self.edges() {
            let d = edge.distance_to_point_squared(p);
            if d < min_dist {
                min_dist = d;
                closest = edge.project_point(p);
            }
        }

        closest
    }

    /// Distance from a point to the polygon boundary.
    pub fn distance_to_point(&self, p: &Point) -> CoordF {
        self.edges()
            .iter()
            .map(|e| e.distance_to_point_squared(p))
            .fold(CoordF::MAX, CoordF::min)
            .sqrt()
    }

    /// Create a rectangular polygon (counter-clockwise).
    pub fn rectangle(min: Point, max: Point) -> Self {
        Self::from_points(vec![
            min,
            Point::new(max.x, min.y),
            max,
            Point::new(min.x, max.y),
        ])
    }

    /// Create a square polygon centered at a point.
    pub fn square(center: Point, half_size: Coord) -> Self {
        Self::rectangle(
            Point::new(center.x - half_size, center.y - half_size),
            Point::new(center.x + half_size, center.y + half_size),
        )
    }
}

impl fmt::Debug for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Polygon({} points)", self.points.len())
    }
}

impl From<Vec<Point>> for Polygon {
    fn from(points: Vec<Point>) -> Self {
        Self::from_points(points)
    }
}

pub type Polygons = Vec<Polygon>;

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Polygon {
        Polygon::rectangle(Point::new(0, 0), Point::new(100, 100))
    }

    #[test]
    fn test_polygon_area() {
        let sq = unit_square();
        assert!((sq.signed_area() - 10_000.0).abs() < 1e-9);
        assert!(sq.is_counter_clockwise());

        let mut cw = sq.clone();
        cw.make_clockwise();
        assert!((cw.signed_area() + 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_contains_point() {
        let sq = unit_square();
        assert!(sq.contains_point(&Point::new(50, 50)));
        assert!(sq.contains_point(&Point::new(1, 99)));
        assert!(!sq.contains_point(&Point::new(150, 50)));
        assert!(!sq.contains_point(&Point::new(-1, 50)));
    }

    #[test]
    fn test_contains_point_clockwise() {
        let mut sq = unit_square();
        sq.make_clockwise();
        assert!(sq.contains_point(&Point::new(50, 50)));
        assert!(!sq.contains_point(&Point::new(50, 150)));
    }

    #[test]
    fn test_closest_point() {
        let sq = unit_square();
        assert_eq!(sq.closest_point(&Point::new(50, 10)), Point::new(50, 0));
        assert_eq!(sq.closest_point(&Point::new(150, 50)), Point::new(100, 50));
        assert!((sq.distance_to_point(&Point::new(50, 10)) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_edges_wrap() {
        let sq = unit_square();
        let edges = sq.edges();
        assert_eq!(edges.len(), 4);
        assert_eq!(edges[3].b, Point::new(0, 0));
    }
}
