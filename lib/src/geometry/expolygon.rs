//! ExPolygon type for polygons with holes.

use super::{BoundingBox, Line, Point, Polygon};
use crate::CoordF;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A polygon with holes (exterior polygon + interior hole polygons).
///
/// The contour is the outer boundary (should be counter-clockwise for positive area).
/// The holes are interior boundaries (should be clockwise).
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExPolygon {
    /// The outer contour of the polygon.
    pub contour: Polygon,
    /// The holes (interior contours) of the polygon.
    pub holes: Vec<Polygon>,
}

impl ExPolygon {
    #[inline]
    pub fn new(contour: Polygon) -> Self {
        Self {
            contour,
            holes: Vec::new(),
        }
    }

    #[inline]
    pub fn with_holes(contour: Polygon, holes: Vec<Polygon>) -> Self {
        Self { contour, holes }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.contour.is_empty()
    }

    /// Area of the contour minus the area of the holes.
    pub fn area(&self) -> CoordF {
        let holes: CoordF = self.holes.iter().map(Polygon::area).sum();
        self.contour.area() - holes
    }

    /// Get the bounding box of the ExPolygon (same as contour's bounding box).
    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        self.contour.bounding_box()
    }

    /// Check if a point is inside the ExPolygon (inside contour and not inside any hole).
    pub fn contains_point(&self, p: &Point) -> bool {
        if !self.contour.contains_point(p) {
            return false;
        }

        !self.holes.iter().any(|hole| hole.contains_point(p))
    }

    /// Iterate over the contour followed by the holes.
    pub fn polygons(&self) -> impl Iterator<Item = &Polygon> {
        std::iter::once(&self.contour).chain(self.holes.iter())
    }

    /// Every boundary edge of the contour and the holes.
    pub fn boundary_lines(&self) -> Vec<Line> {
        self.polygons().flat_map(Polygon::edges).collect()
    }

    /// Closest point on any boundary (contour or hole).
    pub fn closest_boundary_point(&self, p: &Point) -> Option<Point> {
        let mut best: Option<(CoordF, Point)> = None;
        for poly in self.polygons() {
            if poly.len() < 2 {
                continue;
            }
            for edge in poly.edges() {
                let d = edge.distance_to_point_squared(p);
                if best.map_or(true, |(bd, _)| d < bd) {
                    best = Some((d, edge.project_point(p)));
                }
            }
        }
        best.map(|(_, q)| q)
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.polygons().map(Polygon::len).sum()
    }
}

impl fmt::Debug for ExPolygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExPolygon(contour: {} points, {} holes)",
            self.contour.len(),
            self.holes.len()
        )
    }
}

impl From<Polygon> for ExPolygon {
    fn from(contour: Polygon) -> Self {
        Self::new(contour)
    }
}

/// Type alias for a collection of ExPolygons.
pub type ExPolygons = Vec<ExPolygon>;

#[cfg(test)]
mod tests {
    use super::*;

    fn square_with_hole() -> ExPolygon {
        let contour = Polygon::rectangle(Point::new(0, 0), Point::new(100, 100));
        let mut hole = Polygon::rectangle(Point::new(40, 40), Point::new(60, 60));
        hole.make_clockwise();
        ExPolygon::with_holes(contour, vec![hole])
    }

    #[test]
    fn test_expolygon_area() {
        let ex = square_with_hole();
        assert!((ex.area() - 9_600.0).abs() < 1e-9);
        assert_eq!(ex.point_count(), 8);
    }

    #[test]
    fn test_expolygon_contains_point() {
        let ex = square_with_hole();
        assert!(ex.contains_point(&Point::new(10, 10)));
        assert!(!ex.contains_point(&Point::new(50, 50)));
        assert!(!ex.contains_point(&Point::new(150, 50)));
    }

    #[test]
    fn test_closest_boundary_point_sees_holes() {
        let ex = square_with_hole();
        // Closer to the hole than to the contour
        assert_eq!(
            ex.closest_boundary_point(&Point::new(35, 50)),
            Some(Point::new(40, 50))
        );
        assert_eq!(ex.boundary_lines().len(), 8);
        assert_eq!(ExPolygon::default().closest_boundary_point(&Point::zero()), None);
    }
}
