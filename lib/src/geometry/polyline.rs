//! Open polyline type.

use super::{BoundingBox, Line, Point};
use crate::{Coord, CoordF};
use serde::{Deserialize, Serialize};

/// An open path through a sequence of points.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Point>,
}

impl Polyline {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

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

    pub fn first_point(&self) -> Option<Point> {
        self.points.first().copied()
    }

    pub fn last_point(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// A polyline needs at least two points to be printable.
    pub fn is_valid(&self) -> bool {
        self.points.len() >= 2
    }

    /// Segments between consecutive points.
    pub fn lines(&self) -> Vec<Line> {
        self.points
            .windows(2)
            .map(|w| Line::new(w[0], w[1]))
            .collect()
    }

    /// Total length in scaled units.
    pub fn length(&self) -> CoordF {
        self.points.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.points)
    }

    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// Shorten the polyline by removing `distance` from its end.
    ///
    /// Whole segments are dropped while they fit in the remaining distance;
    /// the last kept segment is cut at the interpolated point. A polyline
    /// shortened past its start is left with a single point.
    pub fn clip_end(&mut self, mut distance: Coord) {
        while distance > 0 && self.points.len() >= 2 {
            let n = self.points.len();
            let last = self.points[n - 1];
            let prev = self.points[n - 2];
            let seg_len = last.distance(&prev);

            if seg_len <= distance as CoordF {
                distance -= seg_len.round() as Coord;
                self.points.pop();
                continue;
            }

            let keep = (seg_len - distance as CoordF) / seg_len;
            let new_last = Line::new(prev, last).point_at(keep);
            self.points[n - 1] = new_last;
            break;
        }
    }
}

impl From<Vec<Point>> for Polyline {
    fn from(points: Vec<Point>) -> Self {
        Self::from_points(points)
    }
}

impl From<Line> for Polyline {
    fn from(line: Line) -> Self {
        Self::from_points(vec![line.a, line.b])
    }
}

pub type Polylines = Vec<Polyline>;

#[cfg(test)]
mod tests {
    use super::*;

    fn l_shape() -> Polyline {
        Polyline::from_points(vec![
            Point::new(0, 0),
            Point::new(100, 0),
            Point::new(100, 50),
        ])
    }

    #[test]
    fn test_polyline_length() {
        let p = l_shape();
        assert!((p.length() - 150.0).abs() < 1e-12);
        assert_eq!(p.lines().len(), 2);
    }

    #[test]
    fn test_clip_end_within_last_segment() {
        let mut p = l_shape();
        p.clip_end(20);
        assert_eq!(p.len(), 3);
        assert_eq!(p.last_point(), Some(Point::new(100, 30)));
    }

    #[test]
    fn test_clip_end_across_segments() {
        let mut p = l_shape();
        p.clip_end(80);
        assert_eq!(p.len(), 2);
        assert_eq!(p.last_point(), Some(Point::new(70, 0)));
    }

    #[test]
    fn test_clip_end_consumes_everything() {
        let mut p = l_shape();
        p.clip_end(1000);
        assert_eq!(p.len(), 1);
        assert!(!p.is_valid());
    }
}
