//! Polygon boolean and offset operations.
//!
//! Boolean operations (union, intersection, difference) and offsets go
//! through the geo-clipper library. Polyline clipping against ExPolygons is
//! done here with exact segment intersection, since clipper's open-path
//! support is not exposed by geo-clipper.
//!
//! Offset distances are given in mm, like the rest of the public
//! configuration surface; geometry stays in scaled units.

use crate::geometry::{ExPolygon, ExPolygons, Line, Point, Polygon, Polyline};
use crate::{scale, unscale, CoordF, SCALING_FACTOR};
use geo::{Coord as GeoCoord, LineString, MultiPolygon, Polygon as GeoPolygon};
use geo_clipper::{Clipper, EndType, JoinType};

/// Integer precision handed to clipper: one clipper unit per scaled unit.
const CLIPPER_FACTOR: f64 = SCALING_FACTOR;

/// Join type for offset corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetJoinType {
    /// Square corners
    Square,
    /// Round corners
    #[default]
    Round,
    /// Mitered corners
    Miter,
}

impl From<OffsetJoinType> for JoinType {
    fn from(jt: OffsetJoinType) -> Self {
        match jt {
            OffsetJoinType::Square => JoinType::Square,
            // Arc tolerance in mm
            OffsetJoinType::Round => JoinType::Round(0.005),
            OffsetJoinType::Miter => JoinType::Miter(2.0),
        }
    }
}

/// Convert a closed ring of scaled points to a closed geo ring in mm.
fn ring_to_geo(points: &[Point]) -> LineString<f64> {
    let mut ring: Vec<GeoCoord<f64>> = points
        .iter()
        .map(|p| GeoCoord {
            x: unscale(p.x),
            y: unscale(p.y),
        })
        .collect();

    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last()) {
        if first != *last {
            ring.push(first);
        }
    }

    LineString::new(ring)
}

/// Convert a closed geo ring back to a polygon (without the closing point).
fn geo_to_ring(ring: &LineString<f64>) -> Polygon {
    let mut points: Vec<Point> = ring
        .coords()
        .map(|c| Point::new(scale(c.x), scale(c.y)))
        .collect();

    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }

    Polygon::from_points(points)
}

fn expolygon_to_geo(expoly: &ExPolygon) -> GeoPolygon<f64> {
    let holes = expoly
        .holes
        .iter()
        .map(|hole| ring_to_geo(hole.points()))
        .collect();

    GeoPolygon::new(ring_to_geo(expoly.contour.points()), holes)
}

fn geo_to_expolygon(geo_poly: &GeoPolygon<f64>) -> ExPolygon {
    let holes = geo_poly.interiors().iter().map(geo_to_ring).collect();
    ExPolygon::with_holes(geo_to_ring(geo_poly.exterior()), holes)
}

fn expolygons_to_geo_multi(expolys: &[ExPolygon]) -> MultiPolygon<f64> {
    MultiPolygon::new(expolys.iter().map(expolygon_to_geo).collect())
}

/// Convert back, dropping rings that collapsed below three points.
fn geo_multi_to_expolygons(multi: &MultiPolygon<f64>) -> ExPolygons {
    multi
        .0
        .iter()
        .map(geo_to_expolygon)
        .filter(|ex| ex.contour.len() >= 3)
        .collect()
}

// ============================================================================
// Boolean Operations
// ============================================================================

/// Compute the union of two sets of polygons.
pub fn union(subject: &[ExPolygon], clip: &[ExPolygon]) -> ExPolygons {
    if subject.is_empty() {
        return clip.to_vec();
    }
    if clip.is_empty() {
        return subject.to_vec();
    }

    let subject_geo = expolygons_to_geo_multi(subject);
    let clip_geo = expolygons_to_geo_multi(clip);

    let result = subject_geo.union(&clip_geo, CLIPPER_FACTOR);
    geo_multi_to_expolygons(&result)
}

/// Compute the union of a single set of potentially overlapping polygons.
pub fn union_ex(polygons: &[ExPolygon]) -> ExPolygons {
    match polygons {
        [] => Vec::new(),
        [single] => vec![single.clone()],
        [first, rest @ ..] => rest.iter().fold(vec![first.clone()], |acc, poly| {
            union(&acc, std::slice::from_ref(poly))
        }),
    }
}

/// Compute the intersection of two sets of polygons.
pub fn intersection(subject: &[ExPolygon], clip: &[ExPolygon]) -> ExPolygons {
    if subject.is_empty() || clip.is_empty() {
        return Vec::new();
    }

    let subject_geo = expolygons_to_geo_multi(subject);
    let clip_geo = expolygons_to_geo_multi(clip);

    let result = subject_geo.intersection(&clip_geo, CLIPPER_FACTOR);
    geo_multi_to_expolygons(&result)
}

/// Compute the difference of two sets of polygons (subject - clip).
pub fn difference(subject: &[ExPolygon], clip: &[ExPolygon]) -> ExPolygons {
    if subject.is_empty() {
        return Vec::new();
    }
    if clip.is_empty() {
        return subject.to_vec();
    }

    let subject_geo = expolygons_to_geo_multi(subject);
    let clip_geo = expolygons_to_geo_multi(clip);

    let result = subject_geo.difference(&clip_geo, CLIPPER_FACTOR);
    geo_multi_to_expolygons(&result)
}

// ============================================================================
// Offset Operations
// ============================================================================

/// Offset multiple ExPolygons by a given distance.
///
/// Positive delta (mm) inflates the polygons, negative delta deflates them.
/// A zero delta returns the input unchanged.
pub fn offset_expolygons(
    expolygons: &[ExPolygon],
    delta: CoordF,
    join_type: OffsetJoinType,
) -> ExPolygons {
    if expolygons.is_empty() {
        return Vec::new();
    }
    if delta == 0.0 {
        return expolygons.to_vec();
    }

    let geo_multi = expolygons_to_geo_multi(expolygons);
    let result = geo_multi.offset(delta, join_type.into(), EndType::ClosedPolygon, CLIPPER_FACTOR);
    geo_multi_to_expolygons(&result)
}

/// Shrink (inset) ExPolygons by a given distance in mm.
pub fn shrink(expolygons: &[ExPolygon], distance: CoordF, join_type: OffsetJoinType) -> ExPolygons {
    offset_expolygons(expolygons, -distance.abs(), join_type)
}

/// Grow (outset) ExPolygons by a given distance in mm.
pub fn grow(expolygons: &[ExPolygon], distance: CoordF, join_type: OffsetJoinType) -> ExPolygons {
    offset_expolygons(expolygons, distance.abs(), join_type)
}

/// Morphological opening: shrink then grow by the same distance (mm).
///
/// Removes slivers and features thinner than twice `distance`.
pub fn opening(expolygons: &[ExPolygon], distance: CoordF) -> ExPolygons {
    let shrunk = shrink(expolygons, distance, OffsetJoinType::Miter);
    grow(&shrunk, distance, OffsetJoinType::Miter)
}

/// Compute the total area of a set of polygons (scaled units squared).
pub fn total_area(expolygons: &[ExPolygon]) -> CoordF {
    expolygons.iter().map(ExPolygon::area).sum()
}

// ============================================================================
// Polyline Clipping
// ============================================================================

/// Intersect polylines with a set of ExPolygons, returning clipped polylines.
///
/// Each segment is split at every crossing with a boundary of `clip`, and
/// the pieces whose midpoint lies inside are kept. Consecutive kept pieces
/// are merged back into one polyline, so an input polyline may produce zero,
/// one, or several outputs.
pub fn intersect_polylines_with_expolygons(
    polylines: &[Polyline],
    clip: &[ExPolygon],
) -> Vec<Polyline> {
    if polylines.is_empty() || clip.is_empty() {
        return Vec::new();
    }

    let boundary: Vec<Line> = clip.iter().flat_map(ExPolygon::boundary_lines).collect();

    polylines
        .iter()
        .flat_map(|polyline| clip_polyline(polyline, clip, &boundary))
        .collect()
}

fn clip_polyline(polyline: &Polyline, clip: &[ExPolygon], boundary: &[Line]) -> Vec<Polyline> {
    let mut result = Vec::new();
    let mut current: Vec<Point> = Vec::new();

    for segment in polyline.lines() {
        if segment.is_degenerate() {
            continue;
        }

        for (a, b) in clip_segment(&segment, clip, boundary) {
            if current.last() != Some(&a) {
                flush(&mut current, &mut result);
                current.push(a);
            }
            current.push(b);
        }
    }

    flush(&mut current, &mut result);
    result
}

fn flush(current: &mut Vec<Point>, out: &mut Vec<Polyline>) {
    if current.len() >= 2 {
        out.push(Polyline::from_points(std::mem::take(current)));
    } else {
        current.clear();
    }
}

/// Pieces of `segment` that lie inside `clip`, in order from `segment.a`.
fn clip_segment(segment: &Line, clip: &[ExPolygon], boundary: &[Line]) -> Vec<(Point, Point)> {
    let mut params = vec![0.0, 1.0];
    params.extend(
        boundary
            .iter()
            .filter_map(|edge| crossing_param(segment, edge)),
    );
    params.sort_by(|a, b| a.total_cmp(b));

    let mut pieces = Vec::new();
    for w in params.windows(2) {
        let (t0, t1) = (w[0], w[1]);
        let a = segment.point_at(t0);
        let b = segment.point_at(t1);
        if a == b {
            continue;
        }

        let mid = segment.point_at((t0 + t1) * 0.5);
        if clip.iter().any(|ex| ex.contains_point(&mid)) {
            pieces.push((a, b));
        }
    }
    pieces
}

/// Parameter along `segment` where it crosses `edge`, if it does.
fn crossing_param(segment: &Line, edge: &Line) -> Option<CoordF> {
    let r = segment.vector();
    let s = edge.vector();
    let denom = r.cross(&s);
    if denom == 0 {
        return None;
    }

    let qp = edge.a - segment.a;
    let (t_num, u_num, denom) = if denom < 0 {
        (-qp.cross(&s), -qp.cross(&r), -denom)
    } else {
        (qp.cross(&s), qp.cross(&r), denom)
    };

    if t_num < 0 || t_num > denom || u_num < 0 || u_num > denom {
        return None;
    }
    Some(t_num as CoordF / denom as CoordF)
}
