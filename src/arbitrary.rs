//! Utilities for fuzz and/or property testing using `arbitrary`.

use arbitrary::Unstructured;
use kurbo::Rect;

use crate::{generators, Point, Polygon, Segment};

/// Generate an arbitrary float in some range.
pub fn float_in_range(
    start: f64,
    end: f64,
    u: &mut Unstructured<'_>,
) -> Result<f64, arbitrary::Error> {
    let num: u32 = u.arbitrary()?;
    let t = num as f64 / u32::MAX as f64;
    Ok((1.0 - t) * start + t * end)
}

/// Generate a float in some range, but give it a chance to be close to another float.
fn another_float_in_range(
    orig: f64,
    start: f64,
    end: f64,
    u: &mut Unstructured<'_>,
) -> Result<f64, arbitrary::Error> {
    let close: bool = u.arbitrary()?;
    if close {
        let ulps: i32 = u.int_in_range(-32..=32)?;
        let scale = 1.0f64 + ulps as f64 * f64::EPSILON;
        Ok((orig * scale).clamp(start, end))
    } else {
        float_in_range(start, end, u)
    }
}

/// Generate an arbitrary point with both coordinates in `[-size, size]`.
///
/// The coordinates are snapped to a grid of spacing 1/8 half of the time, so
/// that exact coincidences (shared coordinates, collinear points) are common.
pub fn point(size: f64, u: &mut Unstructured<'_>) -> Result<Point, arbitrary::Error> {
    let snap: bool = u.arbitrary()?;
    let x = float_in_range(-size, size, u)?;
    let y = float_in_range(-size, size, u)?;
    if snap {
        Ok(Point::new((x * 8.0).round() / 8.0, (y * 8.0).round() / 8.0))
    } else {
        Ok(Point::new(x, y))
    }
}

/// Generate a point that has a chance to be very close to `orig`.
pub fn point_near(orig: Point, size: f64, u: &mut Unstructured<'_>) -> Result<Point, arbitrary::Error> {
    Ok(Point::new(
        another_float_in_range(orig.x, -size, size, u)?,
        another_float_in_range(orig.y, -size, size, u)?,
    ))
}

/// Generate an arbitrary rectangle inside `[-size, size]²`, with either corner first.
pub fn rect(size: f64, u: &mut Unstructured<'_>) -> Result<Rect, arbitrary::Error> {
    let p = point(size, u)?;
    let q = point(size, u)?;
    Ok(Rect::new(p.x, p.y, q.x, q.y))
}

/// Generate an arbitrary segment inside `[-size, size]²`.
pub fn segment(size: f64, u: &mut Unstructured<'_>) -> Result<Segment, arbitrary::Error> {
    let a = point(size, u)?;
    let b = point_near(a, size, u)?;
    Ok(Segment::new(a, b))
}

/// Generate an arbitrary star-shaped polygon centered at the origin, with
/// between 3 and 32 vertices and radii in `[1, size]`.
pub fn star_polygon(size: f64, u: &mut Unstructured<'_>) -> Result<Polygon, arbitrary::Error> {
    let n: usize = u.int_in_range(3..=32)?;
    let radii = (0..n)
        .map(|_| float_in_range(1.0, size.max(1.0), u))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(generators::star_polygon(Point::new(0.0, 0.0), &radii))
}

/// An edit to apply to a polygon.
#[derive(Clone, Debug)]
pub enum PolygonEdit {
    /// Insert a vertex (which should land on the boundary to succeed).
    AddVertex(Point),
    /// Insert a vertex at some fraction of the way along an existing edge.
    SplitEdge {
        /// Which edge of the exterior ring, modulo its length.
        edge: usize,
        /// How far along the edge.
        t: f64,
    },
    /// Remove a vertex of the exterior ring, modulo its length.
    RemoveVertex(usize),
    /// Add a hole shaped like a small square.
    AddHole {
        /// The center of the hole.
        center: Point,
        /// The half-width of the hole.
        r: f64,
    },
    /// Remove an interior ring, modulo the number of them.
    RemoveHole(usize),
}

impl PolygonEdit {
    /// Generate an arbitrary edit for polygons of roughly the scale `size`.
    pub fn arbitrary(size: f64, u: &mut Unstructured<'_>) -> Result<Self, arbitrary::Error> {
        Ok(match u.int_in_range(0..=4)? {
            0 => PolygonEdit::AddVertex(point(size, u)?),
            1 => PolygonEdit::SplitEdge {
                edge: u.arbitrary()?,
                t: float_in_range(0.0, 1.0, u)?,
            },
            2 => PolygonEdit::RemoveVertex(u.arbitrary()?),
            3 => PolygonEdit::AddHole {
                center: point(size, u)?,
                r: float_in_range(0.01, size / 4.0, u)?,
            },
            _ => PolygonEdit::RemoveHole(u.arbitrary()?),
        })
    }

    /// Apply this edit, returning whether the polygon changed.
    pub fn apply(&self, poly: &mut Polygon) -> bool {
        match *self {
            PolygonEdit::AddVertex(p) => matches!(poly.add_vertex(p), Ok(true)),
            PolygonEdit::SplitEdge { edge, t } => {
                let ring = poly.exterior_ring();
                let n = ring.len() - 1;
                let a = ring[edge % n];
                let b = ring[edge % n + 1];
                matches!(poly.add_vertex(a.affine(&b, t)), Ok(true))
            }
            PolygonEdit::RemoveVertex(i) => {
                let ring = poly.exterior_ring();
                let p = ring[i % (ring.len() - 1)];
                poly.remove_vertex(p).is_ok()
            }
            PolygonEdit::AddHole { center, r } => {
                let hole = generators::box_polygon(r).exterior_ring();
                let hole = hole
                    .into_iter()
                    .map(|p| Point::new(p.x + center.x, p.y + center.y))
                    .collect();
                poly.add_interior_ring(hole).is_ok()
            }
            PolygonEdit::RemoveHole(i) => {
                let count = poly.interior_ring_count();
                count > 0 && poly.remove_interior_ring(i % count).is_ok()
            }
        }
    }
}
