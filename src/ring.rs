//! Predicates on rings.
//!
//! A ring is a simple closed polyline. At the public API boundary rings are
//! always *closed* (the last point repeats the first), but the functions here
//! that measure a ring accept open rings too: the closing edge of a closed ring
//! has length zero and contributes nothing.

use std::collections::HashSet;

use crate::{
    geom::{Segment, SegmentIntersection},
    Error, Point, TopologyError,
};

/// Where a point is, relative to a ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Location {
    Inside,
    Outside,
    Boundary,
}

pub(crate) fn cyclic_pairs<T>(xs: &[T]) -> impl Iterator<Item = (&T, &T)> {
    xs.windows(2)
        .map(|pair| (&pair[0], &pair[1]))
        .chain(xs.last().zip(xs.first()))
}

/// The edges of an open ring, including the closing edge.
pub(crate) fn edges(ring: &[Point]) -> impl Iterator<Item = Segment> + '_ {
    cyclic_pairs(ring).map(|(a, b)| Segment::new(*a, *b))
}

/// Is the first point of this ring the same as the last?
pub fn is_closed(ring: &[Point]) -> bool {
    ring.len() >= 2 && ring.first() == ring.last()
}

/// The unique vertices of a closed ring: everything but the closing point.
pub fn open(ring: &[Point]) -> &[Point] {
    if is_closed(ring) {
        &ring[..ring.len() - 1]
    } else {
        ring
    }
}

/// Checks that `ring` is a valid closed ring: finite, closed, with at least three
/// distinct points, and simple.
pub fn validate_closed_ring(ring: &[Point]) -> Result<(), Error> {
    for p in ring {
        crate::check_finite(*p)?;
    }
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() >= 2 && first == last => {}
        (Some(first), Some(last)) => {
            return Err(Error::NonClosedRing {
                first: *first,
                last: *last,
            })
        }
        _ => return Err(TopologyError::TooFewPoints(0).into()),
    }

    let unique = open(ring);
    let distinct = unique.iter().collect::<HashSet<_>>().len();
    if distinct < 3 {
        return Err(TopologyError::TooFewPoints(distinct).into());
    }
    if distinct != unique.len() || !is_simple(unique) {
        return Err(TopologyError::SelfIntersection.into());
    }
    Ok(())
}

/// The signed area of a ring, positive if it is counter-clockwise.
pub fn signed_area(ring: &[Point]) -> f64 {
    cyclic_pairs(ring)
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum::<f64>()
        / 2.0
}

/// Is this ring oriented clockwise?
pub fn is_clockwise(ring: &[Point]) -> bool {
    signed_area(ring) < 0.0
}

/// The centroid of the region bounded by a ring.
///
/// The computation is done relative to the average of the vertices, which
/// keeps it accurate for small rings far from the origin.
pub fn centroid(ring: &[Point]) -> Point {
    let ring = open(ring);
    if ring.is_empty() {
        return Point { x: 0.0, y: 0.0 };
    }
    let n = ring.len() as f64;
    let avg = Point {
        x: ring.iter().map(|p| p.x).sum::<f64>() / n,
        y: ring.iter().map(|p| p.y).sum::<f64>() / n,
    };

    let mut area = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for (a, b) in cyclic_pairs(ring) {
        let (ax, ay) = (a.x - avg.x, a.y - avg.y);
        let (bx, by) = (b.x - avg.x, b.y - avg.y);
        let cross = ax * by - bx * ay;
        area += cross;
        cx += (ax + bx) * cross;
        cy += (ay + by) * cross;
    }

    if area == 0.0 {
        return avg;
    }
    Point {
        x: avg.x + cx / (3.0 * area),
        y: avg.y + cy / (3.0 * area),
    }
}

/// The total length of a ring's edges.
pub fn perimeter(ring: &[Point]) -> f64 {
    edges(ring).map(|s| s.length()).sum()
}

pub(crate) fn locate(ring: &[Point], p: &Point) -> Location {
    let mut inside = false;
    for (a, b) in cyclic_pairs(ring) {
        if Segment::new(*a, *b).contains_point(p) {
            return Location::Boundary;
        }
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    if inside {
        Location::Inside
    } else {
        Location::Outside
    }
}

/// Is `p` inside the ring or on its boundary?
pub fn winding_contains(ring: &[Point], p: &Point) -> bool {
    locate(open(ring), p) != Location::Outside
}

/// Is this ring simple? That is, does every edge meet only its two neighbors,
/// and only at their shared vertices?
pub fn is_simple(ring: &[Point]) -> bool {
    let ring = open(ring);
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let segs: Vec<_> = edges(ring).collect();
    (0..n).all(|i| edge_is_clear(&segs, i, i + 1..n))
}

// Checks edge `i` of a ring against the edges in `others`. Neighboring edges
// may only share their common vertex; all other edges must be disjoint.
pub(crate) fn edge_is_clear(
    segs: &[Segment],
    i: usize,
    others: impl IntoIterator<Item = usize>,
) -> bool {
    let n = segs.len();
    others.into_iter().filter(|&j| j != i).all(|j| {
        let adjacent = (i + 1) % n == j || (j + 1) % n == i;
        match segs[i].intersection(&segs[j]) {
            SegmentIntersection::None => true,
            SegmentIntersection::Point(p) => adjacent && n > 2 && shared_vertex(&segs[i], &segs[j]) == Some(p),
            SegmentIntersection::Overlap(_) => false,
        }
    })
}

fn shared_vertex(s: &Segment, t: &Segment) -> Option<Point> {
    if s.b == t.a {
        Some(s.b)
    } else if t.b == s.a {
        Some(s.a)
    } else {
        None
    }
}

/// Do any edges of these two rings meet?
pub fn rings_intersect(a: &[Point], b: &[Point]) -> bool {
    let b_segs: Vec<_> = edges(open(b)).collect();
    edges(open(a)).any(|s| {
        let bbox = s.bbox();
        b_segs.iter().any(|t| {
            crate::geom::rects_overlap(&bbox.inflate(crate::EPSILON, crate::EPSILON), &t.bbox())
                && !matches!(s.intersection(t), SegmentIntersection::None)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn ring(points: &[(f64, f64)]) -> Vec<Point> {
        points.iter().map(|&p| Point::from(p)).collect()
    }

    fn square() -> Vec<Point> {
        ring(&[
            (-10.0, -10.0),
            (10.0, -10.0),
            (10.0, 10.0),
            (-10.0, 10.0),
            (-10.0, -10.0),
        ])
    }

    #[test]
    fn area_and_orientation() {
        let sq = square();
        assert_eq!(signed_area(&sq), 400.0);
        assert!(!is_clockwise(&sq));

        let mut rev = sq.clone();
        rev.reverse();
        assert_eq!(signed_area(&rev), -400.0);
        assert!(is_clockwise(&rev));

        // Open and closed rings measure the same.
        assert_eq!(signed_area(open(&sq)), 400.0);
    }

    #[test]
    fn centroid_far_from_origin() {
        let offset = 1e7;
        let sq: Vec<_> = square()
            .into_iter()
            .map(|p| Point::new(p.x + offset, p.y + offset))
            .collect();
        let c = centroid(&sq);
        assert!((c.x - offset).abs() < 1e-6);
        assert!((c.y - offset).abs() < 1e-6);
    }

    #[test]
    fn containment() {
        let sq = square();
        assert!(winding_contains(&sq, &Point::new(0.0, 0.0)));
        assert!(winding_contains(&sq, &Point::new(10.0, 3.0)));
        assert!(winding_contains(&sq, &Point::new(-10.0, -10.0)));
        assert!(!winding_contains(&sq, &Point::new(10.5, 3.0)));
        assert_eq!(locate(open(&sq), &Point::new(10.0, 3.0)), Location::Boundary);
    }

    #[test]
    fn simplicity() {
        assert!(is_simple(&square()));
        let bowtie = ring(&[(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0), (0.0, 0.0)]);
        assert!(!is_simple(&bowtie));

        // A spike back along the previous edge.
        let spike = ring(&[(0.0, 0.0), (2.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]);
        assert!(!is_simple(&spike));
    }

    #[test]
    fn validation() {
        assert_eq!(validate_closed_ring(&square()), Ok(()));
        assert_matches!(
            validate_closed_ring(&square()[..4]),
            Err(Error::NonClosedRing { .. })
        );
        assert_eq!(
            validate_closed_ring(&ring(&[(0.0, 0.0), (1.0, 0.0), (0.0, 0.0)])),
            Err(Error::InvalidTopology(TopologyError::TooFewPoints(2)))
        );
        assert_eq!(
            validate_closed_ring(&ring(&[(0.0, 0.0), (f64::NAN, 0.0), (0.0, 1.0), (0.0, 0.0)])),
            Err(Error::NaN)
        );
    }

    #[test]
    fn intersecting_rings() {
        let sq = square();
        let inner = ring(&[(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0), (-1.0, -1.0)]);
        assert!(!rings_intersect(&sq, &inner));
        let crossing = ring(&[(5.0, -1.0), (15.0, -1.0), (15.0, 1.0), (5.0, 1.0), (5.0, -1.0)]);
        assert!(rings_intersect(&sq, &crossing));
    }
}
