//! Cutting a polygon in two along a path.

use crate::{
    check_finite,
    ring::{self, Location},
    Error, Point, Polygon, RotationDirection,
};

use super::intersect::{crossings, merge_hits, path_hits, Hit, Pos};

/// Cuts `polygon` along `path` and returns one of the pieces.
///
/// The crossings of the path with the exterior ring are numbered in path
/// order, and paired up as (1, 2), (3, 4), and so on. Starting from the first
/// crossing, we walk along the exterior ring in `direction` until we reach
/// another crossing, follow the path from there to its partner, and continue
/// along the ring until we're back at the first crossing.
///
/// The returned polygon's exterior ring starts at the first crossing. Interior
/// rings that are inside the returned piece are kept.
///
/// The path must cross the exterior ring a non-zero, even number of times
/// (touching the ring without crossing doesn't count) and it must stay clear of
/// the interior rings; otherwise, this returns [`Error::InvalidCutPath`].
pub fn walk_polygon_cut(
    polygon: &Polygon,
    direction: RotationDirection,
    path: &[Point],
) -> Result<Polygon, Error> {
    for p in path {
        check_finite(*p)?;
    }

    let ring = polygon.ring_points(None);
    let n = ring.len();
    let hits = merge_hits(path_hits(path, &ring, None));
    let crossings: Vec<Hit> = crossings(path, &hits, |p| ring::locate(&ring, p))
        .into_iter()
        .map(|i| hits[i])
        .collect();
    let m = crossings.len();
    tracing::debug!(hits = hits.len(), crossings = m, ?direction, "cutting polygon");

    if m == 0 || m % 2 == 1 {
        return Err(Error::InvalidCutPath { crossings: m });
    }
    for i in 0..polygon.interior_ring_count() {
        if !path_hits(path, &polygon.ring_points(Some(i)), Some(i)).is_empty() {
            tracing::debug!(hole = i, "cut path runs into an interior ring");
            return Err(Error::InvalidCutPath { crossings: m });
        }
    }

    let mut out = Emitter::new(crossings[0].point);
    let mut visited = vec![false; m];
    visited[0] = true;
    let mut cur = 0;
    loop {
        let next = next_on_ring(&crossings, cur, n, direction);
        let from = crossings[cur].ring_pos;
        let to = crossings[next].ring_pos;
        let between = match direction {
            RotationDirection::CounterClockwise => ccw_vertices(n, from, to),
            RotationDirection::Clockwise => {
                let mut vs = ccw_vertices(n, to, from);
                vs.reverse();
                vs
            }
        };
        for v in between {
            out.push(ring[v]);
        }
        if next == 0 {
            break;
        }
        if std::mem::replace(&mut visited[next], true) {
            return Err(Error::InvalidCutPath { crossings: m });
        }
        out.push(crossings[next].point);

        let partner = next ^ 1;
        for j in path_vertices(path, crossings[next].path_pos, crossings[partner].path_pos) {
            out.push(path[j]);
        }
        if partner == 0 {
            break;
        }
        if std::mem::replace(&mut visited[partner], true) {
            return Err(Error::InvalidCutPath { crossings: m });
        }
        out.push(crossings[partner].point);
        cur = partner;
    }

    let mut ret = Polygon::new(out.finish())?;
    let result_ring = ret.ring_points(None);
    for hole in polygon.interior_rings() {
        if ring::open(&hole)
            .iter()
            .all(|p| ring::locate(&result_ring, p) == Location::Inside)
        {
            ret.add_interior_ring(hole)?;
        }
    }
    Ok(ret)
}

impl Polygon {
    /// Cuts this polygon along `path`. See [`walk_polygon_cut`].
    pub fn walk_cut(&self, direction: RotationDirection, path: &[Point]) -> Result<Polygon, Error> {
        walk_polygon_cut(self, direction, path)
    }
}

// Collects the output ring, dropping points that are too close to the
// previous one.
struct Emitter {
    points: Vec<Point>,
}

impl Emitter {
    fn new(start: Point) -> Self {
        Emitter {
            points: vec![start],
        }
    }

    fn push(&mut self, p: Point) {
        if !self.points.last().is_some_and(|last| last.approx_eq(&p)) {
            self.points.push(p);
        }
    }

    fn finish(mut self) -> Vec<Point> {
        let first = self.points[0];
        while self.points.len() > 1 && self.points.last().is_some_and(|p| p.approx_eq(&first)) {
            self.points.pop();
        }
        self.points.push(first);
        self.points
    }
}

// The crossing reached first when walking around the ring from crossing `cur`.
fn next_on_ring(crossings: &[Hit], cur: usize, n: usize, direction: RotationDirection) -> usize {
    let here = crossings[cur].ring_pos.value();
    let len = n as f64;
    let distance = |k: usize| {
        let there = crossings[k].ring_pos.value();
        let d = match direction {
            RotationDirection::CounterClockwise => there - here,
            RotationDirection::Clockwise => here - there,
        }
        .rem_euclid(len);
        if d == 0.0 {
            len
        } else {
            d
        }
    };
    (0..crossings.len())
        .filter(|&k| k != cur)
        .min_by(|&a, &b| distance(a).total_cmp(&distance(b)))
        .unwrap_or(cur)
}

// The ring vertices strictly between two ring positions, walking forward
// (counter-clockwise) from `from` to `to`. If the positions are the same, we
// go all the way around.
fn ccw_vertices(n: usize, from: Pos, to: Pos) -> Vec<usize> {
    let mut steps = (to.idx + n - from.idx) % n;
    if steps == 0 && to.t <= from.t {
        steps = n;
    }
    // The last step lands on vertex `to.idx`, which is `to` itself if `to` is a vertex.
    let count = if to.t == 0.0 { steps.saturating_sub(1) } else { steps };
    (1..=count).map(|k| (from.idx + k) % n).collect()
}

// The path vertices strictly between two path positions, in the order they're
// met going from `from` to `to`.
fn path_vertices(path: &[Point], from: Pos, to: Pos) -> Vec<usize> {
    let (a, b) = (from.value(), to.value());
    let inner = 1..path.len().saturating_sub(1);
    if a < b {
        inner.filter(|&j| a < j as f64 && (j as f64) < b).collect()
    } else {
        inner.rev().filter(|&j| b < j as f64 && (j as f64) < a).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{box_polygon, u_polygon};
    use assert_matches::assert_matches;
    use kurbo::Vec2;
    use RotationDirection::{Clockwise, CounterClockwise};

    fn pts(points: &[(f64, f64)]) -> Vec<Point> {
        points.iter().map(|&p| Point::from(p)).collect()
    }

    #[track_caller]
    fn check_cut(
        poly: &Polygon,
        path: &[(f64, f64)],
        direction: RotationDirection,
        expected: &[(f64, f64)],
    ) {
        let cut = poly.walk_cut(direction, &pts(path)).unwrap();
        let expected = pts(expected);
        assert_eq!(cut.exterior_ring(), expected);
        assert!(cut.contains(&expected[0]));
    }

    #[test]
    fn straight_line() {
        let poly = box_polygon(10.0);
        let path = [(-15.0, 1.0), (15.0, 1.0)];
        check_cut(
            &poly,
            &path,
            CounterClockwise,
            &[
                (-10.0, 1.0),
                (-10.0, 0.0),
                (-10.0, -10.0),
                (10.0, -10.0),
                (10.0, 1.0),
                (-10.0, 1.0),
            ],
        );
        check_cut(
            &poly,
            &path,
            Clockwise,
            &[
                (-10.0, 1.0),
                (10.0, 1.0),
                (10.0, 10.0),
                (-10.0, 10.0),
                (-10.0, 1.0),
            ],
        );
    }

    #[test]
    fn one_interior_point() {
        let poly = box_polygon(10.0);
        let path = [(-15.0, 1.0), (0.0, 1.0), (15.0, 1.0)];
        check_cut(
            &poly,
            &path,
            CounterClockwise,
            &[
                (-10.0, 1.0),
                (-10.0, 0.0),
                (-10.0, -10.0),
                (10.0, -10.0),
                (10.0, 1.0),
                (0.0, 1.0),
                (-10.0, 1.0),
            ],
        );
        check_cut(
            &poly,
            &path,
            Clockwise,
            &[
                (-10.0, 1.0),
                (0.0, 1.0),
                (10.0, 1.0),
                (10.0, 10.0),
                (-10.0, 10.0),
                (-10.0, 1.0),
            ],
        );
    }

    #[test]
    fn two_interior_points() {
        let poly = box_polygon(10.0);
        let path = [(-15.0, 1.0), (0.0, 1.0), (0.0, -5.0), (15.0, -5.0)];
        check_cut(
            &poly,
            &path,
            CounterClockwise,
            &[
                (-10.0, 1.0),
                (-10.0, 0.0),
                (-10.0, -10.0),
                (10.0, -10.0),
                (10.0, -5.0),
                (0.0, -5.0),
                (0.0, 1.0),
                (-10.0, 1.0),
            ],
        );
        check_cut(
            &poly,
            &path,
            Clockwise,
            &[
                (-10.0, 1.0),
                (0.0, 1.0),
                (0.0, -5.0),
                (10.0, -5.0),
                (10.0, 10.0),
                (-10.0, 10.0),
                (-10.0, 1.0),
            ],
        );
    }

    #[test]
    fn through_vertices() {
        let poly = box_polygon(10.0);
        let path = [(-15.0, 15.0), (15.0, -15.0)];
        check_cut(
            &poly,
            &path,
            CounterClockwise,
            &[
                (-10.0, 10.0),
                (-10.0, 0.0),
                (-10.0, -10.0),
                (10.0, -10.0),
                (-10.0, 10.0),
            ],
        );
        check_cut(
            &poly,
            &path,
            Clockwise,
            &[(-10.0, 10.0), (10.0, -10.0), (10.0, 10.0), (-10.0, 10.0)],
        );
    }

    #[test]
    fn through_vertices_with_interior_point() {
        let poly = box_polygon(10.0);
        let short = [(-15.0, 15.0), (0.0, 0.0), (15.0, -15.0)];
        let long = [
            (-45.0, 15.0),
            (-30.0, 15.0),
            (-15.0, 15.0),
            (0.0, 0.0),
            (15.0, -15.0),
            (30.0, -15.0),
            (45.0, -15.0),
        ];
        for path in [&short[..], &long[..]] {
            check_cut(
                &poly,
                path,
                CounterClockwise,
                &[
                    (-10.0, 10.0),
                    (-10.0, 0.0),
                    (-10.0, -10.0),
                    (10.0, -10.0),
                    (0.0, 0.0),
                    (-10.0, 10.0),
                ],
            );
            check_cut(
                &poly,
                path,
                Clockwise,
                &[
                    (-10.0, 10.0),
                    (0.0, 0.0),
                    (10.0, -10.0),
                    (10.0, 10.0),
                    (-10.0, 10.0),
                ],
            );
        }
    }

    #[test]
    fn path_outside_the_polygon() {
        let poly = box_polygon(10.0);
        let path = [
            (-9.0, 1.0),
            (-15.0, 1.0),
            (-15.0, 15.0),
            (15.0, 15.0),
            (15.0, 1.0),
            (9.0, 1.0),
        ];
        let tail = [(15.0, 1.0), (15.0, 15.0), (-15.0, 15.0), (-15.0, 1.0), (-10.0, 1.0)];

        let mut ccw = vec![(-10.0, 1.0), (-10.0, 0.0), (-10.0, -10.0), (10.0, -10.0), (10.0, 1.0)];
        ccw.extend_from_slice(&tail);
        check_cut(&poly, &path, CounterClockwise, &ccw);

        let mut cw = vec![(-10.0, 1.0), (-10.0, 10.0), (10.0, 10.0), (10.0, 1.0)];
        cw.extend_from_slice(&tail);
        check_cut(&poly, &path, Clockwise, &cw);
    }

    #[test]
    fn concave() {
        let poly = u_polygon(10.0);
        let short = [(-7.5, 7.5), (7.5, 7.5)];
        let long = [(-8.0, 7.5), (-7.5, 7.5), (7.5, 7.5), (9.0, 7.5)];
        for path in [&short[..], &long[..]] {
            check_cut(
                &poly,
                path,
                CounterClockwise,
                &[
                    (-5.0, 7.5),
                    (-5.0, 10.0),
                    (-10.0, 10.0),
                    (-10.0, -10.0),
                    (10.0, -10.0),
                    (10.0, 10.0),
                    (5.0, 10.0),
                    (5.0, 7.5),
                    (-5.0, 7.5),
                ],
            );
            check_cut(
                &poly,
                path,
                Clockwise,
                &[(-5.0, 7.5), (-5.0, -5.0), (5.0, -5.0), (5.0, 7.5), (-5.0, 7.5)],
            );
        }
    }

    #[test]
    fn holes_follow_their_piece() {
        let mut poly = box_polygon(10.0);
        poly.add_interior_ring(box_polygon(1.0).translate(Vec2::new(0.0, -2.0)).exterior_ring())
            .unwrap();
        let path = pts(&[(-15.0, 1.0), (15.0, 1.0)]);

        let below = poly.walk_cut(CounterClockwise, &path).unwrap();
        assert_eq!(below.interior_ring_count(), 1);
        assert_eq!(below.area(), 11.0 * 20.0 - 4.0);

        let above = poly.walk_cut(Clockwise, &path).unwrap();
        assert_eq!(above.interior_ring_count(), 0);
        assert_eq!(above.area(), 9.0 * 20.0);

        // The input is left alone.
        assert_eq!(poly.interior_ring_count(), 1);
    }

    #[test]
    fn path_into_a_hole() {
        let mut poly = box_polygon(10.0);
        poly.add_interior_ring(box_polygon(1.0).exterior_ring()).unwrap();
        assert_eq!(
            poly.walk_cut(CounterClockwise, &pts(&[(-15.0, 0.0), (15.0, 0.0)])),
            Err(Error::InvalidCutPath { crossings: 2 })
        );
    }

    #[test]
    fn bad_crossing_counts() {
        let poly = box_polygon(10.0);
        assert_eq!(
            poly.walk_cut(CounterClockwise, &pts(&[(-15.0, 1.0), (0.0, 1.0)])),
            Err(Error::InvalidCutPath { crossings: 1 })
        );
        assert_eq!(
            poly.walk_cut(CounterClockwise, &pts(&[(-5.0, 1.0), (5.0, 1.0)])),
            Err(Error::InvalidCutPath { crossings: 0 })
        );
        assert_matches!(
            poly.walk_cut(CounterClockwise, &pts(&[(-5.0, 1.0), (f64::NAN, 1.0)])),
            Err(Error::NaN)
        );
    }

    #[test]
    fn tangents_are_not_crossings() {
        let poly = box_polygon(10.0);

        // Grazing a corner.
        assert_eq!(
            poly.walk_cut(Clockwise, &pts(&[(5.0, 15.0), (15.0, 5.0)])),
            Err(Error::InvalidCutPath { crossings: 0 })
        );
        // Running along an edge.
        assert_eq!(
            poly.walk_cut(Clockwise, &pts(&[(-15.0, 10.0), (15.0, 10.0)])),
            Err(Error::InvalidCutPath { crossings: 0 })
        );

        // A real cut, which then grazes a corner on the way out.
        let path = [(-15.0, 1.0), (12.0, 1.0), (12.0, 8.0), (10.0, 10.0), (8.0, 12.0)];
        check_cut(
            &poly,
            &path,
            CounterClockwise,
            &[
                (-10.0, 1.0),
                (-10.0, 0.0),
                (-10.0, -10.0),
                (10.0, -10.0),
                (10.0, 1.0),
                (-10.0, 1.0),
            ],
        );
    }

    #[test]
    fn entering_along_an_edge() {
        // The path runs down the left edge and then turns inside: it crosses
        // where it leaves the edge.
        let poly = box_polygon(10.0);
        let path = pts(&[(-10.0, 15.0), (-10.0, 5.0), (0.0, 5.0), (15.0, 5.0)]);
        let cut = poly.walk_cut(Clockwise, &path).unwrap();
        insta::assert_debug_snapshot!(cut.exterior_ring(), @r###"
        [
            (-10.0, 5.0),
            (0.0, 5.0),
            (10.0, 5.0),
            (10.0, 10.0),
            (-10.0, 10.0),
            (-10.0, 5.0),
        ]
        "###);
    }
}
