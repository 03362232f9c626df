//! Where paths and polygons meet.

use std::collections::{HashMap, HashSet};

use crate::{
    geom::{rects_overlap, Segment, SegmentIntersection},
    num::CheapOrderedFloat,
    ring::{self, Location},
    Error, Point, Polygon, EPSILON,
};

use super::{check_edits, index::PolygonIndex, slot_ring, RingId};

/// A position along a polyline: the index of a segment (or edge) and a
/// parameter in `[0, 1]` along it.
///
/// Vertices are always represented with `t == 0`, except for the last point of
/// an open path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Pos {
    pub idx: usize,
    pub t: f64,
}

impl Pos {
    pub fn value(&self) -> f64 {
        self.idx as f64 + self.t
    }
}

/// A place where a path meets a ring.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Hit {
    pub point: Point,
    pub path_pos: Pos,
    pub ring: RingId,
    pub ring_pos: Pos,
}

/// Finds every point where `path` (an open polyline) meets `ring` (an open
/// ring). Overlaps produce a hit at each end.
pub(crate) fn path_hits(path: &[Point], ring: &[Point], ring_id: RingId) -> Vec<Hit> {
    let n = ring.len();
    let edges: Vec<Segment> = ring::edges(ring).collect();
    let mut ret = Vec::new();

    for (j, w) in path.windows(2).enumerate() {
        let seg = Segment::new(w[0], w[1]);
        if seg.a == seg.b {
            continue;
        }
        let bbox = seg.bbox().inflate(EPSILON, EPSILON);
        let last_seg = j + 2 == path.len();

        for (e, edge) in edges.iter().enumerate() {
            if !rects_overlap(&bbox, &edge.bbox()) {
                continue;
            }
            let points = match seg.intersection(edge) {
                SegmentIntersection::None => continue,
                SegmentIntersection::Point(p) => [Some(p), None],
                SegmentIntersection::Overlap(o) => [Some(o.a), Some(o.b)],
            };
            for p in points.into_iter().flatten() {
                let t = seg.param_of(&p).clamp(0.0, 1.0);
                let path_pos = if (p == seg.b || t >= 1.0) && !last_seg {
                    Pos { idx: j + 1, t: 0.0 }
                } else if p == seg.a {
                    Pos { idx: j, t: 0.0 }
                } else {
                    Pos { idx: j, t }
                };
                let ring_pos = if p == edge.a {
                    Pos { idx: e, t: 0.0 }
                } else if p == edge.b {
                    Pos {
                        idx: (e + 1) % n,
                        t: 0.0,
                    }
                } else {
                    Pos {
                        idx: e,
                        t: edge.param_of(&p).clamp(0.0, 1.0),
                    }
                };
                ret.push(Hit {
                    point: p,
                    path_pos,
                    ring: ring_id,
                    ring_pos,
                });
            }
        }
    }
    ret
}

/// Sorts hits along the path and merges consecutive hits at the same point.
pub(crate) fn merge_hits(mut hits: Vec<Hit>) -> Vec<Hit> {
    hits.sort_by_key(|h| CheapOrderedFloat::from(h.path_pos.value()));
    let mut ret: Vec<Hit> = Vec::with_capacity(hits.len());
    for h in hits {
        match ret.last_mut() {
            Some(last) if last.point.approx_eq(&h.point) => {
                // Prefer the hit that lands exactly on a vertex.
                if last.ring_pos.t != 0.0 && h.ring_pos.t == 0.0 && last.ring == h.ring {
                    last.ring_pos = h.ring_pos;
                    last.point = h.point;
                }
            }
            _ => ret.push(h),
        }
    }
    ret
}

fn point_at(path: &[Point], v: f64) -> Point {
    let max = path.len().saturating_sub(2);
    let idx = (v.floor().max(0.0) as usize).min(max);
    let t = (v - idx as f64).clamp(0.0, 1.0);
    path[idx].affine(&path[idx + 1], t)
}

/// Picks out the hits where the path really crosses from one side to the other.
///
/// The path is cut into pieces at the hits, and each piece is located by its
/// midpoint. A hit is a crossing if the pieces on either side of it (skipping
/// over pieces that run along the boundary) are on different sides. So a path
/// that touches the boundary and turns back doesn't cross, and a path that runs
/// along the boundary for a while crosses (if it does) at the last hit of the
/// run.
pub(crate) fn crossings(
    path: &[Point],
    hits: &[Hit],
    locate: impl Fn(&Point) -> Location,
) -> Vec<usize> {
    if path.len() < 2 {
        return Vec::new();
    }
    let end = (path.len() - 1) as f64;
    let bounds: Vec<f64> = std::iter::once(0.0)
        .chain(hits.iter().map(|h| h.path_pos.value()))
        .chain(std::iter::once(end))
        .collect();

    let piece = |k: usize| -> Option<Location> {
        let (lo, hi) = (bounds[k], bounds[k + 1]);
        (hi > lo).then(|| locate(&point_at(path, (lo + hi) / 2.0)))
    };

    let mut ret = Vec::new();
    let mut side = piece(0).filter(|&loc| loc != Location::Boundary);
    for i in 0..hits.len() {
        match piece(i + 1) {
            None | Some(Location::Boundary) => {}
            Some(after) => {
                if side.is_some_and(|before| before != after) {
                    ret.push(i);
                }
                side = Some(after);
            }
        }
    }
    ret
}

impl Polygon {
    /// Does `seg` meet any edge of any ring?
    ///
    /// If `endpoints_on_ring_do_not_intersect` is set, a single-point meeting at
    /// an endpoint of either the segment or the edge doesn't count. Collinear
    /// overlaps always count.
    pub fn intersects_segment(&self, seg: &Segment, endpoints_on_ring_do_not_intersect: bool) -> bool {
        let bbox = seg.bbox().inflate(EPSILON, EPSILON);
        if !rects_overlap(&bbox, &self.bounding_box()) {
            return false;
        }
        self.rings().iter().any(|r| {
            ring::edges(r).any(|e| {
                rects_overlap(&bbox, &e.bbox()) && seg.intersects(&e, endpoints_on_ring_do_not_intersect)
            })
        })
    }

    /// Does `seg` pass between the inside and the outside of the polygon?
    ///
    /// Touching or running along the boundary doesn't count.
    pub fn crosses(&self, seg: &Segment) -> bool {
        let path = [seg.a, seg.b];
        let hits = self
            .ring_ids()
            .flat_map(|id| path_hits(&path, &self.ring_points(id), id))
            .collect();
        let hits = merge_hits(hits);
        !crossings(&path, &hits, |p| self.locate(p)).is_empty()
    }

    /// Do the two polygons meet? They do if any of their edges meet, or if
    /// either one contains a vertex of the other.
    pub fn intersects_polygon(&self, other: &Polygon) -> bool {
        if !rects_overlap(&self.bounding_box(), &other.bounding_box()) {
            return false;
        }
        let theirs = other.rings();
        let edges_meet = self.rings().iter().any(|ours| {
            theirs.iter().any(|t| ring::rings_intersect(ours, t))
        });
        edges_meet
            || other.vertex(None, 0).is_some_and(|p| self.contains(&p))
            || self.vertex(None, 0).is_some_and(|p| other.contains(&p))
    }

    /// The edges that `seg` meets, with the meeting points, ordered by distance
    /// from the start of `seg`. For an edge that `seg` runs along, the point is
    /// the start of the shared part.
    ///
    /// The returned indices point at the first vertex of each edge, and have
    /// polygon number zero.
    pub fn intersecting_segments(&self, seg: &Segment) -> Vec<(PolygonIndex, Point)> {
        let mut ret = Vec::new();
        for id in self.ring_ids() {
            let r = self.ring_points(id);
            for (e, edge) in ring::edges(&r).enumerate() {
                let p = match seg.intersection(&edge) {
                    SegmentIntersection::None => continue,
                    SegmentIntersection::Point(p) => p,
                    SegmentIntersection::Overlap(o) => o.a,
                };
                ret.push((PolygonIndex::new(0, id, e, r.len()), p));
            }
        }
        ret.sort_by_key(|(idx, p)| (CheapOrderedFloat::from(seg.a.distance(p)), *idx));
        ret
    }

    /// Adds a vertex to both polygons at every point where their rings meet.
    ///
    /// Where two edges overlap, both ends of the overlap are added. A point
    /// that is already a vertex of a ring isn't added to that ring again.
    ///
    /// Returns the points that were added to either polygon, in the order they
    /// were found. Either both polygons are updated or neither is.
    pub fn add_points_at_intersections(&mut self, other: &mut Polygon) -> Result<Vec<Point>, Error> {
        let mut ours = self.rings();
        let mut theirs = other.rings();

        // Keyed by (ring slot, edge).
        let mut our_inserts: HashMap<(usize, usize), Vec<Point>> = HashMap::new();
        let mut their_inserts: HashMap<(usize, usize), Vec<Point>> = HashMap::new();
        let mut found = Vec::new();
        let mut seen = HashSet::new();

        {
            let our_vertices: Vec<HashSet<Point>> =
                ours.iter().map(|r| r.iter().copied().collect()).collect();
            let their_vertices: Vec<HashSet<Point>> =
                theirs.iter().map(|r| r.iter().copied().collect()).collect();
            let mut our_pending: Vec<HashSet<Point>> = vec![HashSet::new(); ours.len()];
            let mut their_pending: Vec<HashSet<Point>> = vec![HashSet::new(); theirs.len()];

            for (ka, ra) in ours.iter().enumerate() {
                for (kb, rb) in theirs.iter().enumerate() {
                    let b_edges: Vec<Segment> = ring::edges(rb).collect();
                    for (i, sa) in ring::edges(ra).enumerate() {
                        let bbox = sa.bbox().inflate(EPSILON, EPSILON);
                        for (j, sb) in b_edges.iter().enumerate() {
                            if !rects_overlap(&bbox, &sb.bbox()) {
                                continue;
                            }
                            let points = match sa.intersection(sb) {
                                SegmentIntersection::None => continue,
                                SegmentIntersection::Point(p) => [Some(p), None],
                                SegmentIntersection::Overlap(o) => [Some(o.a), Some(o.b)],
                            };
                            for p in points.into_iter().flatten() {
                                let mut added = false;
                                if !our_vertices[ka].contains(&p) && our_pending[ka].insert(p) {
                                    our_inserts.entry((ka, i)).or_default().push(p);
                                    added = true;
                                }
                                if !their_vertices[kb].contains(&p) && their_pending[kb].insert(p) {
                                    their_inserts.entry((kb, j)).or_default().push(p);
                                    added = true;
                                }
                                if added && seen.insert(p) {
                                    found.push(p);
                                }
                            }
                        }
                    }
                }
            }
        }

        if found.is_empty() {
            return Ok(found);
        }

        let our_changes = splice_all(&mut ours, &our_inserts);
        let their_changes = splice_all(&mut theirs, &their_inserts);
        check_edits(&ours, &our_changes)?;
        check_edits(&theirs, &their_changes)?;

        tracing::debug!(
            count = found.len(),
            "added vertices at polygon intersections"
        );
        self.rebuild(ours);
        other.rebuild(theirs);

        #[cfg(feature = "slow-asserts")]
        {
            self.check_invariants();
            other.check_invariants();
        }
        Ok(found)
    }
}

// Splices the pending points into their edges, returning the edges that
// changed in each ring.
fn splice_all(
    rings: &mut [Vec<Point>],
    inserts: &HashMap<(usize, usize), Vec<Point>>,
) -> Vec<Option<Vec<usize>>> {
    let mut changed = vec![None; rings.len()];
    for (k, r) in rings.iter_mut().enumerate() {
        if !inserts.keys().any(|&(slot, _)| slot == k) {
            continue;
        }
        let n = r.len();
        let mut out = Vec::with_capacity(n);
        let mut edges = Vec::new();
        for i in 0..n {
            out.push(r[i]);
            if let Some(points) = inserts.get(&(k, i)) {
                let edge = Segment::new(r[i], r[(i + 1) % n]);
                let mut points = points.clone();
                points.sort_by_key(|p| CheapOrderedFloat::from(edge.param_of(p)));
                edges.push(out.len() - 1);
                for p in points {
                    out.push(p);
                    edges.push(out.len() - 1);
                }
            }
        }
        tracing::trace!(ring = ?slot_ring(k), added = out.len() - n, "spliced ring");
        *r = out;
        changed[k] = Some(edges);
    }
    changed
}
