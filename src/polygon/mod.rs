//! Polygons with holes.
//!
//! A [`Polygon`] owns an arena of points, and each of its rings is a list of
//! indices into that arena. Every ring is stored counter-clockwise and without
//! its closing point; rings are closed again whenever they are handed out.
//!
//! All edits are atomic: an edit that would break a ring invariant returns an
//! error and leaves the polygon as it was.

use std::collections::HashSet;

use kurbo::{Rect, Vec2};

use crate::{
    check_finite,
    geom::{rect_contains_point, rect_from_points, rects_overlap, Segment, SegmentIntersection},
    ring::{self, Location},
    Error, Point, TopologyError, EPSILON,
};

pub mod cut;
pub mod index;
mod intersect;
pub mod vertex_enum;

use index::PolygonIndex;

/// An index into a polygon's point arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PointIdx(pub usize);

#[derive(Clone)]
pub(crate) struct PointVec<T> {
    inner: Vec<T>,
}

impl_typed_vec!(PointVec, PointIdx, "p");

/// Names one ring of a polygon: `None` for the exterior ring, `Some(i)` for
/// interior ring `i`.
pub type RingId = Option<usize>;

/// A polygon: one exterior ring and zero or more interior rings (holes).
///
/// The invariants, checked on construction and after every edit:
/// - every ring is simple and has at least three distinct points,
/// - every interior ring is strictly inside the exterior ring,
/// - no two rings meet, and no interior ring is inside another.
#[derive(Clone)]
pub struct Polygon {
    points: PointVec<Point>,
    exterior: Vec<PointIdx>,
    interiors: Vec<Vec<PointIdx>>,
    bbox: Rect,
}

impl PartialEq for Polygon {
    fn eq(&self, other: &Self) -> bool {
        self.rings() == other.rings()
    }
}

impl std::fmt::Debug for Polygon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Polygon")
            .field("exterior", &self.ring_points(None))
            .field(
                "interiors",
                &(0..self.interiors.len())
                    .map(|i| self.ring_points(Some(i)))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

// Orients a closed ring counter-clockwise and drops its closing point. Reversing
// a closed ring keeps its first point first.
fn normalize_ring(mut ring: Vec<Point>) -> Vec<Point> {
    if ring::is_clockwise(&ring) {
        ring.reverse();
    }
    ring.pop();
    ring
}

impl Polygon {
    /// Creates a polygon from a closed exterior ring.
    ///
    /// A clockwise ring is reversed, keeping its first point first.
    pub fn new(exterior: Vec<Point>) -> Result<Polygon, Error> {
        ring::validate_closed_ring(&exterior)?;
        let exterior = normalize_ring(exterior);

        let mut points = PointVec::default();
        let exterior = exterior.into_iter().map(|p| points.push(p)).collect();
        let mut ret = Polygon {
            points,
            exterior,
            interiors: Vec::new(),
            bbox: Rect::ZERO,
        };
        ret.refresh_bbox();
        Ok(ret)
    }

    /// Creates a polygon from a closed exterior ring and some closed interior rings.
    pub fn with_interior_rings(
        exterior: Vec<Point>,
        interiors: impl IntoIterator<Item = Vec<Point>>,
    ) -> Result<Polygon, Error> {
        let mut ret = Polygon::new(exterior)?;
        for ring in interiors {
            ret.add_interior_ring(ring)?;
        }
        Ok(ret)
    }

    /// The polygon covering a rectangle.
    pub fn from_rect(rect: Rect) -> Result<Polygon, Error> {
        let rect = rect.abs();
        Polygon::new(vec![
            Point::new(rect.x0, rect.y0),
            Point::new(rect.x1, rect.y0),
            Point::new(rect.x1, rect.y1),
            Point::new(rect.x0, rect.y1),
            Point::new(rect.x0, rect.y0),
        ])
    }

    pub(crate) fn ring_indices(&self, id: RingId) -> Option<&[PointIdx]> {
        match id {
            None => Some(&self.exterior),
            Some(i) => self.interiors.get(i).map(|r| r.as_slice()),
        }
    }

    fn ring_indices_mut(&mut self, id: RingId) -> &mut Vec<PointIdx> {
        match id {
            None => &mut self.exterior,
            Some(i) => &mut self.interiors[i],
        }
    }

    /// The ring ids of this polygon: the exterior first, then each hole.
    pub(crate) fn ring_ids(&self) -> impl Iterator<Item = RingId> {
        std::iter::once(None).chain((0..self.interiors.len()).map(Some))
    }

    // The unique vertices of a ring, in order. Empty if there is no such ring.
    pub(crate) fn ring_points(&self, id: RingId) -> Vec<Point> {
        self.ring_indices(id)
            .map(|r| r.iter().map(|&i| self.points[i]).collect())
            .unwrap_or_default()
    }

    // All rings as open point lists, the exterior first.
    pub(crate) fn rings(&self) -> Vec<Vec<Point>> {
        self.ring_ids().map(|id| self.ring_points(id)).collect()
    }

    fn closed(mut ring: Vec<Point>) -> Vec<Point> {
        if let Some(&first) = ring.first() {
            ring.push(first);
        }
        ring
    }

    /// The exterior ring, closed and counter-clockwise.
    pub fn exterior_ring(&self) -> Vec<Point> {
        Self::closed(self.ring_points(None))
    }

    /// Interior ring `i`, closed and counter-clockwise.
    pub fn interior_ring(&self, i: usize) -> Option<Vec<Point>> {
        self.interiors
            .get(i)
            .map(|_| Self::closed(self.ring_points(Some(i))))
    }

    /// All the interior rings, closed and counter-clockwise.
    pub fn interior_rings(&self) -> Vec<Vec<Point>> {
        (0..self.interiors.len())
            .map(|i| Self::closed(self.ring_points(Some(i))))
            .collect()
    }

    /// The number of interior rings.
    pub fn interior_ring_count(&self) -> usize {
        self.interiors.len()
    }

    /// The number of unique vertices in a ring, if the ring exists.
    pub fn ring_len(&self, id: RingId) -> Option<usize> {
        self.ring_indices(id).map(|r| r.len())
    }

    /// Vertex `i` of a ring.
    pub fn vertex(&self, id: RingId, i: usize) -> Option<Point> {
        self.ring_indices(id)?.get(i).map(|&idx| self.points[idx])
    }

    /// Is `p` exactly one of our vertices?
    pub fn is_vertex(&self, p: &Point) -> bool {
        self.vertex_index(p).is_some()
    }

    /// Finds `p` (exactly) among the vertices of every ring.
    ///
    /// The returned index has polygon number zero.
    pub fn vertex_index(&self, p: &Point) -> Option<PolygonIndex> {
        self.ring_ids().find_map(|id| {
            let ring = self.ring_indices(id)?;
            let pos = ring.iter().position(|&i| self.points[i] == *p)?;
            Some(PolygonIndex::new(0, id, pos, ring.len()))
        })
    }

    /// The number of points in all rings, counting each ring's closing point.
    pub fn total_verticies(&self) -> usize {
        self.ring_ids()
            .filter_map(|id| self.ring_len(id))
            .map(|len| len + 1)
            .sum()
    }

    /// The number of distinct ring positions: every ring's length without its
    /// closing point.
    pub fn total_unique_verticies(&self) -> usize {
        self.total_verticies() - (1 + self.interiors.len())
    }

    /// The area of the exterior ring, minus the areas of the holes.
    pub fn area(&self) -> f64 {
        let exterior = ring::signed_area(&self.ring_points(None));
        let holes: f64 = (0..self.interiors.len())
            .map(|i| ring::signed_area(&self.ring_points(Some(i))))
            .sum();
        exterior - holes
    }

    /// The centroid of the exterior ring.
    pub fn centroid(&self) -> Point {
        ring::centroid(&self.ring_points(None))
    }

    /// The total length of every ring.
    pub fn perimeter(&self) -> f64 {
        self.rings().iter().map(|r| ring::perimeter(r)).sum()
    }

    /// The bounding box of the exterior ring.
    pub fn bounding_box(&self) -> Rect {
        self.bbox
    }

    fn refresh_bbox(&mut self) {
        let points = self.exterior.iter().map(|&i| &self.points[i]);
        self.bbox = rect_from_points(points).unwrap_or(Rect::ZERO);
    }

    // Where `p` is relative to the polygon's region, holes taken into account.
    pub(crate) fn locate(&self, p: &Point) -> Location {
        if !rect_contains_point(&self.bbox, p) {
            return Location::Outside;
        }
        match ring::locate(&self.ring_points(None), p) {
            Location::Inside => {}
            other => return other,
        }
        for i in 0..self.interiors.len() {
            match ring::locate(&self.ring_points(Some(i)), p) {
                Location::Inside => return Location::Outside,
                Location::Boundary => return Location::Boundary,
                Location::Outside => {}
            }
        }
        Location::Inside
    }

    /// Is `p` inside the polygon? Points on the boundary of any ring, interior
    /// rings included, count as inside.
    pub fn contains(&self, p: &Point) -> bool {
        self.locate(p) != Location::Outside
    }

    /// Is all of `other` inside this polygon?
    ///
    /// Every vertex and every edge midpoint of `other` must be inside, no edge
    /// of `other` may properly cross one of ours, and none of our holes may be
    /// inside `other`. Shared boundaries are allowed.
    pub fn contains_polygon(&self, other: &Polygon) -> bool {
        let theirs = other.ring_points(None);
        if !theirs.iter().all(|p| self.contains(p)) {
            return false;
        }
        if !ring::edges(&theirs).all(|s| self.contains(&s.midpoint())) {
            return false;
        }

        let ours: Vec<Segment> = self.rings().iter().flat_map(|r| ring::edges(r).collect::<Vec<_>>()).collect();
        for s in ring::edges(&theirs) {
            for t in &ours {
                if let SegmentIntersection::Point(p) = s.intersection(t) {
                    if !s.is_endpoint(&p) && !t.is_endpoint(&p) {
                        return false;
                    }
                }
            }
        }

        (0..self.interiors.len()).all(|i| {
            self.ring_points(Some(i))
                .iter()
                .all(|p| other.locate(p) != Location::Inside)
        })
    }

    /// The distance from `p` to the polygon: zero if `p` is inside, otherwise
    /// the distance to the nearest edge.
    pub fn distance_to_point(&self, p: &Point) -> f64 {
        if self.contains(p) {
            return 0.0;
        }
        self.rings()
            .iter()
            .flat_map(|r| ring::edges(r).map(|s| s.distance_to_point(p)).collect::<Vec<_>>())
            .fold(f64::INFINITY, f64::min)
    }

    // The edge (over all rings) closest to `p`, with its distance.
    fn nearest_edge(&self, p: &Point) -> Option<(RingId, usize, f64)> {
        self.ring_ids()
            .filter_map(|id| {
                let (edge, dist) = Self::nearest_edge_of(&self.ring_points(id), p)?;
                Some((id, edge, dist))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))
    }

    fn nearest_edge_of(ring: &[Point], p: &Point) -> Option<(usize, f64)> {
        ring::edges(ring)
            .map(|s| s.distance_to_point(p))
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Adds a vertex.
    ///
    /// If `p` is already a vertex, this does nothing and returns `Ok(false)`.
    /// If `p` lies on an edge, it is spliced into that edge. Otherwise it is
    /// added to the innermost ring that contains it (a hole containing it, or
    /// else the exterior ring), between the endpoints of that ring's nearest
    /// edge.
    pub fn add_vertex(&mut self, p: Point) -> Result<bool, Error> {
        check_finite(p)?;
        if self.is_vertex(&p) {
            return Ok(false);
        }

        let (id, edge) = match self.nearest_edge(&p) {
            Some((id, edge, dist)) if dist <= EPSILON => (id, edge),
            _ => {
                let id = (0..self.interiors.len())
                    .map(Some)
                    .find(|&id| ring::locate(&self.ring_points(id), &p) == Location::Inside)
                    .unwrap_or(None);
                let edge = Self::nearest_edge_of(&self.ring_points(id), &p)
                    .map(|(edge, _)| edge)
                    .unwrap_or(0);
                (id, edge)
            }
        };

        self.insert_vertex(id, edge, p)?;
        Ok(true)
    }

    /// Inserts `p` into a ring, right after vertex `edge`.
    pub(crate) fn insert_vertex(&mut self, id: RingId, edge: usize, p: Point) -> Result<(), Error> {
        let mut rings = self.rings();
        let k = ring_slot(id);
        let pos = edge + 1;
        rings[k].insert(pos, p);
        check_edit(&rings, k, Some(&[edge, pos][..])).inspect_err(|e| {
            tracing::debug!(?p, ?id, error = %e, "rejected vertex insertion");
        })?;

        let idx = self.points.push(p);
        self.ring_indices_mut(id).insert(pos, idx);
        self.refresh_bbox();

        #[cfg(feature = "slow-asserts")]
        self.check_invariants();
        Ok(())
    }

    /// Removes the vertex `p`, which must be (exactly) a vertex of one of our
    /// rings.
    ///
    /// Fails if the ring would end up with fewer than three points, would
    /// intersect itself or another ring, or if the holes would no longer be
    /// properly inside the exterior.
    pub fn remove_vertex(&mut self, p: Point) -> Result<(), Error> {
        let idx = self.vertex_index(&p).ok_or(Error::NoSuchVertex(p))?;
        let id = idx.inner;
        let pos = idx.vertex;

        let mut rings = self.rings();
        let k = ring_slot(id);
        rings[k].remove(pos);
        let n = rings[k].len();
        if n < 3 {
            return Err(TopologyError::TooFewPoints(n).into());
        }
        check_edit(&rings, k, Some(&[(pos + n - 1) % n][..])).inspect_err(|e| {
            tracing::debug!(?p, ?id, error = %e, "rejected vertex removal");
        })?;

        self.ring_indices_mut(id).remove(pos);
        self.refresh_bbox();
        self.maybe_compact();

        #[cfg(feature = "slow-asserts")]
        self.check_invariants();
        Ok(())
    }

    /// Adds a hole. The ring must be closed and simple, strictly inside the
    /// exterior ring, and disjoint from (and not nested with) the other holes.
    pub fn add_interior_ring(&mut self, ring: Vec<Point>) -> Result<(), Error> {
        ring::validate_closed_ring(&ring)?;
        let ring = normalize_ring(ring);

        let mut rings = self.rings();
        rings.push(ring.clone());
        check_edit(&rings, rings.len() - 1, None)?;

        let indices = ring.into_iter().map(|p| self.points.push(p)).collect();
        self.interiors.push(indices);

        #[cfg(feature = "slow-asserts")]
        self.check_invariants();
        Ok(())
    }

    /// Removes hole `i`, returning it as a closed ring.
    pub fn remove_interior_ring(&mut self, i: usize) -> Result<Vec<Point>, Error> {
        let ring = self.interior_ring(i).ok_or(Error::NoSuchRing(i))?;
        self.interiors.remove(i);
        self.maybe_compact();
        Ok(ring)
    }

    /// Removes the first hole containing `p`. Returns false if no hole contains it.
    pub fn try_remove_interior_ring_at(&mut self, p: &Point) -> bool {
        let found = (0..self.interiors.len())
            .find(|&i| ring::winding_contains(&self.ring_points(Some(i)), p));
        match found {
            Some(i) => self.remove_interior_ring(i).is_ok(),
            None => false,
        }
    }

    // The caller promises that the rings are open, counter-clockwise, and
    // satisfy the polygon invariants.
    pub(crate) fn from_rings_unchecked(rings: Vec<Vec<Point>>) -> Polygon {
        let mut ret = Polygon {
            points: PointVec::default(),
            exterior: Vec::new(),
            interiors: Vec::new(),
            bbox: Rect::ZERO,
        };
        ret.rebuild(rings);
        ret
    }

    // Replaces the rings wholesale, without checking them.
    pub(crate) fn rebuild(&mut self, rings: Vec<Vec<Point>>) {
        self.points.clear();
        let mut rings = rings.into_iter();
        let exterior = rings.next().unwrap_or_default();
        self.exterior = exterior.into_iter().map(|p| self.points.push(p)).collect();
        self.interiors = rings
            .map(|r| r.into_iter().map(|p| self.points.push(p)).collect())
            .collect();
        self.refresh_bbox();
    }

    /// Checks the ring invariants, panicking if they don't hold.
    pub fn check_invariants(&self) {
        let rings = self.rings();
        for (k, r) in rings.iter().enumerate() {
            assert!(!ring::is_clockwise(r), "ring {k} is clockwise");
            if let Err(e) = check_edit(&rings, k, None) {
                panic!("ring {k} is invalid: {e}");
            }
        }
        for idx in self.exterior.iter().chain(self.interiors.iter().flatten()) {
            assert!(idx.0 < self.points.len());
        }
    }

    /// Drops arena points that no ring refers to any more.
    pub fn compact(&mut self) {
        self.rebuild(self.rings());
    }

    fn maybe_compact(&mut self) {
        let live = self.total_unique_verticies();
        if self.points.len() > 2 * live + 16 {
            self.compact();
        }
    }

    fn map_points(&self, f: impl Fn(Point) -> Point) -> Polygon {
        let mut ret = self.clone();
        for (idx, p) in self.points.iter() {
            ret.points[idx] = f(*p);
        }
        ret.refresh_bbox();
        ret
    }

    /// A copy of this polygon, moved by `offset`.
    pub fn translate(&self, offset: Vec2) -> Polygon {
        self.map_points(|p| p + offset)
    }

    /// A copy of this polygon, rotated counter-clockwise by `angle` radians
    /// around `origin` (or around the centroid, if no origin is given).
    pub fn rotate(&self, angle: f64, origin: Option<Point>) -> Polygon {
        let origin = origin.unwrap_or_else(|| self.centroid());
        let (sin, cos) = angle.sin_cos();
        self.map_points(|p| {
            let d = p - origin;
            Point {
                x: origin.x + d.x * cos - d.y * sin,
                y: origin.y + d.x * sin + d.y * cos,
            }
        })
    }

    /// A copy of this polygon, scaled by `factor` around `origin` (or around the
    /// centroid, if no origin is given).
    ///
    /// Fails if the scaled rings are degenerate, for example if `factor` is zero.
    pub fn scale(&self, factor: f64, origin: Option<Point>) -> Result<Polygon, Error> {
        if factor.is_nan() {
            return Err(Error::NaN);
        }
        if factor.is_infinite() {
            return Err(Error::Infinity);
        }
        let origin = origin.unwrap_or_else(|| self.centroid());
        let scaled = self.map_points(|p| origin + (p - origin) * factor);
        Polygon::with_interior_rings(scaled.exterior_ring(), scaled.interior_rings())
    }

    /// Renders this polygon as an SVG document, for debugging.
    #[cfg(feature = "debug-svg")]
    pub fn dump_svg(&self) -> svg::Document {
        let bbox = self.bbox.inflate(1.0 + 0.05 * self.bbox.width(), 1.0 + 0.05 * self.bbox.height());
        let mut data = svg::node::element::path::Data::new();
        for ring in self.rings() {
            let mut points = ring.iter();
            if let Some(first) = points.next() {
                data = data.move_to((first.x, -first.y));
                for p in points {
                    data = data.line_to((p.x, -p.y));
                }
                data = data.close();
            }
        }
        let path = svg::node::element::Path::new()
            .set("d", data)
            .set("fill", "lightblue")
            .set("fill-rule", "evenodd")
            .set("stroke", "black")
            .set("stroke-width", 0.002 * bbox.width().max(bbox.height()));
        svg::Document::new()
            .set("viewBox", (bbox.x0, -bbox.y1, bbox.width(), bbox.height()))
            .add(path)
    }
}

// Position of a ring in the list returned by `Polygon::rings`.
pub(crate) fn ring_slot(id: RingId) -> usize {
    id.map_or(0, |i| i + 1)
}

pub(crate) fn slot_ring(k: usize) -> RingId {
    k.checked_sub(1)
}

/// Checks several edited rings at once. `changed` has an entry for each ring
/// slot: the edges to check, or `None` if the ring is unchanged.
pub(crate) fn check_edits(
    rings: &[Vec<Point>],
    changed: &[Option<Vec<usize>>],
) -> Result<(), TopologyError> {
    for (k, edges) in changed.iter().enumerate() {
        if let Some(edges) = edges {
            check_edit(rings, k, Some(edges))?;
        }
    }
    Ok(())
}

/// Checks the rings of a candidate polygon after ring `changed` (a slot in
/// `rings`, which holds the exterior first) was edited. Only the edges listed
/// in `edges` are checked for intersections, since the others haven't moved;
/// `None` means all of them.
pub(crate) fn check_edit(
    rings: &[Vec<Point>],
    changed: usize,
    edges: Option<&[usize]>,
) -> Result<(), TopologyError> {
    let ring = &rings[changed];
    let distinct = ring.iter().collect::<HashSet<_>>().len();
    if distinct < 3 {
        return Err(TopologyError::TooFewPoints(distinct));
    }
    if distinct != ring.len() {
        return Err(TopologyError::SelfIntersection);
    }

    let segs: Vec<Segment> = ring::edges(ring).collect();
    let all: Vec<usize>;
    let edges = match edges {
        Some(edges) => edges,
        None => {
            all = (0..segs.len()).collect();
            &all
        }
    };

    for &i in edges {
        if !ring::edge_is_clear(&segs, i, 0..segs.len()) {
            return Err(TopologyError::SelfIntersection);
        }
    }

    for (k, other) in rings.iter().enumerate() {
        if k == changed {
            continue;
        }
        for t in ring::edges(other) {
            let bbox = t.bbox().inflate(EPSILON, EPSILON);
            for &i in edges {
                let s = &segs[i];
                if rects_overlap(&bbox, &s.bbox())
                    && !matches!(s.intersection(&t), SegmentIntersection::None)
                {
                    return Err(TopologyError::RingsIntersect);
                }
            }
        }
    }

    // Every vertex is checked, not just one: the edge checks above only cover
    // `edges`, so they can't rule out a hole that straddles an unchecked edge.
    if changed == 0 {
        for hole in &rings[1..] {
            if !all_inside(ring, hole) {
                return Err(TopologyError::HoleOutside);
            }
        }
    } else {
        if !all_inside(&rings[0], ring) {
            return Err(TopologyError::HoleOutside);
        }
        for (k, other) in rings.iter().enumerate().skip(1) {
            if k != changed && (any_inside(other, ring) || any_inside(ring, other)) {
                return Err(TopologyError::NestedHoles);
            }
        }
    }
    Ok(())
}

fn all_inside(outer: &[Point], inner: &[Point]) -> bool {
    inner
        .iter()
        .all(|p| ring::locate(outer, p) == Location::Inside)
}

fn any_inside(outer: &[Point], inner: &[Point]) -> bool {
    inner
        .iter()
        .any(|p| ring::locate(outer, p) == Location::Inside)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{box_polygon, star_polygon, u_polygon};
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn pts(points: &[(f64, f64)]) -> Vec<Point> {
        points.iter().map(|&p| Point::from(p)).collect()
    }

    #[test]
    fn clockwise_input_is_reversed() {
        let cw = pts(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)]);
        let poly = Polygon::new(cw).unwrap();
        assert_eq!(
            poly.exterior_ring(),
            pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)])
        );
        assert_eq!(poly.area(), 1.0);
    }

    #[test]
    fn derived_properties() {
        let mut poly = box_polygon(10.0);
        assert_eq!(poly.total_verticies(), 6);
        assert_eq!(poly.total_unique_verticies(), 5);
        assert_eq!(poly.area(), 400.0);
        assert_eq!(poly.bounding_box(), Rect::new(-10.0, -10.0, 10.0, 10.0));
        assert_eq!(poly.centroid(), Point::new(0.0, 0.0));

        poly.add_interior_ring(box_polygon(1.0).exterior_ring()).unwrap();
        assert_eq!(poly.total_verticies(), 12);
        assert_eq!(poly.total_unique_verticies(), 10);
        assert_eq!(poly.area(), 396.0);
    }

    #[test]
    fn containment_with_holes() {
        let mut poly = box_polygon(10.0);
        poly.add_interior_ring(box_polygon(1.0).exterior_ring()).unwrap();

        assert!(poly.contains(&Point::new(5.0, 5.0)));
        assert!(poly.contains(&Point::new(10.0, 5.0)));
        assert!(!poly.contains(&Point::new(0.0, 0.0)));
        assert!(poly.contains(&Point::new(1.0, 0.5)));
        assert!(!poly.contains(&Point::new(11.0, 0.0)));
    }

    #[test]
    fn polygon_containment() {
        let outer = box_polygon(10.0);
        let inner = box_polygon(2.0);
        assert!(outer.contains_polygon(&inner));
        assert!(!inner.contains_polygon(&outer));
        assert!(outer.contains_polygon(&outer));

        // All the vertices of the box are inside the U, but the box spans the notch.
        let u = u_polygon(10.0);
        let across_notch = Polygon::from_rect(Rect::new(-8.0, 6.0, 8.0, 8.0)).unwrap();
        assert!(!u.contains_polygon(&across_notch));

        let mut holey = box_polygon(10.0);
        holey.add_interior_ring(box_polygon(1.0).exterior_ring()).unwrap();
        assert!(!holey.contains_polygon(&inner));
        assert!(holey.contains_polygon(&box_polygon(0.5).translate(Vec2::new(5.0, 5.0))));
    }

    #[test]
    fn add_vertex_on_edge() {
        let mut poly = box_polygon(10.0);
        assert_eq!(poly.add_vertex(Point::new(0.0, -10.0)), Ok(true));
        assert_eq!(
            poly.exterior_ring(),
            pts(&[
                (-10.0, -10.0),
                (0.0, -10.0),
                (10.0, -10.0),
                (10.0, 10.0),
                (-10.0, 10.0),
                (-10.0, 0.0),
                (-10.0, -10.0)
            ])
        );

        // Existing vertices are a no-op.
        assert_eq!(poly.add_vertex(Point::new(0.0, -10.0)), Ok(false));
        assert_eq!(poly.total_unique_verticies(), 6);
    }

    #[test]
    fn add_vertex_off_ring() {
        let mut poly = box_polygon(10.0);
        poly.add_vertex(Point::new(12.0, 0.0)).unwrap();
        assert!(poly.exterior_ring().contains(&Point::new(12.0, 0.0)));
        assert_eq!(poly.area(), 420.0);
    }

    #[test]
    fn add_vertex_goes_to_the_hole_containing_it() {
        let mut poly = box_polygon(10.0);
        poly.add_interior_ring(box_polygon(2.0).exterior_ring()).unwrap();
        poly.add_vertex(Point::new(0.0, 1.5)).unwrap();
        assert_eq!(poly.ring_len(Some(0)), Some(6));
        assert_eq!(poly.ring_len(None), Some(5));
    }

    #[test]
    fn add_vertex_rejects_lost_holes() {
        // Denting the right edge in to (5, 0) would leave the hole outside.
        let mut poly = box_polygon(10.0);
        poly.add_interior_ring(box_polygon(1.0).translate(Vec2::new(8.0, 0.0)).exterior_ring())
            .unwrap();
        let before = poly.clone();
        assert_eq!(
            poly.add_vertex(Point::new(5.0, 0.0)),
            Err(Error::InvalidTopology(TopologyError::HoleOutside))
        );
        assert_eq!(poly, before);
    }

    #[test]
    fn remove_vertex_rejects_self_intersection() {
        // A deep notch comes down from the top; dropping the bottom-right
        // corner makes the new diagonal edge cut through it.
        let mut poly = Polygon::new(pts(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (6.0, 10.0),
            (5.0, 1.0),
            (4.0, 10.0),
            (0.0, 10.0),
            (0.0, 0.0),
        ]))
        .unwrap();
        let before = poly.clone();
        assert_eq!(
            poly.remove_vertex(Point::new(10.0, 0.0)),
            Err(Error::InvalidTopology(TopologyError::SelfIntersection))
        );
        assert_eq!(poly, before);
    }

    #[test]
    fn remove_vertex() {
        let mut poly = box_polygon(10.0);
        poly.remove_vertex(Point::new(-10.0, 0.0)).unwrap();
        assert_eq!(poly.total_unique_verticies(), 4);

        assert_eq!(
            poly.remove_vertex(Point::new(3.0, 3.0)),
            Err(Error::NoSuchVertex(Point::new(3.0, 3.0)))
        );

        poly.remove_vertex(Point::new(10.0, 10.0)).unwrap();
        let before = poly.clone();
        assert_eq!(
            poly.remove_vertex(Point::new(10.0, -10.0)),
            Err(Error::InvalidTopology(TopologyError::TooFewPoints(2)))
        );
        assert_eq!(poly, before);
    }

    #[test]
    fn remove_vertex_keeps_holes_inside() {
        // Removing the top-right corner cuts the hole off.
        let mut poly = box_polygon(10.0);
        poly.add_interior_ring(box_polygon(1.0).translate(Vec2::new(7.0, 7.0)).exterior_ring())
            .unwrap();
        let before = poly.clone();
        assert_matches!(
            poly.remove_vertex(Point::new(10.0, 10.0)),
            Err(Error::InvalidTopology(_))
        );
        assert_eq!(poly, before);
    }

    #[test]
    fn remove_vertex_rejects_straddling_holes() {
        // Dropping the peak flattens the top edge to y = 10, through the
        // middle of the hole. The hole's first vertex stays inside.
        let exterior = pts(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (5.0, 14.0),
            (0.0, 10.0),
            (0.0, 0.0),
        ]);
        let hole = box_polygon(1.0).translate(Vec2::new(5.0, 10.0)).exterior_ring();
        let mut poly = Polygon::with_interior_rings(exterior, [hole]).unwrap();
        let before = poly.clone();
        assert_matches!(
            poly.remove_vertex(Point::new(5.0, 14.0)),
            Err(Error::InvalidTopology(
                TopologyError::HoleOutside | TopologyError::RingsIntersect
            ))
        );
        assert_eq!(poly, before);
        poly.check_invariants();

        // Without any edges to check, containment alone catches it.
        let rings = vec![
            pts(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]),
            pts(&[(4.0, 9.0), (6.0, 9.0), (6.0, 11.0), (4.0, 11.0)]),
        ];
        assert_eq!(check_edit(&rings, 0, Some(&[][..])), Err(TopologyError::HoleOutside));
        assert_eq!(check_edit(&rings, 1, Some(&[][..])), Err(TopologyError::HoleOutside));
    }

    #[test]
    fn interior_ring_validation() {
        let mut poly = box_polygon(10.0);
        assert_eq!(
            poly.add_interior_ring(box_polygon(5.0).translate(Vec2::new(8.0, 0.0)).exterior_ring()),
            Err(Error::InvalidTopology(TopologyError::RingsIntersect))
        );
        assert_eq!(
            poly.add_interior_ring(box_polygon(11.0).exterior_ring()),
            Err(Error::InvalidTopology(TopologyError::HoleOutside))
        );
        assert_eq!(
            poly.add_interior_ring(box_polygon(1.0).translate(Vec2::new(20.0, 0.0)).exterior_ring()),
            Err(Error::InvalidTopology(TopologyError::HoleOutside))
        );
        poly.add_interior_ring(box_polygon(3.0).exterior_ring()).unwrap();
        assert_eq!(
            poly.add_interior_ring(box_polygon(1.0).exterior_ring()),
            Err(Error::InvalidTopology(TopologyError::NestedHoles))
        );
        assert_eq!(poly.interior_ring_count(), 1);

        assert!(!poly.try_remove_interior_ring_at(&Point::new(8.0, 8.0)));
        assert!(poly.try_remove_interior_ring_at(&Point::new(0.5, 0.5)));
        assert_eq!(poly.remove_interior_ring(0), Err(Error::NoSuchRing(0)));
    }

    #[test]
    fn transforms() {
        let poly = box_polygon(10.0);
        let moved = poly.translate(Vec2::new(100.0, -3.0));
        assert_eq!(moved.bounding_box(), Rect::new(90.0, -13.0, 110.0, 7.0));

        let rotated = poly.rotate(std::f64::consts::FRAC_PI_2, Some(Point::new(0.0, 0.0)));
        assert!((rotated.area() - 400.0).abs() < 1e-9);

        let scaled = poly.scale(0.5, None).unwrap();
        assert_eq!(scaled.area(), 100.0);
        assert_matches!(poly.scale(0.0, None), Err(Error::InvalidTopology(_)));
    }

    #[test]
    fn distance() {
        let poly = box_polygon(10.0);
        assert_eq!(poly.distance_to_point(&Point::new(0.0, 0.0)), 0.0);
        assert_eq!(poly.distance_to_point(&Point::new(13.0, 0.0)), 3.0);
    }

    #[test]
    fn compaction_keeps_rings() {
        let mut poly = star_polygon(Point::new(0.0, 0.0), &[5.0; 40]);
        let before = poly.exterior_ring();
        let mut removed = Vec::new();
        for p in before[1..30].iter().step_by(2) {
            poly.remove_vertex(*p).unwrap();
            removed.push(*p);
        }
        assert!(poly.points.len() > poly.total_unique_verticies());
        poly.compact();
        assert_eq!(poly.points.len(), poly.total_unique_verticies());
        let expected: Vec<_> = before
            .iter()
            .filter(|p| !removed.contains(p))
            .copied()
            .collect();
        assert_eq!(poly.exterior_ring(), expected);
    }

    fn star() -> impl Strategy<Value = Polygon> {
        prop::collection::vec(2.0..10.0f64, 3..24)
            .prop_map(|radii| star_polygon(Point::new(0.0, 0.0), &radii))
    }

    proptest! {
        #[test]
        fn add_then_remove_round_trips(poly in star(), x in -12.0..12.0f64, y in -12.0..12.0f64) {
            let p = Point::new(x, y);
            prop_assume!(!poly.is_vertex(&p));
            let mut edited = poly.clone();
            if edited.add_vertex(p).is_ok() {
                edited.check_invariants();
                edited.remove_vertex(p).unwrap();
                prop_assert_eq!(edited.exterior_ring(), poly.exterior_ring());
            } else {
                prop_assert_eq!(edited, poly);
            }
        }

        #[test]
        fn area_is_translation_invariant(poly in star(), dx in -1e4..1e4f64, dy in -1e4..1e4f64) {
            let moved = poly.translate(Vec2::new(dx, dy));
            prop_assert!((moved.area() - poly.area()).abs() <= 1e-9 * (1.0 + dx.abs() + dy.abs()) * poly.area().max(1.0));
        }
    }
}
