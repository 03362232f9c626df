//! Addressing vertices by ring.

use crate::{Point, Polygon, Segment};

use super::RingId;

/// The position of a vertex: which polygon (in some slice of polygons), which
/// ring of that polygon, and where in the ring.
///
/// The ring length is carried along so that `next` and `previous` can wrap
/// around without looking at the polygon. Indices are compared field by field,
/// in declaration order, with the exterior ring sorting before the holes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct PolygonIndex {
    /// Which polygon.
    pub poly: usize,
    /// Which ring: `None` for the exterior ring, `Some(i)` for interior ring `i`.
    pub inner: RingId,
    /// The vertex's position in its ring.
    pub vertex: usize,
    /// The number of unique vertices in the ring.
    pub ring_len: usize,
}

impl std::fmt::Debug for PolygonIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner {
            Some(i) => write!(
                f,
                "P:{} I:{} v{} of {}",
                self.poly, i, self.vertex, self.ring_len
            ),
            None => write!(f, "P:{} v{} of {}", self.poly, self.vertex, self.ring_len),
        }
    }
}

impl PolygonIndex {
    /// Creates a new index.
    pub fn new(poly: usize, inner: RingId, vertex: usize, ring_len: usize) -> Self {
        debug_assert!(vertex < ring_len);
        PolygonIndex {
            poly,
            inner,
            vertex,
            ring_len,
        }
    }

    fn with_vertex(self, vertex: usize) -> Self {
        PolygonIndex { vertex, ..self }
    }

    /// The next vertex in the ring, wrapping from the last to the first.
    pub fn next(&self) -> Self {
        self.with_vertex((self.vertex + 1) % self.ring_len)
    }

    /// The previous vertex in the ring, wrapping from the first to the last.
    pub fn previous(&self) -> Self {
        self.with_vertex((self.vertex + self.ring_len - 1) % self.ring_len)
    }

    /// The first vertex of this ring.
    pub fn first_in_ring(&self) -> Self {
        self.with_vertex(0)
    }

    /// The last vertex of this ring.
    pub fn last_in_ring(&self) -> Self {
        self.with_vertex(self.ring_len - 1)
    }

    /// Is this the first vertex of its ring?
    pub fn is_first_in_ring(&self) -> bool {
        self.vertex == 0
    }

    /// Is this the last vertex of its ring?
    pub fn is_last_in_ring(&self) -> bool {
        self.vertex + 1 == self.ring_len
    }

    /// Does this index point into an interior ring?
    pub fn is_inner(&self) -> bool {
        self.inner.is_some()
    }

    /// Are both indices on the same ring of the same polygon?
    pub fn are_on_same_ring(&self, other: &PolygonIndex) -> bool {
        self.poly == other.poly && self.inner == other.inner
    }

    /// Are these neighboring vertices of the same ring? The last and first
    /// vertices of a ring are neighbors.
    pub fn are_adjacent(&self, other: &PolygonIndex) -> bool {
        self.are_on_same_ring(other)
            && self.vertex != other.vertex
            && (self.next().vertex == other.vertex || other.next().vertex == self.vertex)
    }

    /// A copy of this index, pointing into a different polygon.
    pub fn reindex(&self, poly: usize) -> Self {
        PolygonIndex { poly, ..*self }
    }

    /// A copy of this index for a ring that has changed size.
    pub fn reindex_to_size(&self, ring_len: usize) -> Self {
        PolygonIndex { ring_len, ..*self }
    }

    /// Treats an interior ring as the exterior ring of polygon `poly`, or of
    /// the polygon numbered like the interior ring if `poly` is `None`.
    ///
    /// Returns `None` if this index doesn't point into an interior ring.
    pub fn reindex_to_outer(&self, poly: Option<usize>) -> Option<Self> {
        let inner = self.inner?;
        Some(PolygonIndex {
            poly: poly.unwrap_or(inner),
            inner: None,
            ..*self
        })
    }

    /// Treats an exterior ring as interior ring `inner` of polygon `poly`.
    ///
    /// Returns `None` if this index already points into an interior ring.
    pub fn reindex_to_inner(&self, inner: usize, poly: usize) -> Option<Self> {
        if self.is_inner() {
            return None;
        }
        Some(PolygonIndex {
            poly,
            inner: Some(inner),
            ..*self
        })
    }

    /// The vertex in `polygon` (ignoring our polygon number).
    pub fn point(&self, polygon: &Polygon) -> Option<Point> {
        polygon.vertex(self.inner, self.vertex)
    }

    /// The vertex in `polygons[self.poly]`.
    pub fn point_in(&self, polygons: &[Polygon]) -> Option<Point> {
        self.point(polygons.get(self.poly)?)
    }

    /// The edge from this vertex to the next one.
    pub fn segment(&self, polygon: &Polygon) -> Option<Segment> {
        Some(Segment::new(self.point(polygon)?, self.next().point(polygon)?))
    }
}

/// Sorts indices into runs along their rings.
///
/// The indices are grouped by polygon and ring, and each group is sorted by
/// vertex. If a group doesn't cover its whole ring but does contain both the
/// first and the last vertex, the group is rotated to start after its first
/// gap, so that a run wrapping around the end of the ring stays contiguous.
pub fn sort_by_ring(indices: &[PolygonIndex]) -> Vec<PolygonIndex> {
    let mut sorted = indices.to_vec();
    sorted.sort();

    let mut ret = Vec::with_capacity(sorted.len());
    for group in sorted.chunk_by(|a, b| a.are_on_same_ring(b)) {
        let first = group[0];
        let last = group[group.len() - 1];
        if group.len() < first.ring_len && first.are_adjacent(&last) {
            let start = group
                .windows(2)
                .position(|w| !w[0].are_adjacent(&w[1]))
                .map_or(0, |i| i + 1);
            ret.extend_from_slice(&group[start..]);
            ret.extend_from_slice(&group[..start]);
        } else {
            ret.extend_from_slice(group);
        }
    }
    ret
}
