//! Enumerating every vertex of a polygon, or of a set of polygons.

use crate::Polygon;

use super::{index::PolygonIndex, RingId};

// A flattened list of rings. Position `k` in the enumeration is found by
// binary search on the running totals.
#[derive(Clone, Debug)]
struct Rings {
    // (poly, ring, ring_len, number of vertices in earlier rings)
    rings: Vec<(usize, RingId, usize, usize)>,
    front: usize,
    back: usize,
}

impl Rings {
    fn new(polys: &[Polygon]) -> Self {
        let mut rings = Vec::new();
        let mut total = 0;
        for (p, poly) in polys.iter().enumerate() {
            for id in poly.ring_ids() {
                let len = poly.ring_len(id).unwrap_or(0);
                rings.push((p, id, len, total));
                total += len;
            }
        }
        Rings {
            rings,
            front: 0,
            back: total,
        }
    }

    fn index(&self, k: usize) -> PolygonIndex {
        let r = self.rings.partition_point(|&(_, _, _, start)| start <= k) - 1;
        let (poly, inner, len, start) = self.rings[r];
        PolygonIndex::new(poly, inner, k - start, len)
    }

    fn next(&mut self) -> Option<PolygonIndex> {
        (self.front < self.back).then(|| {
            self.front += 1;
            self.index(self.front - 1)
        })
    }

    fn next_back(&mut self) -> Option<PolygonIndex> {
        (self.front < self.back).then(|| {
            self.back -= 1;
            self.index(self.back)
        })
    }

    fn remaining(&self) -> usize {
        self.back - self.front
    }
}

/// Every unique vertex of a polygon: the exterior ring first, then each
/// interior ring in order.
///
/// Use `.rev()` to walk the vertices backwards.
#[derive(Clone, Debug)]
pub struct PolygonVertexEnum {
    rings: Rings,
}

impl PolygonVertexEnum {
    /// Enumerates the vertices of `poly`, which is given polygon number zero.
    pub fn new(poly: &Polygon) -> Self {
        PolygonVertexEnum {
            rings: Rings::new(std::slice::from_ref(poly)),
        }
    }
}

impl Iterator for PolygonVertexEnum {
    type Item = PolygonIndex;

    fn next(&mut self) -> Option<PolygonIndex> {
        self.rings.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.rings.remaining();
        (n, Some(n))
    }
}

impl DoubleEndedIterator for PolygonVertexEnum {
    fn next_back(&mut self) -> Option<PolygonIndex> {
        self.rings.next_back()
    }
}

impl ExactSizeIterator for PolygonVertexEnum {}

/// Every unique vertex of every polygon in a slice, polygon by polygon.
#[derive(Clone, Debug)]
pub struct PolySetVertexEnum {
    rings: Rings,
}

impl PolySetVertexEnum {
    /// Enumerates the vertices of every polygon in `polys`.
    pub fn new(polys: &[Polygon]) -> Self {
        PolySetVertexEnum {
            rings: Rings::new(polys),
        }
    }
}

impl Iterator for PolySetVertexEnum {
    type Item = PolygonIndex;

    fn next(&mut self) -> Option<PolygonIndex> {
        self.rings.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.rings.remaining();
        (n, Some(n))
    }
}

impl DoubleEndedIterator for PolySetVertexEnum {
    fn next_back(&mut self) -> Option<PolygonIndex> {
        self.rings.next_back()
    }
}

impl ExactSizeIterator for PolySetVertexEnum {}
