//! A uniform grid over line segments, with nearest-segment queries.
//!
//! The grid has square cells, and about as many of them as the square root of
//! the expected number of segments. A segment is registered in
//! every cell that its bounding box touches. Coordinates are clamped to the
//! grid, so the cells along the edges also hold everything that lies beyond
//! them.

use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
};

use kurbo::Rect;

use crate::{
    check_finite, geom::rects_overlap, num::CheapOrderedFloat, Error, Point, Segment, EPSILON,
};

use super::SpatialIndex;

// Used when the caller doesn't know how many segments to expect.
const DEFAULT_ESTIMATED_COUNT: usize = 1000;

#[derive(Clone, Debug)]
struct LineEntry<P> {
    segment: Segment,
    payload: P,
    seq: u64,
}

/// The segment closest to some query point.
#[derive(Clone, Debug, PartialEq)]
pub struct NearestLine<P> {
    /// The payload that was stored with the segment.
    pub payload: P,
    /// The stored segment.
    pub segment: Segment,
    /// The point on the segment closest to the query point.
    pub point: Point,
    /// The distance from the query point to `point`.
    pub distance: f64,
}

/// A spatial index of line segments, each carrying a payload.
///
/// Both segments and payloads are unique: there is at most one payload per
/// segment and one segment per payload.
#[derive(Clone)]
pub struct LineIndex<P> {
    bounds: Rect,
    cell_size: f64,
    // The largest cell coordinates; there are `nx + 1` columns and `ny + 1` rows.
    nx: usize,
    ny: usize,
    cells: Vec<Vec<usize>>,
    entries: Vec<Option<LineEntry<P>>>,
    free: Vec<usize>,
    by_segment: HashMap<Segment, usize>,
    by_payload: HashMap<P, usize>,
    next_seq: u64,
}

impl<P: std::fmt::Debug> std::fmt::Debug for LineIndex<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineIndex")
            .field("bounds", &self.bounds)
            .field("cell_size", &self.cell_size)
            .field(
                "entries",
                &self
                    .entries
                    .iter()
                    .flatten()
                    .map(|e| (e.segment, &e.payload))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<P: Clone + Eq + Hash> LineIndex<P> {
    /// Creates an empty index over `bounds`, with a grid sized for about
    /// `estimated_count` segments.
    ///
    /// An estimate of zero or one means "unknown".
    pub fn new(bounds: Rect, estimated_count: usize) -> Self {
        let bounds = bounds.abs();
        let estimated_count = if estimated_count <= 1 {
            DEFAULT_ESTIMATED_COUNT
        } else {
            estimated_count
        };
        let cells_per_dim = (estimated_count as f64).sqrt().ceil().sqrt().ceil();

        // The longer side gets `cells_per_dim` cells, so neither axis has more.
        let mut cell_size = bounds.width().max(bounds.height()) / cells_per_dim;
        if !(cell_size > 0.0) {
            cell_size = 1.0;
        }
        let max_cells = cells_per_dim as usize;
        let nx = ((bounds.width() / cell_size).ceil() as usize).min(max_cells);
        let ny = ((bounds.height() / cell_size).ceil() as usize).min(max_cells);

        LineIndex {
            bounds,
            cell_size,
            nx,
            ny,
            cells: vec![Vec::new(); (nx + 1) * (ny + 1)],
            entries: Vec::new(),
            free: Vec::new(),
            by_segment: HashMap::new(),
            by_payload: HashMap::new(),
            next_seq: 0,
        }
    }

    /// The region the grid covers.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// The number of segments in the index.
    pub fn len(&self) -> usize {
        self.by_payload.len()
    }

    /// Is the index empty?
    pub fn is_empty(&self) -> bool {
        self.by_payload.is_empty()
    }

    /// Is this segment in the index?
    pub fn contains_segment(&self, segment: &Segment) -> bool {
        self.by_segment.contains_key(segment)
    }

    /// Is there a segment with this payload?
    pub fn contains_value(&self, payload: &P) -> bool {
        self.by_payload.contains_key(payload)
    }

    /// The segment stored with this payload.
    pub fn segment_of(&self, payload: &P) -> Option<Segment> {
        let slot = *self.by_payload.get(payload)?;
        self.entries[slot].as_ref().map(|e| e.segment)
    }

    fn coord(&self, v: f64, origin: f64, max: usize) -> usize {
        let c = ((v - origin) / self.cell_size).floor();
        if c > 0.0 {
            (c as usize).min(max)
        } else {
            0
        }
    }

    fn cell_coords(&self, p: &Point) -> (usize, usize) {
        (
            self.coord(p.x, self.bounds.x0, self.nx),
            self.coord(p.y, self.bounds.y0, self.ny),
        )
    }

    fn cell_index(&self, x: usize, y: usize) -> usize {
        y * (self.nx + 1) + x
    }

    // Every cell touched by `rect`, row by row.
    fn cells_for_rect(&self, rect: &Rect) -> impl Iterator<Item = usize> + '_ {
        let (x0, y0) = self.cell_coords(&Point::new(rect.x0, rect.y0));
        let (x1, y1) = self.cell_coords(&Point::new(rect.x1, rect.y1));
        (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| self.cell_index(x, y)))
    }

    /// Adds a segment.
    ///
    /// Fails if the segment isn't finite, or if either the segment or the
    /// payload is already present.
    pub fn add(&mut self, segment: Segment, payload: P) -> Result<(), Error> {
        check_finite(segment.a)?;
        check_finite(segment.b)?;
        if self.by_segment.contains_key(&segment) || self.by_payload.contains_key(&payload) {
            return Err(Error::DuplicateKey);
        }

        let entry = LineEntry {
            segment,
            payload: payload.clone(),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        let slot = match self.free.pop() {
            Some(slot) => {
                self.entries[slot] = Some(entry);
                slot
            }
            None => {
                self.entries.push(Some(entry));
                self.entries.len() - 1
            }
        };

        let cells: Vec<_> = self.cells_for_rect(&segment.bbox()).collect();
        for c in cells {
            self.cells[c].push(slot);
        }
        self.by_segment.insert(segment, slot);
        self.by_payload.insert(payload, slot);

        #[cfg(feature = "slow-asserts")]
        self.check_invariants();
        Ok(())
    }

    /// Adds a segment, returning `false` if that failed.
    pub fn try_add(&mut self, segment: Segment, payload: P) -> bool {
        self.add(segment, payload).is_ok()
    }

    fn remove_slot(&mut self, slot: usize) -> Option<LineEntry<P>> {
        let entry = self.entries[slot].take()?;
        let cells: Vec<_> = self.cells_for_rect(&entry.segment.bbox()).collect();
        for c in cells {
            self.cells[c].retain(|&s| s != slot);
        }
        self.by_segment.remove(&entry.segment);
        self.by_payload.remove(&entry.payload);
        self.free.push(slot);

        #[cfg(feature = "slow-asserts")]
        self.check_invariants();
        Some(entry)
    }

    /// Removes a segment, returning its payload.
    pub fn remove(&mut self, segment: &Segment) -> Option<P> {
        let slot = *self.by_segment.get(segment)?;
        self.remove_slot(slot).map(|e| e.payload)
    }

    /// Removes the segment with this payload, returning the segment.
    pub fn remove_value(&mut self, payload: &P) -> Option<Segment> {
        let slot = *self.by_payload.get(payload)?;
        self.remove_slot(slot).map(|e| e.segment)
    }

    /// Moves an existing payload to a new segment.
    ///
    /// The moved entry counts as newly inserted when breaking ties. Returns
    /// `false` (and changes nothing) if the payload isn't present, the segment
    /// isn't finite, or the segment already belongs to a different payload.
    pub fn update(&mut self, payload: P, segment: Segment) -> bool {
        let Some(&slot) = self.by_payload.get(&payload) else {
            return false;
        };
        if !segment.a.is_finite() || !segment.b.is_finite() {
            return false;
        }
        if self.by_segment.get(&segment).is_some_and(|&s| s != slot) {
            return false;
        }
        self.remove_slot(slot);
        self.add(segment, payload).is_ok()
    }

    /// The segment closest to `p`.
    ///
    /// If several are equally close, the one that was inserted first wins.
    pub fn get_nearest(&self, p: Point) -> Option<NearestLine<P>> {
        if self.is_empty() || !p.is_finite() {
            return None;
        }

        let (qx, qy) = self.cell_coords(&p);
        let mut seen = HashSet::new();
        let mut best: Option<((CheapOrderedFloat, u64), usize)> = None;
        let mut radius = 0;
        loop {
            for (x, y) in self.ring(qx, qy, radius) {
                for &slot in &self.cells[self.cell_index(x, y)] {
                    if !seen.insert(slot) {
                        continue;
                    }
                    let Some(e) = &self.entries[slot] else {
                        continue;
                    };
                    let key = (CheapOrderedFloat::from(e.segment.distance_to_point(&p)), e.seq);
                    if best.map_or(true, |(b, _)| key < b) {
                        best = Some((key, slot));
                    }
                }
            }

            let Some(bound) = self.unexamined_distance(&p, qx, qy, radius) else {
                break;
            };
            if let Some(((dist, _), _)) = best {
                // The slack keeps exact ties in neighboring cells from being
                // cut off by rounding in the bound.
                if dist.into_inner() + EPSILON < bound {
                    break;
                }
            }
            radius += 1;
        }
        tracing::trace!(?p, radius, candidates = seen.len(), "nearest line");

        let (_, slot) = best?;
        let e = self.entries[slot].as_ref()?;
        let point = e.segment.nearest_point(&p);
        Some(NearestLine {
            payload: e.payload.clone(),
            segment: e.segment,
            point,
            distance: e.segment.distance_to_point(&p),
        })
    }

    // The cells at Chebyshev distance exactly `r` from `(qx, qy)`.
    fn ring(&self, qx: usize, qy: usize, r: usize) -> Vec<(usize, usize)> {
        let x0 = qx.saturating_sub(r);
        let x1 = (qx + r).min(self.nx);
        let y0 = qy.saturating_sub(r);
        let y1 = (qy + r).min(self.ny);
        let mut ret = Vec::new();
        for y in y0..=y1 {
            for x in x0..=x1 {
                if x.abs_diff(qx) == r || y.abs_diff(qy) == r {
                    ret.push((x, y));
                }
            }
        }
        ret
    }

    // A lower bound on the distance from `p` to anything in a cell outside the
    // first `r` rings around `(qx, qy)`, or `None` if there are no such cells.
    fn unexamined_distance(&self, p: &Point, qx: usize, qy: usize, r: usize) -> Option<f64> {
        let c = self.cell_size;
        let b = &self.bounds;
        let mut bound: Option<f64> = None;
        let mut consider = |gap: f64| bound = Some(bound.map_or(gap, |m| m.min(gap)));
        if qx + r < self.nx {
            consider(b.x0 + (qx + r + 1) as f64 * c - p.x);
        }
        if qx > r {
            consider(p.x - (b.x0 + (qx - r) as f64 * c));
        }
        if qy + r < self.ny {
            consider(b.y0 + (qy + r + 1) as f64 * c - p.y);
        }
        if qy > r {
            consider(p.y - (b.y0 + (qy - r) as f64 * c));
        }
        bound
    }

    /// The payloads of every segment whose bounding box meets `rect`, in the
    /// order they were inserted.
    pub fn get_values(&self, rect: &Rect) -> Vec<P> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for c in self.cells_for_rect(rect) {
            for &slot in &self.cells[c] {
                if !seen.insert(slot) {
                    continue;
                }
                if let Some(e) = &self.entries[slot] {
                    if rects_overlap(&e.segment.bbox(), rect) {
                        found.push(e);
                    }
                }
            }
        }
        found.sort_by_key(|e| e.seq);
        found.into_iter().map(|e| e.payload.clone()).collect()
    }

    /// The payloads of every segment whose bounding box meets that of
    /// `segment`, in the order they were inserted.
    pub fn get_values_for_segment(&self, segment: &Segment) -> Vec<P> {
        self.get_values(&segment.bbox())
    }

    /// Checks our internal invariants, panicking if they don't hold.
    pub fn check_invariants(&self) {
        let live = self.entries.iter().flatten().count();
        assert_eq!(live, self.by_payload.len());
        assert_eq!(live, self.by_segment.len());
        for (slot, e) in self.entries.iter().enumerate() {
            let Some(e) = e else {
                assert!(self.cells.iter().all(|c| !c.contains(&slot)));
                continue;
            };
            assert_eq!(self.by_segment.get(&e.segment), Some(&slot));
            assert_eq!(self.by_payload.get(&e.payload), Some(&slot));
            let expected: HashSet<_> = self.cells_for_rect(&e.segment.bbox()).collect();
            for (c, cell) in self.cells.iter().enumerate() {
                assert_eq!(cell.contains(&slot), expected.contains(&c));
            }
        }
    }
}

impl<P: Clone + Eq + Hash> SpatialIndex<P> for LineIndex<P> {
    fn len(&self) -> usize {
        self.len()
    }

    fn query_rect(&self, rect: &Rect) -> Vec<P> {
        self.get_values(rect)
    }
}
