//! A quadtree over points, with nearest-neighbor queries.
//!
//! Entries live in a slot arena and the tree holds keys pointing into
//! it. Removing an entry just empties its slot and bumps the slot's generation,
//! so any key still sitting in a leaf goes stale without the tree being touched.
//! Stale keys are dropped from a leaf the next time an insertion passes through
//! it, and all at once when the tree is rebuilt. We rebuild when there are more
//! stale keys than live ones, and whenever the bounds grow.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
    hash::Hash,
};

use kurbo::Rect;

use crate::{
    check_finite,
    geom::{rect_contains_point, rect_distance_to_point, rects_overlap},
    num::CheapOrderedFloat,
    Error, Point,
};

use super::SpatialIndex;

/// A leaf with more live entries than this is split into quadrants.
pub const LEAF_CAPACITY: usize = 8;

/// Leaves at this depth are never split.
pub const MAX_DEPTH: usize = 24;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct NodeIdx(usize);

#[derive(Clone)]
struct NodeVec<T> {
    inner: Vec<T>,
}

impl_typed_vec!(NodeVec, NodeIdx, "n");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct EntryKey {
    slot: usize,
    generation: u32,
}

#[derive(Clone, Debug)]
struct Entry<P> {
    point: Point,
    payload: P,
    // Insertion order, for breaking ties between equidistant points.
    seq: u64,
}

#[derive(Clone, Debug)]
struct Slot<P> {
    generation: u32,
    entry: Option<Entry<P>>,
}

fn is_fresh<P>(slots: &[Slot<P>], key: EntryKey) -> bool {
    let slot = &slots[key.slot];
    slot.generation == key.generation && slot.entry.is_some()
}

#[derive(Clone, Debug)]
enum NodeKind {
    Leaf(Vec<EntryKey>),
    // South-west, south-east, north-west, north-east.
    Internal([NodeIdx; 4]),
}

#[derive(Clone, Debug)]
struct Node {
    bounds: Rect,
    depth: usize,
    kind: NodeKind,
}

impl Node {
    fn leaf(bounds: Rect, depth: usize) -> Self {
        Node {
            bounds,
            depth,
            kind: NodeKind::Leaf(Vec::new()),
        }
    }
}

// Points on the dividing lines go east and north.
fn quadrant(bounds: &Rect, p: &Point) -> usize {
    let mid = bounds.center();
    let east = p.x >= mid.x;
    let north = p.y >= mid.y;
    (east as usize) | ((north as usize) << 1)
}

fn quadrant_bounds(bounds: &Rect, q: usize) -> Rect {
    let mid = bounds.center();
    let (x0, x1) = if q & 1 == 0 {
        (bounds.x0, mid.x)
    } else {
        (mid.x, bounds.x1)
    };
    let (y0, y1) = if q & 2 == 0 {
        (bounds.y0, mid.y)
    } else {
        (mid.y, bounds.y1)
    };
    Rect::new(x0, y0, x1, y1)
}

// The smallest rectangle around `rect` that is at least 1x1.
fn at_least_unit(rect: Rect) -> Rect {
    let grow_x = (1.0 - rect.width()).max(0.0) / 2.0;
    let grow_y = (1.0 - rect.height()).max(0.0) / 2.0;
    rect.inflate(grow_x, grow_y)
}

/// A point found by a nearest-neighbor query.
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbor<P> {
    /// The payload that was stored with the point.
    pub payload: P,
    /// The stored point.
    pub point: Point,
    /// The distance from the query point.
    pub distance: f64,
}

// Things waiting in the best-first search queue. At equal distances, nodes
// come out before entries (so that nothing in an unopened node can be missed)
// and entries come out in insertion order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Visit {
    Node(NodeIdx),
    Entry { seq: u64, slot: usize },
}

/// A spatial index of points, each carrying a payload.
///
/// Payloads are unique: adding a payload that is already present is an error.
/// The index has bounds, but they are only a hint: adding a point outside them
/// grows the index to fit.
#[derive(Clone)]
pub struct PointIndex<P> {
    // `None` until the first point arrives, if no bounds were given.
    bounds: Option<Rect>,
    nodes: NodeVec<Node>,
    slots: Vec<Slot<P>>,
    free: Vec<usize>,
    by_payload: HashMap<P, EntryKey>,
    stale: usize,
    next_seq: u64,
}

impl<P> Default for PointIndex<P> {
    /// An empty index whose bounds are taken from the first point added.
    fn default() -> Self {
        PointIndex {
            bounds: None,
            nodes: NodeVec::default(),
            slots: Vec::new(),
            free: Vec::new(),
            by_payload: HashMap::new(),
            stale: 0,
            next_seq: 0,
        }
    }
}

impl<P: std::fmt::Debug> std::fmt::Debug for PointIndex<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries: Vec<_> = self
            .slots
            .iter()
            .filter_map(|s| s.entry.as_ref())
            .map(|e| (e.point, &e.payload))
            .collect();
        f.debug_struct("PointIndex")
            .field("bounds", &self.bounds)
            .field("entries", &entries)
            .finish()
    }
}

impl<P: Clone + Eq + Hash> PointIndex<P> {
    /// Creates an empty index covering `bounds`.
    pub fn new(bounds: Rect) -> Self {
        let bounds = bounds.abs();
        let mut nodes = NodeVec::default();
        nodes.push(Node::leaf(bounds, 0));
        PointIndex {
            bounds: Some(bounds),
            nodes,
            ..PointIndex::default()
        }
    }

    /// Creates an index holding a batch of points, with bounds fitted to the
    /// batch.
    pub fn from_points(points: impl IntoIterator<Item = (Point, P)>) -> Result<Self, Error> {
        let points: Vec<_> = points.into_iter().collect();
        for (p, _) in &points {
            check_finite(*p)?;
        }
        let mut ret = match crate::geom::rect_from_points(points.iter().map(|(p, _)| p)) {
            Some(rect) => PointIndex::new(at_least_unit(rect)),
            None => PointIndex::default(),
        };
        for (p, payload) in points {
            ret.add(p, payload)?;
        }
        Ok(ret)
    }

    /// The current bounds, if any point has been added or bounds were given.
    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    /// The number of points in the index.
    pub fn len(&self) -> usize {
        self.by_payload.len()
    }

    /// Is the index empty?
    pub fn is_empty(&self) -> bool {
        self.by_payload.is_empty()
    }

    /// Is there a point with this payload?
    pub fn contains(&self, payload: &P) -> bool {
        self.by_payload.contains_key(payload)
    }

    /// The point stored with this payload.
    pub fn point_of(&self, payload: &P) -> Option<Point> {
        let key = self.by_payload.get(payload)?;
        self.slots[key.slot].entry.as_ref().map(|e| e.point)
    }

    /// Adds a point.
    ///
    /// Fails if the point isn't finite, or if the payload is already present.
    pub fn add(&mut self, point: Point, payload: P) -> Result<(), Error> {
        check_finite(point)?;
        if self.by_payload.contains_key(&payload) {
            return Err(Error::DuplicateKey);
        }

        match self.bounds {
            None => {
                self.bounds = Some(at_least_unit(Rect::from_points(
                    point.to_kurbo(),
                    point.to_kurbo(),
                )));
                self.rebuild();
            }
            Some(bounds) if !rect_contains_point(&bounds, &point) => self.grow_to(point),
            Some(_) => {}
        }

        let entry = Entry {
            point,
            payload: payload.clone(),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        let key = match self.free.pop() {
            Some(slot) => {
                self.slots[slot].entry = Some(entry);
                EntryKey {
                    slot,
                    generation: self.slots[slot].generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                EntryKey {
                    slot: self.slots.len() - 1,
                    generation: 0,
                }
            }
        };
        self.by_payload.insert(payload, key);
        self.insert_key(key, point);

        #[cfg(feature = "slow-asserts")]
        self.check_invariants();
        Ok(())
    }

    /// Adds a point, returning `false` if that failed.
    pub fn try_add(&mut self, point: Point, payload: P) -> bool {
        self.add(point, payload).is_ok()
    }

    /// Moves an existing payload to a new point.
    ///
    /// The moved entry counts as newly inserted when breaking ties in
    /// nearest-neighbor queries. Returns `false` (and changes nothing) if the
    /// payload isn't present or the point isn't finite.
    pub fn update(&mut self, payload: P, point: Point) -> bool {
        if !point.is_finite() || !self.contains(&payload) {
            return false;
        }
        self.try_remove(&payload);
        self.add(point, payload).is_ok()
    }

    /// Removes the point with this payload, returning it.
    pub fn try_remove(&mut self, payload: &P) -> Option<(Point, P)> {
        let key = self.by_payload.remove(payload)?;
        let slot = &mut self.slots[key.slot];
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.slot);
        self.stale += 1;

        if self.stale > self.len() {
            self.rebuild();
        }

        #[cfg(feature = "slow-asserts")]
        self.check_invariants();
        Some((entry.point, entry.payload))
    }

    /// The stored point closest to `p`.
    ///
    /// If several are equally close, the one that was inserted first wins.
    pub fn find_nearest(&self, p: Point) -> Option<Neighbor<P>> {
        self.find_nearest_points(p, 1).into_iter().next()
    }

    /// The `k` stored points closest to `p`, closest first.
    ///
    /// Points at the same distance are returned in insertion order.
    pub fn find_nearest_points(&self, p: Point, k: usize) -> Vec<Neighbor<P>> {
        let mut ret = Vec::new();
        if k == 0 || self.bounds.is_none() || !p.is_finite() {
            return ret;
        }

        let root = NodeIdx(0);
        let mut queue = BinaryHeap::new();
        queue.push(Reverse((
            CheapOrderedFloat::from(rect_distance_to_point(&self.nodes[root].bounds, &p)),
            Visit::Node(root),
        )));

        let mut visited = 0;
        while let Some(Reverse((dist, visit))) = queue.pop() {
            match visit {
                Visit::Node(idx) => {
                    visited += 1;
                    match &self.nodes[idx].kind {
                        NodeKind::Internal(children) => {
                            for &child in children {
                                let d = rect_distance_to_point(&self.nodes[child].bounds, &p);
                                queue.push(Reverse((d.into(), Visit::Node(child))));
                            }
                        }
                        NodeKind::Leaf(keys) => {
                            for &key in keys {
                                if !is_fresh(&self.slots, key) {
                                    continue;
                                }
                                if let Some(e) = &self.slots[key.slot].entry {
                                    queue.push(Reverse((
                                        e.point.distance(&p).into(),
                                        Visit::Entry {
                                            seq: e.seq,
                                            slot: key.slot,
                                        },
                                    )));
                                }
                            }
                        }
                    }
                }
                Visit::Entry { slot, .. } => {
                    if let Some(e) = &self.slots[slot].entry {
                        ret.push(Neighbor {
                            payload: e.payload.clone(),
                            point: e.point,
                            distance: dist.into_inner(),
                        });
                        if ret.len() == k {
                            break;
                        }
                    }
                }
            }
        }
        tracing::trace!(?p, k, found = ret.len(), visited, "nearest points");
        ret
    }

    /// Every stored point in the closed rectangle `rect`, in insertion order.
    pub fn intersects(&self, rect: &Rect) -> Vec<(Point, P)> {
        if self.bounds.is_none() {
            return Vec::new();
        }

        let mut found: Vec<&Entry<P>> = Vec::new();

        let mut stack = vec![NodeIdx(0)];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !rects_overlap(&node.bounds, rect) {
                continue;
            }
            match &node.kind {
                NodeKind::Internal(children) => stack.extend_from_slice(children),
                NodeKind::Leaf(keys) => {
                    for &key in keys {
                        if !is_fresh(&self.slots, key) {
                            continue;
                        }
                        if let Some(e) = &self.slots[key.slot].entry {
                            if rect_contains_point(rect, &e.point) {
                                found.push(e);
                            }
                        }
                    }
                }
            }
        }
        found.sort_by_key(|e| e.seq);
        found
            .into_iter()
            .map(|e| (e.point, e.payload.clone()))
            .collect()
    }

    // Doubles the bounds toward `p` until they contain it.
    fn grow_to(&mut self, p: Point) {
        let Some(mut bounds) = self.bounds else {
            return;
        };
        while !rect_contains_point(&bounds, &p) {
            let w = bounds.width().max(1.0);
            let h = bounds.height().max(1.0);
            if p.x < bounds.x0 {
                bounds.x0 -= w;
            } else {
                bounds.x1 += w;
            }
            if p.y < bounds.y0 {
                bounds.y0 -= h;
            } else {
                bounds.y1 += h;
            }
        }
        tracing::debug!(?bounds, "growing point index");
        self.bounds = Some(bounds);
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let Some(bounds) = self.bounds else {
            return;
        };
        self.nodes.clear();
        self.nodes.push(Node::leaf(bounds, 0));
        self.stale = 0;

        let live: Vec<_> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(slot, s)| {
                let e = s.entry.as_ref()?;
                let key = EntryKey {
                    slot,
                    generation: s.generation,
                };
                Some((e.seq, key, e.point))
            })
            .collect();
        for &(_, key, point) in &live {
            self.insert_key(key, point);
        }
        tracing::debug!(
            live = live.len(),
            nodes = self.nodes.len(),
            "rebuilt point index"
        );
    }

    fn insert_key(&mut self, key: EntryKey, point: Point) {
        let mut idx = NodeIdx(0);
        while let NodeKind::Internal(children) = &self.nodes[idx].kind {
            idx = children[quadrant(&self.nodes[idx].bounds, &point)];
        }

        let slots = &self.slots;
        if let NodeKind::Leaf(keys) = &mut self.nodes[idx].kind {
            let before = keys.len();
            keys.retain(|k| is_fresh(slots, *k));
            self.stale -= before - keys.len();
            keys.push(key);
        }
        self.maybe_split(idx);
    }

    fn point_of_key(&self, key: EntryKey) -> Option<Point> {
        self.slots[key.slot].entry.as_ref().map(|e| e.point)
    }

    fn maybe_split(&mut self, idx: NodeIdx) {
        let node = &self.nodes[idx];
        let NodeKind::Leaf(keys) = &node.kind else {
            return;
        };
        if keys.len() <= LEAF_CAPACITY || node.depth >= MAX_DEPTH {
            return;
        }
        let first = self.point_of_key(keys[0]);
        if keys.iter().all(|k| self.point_of_key(*k) == first) {
            return;
        }

        let bounds = node.bounds;
        let depth = node.depth + 1;
        let keys = keys.clone();
        let children =
            [0, 1, 2, 3].map(|q| self.nodes.push(Node::leaf(quadrant_bounds(&bounds, q), depth)));
        for key in keys {
            let Some(p) = self.point_of_key(key) else {
                continue;
            };
            let child = children[quadrant(&bounds, &p)];
            if let NodeKind::Leaf(child_keys) = &mut self.nodes[child].kind {
                child_keys.push(key);
            }
        }
        self.nodes[idx].kind = NodeKind::Internal(children);

        for child in children {
            self.maybe_split(child);
        }
    }

    /// Checks our internal invariants, panicking if they don't hold.
    pub fn check_invariants(&self) {
        let occupied = self.slots.iter().filter(|s| s.entry.is_some()).count();
        assert_eq!(occupied, self.by_payload.len());
        for (payload, key) in &self.by_payload {
            assert!(is_fresh(&self.slots, *key));
            assert!(matches!(&self.slots[key.slot].entry, Some(e) if e.payload == *payload));
        }
        for &slot in &self.free {
            assert!(self.slots[slot].entry.is_none());
        }

        let mut fresh = 0;
        let mut stale = 0;
        for (idx, node) in self.nodes.iter() {
            match &node.kind {
                NodeKind::Internal(children) => {
                    for (q, &child) in children.iter().enumerate() {
                        assert_eq!(self.nodes[child].depth, node.depth + 1);
                        assert_eq!(self.nodes[child].bounds, quadrant_bounds(&node.bounds, q));
                    }
                }
                NodeKind::Leaf(keys) => {
                    let mut live_points = Vec::new();
                    for &key in keys {
                        match self.point_of_key(key) {
                            Some(p) if is_fresh(&self.slots, key) => {
                                assert!(
                                    rect_contains_point(&node.bounds, &p),
                                    "{p:?} outside {idx:?}"
                                );
                                live_points.push(p);
                            }
                            _ => stale += 1,
                        }
                    }
                    if live_points.len() > LEAF_CAPACITY && node.depth < MAX_DEPTH {
                        assert!(live_points.iter().all(|p| *p == live_points[0]));
                    }
                    fresh += live_points.len();
                }
            }
        }
        assert_eq!(fresh, self.by_payload.len());
        assert_eq!(stale, self.stale);
    }
}

impl<P: Clone + Eq + Hash> SpatialIndex<P> for PointIndex<P> {
    fn len(&self) -> usize {
        self.len()
    }

    fn query_rect(&self, rect: &Rect) -> Vec<P> {
        self.intersects(rect).into_iter().map(|(_, p)| p).collect()
    }
}
