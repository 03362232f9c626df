//! An R-tree over axis-aligned rectangles.
//!
//! Nodes live in an arena and hold at most [`MAX_CHILDREN`] children. An
//! overflowing node is split in two by sorting its children along each axis
//! and cutting where the two halves have the smallest total area. Deletion
//! doesn't rebalance: it only drops nodes that become empty, so apart from the
//! root every node has at least one child but possibly fewer than
//! [`MIN_CHILDREN`].

use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
};

use arrayvec::ArrayVec;
use kurbo::Rect;

use crate::{
    geom::{rect_is_finite, rects_overlap},
    num::CheapOrderedFloat,
    Error,
};

use super::SpatialIndex;

/// The most children a node can have.
pub const MAX_CHILDREN: usize = 8;

/// The fewest children either half of a split can get.
pub const MIN_CHILDREN: usize = 3;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct NodeIdx(usize);

#[derive(Clone)]
struct NodeVec<T> {
    inner: Vec<T>,
}

impl_typed_vec!(NodeVec, NodeIdx, "r");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Child {
    Node(NodeIdx),
    // An index into the item slots.
    Item(usize),
}

// One extra slot, so that a node can overflow just before being split.
type Children = ArrayVec<Child, { MAX_CHILDREN + 1 }>;

#[derive(Clone, Debug)]
struct Node {
    bbox: Rect,
    leaf: bool,
    children: Children,
}

#[derive(Clone, Debug)]
struct Item<P> {
    rect: Rect,
    payload: P,
}

fn area(r: &Rect) -> f64 {
    r.width() * r.height()
}

fn margin(r: &Rect) -> f64 {
    r.width() + r.height()
}

/// A spatial index of rectangles, each carrying a unique payload.
#[derive(Clone)]
pub struct BoxIndex<P> {
    root: Option<NodeIdx>,
    nodes: NodeVec<Node>,
    free_nodes: Vec<NodeIdx>,
    items: Vec<Option<Item<P>>>,
    free_items: Vec<usize>,
    by_payload: HashMap<P, usize>,
}

impl<P> Default for BoxIndex<P> {
    fn default() -> Self {
        BoxIndex {
            root: None,
            nodes: NodeVec::default(),
            free_nodes: Vec::new(),
            items: Vec::new(),
            free_items: Vec::new(),
            by_payload: HashMap::new(),
        }
    }
}

impl<P: std::fmt::Debug> std::fmt::Debug for BoxIndex<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.items.iter().flatten().map(|i| (i.rect, &i.payload)))
            .finish()
    }
}

impl<P: Clone + Eq + Hash> BoxIndex<P> {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of rectangles in the index.
    pub fn len(&self) -> usize {
        self.by_payload.len()
    }

    /// Is the index empty?
    pub fn is_empty(&self) -> bool {
        self.by_payload.is_empty()
    }

    /// Is there a rectangle with this payload?
    pub fn contains(&self, payload: &P) -> bool {
        self.by_payload.contains_key(payload)
    }

    /// The rectangle stored with this payload.
    pub fn get(&self, payload: &P) -> Option<Rect> {
        let slot = *self.by_payload.get(payload)?;
        self.items[slot].as_ref().map(|i| i.rect)
    }

    /// Adds a rectangle.
    ///
    /// Fails if the rectangle isn't finite or the payload is already present.
    pub fn add(&mut self, rect: Rect, payload: P) -> Result<(), Error> {
        if rect.is_nan() {
            return Err(Error::NaN);
        }
        if !rect_is_finite(&rect) {
            return Err(Error::Infinity);
        }
        if self.by_payload.contains_key(&payload) {
            return Err(Error::DuplicateKey);
        }

        let rect = rect.abs();
        let item = Item {
            rect,
            payload: payload.clone(),
        };
        let slot = match self.free_items.pop() {
            Some(slot) => {
                self.items[slot] = Some(item);
                slot
            }
            None => {
                self.items.push(Some(item));
                self.items.len() - 1
            }
        };
        self.by_payload.insert(payload, slot);
        self.insert_item(slot, rect);

        #[cfg(feature = "slow-asserts")]
        self.check_invariants();
        Ok(())
    }

    /// Adds a rectangle, returning `false` if that failed.
    pub fn try_add(&mut self, rect: Rect, payload: P) -> bool {
        self.add(rect, payload).is_ok()
    }

    /// Moves an existing payload to a new rectangle.
    ///
    /// Returns `false` (and changes nothing) if the payload isn't present or
    /// the rectangle isn't finite.
    pub fn update(&mut self, payload: P, rect: Rect) -> bool {
        if !rect_is_finite(&rect) {
            return false;
        }
        let Some(&slot) = self.by_payload.get(&payload) else {
            return false;
        };
        let Some(old) = self.items[slot].as_ref().map(|i| i.rect) else {
            return false;
        };

        self.remove_item(slot, &old);
        let rect = rect.abs();
        if let Some(item) = &mut self.items[slot] {
            item.rect = rect;
        }
        self.insert_item(slot, rect);

        #[cfg(feature = "slow-asserts")]
        self.check_invariants();
        true
    }

    /// Removes the rectangle with this payload, returning it.
    pub fn delete(&mut self, payload: &P) -> Option<(Rect, P)> {
        let slot = self.by_payload.remove(payload)?;
        let item = self.items[slot].take()?;
        self.free_items.push(slot);
        self.remove_item(slot, &item.rect);

        #[cfg(feature = "slow-asserts")]
        self.check_invariants();
        Some((item.rect, item.payload))
    }

    /// The payloads of every rectangle that overlaps `rect`, touching included.
    pub fn intersects(&self, rect: &Rect) -> Vec<P> {
        let mut ret = Vec::new();
        let Some(root) = self.root else {
            return ret;
        };

        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !rects_overlap(&node.bbox, rect) {
                continue;
            }
            for child in &node.children {
                match *child {
                    Child::Node(n) => stack.push(n),
                    Child::Item(slot) => {
                        if let Some(item) = &self.items[slot] {
                            if rects_overlap(&item.rect, rect) {
                                ret.push(item.payload.clone());
                            }
                        }
                    }
                }
            }
        }
        ret
    }

    fn alloc_node(&mut self, node: Node) -> NodeIdx {
        match self.free_nodes.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => self.nodes.push(node),
        }
    }

    fn child_bbox(&self, child: &Child) -> Rect {
        match *child {
            Child::Node(idx) => self.nodes[idx].bbox,
            Child::Item(slot) => self.items[slot].as_ref().map_or(Rect::ZERO, |i| i.rect),
        }
    }

    fn children_bbox(&self, children: &[Child]) -> Rect {
        let mut iter = children.iter().map(|c| self.child_bbox(c));
        let first = iter.next().unwrap_or(Rect::ZERO);
        iter.fold(first, |acc, r| acc.union(r))
    }

    // The child that grows least when `rect` is added to it, or the smallest
    // one if there's a tie.
    fn choose_child(&self, node: NodeIdx, rect: &Rect) -> usize {
        let children = &self.nodes[node].children;
        let mut best = 0;
        let mut best_cost = None;
        for (i, c) in children.iter().enumerate() {
            let bbox = self.child_bbox(c);
            let cost = (
                CheapOrderedFloat::from(area(&bbox.union(*rect)) - area(&bbox)),
                CheapOrderedFloat::from(area(&bbox)),
            );
            if best_cost.map_or(true, |b| cost < b) {
                best_cost = Some(cost);
                best = i;
            }
        }
        best
    }

    // Splits an overflowing set of children in two.
    fn split_children(&self, children: &[Child]) -> (Children, Children) {
        let n = children.len();
        let mut best: Option<((CheapOrderedFloat, CheapOrderedFloat), Vec<Child>, usize)> = None;

        for axis in 0..2 {
            let mut sorted = children.to_vec();
            sorted.sort_by_key(|c| {
                let r = self.child_bbox(c);
                if axis == 0 {
                    (CheapOrderedFloat::from(r.x0), CheapOrderedFloat::from(r.x1))
                } else {
                    (CheapOrderedFloat::from(r.y0), CheapOrderedFloat::from(r.y1))
                }
            });

            for k in MIN_CHILDREN..=(n - MIN_CHILDREN) {
                let left = self.children_bbox(&sorted[..k]);
                let right = self.children_bbox(&sorted[k..]);
                let cost = (
                    CheapOrderedFloat::from(area(&left) + area(&right)),
                    CheapOrderedFloat::from(margin(&left) + margin(&right)),
                );
                if best.as_ref().map_or(true, |(b, _, _)| cost < *b) {
                    best = Some((cost, sorted.clone(), k));
                }
            }
        }

        let (sorted, k) = match best {
            Some((_, sorted, k)) => (sorted, k),
            None => (children.to_vec(), n / 2),
        };
        (
            sorted[..k].iter().copied().collect(),
            sorted[k..].iter().copied().collect(),
        )
    }

    // Splits `node` in place, returning its new sibling.
    fn split(&mut self, node: NodeIdx) -> NodeIdx {
        let (left, right) = self.split_children(&self.nodes[node].children);
        let leaf = self.nodes[node].leaf;
        let left_bbox = self.children_bbox(&left);
        let right_bbox = self.children_bbox(&right);
        let n = &mut self.nodes[node];
        n.children = left;
        n.bbox = left_bbox;
        self.alloc_node(Node {
            bbox: right_bbox,
            leaf,
            children: right,
        })
    }

    // Returns the new sibling of `node`, if it had to be split.
    fn insert_into(&mut self, node: NodeIdx, slot: usize, rect: Rect) -> Option<NodeIdx> {
        if self.nodes[node].leaf {
            let n = &mut self.nodes[node];
            n.children.push(Child::Item(slot));
            n.bbox = n.bbox.union(rect);
        } else {
            let i = self.choose_child(node, &rect);
            let split = match self.nodes[node].children[i] {
                Child::Node(child) => self.insert_into(child, slot, rect),
                Child::Item(_) => None,
            };
            let n = &mut self.nodes[node];
            n.bbox = n.bbox.union(rect);
            if let Some(sibling) = split {
                n.children.insert(i + 1, Child::Node(sibling));
            }
        }

        (self.nodes[node].children.len() > MAX_CHILDREN).then(|| self.split(node))
    }

    fn insert_item(&mut self, slot: usize, rect: Rect) {
        let Some(root) = self.root else {
            let mut children = Children::new();
            children.push(Child::Item(slot));
            self.root = Some(self.alloc_node(Node {
                bbox: rect,
                leaf: true,
                children,
            }));
            return;
        };

        if let Some(sibling) = self.insert_into(root, slot, rect) {
            let mut children = Children::new();
            children.push(Child::Node(root));
            children.push(Child::Node(sibling));
            let bbox = self.nodes[root].bbox.union(self.nodes[sibling].bbox);
            self.root = Some(self.alloc_node(Node {
                bbox,
                leaf: false,
                children,
            }));
            tracing::debug!(height = self.height(), items = self.len(), "box index grew");
        }
    }

    // Removes the item from the subtree under `node`, dropping any nodes that
    // become empty along the way. Returns whether the item was found.
    fn remove_from(&mut self, node: NodeIdx, slot: usize, rect: &Rect) -> bool {
        if !rects_overlap(&self.nodes[node].bbox, rect) {
            return false;
        }

        if self.nodes[node].leaf {
            let children = &mut self.nodes[node].children;
            let Some(pos) = children.iter().position(|c| *c == Child::Item(slot)) else {
                return false;
            };
            children.remove(pos);
        } else {
            let children = self.nodes[node].children.clone();
            let Some(pos) = children.iter().position(|c| match *c {
                Child::Node(child) => self.remove_from(child, slot, rect),
                Child::Item(_) => false,
            }) else {
                return false;
            };
            if let Child::Node(child) = children[pos] {
                if self.nodes[child].children.is_empty() {
                    self.nodes[node].children.remove(pos);
                    self.free_nodes.push(child);
                }
            }
        }

        let bbox = self.children_bbox(&self.nodes[node].children);
        self.nodes[node].bbox = bbox;
        true
    }

    fn remove_item(&mut self, slot: usize, rect: &Rect) {
        let Some(mut root) = self.root else {
            return;
        };
        self.remove_from(root, slot, rect);

        loop {
            let node = &self.nodes[root];
            match node.children.as_slice() {
                [] => {
                    self.root = None;
                    self.nodes.clear();
                    self.free_nodes.clear();
                    return;
                }
                [Child::Node(only)] if !node.leaf => {
                    let only = *only;
                    self.free_nodes.push(root);
                    root = only;
                    self.root = Some(root);
                }
                _ => return,
            }
        }
    }

    /// The number of levels in the tree.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut cur = self.root;
        while let Some(idx) = cur {
            height += 1;
            let node = &self.nodes[idx];
            cur = match node.children.first() {
                Some(Child::Node(child)) if !node.leaf => Some(*child),
                _ => None,
            };
        }
        height
    }

    /// Checks our internal invariants, panicking if they don't hold.
    pub fn check_invariants(&self) {
        let live = self.items.iter().filter(|i| i.is_some()).count();
        assert_eq!(live, self.by_payload.len());
        for (payload, &slot) in &self.by_payload {
            assert!(matches!(&self.items[slot], Some(i) if i.payload == *payload));
        }

        let Some(root) = self.root else {
            assert_eq!(live, 0);
            assert_eq!(self.nodes.len(), 0);
            return;
        };
        let mut seen = 0;
        let mut leaf_depth = None;
        let mut reached = HashSet::new();
        self.check_node(root, true, 0, &mut leaf_depth, &mut seen, &mut reached);
        assert_eq!(seen, live);

        // Every node is either in the tree or waiting to be reused.
        let free: HashSet<_> = self.free_nodes.iter().copied().collect();
        assert_eq!(free.len(), self.free_nodes.len());
        assert_eq!(reached.len() + free.len(), self.nodes.len());
        for (idx, _) in self.nodes.iter() {
            assert!(reached.contains(&idx) != free.contains(&idx), "{idx:?} is lost");
        }
    }

    fn check_node(
        &self,
        idx: NodeIdx,
        is_root: bool,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        seen: &mut usize,
        reached: &mut HashSet<NodeIdx>,
    ) {
        assert!(reached.insert(idx), "{idx:?} is in the tree twice");
        let node = &self.nodes[idx];
        assert!(node.children.len() <= MAX_CHILDREN);
        assert!(!node.children.is_empty());
        if is_root && !node.leaf {
            assert!(node.children.len() >= 2);
        }
        assert_eq!(node.bbox, self.children_bbox(&node.children));

        if node.leaf {
            assert_eq!(*leaf_depth.get_or_insert(depth), depth);
        }
        for child in &node.children {
            match (*child, node.leaf) {
                (Child::Item(slot), true) => {
                    assert!(self.items[slot].is_some());
                    *seen += 1;
                }
                (Child::Node(n), false) => {
                    self.check_node(n, false, depth + 1, leaf_depth, seen, reached)
                }
                _ => panic!("{child:?} in the wrong kind of node"),
            }
        }
    }
}

impl<P: Clone + Eq + Hash> SpatialIndex<P> for BoxIndex<P> {
    fn len(&self) -> usize {
        self.len()
    }

    fn query_rect(&self, rect: &Rect) -> Vec<P> {
        self.intersects(rect)
    }
}
