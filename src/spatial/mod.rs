//! Spatial indexes.
//!
//! There are four kinds, for different kinds of things:
//! - [`PointIndex`](point_index::PointIndex) is a quadtree over points, with
//!   nearest-neighbor queries;
//! - [`BoxIndex`](box_index::BoxIndex) is an R-tree over rectangles;
//! - [`LineIndex`](line_index::LineIndex) is a uniform grid over line segments,
//!   with nearest-segment queries;
//! - [`RegionPyramid`](pyramid::RegionPyramid) is a stack of ever-finer grids
//!   of cells, for level-of-detail lookups. Its
//!   [`BoundlessRegionPyramid`](boundless_pyramid::BoundlessRegionPyramid)
//!   cousin does the same without knowing the world's extent.
//!
//! All of them are single-threaded, and all queries return owned vectors.

use kurbo::Rect;

pub mod boundless_pyramid;
pub mod box_index;
pub mod line_index;
pub mod point_index;
pub mod pyramid;

/// The operations shared by every spatial index.
pub trait SpatialIndex<P> {
    /// The number of entries.
    fn len(&self) -> usize;

    /// Are there no entries?
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The payloads of every entry that meets `rect`, boundary included.
    fn query_rect(&self, rect: &Rect) -> Vec<P>;
}
