#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

#[macro_use]
mod typed_vec;

#[cfg(any(test, feature = "arbitrary"))]
pub mod arbitrary;
mod geom;
mod num;
pub mod polygon;
pub mod ring;
pub mod spatial;

#[cfg(any(test, feature = "generators"))]
pub mod generators;

pub use geom::{Point, Segment, SegmentIntersection, EPSILON};
pub use polygon::{
    index::{sort_by_ring, PolygonIndex},
    vertex_enum::{PolySetVertexEnum, PolygonVertexEnum},
    Polygon,
};
pub use spatial::{
    boundless_pyramid::{BoundlessLevel, BoundlessRegionPyramid, CellRange},
    box_index::BoxIndex,
    line_index::{LineIndex, NearestLine},
    point_index::{Neighbor, PointIndex},
    pyramid::{GridRange, PyramidLevel, RegionPyramid},
    SpatialIndex,
};

/// The direction in which to walk around a ring.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RotationDirection {
    /// Clockwise, with `y` pointing up.
    Clockwise,
    /// Counter-clockwise, with `y` pointing up. This is the orientation all
    /// stored rings use.
    CounterClockwise,
}

impl RotationDirection {
    /// The other direction.
    pub fn reversed(self) -> Self {
        match self {
            RotationDirection::Clockwise => RotationDirection::CounterClockwise,
            RotationDirection::CounterClockwise => RotationDirection::Clockwise,
        }
    }
}

/// The ways in which an edit can break the ring structure of a polygon.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, thiserror::Error)]
pub enum TopologyError {
    /// A ring would be left with fewer than three distinct points.
    #[error("a ring needs at least three distinct points, but would have {0}")]
    TooFewPoints(usize),
    /// A ring would cross or touch itself.
    #[error("ring intersects itself")]
    SelfIntersection,
    /// Two different rings would cross or touch.
    #[error("two rings of the polygon intersect")]
    RingsIntersect,
    /// An interior ring would not be inside the exterior ring.
    #[error("an interior ring is not inside the exterior ring")]
    HoleOutside,
    /// One interior ring would be inside another.
    #[error("an interior ring is inside another interior ring")]
    NestedHoles,
}

/// The things that can go wrong when building or editing shapes and indexes.
///
/// Queries never fail: a miss is reported with `None`, `false`, or an empty
/// collection. Only mutations return errors, and a mutation that returns an
/// error leaves its receiver unchanged.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// At least one of the inputs was infinite.
    #[error("one of the inputs was infinite")]
    Infinity,
    /// At least one of the inputs was not a number.
    #[error("one of the inputs had a NaN")]
    NaN,
    /// A ring's last point was not the same as its first point.
    #[error("ring is not closed: it starts at {first:?} but ends at {last:?}")]
    NonClosedRing {
        /// The first point of the ring.
        first: Point,
        /// The last point of the ring.
        last: Point,
    },
    /// The edit would violate a ring invariant.
    #[error("invalid topology: {0}")]
    InvalidTopology(#[from] TopologyError),
    /// The point is not a vertex of any ring.
    #[error("{0:?} is not a vertex of the polygon")]
    NoSuchVertex(Point),
    /// There is no interior ring with this index.
    #[error("there is no interior ring {0}")]
    NoSuchRing(usize),
    /// The payload (or segment) is already in the index.
    #[error("the key is already present in the index")]
    DuplicateKey,
    /// The cutting path does not cross the exterior ring an even, non-zero
    /// number of times, or it runs into an interior ring.
    #[error("cut path crosses the boundary {crossings} times")]
    InvalidCutPath {
        /// The number of true crossings that were found.
        crossings: usize,
    },
}

/// Checks that a coordinate is usable, distinguishing infinities from NaNs.
pub(crate) fn check_finite(p: Point) -> Result<(), Error> {
    if p.x.is_nan() || p.y.is_nan() {
        Err(Error::NaN)
    } else if p.x.is_infinite() || p.y.is_infinite() {
        Err(Error::Infinity)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_checks() {
        assert_eq!(check_finite(Point::new(1.0, 2.0)), Ok(()));
        assert_eq!(check_finite(Point::new(f64::NAN, 2.0)), Err(Error::NaN));
        assert_eq!(
            check_finite(Point::new(1.0, f64::NEG_INFINITY)),
            Err(Error::Infinity)
        );
        assert_eq!(check_finite(Point::new(f64::INFINITY, f64::NAN)), Err(Error::NaN));
    }

    #[test]
    fn topology_errors_convert() {
        let err: Error = TopologyError::SelfIntersection.into();
        assert_eq!(err, Error::InvalidTopology(TopologyError::SelfIntersection));
        assert_eq!(
            err.to_string(),
            "invalid topology: ring intersects itself"
        );
    }
}
