//! Geometric primitives, like points and line segments.

use kurbo::{Rect, Vec2};

use crate::num::CheapOrderedFloat;

/// The tolerance used by every near-equality test in this crate: point-on-segment
/// tests, snapping of computed intersections onto existing vertices, and
/// [`Point::approx_eq`].
pub const EPSILON: f64 = 1e-5;

/// A two-dimensional point.
///
/// Equality and hashing are exact, so points can be used in sets and maps.
/// Geometric predicates that need slack use [`Point::approx_eq`] instead; the
/// two are never mixed.
///
/// Points are sorted by `y` and then by `x`.
#[derive(Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    ///
    /// The orientation conventions (e.g. "counter-clockwise") assume that larger
    /// values are up.
    pub y: f64,
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl Eq for Point {}

impl std::hash::Hash for Point {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        CheapOrderedFloat::from(self.x).hash(state);
        CheapOrderedFloat::from(self.y).hash(state);
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (
            CheapOrderedFloat::from(self.y),
            CheapOrderedFloat::from(self.x),
        )
            .cmp(&(
                CheapOrderedFloat::from(other.y),
                CheapOrderedFloat::from(other.x),
            ))
    }
}

impl PartialOrd for Point {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Debug for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, {:?})", self.x, self.y)
    }
}

impl Point {
    /// Create a new point.
    ///
    /// Any coordinates are accepted here; the operations that store points
    /// reject non-finite ones with [`Error::NaN`](crate::Error::NaN) or
    /// [`Error::Infinity`](crate::Error::Infinity).
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    /// Compute an affine combination between `self` and `other`; that is, `(1 - t) * self + t * other`.
    pub fn affine(&self, other: &Self, t: f64) -> Self {
        Point {
            x: (1.0 - t) * self.x + t * other.x,
            y: (1.0 - t) * self.y + t * other.y,
        }
    }

    /// The Euclidean distance between two points.
    pub fn distance(&self, other: &Point) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// The squared Euclidean distance between two points.
    pub fn distance_squared(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Are these two points within [`EPSILON`] of one another?
    pub fn approx_eq(&self, other: &Point) -> bool {
        self.distance_squared(other) <= EPSILON * EPSILON
    }

    /// Are both coordinates finite?
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Convert to a `kurbo` point.
    pub fn to_kurbo(self) -> kurbo::Point {
        kurbo::Point::new(self.x, self.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<kurbo::Point> for Point {
    fn from(p: kurbo::Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

impl std::ops::Sub for Point {
    type Output = Vec2;

    fn sub(self, rhs: Point) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Add<Vec2> for Point {
    type Output = Point;

    fn add(self, rhs: Vec2) -> Point {
        Point {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

/// The result of intersecting two line segments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SegmentIntersection {
    /// The segments are disjoint.
    None,
    /// The segments meet in a single point.
    Point(Point),
    /// The segments are collinear and share this sub-segment.
    Overlap(Segment),
}

/// A line segment between two points.
///
/// The orientation matters for parametrization (`a` is at parameter zero and `b`
/// at parameter one) but not for any geometric predicate.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    /// The start point.
    pub a: Point,
    /// The end point.
    pub b: Point,
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Segment { a, b } = self;
        write!(f, "{a:?} -- {b:?}")
    }
}

impl Segment {
    /// Create a new segment.
    pub fn new(a: impl Into<Point>, b: impl Into<Point>) -> Self {
        Segment {
            a: a.into(),
            b: b.into(),
        }
    }

    /// The axis-aligned bounding box of this segment.
    pub fn bbox(&self) -> Rect {
        Rect::from_points(self.a.to_kurbo(), self.b.to_kurbo())
    }

    /// The length of this segment.
    pub fn length(&self) -> f64 {
        self.a.distance(&self.b)
    }

    /// The point halfway between the endpoints.
    pub fn midpoint(&self) -> Point {
        self.a.affine(&self.b, 0.5)
    }

    /// The same segment, traversed in the other direction.
    pub fn reversed(&self) -> Segment {
        Segment {
            a: self.b,
            b: self.a,
        }
    }

    /// Is `p` exactly one of our endpoints?
    pub fn is_endpoint(&self, p: &Point) -> bool {
        self.a == *p || self.b == *p
    }

    /// Returns true if this segment is exactly vertical.
    pub fn is_vertical(&self) -> bool {
        self.a.x == self.b.x
    }

    /// Returns true if this segment is exactly horizontal.
    pub fn is_horizontal(&self) -> bool {
        self.a.y == self.b.y
    }

    /// The parameter of the projection of `p` onto the infinite line through this
    /// segment: zero at `a`, one at `b`.
    pub fn param_of(&self, p: &Point) -> f64 {
        let d = self.b - self.a;
        let len2 = d.hypot2();
        if len2 == 0.0 {
            0.0
        } else {
            (*p - self.a).dot(d) / len2
        }
    }

    /// The point of this segment closest to `p`.
    ///
    /// Axis-aligned segments are handled separately, so that the result lies
    /// exactly on them.
    pub fn nearest_point(&self, p: &Point) -> Point {
        let min_x = self.a.x.min(self.b.x);
        let max_x = self.a.x.max(self.b.x);
        let min_y = self.a.y.min(self.b.y);
        let max_y = self.a.y.max(self.b.y);

        if self.is_vertical() {
            Point::new(self.a.x, p.y.clamp(min_y, max_y))
        } else if self.is_horizontal() {
            Point::new(p.x.clamp(min_x, max_x), self.a.y)
        } else {
            let t = self.param_of(p);
            if t <= 0.0 {
                self.a
            } else if t >= 1.0 {
                self.b
            } else {
                self.a.affine(&self.b, t)
            }
        }
    }

    /// The distance from `p` to the closest point of this segment.
    pub fn distance_to_point(&self, p: &Point) -> f64 {
        self.nearest_point(p).distance(p)
    }

    /// Does `p` lie on this segment, up to [`EPSILON`]?
    pub fn contains_point(&self, p: &Point) -> bool {
        self.distance_to_point(p) <= EPSILON
    }

    /// Intersects two segments.
    ///
    /// A computed intersection point that is within [`EPSILON`] of an endpoint of
    /// either segment is replaced by that endpoint, and a point on an
    /// axis-aligned segment takes that segment's exact coordinate. This makes it
    /// possible to decide with exact equality whether an intersection coincides
    /// with an existing vertex.
    pub fn intersection(&self, other: &Segment) -> SegmentIntersection {
        if !rects_overlap(&self.bbox().inflate(EPSILON, EPSILON), &other.bbox()) {
            return SegmentIntersection::None;
        }

        if self.a == self.b {
            return if other.contains_point(&self.a) {
                SegmentIntersection::Point(self.a)
            } else {
                SegmentIntersection::None
            };
        }
        if other.a == other.b {
            return if self.contains_point(&other.a) {
                SegmentIntersection::Point(other.a)
            } else {
                SegmentIntersection::None
            };
        }

        let r = self.b - self.a;
        let s = other.b - other.a;
        let qp = other.a - self.a;
        let denom = r.cross(s);

        // Collinear means one segment lies within EPSILON of the other's line.
        let (len_r, len_s) = (r.hypot(), s.hypot());
        let other_on_line = qp.cross(r).abs() <= EPSILON * len_r
            && (other.b - self.a).cross(r).abs() <= EPSILON * len_r;
        let self_on_line = qp.cross(s).abs() <= EPSILON * len_s
            && (self.b - other.a).cross(s).abs() <= EPSILON * len_s;
        if other_on_line || self_on_line {
            return self.collinear_intersection(other);
        }

        let t = qp.cross(s) / denom;
        let u = qp.cross(r) / denom;
        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
            return SegmentIntersection::Point(snap(self.a.affine(&self.b, t), self, other));
        }

        // The parameters can fall just outside [0, 1] when the segments touch at
        // an endpoint.
        for e in [self.a, self.b] {
            if other.contains_point(&e) {
                return SegmentIntersection::Point(e);
            }
        }
        for e in [other.a, other.b] {
            if self.contains_point(&e) {
                return SegmentIntersection::Point(e);
            }
        }
        SegmentIntersection::None
    }

    fn collinear_intersection(&self, other: &Segment) -> SegmentIntersection {
        let mut on_both: Vec<Point> = Vec::with_capacity(4);
        for e in [other.a, other.b] {
            if self.contains_point(&e) && !on_both.contains(&e) {
                on_both.push(e);
            }
        }
        for e in [self.a, self.b] {
            if other.contains_point(&e) && !on_both.iter().any(|q| q.approx_eq(&e)) {
                on_both.push(e);
            }
        }

        match on_both.len() {
            0 => SegmentIntersection::None,
            1 => SegmentIntersection::Point(on_both[0]),
            _ => {
                on_both.sort_by_key(|p| CheapOrderedFloat::from(self.param_of(p)));
                let first = on_both[0];
                let last = on_both[on_both.len() - 1];
                if first == last {
                    SegmentIntersection::Point(first)
                } else {
                    SegmentIntersection::Overlap(Segment::new(first, last))
                }
            }
        }
    }

    /// Do these segments intersect?
    ///
    /// If `endpoints_do_not_intersect` is set, a single-point intersection at an
    /// endpoint of either segment doesn't count. Overlaps always count.
    pub fn intersects(&self, other: &Segment, endpoints_do_not_intersect: bool) -> bool {
        match self.intersection(other) {
            SegmentIntersection::None => false,
            SegmentIntersection::Point(p) => {
                !endpoints_do_not_intersect || !(self.is_endpoint(&p) || other.is_endpoint(&p))
            }
            SegmentIntersection::Overlap(_) => true,
        }
    }
}

fn snap(p: Point, s1: &Segment, s2: &Segment) -> Point {
    for e in [s1.a, s1.b, s2.a, s2.b] {
        if p.approx_eq(&e) {
            return e;
        }
    }

    let mut p = p;
    if s1.is_vertical() {
        p.x = s1.a.x;
    } else if s2.is_vertical() {
        p.x = s2.a.x;
    }
    if s1.is_horizontal() {
        p.y = s1.a.y;
    } else if s2.is_horizontal() {
        p.y = s2.a.y;
    }
    p
}

/// Do two rectangles overlap? Rectangles that only touch along an edge or at a
/// corner count as overlapping.
pub(crate) fn rects_overlap(a: &Rect, b: &Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

/// Is `p` in the closed rectangle `r`?
pub(crate) fn rect_contains_point(r: &Rect, p: &Point) -> bool {
    r.x0 <= p.x && p.x <= r.x1 && r.y0 <= p.y && p.y <= r.y1
}

/// The distance from `p` to the closest point of the closed rectangle `r`.
pub(crate) fn rect_distance_to_point(r: &Rect, p: &Point) -> f64 {
    let dx = (r.x0 - p.x).max(0.0).max(p.x - r.x1);
    let dy = (r.y0 - p.y).max(0.0).max(p.y - r.y1);
    (dx * dx + dy * dy).sqrt()
}

pub(crate) fn rect_is_finite(r: &Rect) -> bool {
    r.x0.is_finite() && r.y0.is_finite() && r.x1.is_finite() && r.y1.is_finite()
}

/// The bounding box of a non-empty collection of points.
pub(crate) fn rect_from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Rect> {
    let mut points = points.into_iter();
    let first = points.next()?;
    let mut rect = Rect::from_points(first.to_kurbo(), first.to_kurbo());
    for p in points {
        rect = rect.union_pt(p.to_kurbo());
    }
    Some(rect)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::num::tests::Reasonable;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    impl Reasonable for Point {
        type Strategy = BoxedStrategy<Point>;

        fn reasonable() -> Self::Strategy {
            (f64::reasonable(), f64::reasonable())
                .prop_map(|(x, y)| Point::new(x, y))
                .boxed()
        }
    }

    fn seg(a: (f64, f64), b: (f64, f64)) -> Segment {
        Segment::new(a, b)
    }

    #[test]
    fn crossing() {
        let s1 = seg((-15.0, 1.0), (15.0, 1.0));
        let s2 = seg((-10.0, 10.0), (-10.0, 0.0));
        assert_eq!(
            s1.intersection(&s2),
            SegmentIntersection::Point(Point::new(-10.0, 1.0))
        );
        assert!(s1.intersects(&s2, true));
    }

    #[test]
    fn touching_at_endpoint() {
        let s1 = seg((0.0, 0.0), (1.0, 1.0));
        let s2 = seg((1.0, 1.0), (2.0, 0.0));
        assert_eq!(
            s1.intersection(&s2),
            SegmentIntersection::Point(Point::new(1.0, 1.0))
        );
        assert!(s1.intersects(&s2, false));
        assert!(!s1.intersects(&s2, true));

        // A T-junction: one endpoint in the middle of the other segment.
        let s3 = seg((0.5, 0.5), (0.5, 3.0));
        assert_eq!(
            s1.intersection(&s3),
            SegmentIntersection::Point(Point::new(0.5, 0.5))
        );
        assert!(!s1.intersects(&s3, true));
    }

    #[test]
    fn overlap() {
        let s1 = seg((-10.0, 10.0), (-10.0, -10.0));
        let s2 = seg((-10.0, 0.0), (-10.0, -20.0));
        assert_matches!(s1.intersection(&s2), SegmentIntersection::Overlap(o) => {
            assert_eq!(o, seg((-10.0, 0.0), (-10.0, -10.0)));
        });
        assert!(s1.intersects(&s2, true));

        let parallel = seg((-9.0, 10.0), (-9.0, -10.0));
        assert_eq!(s1.intersection(&parallel), SegmentIntersection::None);
    }

    #[test]
    fn nearly_parallel() {
        // Off by much less than EPSILON, but at an angle far above f64::EPSILON.
        let s1 = seg((0.0, 0.0), (10.0, 0.0));
        let s2 = seg((2.0, 1e-7), (12.0, -1e-7));
        assert_matches!(s1.intersection(&s2), SegmentIntersection::Overlap(o) => {
            assert!((o.length() - 8.0).abs() < 1e-6);
        });
        assert_matches!(s2.intersection(&s1), SegmentIntersection::Overlap(_));

        // Long enough to separate by more than EPSILON: a single crossing.
        let long = seg((0.0, 0.0), (1000.0, 0.0));
        let tilted = seg((0.0, -0.001), (1000.0, 0.001));
        assert_matches!(long.intersection(&tilted), SegmentIntersection::Point(p) => {
            assert!((p.x - 500.0).abs() < 1e-6);
            assert_eq!(p.y, 0.0);
        });
    }

    #[test]
    fn disjoint() {
        let s1 = seg((0.0, 0.0), (1.0, 0.0));
        let s2 = seg((2.0, -1.0), (2.0, 1.0));
        assert_eq!(s1.intersection(&s2), SegmentIntersection::None);
    }

    #[test]
    fn nearest_points() {
        let vertical = seg((0.0, -1.0), (0.0, 1.0));
        assert_eq!(vertical.nearest_point(&Point::new(3.0, 0.5)), Point::new(0.0, 0.5));
        assert_eq!(vertical.distance_to_point(&Point::new(3.0, 0.5)), 3.0);
        assert_eq!(vertical.nearest_point(&Point::new(3.0, 5.0)), Point::new(0.0, 1.0));

        let diagonal = seg((0.0, 0.0), (2.0, 2.0));
        assert_eq!(diagonal.nearest_point(&Point::new(2.0, 0.0)), Point::new(1.0, 1.0));
        assert_eq!(diagonal.nearest_point(&Point::new(-1.0, -5.0)), Point::new(0.0, 0.0));
    }

    #[test]
    fn exact_and_approximate_equality() {
        let p = Point::new(1.0, 1.0);
        let q = Point::new(1.0 + EPSILON / 2.0, 1.0);
        assert_ne!(p, q);
        assert!(p.approx_eq(&q));
        assert_eq!(Point::new(0.0, 0.0), Point::new(-0.0, 0.0));
    }

    #[test]
    fn rect_helpers() {
        let r = Rect::new(0.0, 0.0, 2.0, 1.0);
        assert!(rect_contains_point(&r, &Point::new(2.0, 1.0)));
        assert!(!rect_contains_point(&r, &Point::new(2.5, 1.0)));
        assert!(rects_overlap(&r, &Rect::new(2.0, 1.0, 3.0, 3.0)));
        assert!(!rects_overlap(&r, &Rect::new(2.1, 1.0, 3.0, 3.0)));
        assert_eq!(rect_distance_to_point(&r, &Point::new(5.0, 5.0)), 5.0);
        assert_eq!(rect_distance_to_point(&r, &Point::new(1.0, 0.5)), 0.0);
    }

    proptest! {
        #[test]
        fn intersection_points_lie_on_both(p0 in Point::reasonable(), p1 in Point::reasonable(), q0 in Point::reasonable(), q1 in Point::reasonable()) {
            let s = Segment::new(p0, p1);
            let t = Segment::new(q0, q1);
            let r = p1 - p0;
            let v = q1 - q0;
            // Nearly-parallel segments have badly conditioned intersections.
            prop_assume!(r.hypot() > 1e-3 && v.hypot() > 1e-3);
            prop_assume!(r.cross(v).abs() > 1e-3 * r.hypot() * v.hypot());

            if let SegmentIntersection::Point(p) = s.intersection(&t) {
                let tol = 1e-9 * (1.0 + p.x.abs().max(p.y.abs()));
                prop_assert!(s.distance_to_point(&p) <= tol.max(EPSILON));
                prop_assert!(t.distance_to_point(&p) <= tol.max(EPSILON));
            }
        }

        #[test]
        fn intersection_is_symmetric_for_crossings(p0 in Point::reasonable(), p1 in Point::reasonable(), q0 in Point::reasonable(), q1 in Point::reasonable()) {
            let s = Segment::new(p0, p1);
            let t = Segment::new(q0, q1);
            let r = p1 - p0;
            let v = q1 - q0;
            prop_assume!(r.hypot() > 1e-3 && v.hypot() > 1e-3);
            prop_assume!(r.cross(v).abs() > 1e-3 * r.hypot() * v.hypot());

            let found = !matches!(s.intersection(&t), SegmentIntersection::None);
            let found_rev = !matches!(t.intersection(&s), SegmentIntersection::None);
            prop_assert_eq!(found, found_rev);
        }
    }
}
