//! Utilities for generating examples, benchmarks, and test cases.

use std::f64::consts::TAU;

use crate::{Point, Polygon, Segment};

/// A square of half-width `r` centered at the origin.
///
/// The left-hand side has an extra vertex at `(-r, 0)`, so the ring has five
/// vertices, starting at the bottom-left corner.
pub fn box_polygon(r: f64) -> Polygon {
    Polygon::from_rings_unchecked(vec![vec![
        Point::new(-r, -r),
        Point::new(r, -r),
        Point::new(r, r),
        Point::new(-r, r),
        Point::new(-r, 0.0),
    ]])
}

/// A U-shape that fits in the square of half-width `r`, open at the top.
///
/// ```text
/// ┌──┐  ┌──┐
/// │  │  │  │
/// │  └──┘  │
/// └────────┘
/// ```
pub fn u_polygon(r: f64) -> Polygon {
    Polygon::from_rings_unchecked(vec![vec![
        Point::new(-r, -r),
        Point::new(r, -r),
        Point::new(r, r),
        Point::new(r / 2.0, r),
        Point::new(r / 2.0, -r / 2.0),
        Point::new(-r / 2.0, -r / 2.0),
        Point::new(-r / 2.0, r),
        Point::new(-r, r),
    ]])
}

/// A star-shaped polygon around `center`, with one vertex for each radius.
///
/// Vertex `i` is at angle `2πi / n`. The radii must be positive, and there
/// must be at least three of them.
pub fn star_polygon(center: Point, radii: &[f64]) -> Polygon {
    let n = radii.len() as f64;
    let ring = radii
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let (sin, cos) = (TAU * i as f64 / n).sin_cos();
            Point::new(center.x + r * cos, center.y + r * sin)
        })
        .collect();
    Polygon::from_rings_unchecked(vec![ring])
}

/// A pseudo-random scatter of `n` points in the square `[0, size]²`.
///
/// The points come from a fixed low-discrepancy sequence, so they are the
/// same on every run.
pub fn scatter(n: usize, size: f64) -> Vec<Point> {
    // The plastic-number sequence.
    const A1: f64 = 0.754_877_666_246_692_7;
    const A2: f64 = 0.569_840_290_998_053_3;
    (1..=n)
        .map(|i| {
            let i = i as f64;
            Point::new((0.5 + A1 * i).fract() * size, (0.5 + A2 * i).fract() * size)
        })
        .collect()
}

/// Short segments starting at each point of [`scatter`], pointing in
/// assorted directions.
pub fn scattered_segments(n: usize, size: f64, len: f64) -> Vec<Segment> {
    scatter(n, size)
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            let (sin, cos) = (i as f64 * 2.399_963_229_728_653).sin_cos();
            Segment::new(p, Point::new(p.x + len * cos, p.y + len * sin))
        })
        .collect()
}

/// An `n` by `n` grid of disjoint squares of side `size`, spaced `offset` apart.
pub fn square_grid(n: usize, size: f64, offset: f64) -> Vec<Polygon> {
    let mut ret = Vec::with_capacity(n * n);
    for i in 0..n {
        let x = i as f64 * offset;
        for j in 0..n {
            let y = j as f64 * offset;
            ret.push(Polygon::from_rings_unchecked(vec![vec![
                Point::new(x, y),
                Point::new(x + size, y),
                Point::new(x + size, y + size),
                Point::new(x, y + size),
            ]]));
        }
    }
    ret
}
