//! A stack of grids with no fixed extent.
//!
//! Where a [`RegionPyramid`](super::pyramid::RegionPyramid) splits a known
//! region into ever-finer cells, a boundless pyramid keeps the cells at
//! level 0 at their base size and makes them *coarser* at each level: the
//! cells at level `l` are `scale^l` times as large along each axis. The level
//! is picked from how much of the world a single pixel covers, so it works
//! without knowing the world's bounds.
//!
//! | Pixel covers | Level (scale 2) | Cell size (base 1024) |
//! |--------------|-----------------|-----------------------|
//! | 1            | 0               | 1024                  |
//! | 2            | 1               | 2048                  |
//! | 4            | 2               | 4096                  |

use std::collections::HashMap;

use kurbo::{Rect, Size};

use crate::geom::rects_overlap;

use super::{pyramid::MAX_LEVEL, SpatialIndex};

/// The scale between consecutive levels, used when the one asked for is unusable.
pub const DEFAULT_POWER_SCALE: f64 = 4.0;

/// A rectangle of cells in one level of a [`BoundlessRegionPyramid`].
///
/// Cells are numbered from the world's origin, so they can be negative. The
/// minimums are inclusive and the maximums are exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CellRange {
    /// The first column.
    pub min_x: i64,
    /// One past the last column.
    pub max_x: i64,
    /// The first row.
    pub min_y: i64,
    /// One past the last row.
    pub max_y: i64,
}

impl CellRange {
    /// The number of columns.
    pub fn width(&self) -> u64 {
        self.max_x.saturating_sub(self.min_x).max(0) as u64
    }

    /// The number of rows.
    pub fn height(&self) -> u64 {
        self.max_y.saturating_sub(self.min_y).max(0) as u64
    }

    /// Are there no cells in this range?
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// The cells of this range, row by row.
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> {
        let CellRange {
            min_x,
            max_x,
            min_y,
            max_y,
        } = *self;
        (min_y..max_y).flat_map(move |y| (min_x..max_x).map(move |x| (x, y)))
    }
}

/// One level of a [`BoundlessRegionPyramid`].
#[derive(Clone, Debug)]
pub struct BoundlessLevel<T> {
    level: u32,
    min_radius: f64,
    unscaled_cell_size: Size,
    cell_size: Size,
    cells: HashMap<(i64, i64), T>,
}

impl<T> BoundlessLevel<T> {
    fn new(level: u32, unscaled_cell_size: Size, min_radius: f64) -> Self {
        BoundlessLevel {
            level,
            min_radius,
            unscaled_cell_size,
            cell_size: Size::new(
                unscaled_cell_size.width * min_radius,
                unscaled_cell_size.height * min_radius,
            ),
            cells: HashMap::new(),
        }
    }

    /// Which level this is; 0 is the finest.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// How much of the world one pixel covers at this level.
    pub fn min_radius(&self) -> f64 {
        self.min_radius
    }

    /// The size of the cells at level 0.
    pub fn unscaled_cell_size(&self) -> Size {
        self.unscaled_cell_size
    }

    /// The width and height of each cell at this level.
    pub fn cell_size(&self) -> Size {
        self.cell_size
    }

    /// The region covered by the cell `(x, y)`.
    pub fn cell_bounds(&self, x: i64, y: i64) -> Rect {
        let x0 = x as f64 * self.cell_size.width;
        let y0 = y as f64 * self.cell_size.height;
        Rect::new(
            x0,
            y0,
            x0 + self.cell_size.width,
            y0 + self.cell_size.height,
        )
    }

    /// The cells covering `rect`.
    pub fn range_for_rect(&self, rect: &Rect) -> CellRange {
        let rect = rect.abs();
        let index = |v: f64, extent: f64, round: fn(f64) -> f64| round(v / extent) as i64;
        let Size { width, height } = self.cell_size;
        CellRange {
            min_x: index(rect.x0, width, f64::floor),
            max_x: index(rect.x1, width, f64::ceil),
            min_y: index(rect.y0, height, f64::floor),
            max_y: index(rect.y1, height, f64::ceil),
        }
    }

    /// The contents of a cell, if it has been filled in.
    pub fn cell(&self, x: i64, y: i64) -> Option<&T> {
        self.cells.get(&(x, y))
    }

    /// The contents of a cell, if it has been filled in.
    pub fn cell_mut(&mut self, x: i64, y: i64) -> Option<&mut T> {
        self.cells.get_mut(&(x, y))
    }

    /// The contents of a cell, filling it in with `f` if it is empty.
    pub fn get_or_insert_with(&mut self, x: i64, y: i64, f: impl FnOnce() -> T) -> &mut T {
        self.cells.entry((x, y)).or_insert_with(f)
    }

    /// Replaces the contents of a cell, returning what was there.
    pub fn insert_cell(&mut self, x: i64, y: i64, value: T) -> Option<T> {
        self.cells.insert((x, y), value)
    }

    /// The filled-in cells of `range`, row by row.
    pub fn cells_in(&self, range: &CellRange) -> Vec<((i64, i64), &T)> {
        range
            .iter()
            .filter_map(|c| self.cells.get(&c).map(|t| (c, t)))
            .collect()
    }

    /// Empties a cell, returning what was in it.
    pub fn remove_cell(&mut self, x: i64, y: i64) -> Option<T> {
        self.cells.remove(&(x, y))
    }

    /// The number of filled-in cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Are all the cells empty?
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<T: Clone> SpatialIndex<T> for BoundlessLevel<T> {
    fn len(&self) -> usize {
        self.cells.len()
    }

    fn query_rect(&self, rect: &Rect) -> Vec<T> {
        // Widened by a cell, to pick up the cells that only touch `rect`.
        let r = self.range_for_rect(rect);
        let range = CellRange {
            min_x: r.min_x.saturating_sub(1),
            max_x: r.max_x.saturating_add(1),
            min_y: r.min_y.saturating_sub(1),
            max_y: r.max_y.saturating_add(1),
        };
        self.cells_in(&range)
            .into_iter()
            .filter(|((x, y), _)| rects_overlap(&self.cell_bounds(*x, *y), rect))
            .map(|(_, t)| t.clone())
            .collect()
    }
}

/// Grids of cells over an unbounded world, one per power of `power_scale`.
///
/// Levels are created the first time they are asked for.
#[derive(Clone, Debug)]
pub struct BoundlessRegionPyramid<T> {
    cell_dimensions: Size,
    power_scale: f64,
    levels: HashMap<u32, BoundlessLevel<T>>,
}

impl<T> BoundlessRegionPyramid<T> {
    /// Creates a pyramid whose cells at level 0 have the size
    /// `cell_dimensions`, and grow by `power_scale` along each axis per level.
    ///
    /// A scale that isn't finite and greater than one is replaced by
    /// [`DEFAULT_POWER_SCALE`], and an unusable cell dimension by 1.
    pub fn new(cell_dimensions: Size, power_scale: f64) -> Self {
        let pick = |cell: f64| {
            if cell.is_finite() && cell.abs() > 0.0 {
                cell.abs()
            } else {
                1.0
            }
        };
        let power_scale = if power_scale.is_finite() && power_scale > 1.0 {
            power_scale
        } else {
            DEFAULT_POWER_SCALE
        };
        BoundlessRegionPyramid {
            cell_dimensions: Size::new(pick(cell_dimensions.width), pick(cell_dimensions.height)),
            power_scale,
            levels: HashMap::new(),
        }
    }

    /// The size of the cells at level 0.
    pub fn cell_dimensions(&self) -> Size {
        self.cell_dimensions
    }

    /// The ratio between the cell sizes of consecutive levels.
    pub fn power_scale(&self) -> f64 {
        self.power_scale
    }

    /// The level for a view in which one pixel covers `radius` world units:
    /// `floor(log_scale(radius))`, but never below 0 or above [`MAX_LEVEL`].
    pub fn pixel_radius_to_level(&self, radius: f64) -> u32 {
        let level = (radius.ln() / self.power_scale.ln()).floor();
        if level > 0.0 {
            (level as u32).min(MAX_LEVEL)
        } else {
            0
        }
    }

    /// How much of the world one pixel covers at `level`.
    pub fn level_to_pixel_radius(&self, level: u32) -> f64 {
        self.power_scale.powi(level.min(MAX_LEVEL) as i32)
    }

    /// A level, if it has been created.
    pub fn get_level(&self, level: u32) -> Option<&BoundlessLevel<T>> {
        self.levels.get(&level.min(MAX_LEVEL))
    }

    /// A level, created if necessary. Levels past [`MAX_LEVEL`] are clamped.
    pub fn level_mut(&mut self, level: u32) -> &mut BoundlessLevel<T> {
        let level = level.min(MAX_LEVEL);
        let radius = self.level_to_pixel_radius(level);
        let base = self.cell_dimensions;
        self.levels.entry(level).or_insert_with(|| {
            tracing::trace!(level, radius, "creating boundless pyramid level");
            BoundlessLevel::new(level, base, radius)
        })
    }

    /// The level for a view in which one pixel covers `radius` world units,
    /// created if necessary.
    pub fn level_for_pixel_radius(&mut self, radius: f64) -> &mut BoundlessLevel<T> {
        let level = self.pixel_radius_to_level(radius);
        self.level_mut(level)
    }

    /// The cells of `level` covering `rect`, row by row. Empty cells are
    /// filled in with `f`, which gets the cell's coordinates.
    pub fn cells_for_region(
        &mut self,
        level: u32,
        rect: &Rect,
        mut f: impl FnMut(i64, i64) -> T,
    ) -> Vec<((i64, i64), &T)> {
        let level = self.level_mut(level);
        let range = level.range_for_rect(rect);
        for (x, y) in range.iter() {
            level.cells.entry((x, y)).or_insert_with(|| f(x, y));
        }
        let level = &*level;
        level.cells_in(&range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn radius_for_level(level: u32) -> f64 {
        2.0f64.powi(level as i32)
    }

    // The sub-grid for `rect` has the expected shape, and its cells cover it.
    fn assert_covers(level: &BoundlessLevel<String>, rect: &Rect) {
        let cell = level.cell_size();
        let range = level.range_for_rect(rect);
        assert_eq!(range.width(), (rect.width() / cell.width).ceil() as u64);
        assert_eq!(range.height(), (rect.height() / cell.height).ceil() as u64);
        assert_eq!(range.min_x, (rect.x0 / cell.width).floor() as i64);
        assert_eq!(range.min_y, (rect.y0 / cell.height).floor() as i64);

        let covered = range
            .iter()
            .map(|(x, y)| level.cell_bounds(x, y))
            .reduce(|a, b| a.union(b));
        assert!(covered.is_some_and(|c| c.contains_rect(*rect)));
    }

    #[test]
    fn levels_grow_with_the_pixel_radius() {
        let mut pyramid = BoundlessRegionPyramid::<String>::new(Size::new(1024.0, 1024.0), 2.0);

        let level0 = pyramid.level_for_pixel_radius(radius_for_level(0));
        assert_eq!(level0.level(), 0);
        assert_eq!(level0.min_radius(), radius_for_level(0));
        let (unscaled0, scaled0) = (level0.unscaled_cell_size(), level0.cell_size());

        let level1 = pyramid.level_for_pixel_radius(radius_for_level(1));
        assert_eq!(level1.level(), 1);
        assert_eq!(level1.min_radius(), radius_for_level(1));
        assert_eq!(level1.unscaled_cell_size(), unscaled0);
        assert_eq!(level1.cell_size().width, scaled0.width * 2.0);

        assert_eq!(pyramid.pixel_radius_to_level(3.0), 1);
        assert_eq!(pyramid.pixel_radius_to_level(0.5), 0);
        assert_eq!(pyramid.pixel_radius_to_level(0.0), 0);
        assert_eq!(pyramid.pixel_radius_to_level(f64::NAN), 0);
        assert_eq!(pyramid.pixel_radius_to_level(f64::INFINITY), MAX_LEVEL);
        assert_eq!(pyramid.level_to_pixel_radius(3), 8.0);
    }

    #[test]
    fn other_scales() {
        let pyramid = BoundlessRegionPyramid::<u32>::new(Size::new(100.0, 50.0), 4.0);
        assert_eq!(pyramid.pixel_radius_to_level(15.0), 1);
        assert_eq!(pyramid.pixel_radius_to_level(17.0), 2);

        let pyramid = BoundlessRegionPyramid::<u32>::new(Size::new(-100.0, 0.0), 1.0);
        assert_eq!(pyramid.power_scale(), DEFAULT_POWER_SCALE);
        assert_eq!(pyramid.cell_dimensions(), Size::new(100.0, 1.0));
    }

    #[test]
    fn sub_grids_cover_the_view() {
        let mut pyramid = BoundlessRegionPyramid::<String>::new(Size::new(100.0, 100.0), 2.0);
        let visible = Rect::new(512.0, 512.0, 512.0 + 64.0, 512.0 + 257.0);

        assert_covers(pyramid.level_for_pixel_radius(radius_for_level(0)), &visible);
        let level1 = pyramid.level_for_pixel_radius(radius_for_level(1));
        assert_eq!(
            level1.range_for_rect(&visible),
            CellRange {
                min_x: 2,
                max_x: 3,
                min_y: 2,
                max_y: 4,
            }
        );
        assert_covers(level1, &visible);

        // Cells on the negative side of the origin.
        let level0 = pyramid.level_mut(0);
        let range = level0.range_for_rect(&Rect::new(-150.0, -50.0, -10.0, 10.0));
        assert_eq!(
            range,
            CellRange {
                min_x: -2,
                max_x: 0,
                min_y: -1,
                max_y: 1,
            }
        );
        assert_eq!(level0.cell_bounds(-2, -1), Rect::new(-200.0, -100.0, -100.0, 0.0));
    }

    #[test]
    fn cells() {
        let mut pyramid = BoundlessRegionPyramid::new(Size::new(10.0, 10.0), 2.0);
        let found = pyramid.cells_for_region(1, &Rect::new(-5.0, 0.0, 25.0, 10.0), |x, y| {
            format!("{x},{y}")
        });
        let names: Vec<_> = found.into_iter().map(|(_, s)| s.clone()).collect();
        assert_eq!(names, vec!["-1,0", "0,0", "1,0"]);

        let level = pyramid.level_mut(1);
        assert_eq!(level.len(), 3);
        assert_eq!(level.cell(0, 0).map(|s| s.as_str()), Some("0,0"));
        assert_eq!(level.insert_cell(0, 0, "zero".to_owned()), Some("0,0".to_owned()));
        level.get_or_insert_with(5, 5, || "far".to_owned()).push('!');
        if let Some(s) = level.cell_mut(-1, 0) {
            s.push('?');
        }
        assert_eq!(
            level.query_rect(&Rect::new(100.0, 100.0, 101.0, 101.0)),
            vec!["far!".to_owned()]
        );
        assert_eq!(
            level.query_rect(&Rect::new(-1.0, 1.0, 0.0, 2.0)),
            vec!["-1,0?".to_owned(), "zero".to_owned()]
        );
        assert_eq!(level.remove_cell(5, 5), Some("far!".to_owned()));
        assert!(pyramid.get_level(0).is_none());
        assert!(pyramid.get_level(1).is_some());
    }
}
