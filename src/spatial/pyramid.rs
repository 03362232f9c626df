//! A stack of ever-finer grids over a fixed region.
//!
//! Level 0 divides the region into cells of the base dimensions. Each level
//! below it halves the cell width and height, so level `l` has `2^l` times as
//! many cells along each axis. A viewer that shows some part of the region on screen picks the
//! level whose cells are about the right size to be worth loading, and then
//! asks for the cells under the visible rectangle.
//!
//! | Region | Screen | Pixel covers | Level | Cell size |
//! |--------|--------|--------------|-------|-----------|
//! | 1024   | 128    | 8            | 0     | 1024      |
//! | 1024   | 128    | 4            | 1     | 512       |
//! | 1024   | 128    | 2            | 2     | 256       |
//! | 1024   | 128    | 1            | 3     | 128       |

use std::collections::HashMap;

use kurbo::{Rect, Size};

use crate::{geom::rects_overlap, Point};

use super::SpatialIndex;

/// The finest level a pyramid will create.
pub const MAX_LEVEL: u32 = 30;

/// A rectangle of cells in one level of a pyramid.
///
/// The minimums are inclusive and the maximums are exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct GridRange {
    /// The first column.
    pub min_x: usize,
    /// One past the last column.
    pub max_x: usize,
    /// The first row.
    pub min_y: usize,
    /// One past the last row.
    pub max_y: usize,
}

impl GridRange {
    /// The number of columns.
    pub fn width(&self) -> usize {
        self.max_x.saturating_sub(self.min_x)
    }

    /// The number of rows.
    pub fn height(&self) -> usize {
        self.max_y.saturating_sub(self.min_y)
    }

    /// The number of cells.
    pub fn cell_count(&self) -> usize {
        self.width() * self.height()
    }

    /// Are there no cells in this range?
    pub fn is_empty(&self) -> bool {
        self.cell_count() == 0
    }

    /// Is the cell `(x, y)` in this range?
    pub fn contains(&self, x: usize, y: usize) -> bool {
        (self.min_x..self.max_x).contains(&x) && (self.min_y..self.max_y).contains(&y)
    }

    /// The cells of this range, row by row.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> {
        let GridRange {
            min_x,
            max_x,
            min_y,
            max_y,
        } = *self;
        (min_y..max_y).flat_map(move |y| (min_x..max_x).map(move |x| (x, y)))
    }
}

// The cells of size `cell` (relative to `origin`) covering `rect`, cropped to
// a grid of the given size.
fn grid_range(origin: Point, cell: Size, grid: (usize, usize), rect: &Rect) -> GridRange {
    let rect = rect.abs();
    let index = |v: f64, origin: f64, extent: f64, round: fn(f64) -> f64, max: usize| {
        let i = round((v - origin) / extent);
        if i > 0.0 {
            (i as usize).min(max)
        } else {
            0
        }
    };
    GridRange {
        min_x: index(rect.x0, origin.x, cell.width, f64::floor, grid.0),
        max_x: index(rect.x1, origin.x, cell.width, f64::ceil, grid.0),
        min_y: index(rect.y0, origin.y, cell.height, f64::floor, grid.1),
        max_y: index(rect.y1, origin.y, cell.height, f64::ceil, grid.1),
    }
}

// The dimensions of the cells at `level`, given those at level 0.
fn cell_size_for_level(base: Size, level: u32) -> Size {
    let scale = 2.0f64.powi(level as i32);
    Size::new(base.width / scale, base.height / scale)
}

/// One level of a [`RegionPyramid`]: a grid of cells, only some of which
/// have been filled in.
#[derive(Clone, Debug)]
pub struct PyramidLevel<T> {
    level: u32,
    origin: Point,
    cell_size: Size,
    grid_size: (usize, usize),
    cells: HashMap<(usize, usize), T>,
}

impl<T> PyramidLevel<T> {
    fn new(level: u32, bounds: &Rect, base: Size) -> Self {
        let cell_size = cell_size_for_level(base, level);
        let dim = |extent: f64, cell: f64| ((extent / cell).ceil() as usize).max(1);
        PyramidLevel {
            level,
            origin: Point::new(bounds.x0, bounds.y0),
            cell_size,
            grid_size: (
                dim(bounds.width(), cell_size.width),
                dim(bounds.height(), cell_size.height),
            ),
            cells: HashMap::new(),
        }
    }

    /// Which level this is; 0 is the coarsest.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// The width and height of each cell.
    pub fn cell_size(&self) -> Size {
        self.cell_size
    }

    /// The number of columns and rows.
    pub fn grid_size(&self) -> (usize, usize) {
        self.grid_size
    }

    /// The region covered by the cell `(x, y)`.
    pub fn cell_bounds(&self, x: usize, y: usize) -> Rect {
        let x0 = self.origin.x + x as f64 * self.cell_size.width;
        let y0 = self.origin.y + y as f64 * self.cell_size.height;
        Rect::new(
            x0,
            y0,
            x0 + self.cell_size.width,
            y0 + self.cell_size.height,
        )
    }

    /// The cells covering `rect`.
    pub fn range_for_rect(&self, rect: &Rect) -> GridRange {
        grid_range(self.origin, self.cell_size, self.grid_size, rect)
    }

    /// The contents of a cell, if it has been filled in.
    pub fn cell(&self, x: usize, y: usize) -> Option<&T> {
        self.cells.get(&(x, y))
    }

    /// The contents of a cell, if it has been filled in.
    pub fn cell_mut(&mut self, x: usize, y: usize) -> Option<&mut T> {
        self.cells.get_mut(&(x, y))
    }

    /// The contents of a cell, filling it in with `f` if it is empty.
    ///
    /// Returns `None` if the cell is outside the grid.
    pub fn get_or_insert_with(
        &mut self,
        x: usize,
        y: usize,
        f: impl FnOnce() -> T,
    ) -> Option<&mut T> {
        if x >= self.grid_size.0 || y >= self.grid_size.1 {
            return None;
        }
        Some(self.cells.entry((x, y)).or_insert_with(f))
    }

    /// The filled-in cells of `range`, row by row.
    pub fn cells_in(&self, range: &GridRange) -> Vec<((usize, usize), &T)> {
        range
            .iter()
            .filter_map(|c| self.cells.get(&c).map(|t| (c, t)))
            .collect()
    }

    /// Empties a cell, returning what was in it.
    pub fn remove_cell(&mut self, x: usize, y: usize) -> Option<T> {
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

impl<T: Clone> SpatialIndex<T> for PyramidLevel<T> {
    fn len(&self) -> usize {
        self.cells.len()
    }

    fn query_rect(&self, rect: &Rect) -> Vec<T> {
        // Widened by a cell, to pick up the cells that only touch `rect`.
        let r = self.range_for_rect(rect);
        let range = GridRange {
            min_x: r.min_x.saturating_sub(1),
            max_x: (r.max_x + 1).min(self.grid_size.0),
            min_y: r.min_y.saturating_sub(1),
            max_y: (r.max_y + 1).min(self.grid_size.1),
        };
        self.cells_in(&range)
            .into_iter()
            .filter(|((x, y), _)| rects_overlap(&self.cell_bounds(*x, *y), rect))
            .map(|(_, t)| t.clone())
            .collect()
    }
}

/// A region divided into grids of cells at every power-of-two resolution.
///
/// Levels are created the first time they are asked for.
#[derive(Clone, Debug)]
pub struct RegionPyramid<T> {
    bounds: Rect,
    cell_dimensions: Size,
    levels: HashMap<u32, PyramidLevel<T>>,
}

impl<T> RegionPyramid<T> {
    /// Creates a pyramid over `bounds` whose coarsest cells have the size
    /// `cell_dimensions`.
    ///
    /// A cell dimension that isn't positive and finite falls back to the
    /// extent of the bounds along that axis, so that level 0 is a single row
    /// or column.
    pub fn new(bounds: Rect, cell_dimensions: Size) -> Self {
        let bounds = bounds.abs();
        let pick = |cell: f64, extent: f64| {
            if cell.is_finite() && cell.abs() > 0.0 {
                cell.abs()
            } else if extent.is_finite() && extent > 0.0 {
                extent
            } else {
                1.0
            }
        };
        RegionPyramid {
            bounds,
            cell_dimensions: Size::new(
                pick(cell_dimensions.width, bounds.width()),
                pick(cell_dimensions.height, bounds.height()),
            ),
            levels: HashMap::new(),
        }
    }

    /// The region the pyramid covers.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// The size of the cells at level 0.
    pub fn cell_dimensions(&self) -> Size {
        self.cell_dimensions
    }

    /// The size of the cells at `level`.
    pub fn cell_dimensions_for_level(&self, level: u32) -> Size {
        cell_size_for_level(self.cell_dimensions, level.min(MAX_LEVEL))
    }

    /// A level, if it has been created.
    pub fn get_level(&self, level: u32) -> Option<&PyramidLevel<T>> {
        self.levels.get(&level.min(MAX_LEVEL))
    }

    /// A level, created if necessary. Levels past [`MAX_LEVEL`] are clamped.
    pub fn level(&mut self, level: u32) -> &PyramidLevel<T> {
        self.level_mut(level)
    }

    /// A level, created if necessary. Levels past [`MAX_LEVEL`] are clamped.
    pub fn level_mut(&mut self, level: u32) -> &mut PyramidLevel<T> {
        let level = level.min(MAX_LEVEL);
        let bounds = self.bounds;
        let base = self.cell_dimensions;
        self.levels.entry(level).or_insert_with(|| {
            tracing::trace!(level, "creating pyramid level");
            PyramidLevel::new(level, &bounds, base)
        })
    }

    // The extent of the bounds along the longer side of `size`, and the
    // extent of `size` along that side. A square uses the heights.
    fn longer_side(&self, size: Size) -> (f64, f64) {
        if size.width > size.height {
            (self.bounds.width(), size.width)
        } else {
            (self.bounds.height(), size.height)
        }
    }

    /// The coarsest level at which the whole region, drawn on a screen of size
    /// `screen`, would have at most `target` world units per pixel.
    ///
    /// The comparison is made along the screen's longer side (its height, if
    /// the screen is square).
    pub fn get_level_for_screen_bounds(&self, screen: Size, target: f64) -> u32 {
        let (extent, pixels) = self.longer_side(screen);
        if !(pixels > 0.0) || !(target > 0.0) {
            return 0;
        }

        let mut per_pixel = extent / pixels;
        let mut level = 0;
        while per_pixel > target && level < MAX_LEVEL {
            per_pixel /= 2.0;
            level += 1;
        }
        level
    }

    /// The level to use when `visible` is the part of the region on screen.
    ///
    /// This is `floor(log2(region / visible))` along the visible rectangle's
    /// longer side, so a viewer that shows a quarter of the region's height
    /// gets level 2. Views at least as large as the region, and empty views,
    /// get level 0.
    pub fn get_level_for_volume_bounds(&self, visible: &Rect) -> u32 {
        let visible = visible.abs();
        let (extent, shown) = self.longer_side(visible.size());
        if !(shown > 0.0) {
            return 0;
        }
        let level = (extent / shown).log2().floor();
        if level > 0.0 {
            (level as u32).min(MAX_LEVEL)
        } else {
            0
        }
    }

    /// The size, in world units, of one pixel of a screen of size `screen`
    /// that shows the whole region at `level`.
    ///
    /// This is the smallest radius worth drawing at that level. It is infinite
    /// for an empty screen.
    pub fn min_radius_for_level(&self, screen: Size, level: u32) -> f64 {
        let (extent, pixels) = self.longer_side(screen);
        extent / pixels / 2.0f64.powi(level.min(MAX_LEVEL) as i32)
    }

    /// The cells of `level` covering `rect`, cropped to the grid.
    pub fn sub_grid_for_region(&self, level: u32, rect: &Rect) -> GridRange {
        match self.get_level(level) {
            Some(l) => l.range_for_rect(rect),
            None => {
                let level = level.min(MAX_LEVEL);
                PyramidLevel::<()>::new(level, &self.bounds, self.cell_dimensions)
                    .range_for_rect(rect)
            }
        }
    }

    /// The cells of `level` covering `rect`, row by row. Empty cells are
    /// filled in with `f`, which gets the cell's coordinates.
    pub fn cells_for_region(
        &mut self,
        level: u32,
        rect: &Rect,
        mut f: impl FnMut(usize, usize) -> T,
    ) -> Vec<((usize, usize), &T)> {
        let level = self.level_mut(level);
        let range = level.range_for_rect(rect);
        for (x, y) in range.iter() {
            level.cells.entry((x, y)).or_insert_with(|| f(x, y));
        }
        let level = &*level;
        level.cells_in(&range)
    }
}
