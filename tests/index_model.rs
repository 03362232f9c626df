//! Model tests: each index is driven by a random sequence of operations and
//! compared against a brute-force model after every step.

use std::collections::HashMap;

use arbitrary::Unstructured;
use gridgeom::{BoxIndex, LineIndex, Point, PointIndex, RegionPyramid, Segment, SpatialIndex};
use kurbo::{Rect, Size};

// Coordinates on a coarse grid, so that ties and coincidences are common.
fn coord(u: &mut Unstructured<'_>) -> arbitrary::Result<f64> {
    Ok(u.int_in_range(-40..=40i32)? as f64 / 4.0)
}

fn point(u: &mut Unstructured<'_>) -> arbitrary::Result<Point> {
    Ok(Point::new(coord(u)?, coord(u)?))
}

fn rect(u: &mut Unstructured<'_>) -> arbitrary::Result<Rect> {
    Ok(Rect::new(coord(u)?, coord(u)?, coord(u)?, coord(u)?))
}

fn overlaps(a: &Rect, b: &Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

fn sorted<T: Ord>(mut v: Vec<T>) -> Vec<T> {
    v.sort();
    v
}

#[test]
fn point_index_model() {
    arbtest::arbtest(|u| {
        let mut index = PointIndex::default();
        let mut model: HashMap<u8, Point> = HashMap::new();
        let steps = u.int_in_range(0..=200)?;
        for _ in 0..steps {
            let key = u.int_in_range(0..=31u8)?;
            match u.int_in_range(0..=4)? {
                0 | 1 => {
                    let p = point(u)?;
                    assert_eq!(index.try_add(p, key), !model.contains_key(&key));
                    model.entry(key).or_insert(p);
                }
                2 => {
                    let p = point(u)?;
                    assert_eq!(index.update(key, p), model.contains_key(&key));
                    if let Some(old) = model.get_mut(&key) {
                        *old = p;
                    }
                }
                3 => {
                    assert_eq!(index.try_remove(&key).map(|(p, _)| p), model.remove(&key));
                }
                _ => {
                    let q = point(u)?;
                    let best = model.values().map(|p| p.distance(&q)).min_by(f64::total_cmp);
                    assert_eq!(index.find_nearest(q).map(|n| n.distance), best);

                    let r = rect(u)?.abs();
                    let expected: Vec<u8> = model
                        .iter()
                        .filter(|(_, p)| r.x0 <= p.x && p.x <= r.x1 && r.y0 <= p.y && p.y <= r.y1)
                        .map(|(k, _)| *k)
                        .collect();
                    assert_eq!(sorted(index.query_rect(&r)), sorted(expected));
                }
            }
            index.check_invariants();
            assert_eq!(index.len(), model.len());
        }
        Ok(())
    });
}

#[test]
fn box_index_model() {
    arbtest::arbtest(|u| {
        let mut index = BoxIndex::new();
        let mut model: HashMap<u8, Rect> = HashMap::new();
        let steps = u.int_in_range(0..=200)?;
        for _ in 0..steps {
            let key = u.int_in_range(0..=63u8)?;
            match u.int_in_range(0..=4)? {
                0 | 1 => {
                    let r = rect(u)?;
                    assert_eq!(index.try_add(r, key), !model.contains_key(&key));
                    model.entry(key).or_insert(r.abs());
                }
                2 => {
                    let r = rect(u)?;
                    assert_eq!(index.update(key, r), model.contains_key(&key));
                    if let Some(old) = model.get_mut(&key) {
                        *old = r.abs();
                    }
                }
                3 => {
                    assert_eq!(index.delete(&key).map(|(r, _)| r), model.remove(&key));
                }
                _ => {
                    let q = rect(u)?.abs();
                    let expected: Vec<u8> = model
                        .iter()
                        .filter(|(_, r)| overlaps(r, &q))
                        .map(|(k, _)| *k)
                        .collect();
                    assert_eq!(sorted(index.intersects(&q)), sorted(expected));
                }
            }
            index.check_invariants();
            assert_eq!(index.len(), model.len());
        }
        Ok(())
    });
}

#[test]
fn line_index_model() {
    arbtest::arbtest(|u| {
        let mut index = LineIndex::new(Rect::new(-5.0, -5.0, 5.0, 5.0), u.int_in_range(0..=64)?);
        let mut model: HashMap<u8, Segment> = HashMap::new();
        let steps = u.int_in_range(0..=100)?;
        for _ in 0..steps {
            let key = u.int_in_range(0..=15u8)?;
            match u.int_in_range(0..=3)? {
                0 | 1 => {
                    let s = Segment::new(point(u)?, point(u)?);
                    let fresh = !model.contains_key(&key) && !model.values().any(|t| *t == s);
                    assert_eq!(index.try_add(s, key), fresh);
                    if fresh {
                        model.insert(key, s);
                    }
                }
                2 => {
                    assert_eq!(index.remove_value(&key), model.remove(&key));
                }
                _ => {
                    let q = point(u)?;
                    let best = model
                        .values()
                        .map(|s| s.distance_to_point(&q))
                        .min_by(f64::total_cmp);
                    let found = index.get_nearest(q).map(|n| n.distance);
                    match (found, best) {
                        (Some(found), Some(best)) => assert!((found - best).abs() <= 1e-9),
                        (found, best) => assert_eq!(found, best),
                    }
                }
            }
            index.check_invariants();
            assert_eq!(index.len(), model.len());
        }
        Ok(())
    });
}

#[test]
fn pyramid_levels_cover_the_bounds() {
    arbtest::arbtest(|u| {
        let w = u.int_in_range(1..=1000u32)? as f64;
        let h = u.int_in_range(1..=1000u32)? as f64;
        let base = Size::new(
            u.int_in_range(1..=256u32)? as f64,
            u.int_in_range(1..=256u32)? as f64,
        );
        let mut pyramid: RegionPyramid<u32> = RegionPyramid::new(Rect::new(0.0, 0.0, w, h), base);

        let screen = Size::new(
            u.int_in_range(1..=4000u32)? as f64,
            u.int_in_range(1..=4000u32)? as f64,
        );
        let target = u.int_in_range(1..=16u32)? as f64;
        let level = pyramid.get_level_for_screen_bounds(screen, target);
        let per_pixel = if screen.width > screen.height {
            w / screen.width
        } else {
            h / screen.height
        };
        assert!(per_pixel / 2f64.powi(level as i32) <= target);
        if level > 0 {
            assert!(per_pixel / 2f64.powi(level as i32 - 1) > target);
        }

        let shown = Size::new(
            u.int_in_range(1..=2000u32)? as f64,
            u.int_in_range(1..=2000u32)? as f64,
        );
        let level = pyramid.get_level_for_volume_bounds(&Rect::from_origin_size((0.0, 0.0), shown));
        let (extent, shown) = if shown.width > shown.height {
            (w, shown.width)
        } else {
            (h, shown.height)
        };
        assert!(extent / 2f64.powi(level as i32 + 1) < shown);
        if level > 0 {
            assert!(extent / 2f64.powi(level as i32) >= shown);
        }

        let level = u.int_in_range(0..=6u32)?;
        let grid = pyramid.level(level).grid_size();
        let cell = pyramid.level(level).cell_size();
        assert!(grid.0 as f64 * cell.width >= w && grid.1 as f64 * cell.height >= h);

        let whole = pyramid.sub_grid_for_region(level, &Rect::new(0.0, 0.0, w, h));
        assert_eq!(whole.cell_count(), grid.0 * grid.1);
        Ok(())
    });
}
