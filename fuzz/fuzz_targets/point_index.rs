#![no_main]

use std::collections::HashMap;

use arbitrary::Unstructured;

use gridgeom::{arbitrary::point, Point, PointIndex};
use libfuzzer_sys::fuzz_target;

#[derive(Debug)]
enum Op {
    Add { key: u8, point: Point },
    Update { key: u8, point: Point },
    Remove { key: u8 },
    Nearest { point: Point, k: usize },
}

impl Op {
    fn arbitrary(u: &mut Unstructured<'_>) -> Result<Self, arbitrary::Error> {
        Ok(match u.int_in_range(0..=3)? {
            0 => Op::Add {
                key: u.arbitrary()?,
                point: point(100.0, u)?,
            },
            1 => Op::Update {
                key: u.arbitrary()?,
                point: point(100.0, u)?,
            },
            2 => Op::Remove { key: u.arbitrary()? },
            _ => Op::Nearest {
                point: point(150.0, u)?,
                k: u.int_in_range(1..=8)?,
            },
        })
    }
}

fn arbitrary_ops(mut u: Unstructured) -> Result<(), arbitrary::Error> {
    let len = u.arbitrary_len::<u64>()?;
    let mut model = HashMap::new();
    let mut index = PointIndex::default();
    for _ in 0..len {
        match Op::arbitrary(&mut u)? {
            Op::Add { key, point } => {
                let added = index.try_add(point, key);
                assert_eq!(added, !model.contains_key(&key));
                model.entry(key).or_insert(point);
            }
            Op::Update { key, point } => {
                assert_eq!(index.update(key, point), model.contains_key(&key));
                if let Some(p) = model.get_mut(&key) {
                    *p = point;
                }
            }
            Op::Remove { key } => {
                let removed = index.try_remove(&key).map(|(p, _)| p);
                assert_eq!(removed, model.remove(&key));
            }
            Op::Nearest { point, k } => {
                let mut dists: Vec<f64> = model.values().map(|q| q.distance(&point)).collect();
                dists.sort_by(f64::total_cmp);
                dists.truncate(k);
                let found: Vec<f64> = index
                    .find_nearest_points(point, k)
                    .iter()
                    .map(|n| n.distance)
                    .collect();
                assert_eq!(found, dists);
            }
        }
        index.check_invariants();
        assert_eq!(index.len(), model.len());
    }
    Ok(())
}

fuzz_target!(|data: &[u8]| {
    let u = Unstructured::new(data);
    let _ = arbitrary_ops(u);
});
