#![no_main]

use std::collections::HashMap;

use arbitrary::Unstructured;

use gridgeom::{arbitrary::rect, BoxIndex};
use kurbo::Rect;
use libfuzzer_sys::fuzz_target;

fn overlaps(a: &Rect, b: &Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

fn arbitrary_ops(mut u: Unstructured) -> Result<(), arbitrary::Error> {
    let len = u.arbitrary_len::<u64>()?;
    let mut model: HashMap<u8, Rect> = HashMap::new();
    let mut index = BoxIndex::new();
    for _ in 0..len {
        let key: u8 = u.arbitrary()?;
        match u.int_in_range(0..=3)? {
            0 => {
                let r = rect(100.0, &mut u)?;
                assert_eq!(index.try_add(r, key), !model.contains_key(&key));
                model.entry(key).or_insert(r.abs());
            }
            1 => {
                let r = rect(100.0, &mut u)?;
                assert_eq!(index.update(key, r), model.contains_key(&key));
                if let Some(old) = model.get_mut(&key) {
                    *old = r.abs();
                }
            }
            2 => {
                assert_eq!(index.delete(&key).map(|(r, _)| r), model.remove(&key));
            }
            _ => {
                let query = rect(120.0, &mut u)?.abs();
                let mut found = index.intersects(&query);
                found.sort();
                let mut expected: Vec<u8> = model
                    .iter()
                    .filter(|(_, r)| overlaps(r, &query))
                    .map(|(k, _)| *k)
                    .collect();
                expected.sort();
                assert_eq!(found, expected);
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
