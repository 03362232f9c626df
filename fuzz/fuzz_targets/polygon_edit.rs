#![no_main]

use arbitrary::Unstructured;

use gridgeom::arbitrary::{star_polygon, PolygonEdit};
use libfuzzer_sys::fuzz_target;

fn arbitrary_edits(mut u: Unstructured) -> Result<(), arbitrary::Error> {
    let mut poly = star_polygon(50.0, &mut u)?;
    let len = u.arbitrary_len::<u64>()?;
    for _ in 0..len {
        let edit = PolygonEdit::arbitrary(50.0, &mut u)?;
        let before = poly.clone();
        if !edit.apply(&mut poly) {
            assert_eq!(poly, before, "failed edit {edit:?} changed the polygon");
        }
        poly.check_invariants();
    }
    Ok(())
}

fuzz_target!(|data: &[u8]| {
    let u = Unstructured::new(data);
    let _ = arbitrary_edits(u);
});
