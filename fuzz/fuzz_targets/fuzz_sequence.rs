#![no_main]
use fusefilter::{Fuse8, RestartableIter};
use libfuzzer_sys::fuzz_target;

const MIN_KEYS: usize = 400_000;

// Large arithmetic sequences, big enough for construction to succeed.
fuzz_target!(|data: (u64, u64, u16)| {
    let (start, step, extra) = data;
    let step = step | 1;
    let count = MIN_KEYS + extra as usize;
    let keys = move || (0..count).map(move |i| start.wrapping_add((i as u64).wrapping_mul(step)));

    let mut f = Fuse8::new(count as u64).unwrap();
    f.populate_from(&mut RestartableIter::new(keys()))
        .expect("distinct keys must build");
    for k in keys() {
        assert!(f.contains(k), "{k}");
    }
});
