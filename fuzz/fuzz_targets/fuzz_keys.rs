#![no_main]
use fusefilter::{Error, FilterOptions, Fingerprint, Fingerprint4, FuseFilter};
use libfuzzer_sys::arbitrary;
use libfuzzer_sys::arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    width: u8,
    rng_seed: u64,
    max_iterations: u8,
    keys: Vec<u64>,
}

fn check<F: Fingerprint>(keys: &[u64], options: FilterOptions) {
    match FuseFilter::<F>::build_with_options(keys, options) {
        Ok(f) => {
            f.validate(keys);
            for &k in keys {
                assert!(f.contains(k), "{k}");
            }
        }
        Err(Error::EmptyKeySet) => assert!(keys.is_empty()),
        Err(Error::ConstructionFailed) => (),
        Err(e) => panic!("unexpected error {e}"),
    }
}

fuzz_target!(|input: Input| {
    let Input {
        width,
        rng_seed,
        max_iterations,
        mut keys,
    } = input;
    keys.sort_unstable();
    keys.dedup();
    let options = FilterOptions::default()
        .with_rng_seed(rng_seed)
        .with_max_iterations(max_iterations.min(8) as u32);
    match width % 3 {
        0 => check::<Fingerprint4>(&keys, options),
        1 => check::<u8>(&keys, options),
        _ => check::<u16>(&keys, options),
    }
});
