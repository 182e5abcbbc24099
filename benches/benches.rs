#![feature(test)]
extern crate test;

use fusefilter::*;
use test::Bencher;

const KEYS: u64 = 1_000_000;

#[bench]
fn bench_new(b: &mut Bencher) {
    b.iter(|| Fuse8::new(KEYS).unwrap());
}

#[bench]
fn bench_populate_fuse8(b: &mut Bencher) {
    let keys: Vec<u64> = (0..KEYS).collect();
    let mut f = Fuse8::new(KEYS).unwrap();
    b.iter(|| f.populate(&keys).unwrap());
}

#[bench]
fn bench_populate_fuse16(b: &mut Bencher) {
    let keys: Vec<u64> = (0..KEYS).collect();
    let mut f = Fuse16::new(KEYS).unwrap();
    b.iter(|| f.populate(&keys).unwrap());
}

#[bench]
fn bench_populate_from_iter(b: &mut Bencher) {
    let mut f = Fuse8::new(KEYS).unwrap();
    b.iter(|| {
        f.populate_from(&mut RestartableIter::new((0..KEYS as usize).map(|k| k as u64)))
            .unwrap()
    });
}

#[bench]
fn bench_get_ok(b: &mut Bencher) {
    let keys: Vec<u64> = (0..KEYS).collect();
    let f = Fuse8::build(&keys).unwrap();
    let mut i = 0;
    b.iter(|| {
        i = (i + 1) % KEYS;
        f.contains(i)
    })
}

#[bench]
fn bench_get_nok(b: &mut Bencher) {
    let keys: Vec<u64> = (0..KEYS).collect();
    let f = Fuse8::build(&keys).unwrap();
    let mut i = KEYS;
    b.iter(|| {
        i += 1;
        f.contains(i)
    })
}

#[bench]
fn bench_get_nok_fuse4(b: &mut Bencher) {
    let keys: Vec<u64> = (0..KEYS).collect();
    let f = Fuse4::build(&keys).unwrap();
    let mut i = KEYS;
    b.iter(|| {
        i += 1;
        f.contains(i)
    })
}
