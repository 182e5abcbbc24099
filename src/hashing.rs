//! Key mixing, slot derivation and the seed generator used by construction.
//!
//! Every key maps to three slots lying in three consecutive segments out of
//! [`TOTAL_SEGMENTS`]. The first segment is picked among [`SEGMENT_COUNT`],
//! so the array carries `ARITY - 1` extra segments at the end.

/// Number of segments the first slot of a key can fall in.
pub(crate) const SEGMENT_COUNT: u64 = 100;
/// Number of slots each key maps to.
pub(crate) const ARITY: u64 = 3;
/// Segments backing the fingerprint array.
pub(crate) const TOTAL_SEGMENTS: u64 = SEGMENT_COUNT + ARITY - 1;

/// Murmur3 64-bit finalizer.
#[inline]
pub(crate) fn murmur64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

/// Mixes `key` with the filter `seed`.
#[inline]
pub(crate) fn mix_split(key: u64, seed: u64) -> u64 {
    murmur64(key.wrapping_add(seed))
}

/// Maps `hash` uniformly into `0..n` without a division.
#[inline]
pub(crate) fn reduce(hash: u32, n: u32) -> u32 {
    ((hash as u64 * n as u64) >> 32) as u32
}

/// The three slot indices of a key, `h0 < h1 < h2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slots {
    pub h0: usize,
    pub h1: usize,
    pub h2: usize,
}

impl Slots {
    /// Recomputes the slots of an already mixed hash.
    #[inline]
    pub(crate) fn from_hash(hash: u64, segment_length: u32) -> Self {
        let r0 = hash as u32;
        let r1 = hash.rotate_left(21) as u32;
        let r2 = hash.rotate_left(42) as u32;
        let r3 = (hash.wrapping_mul(0xBF58_476D_1CE4_E5B9) >> 32) as u32;
        let segment = reduce(r0, SEGMENT_COUNT as u32) as usize;
        let len = segment_length as usize;
        Slots {
            h0: segment * len + reduce(r1, segment_length) as usize,
            h1: (segment + 1) * len + reduce(r2, segment_length) as usize,
            h2: (segment + 2) * len + reduce(r3, segment_length) as usize,
        }
    }

    #[inline]
    pub(crate) fn as_array(&self) -> [usize; 3] {
        [self.h0, self.h1, self.h2]
    }
}

/// Mixes `key` with `seed` and derives its slots.
///
/// Returns the mixed hash (the fingerprint source) together with the slots.
#[inline]
pub(crate) fn derive_hashes(key: u64, seed: u64, segment_length: u32) -> (u64, Slots) {
    let hash = mix_split(key, seed);
    (hash, Slots::from_hash(hash, segment_length))
}

/// Counter based splitmix64 generator used to draw per-attempt seeds.
///
/// Two generators created from the same counter yield the same sequence, which
/// makes construction reproducible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitMix64 {
    counter: u64,
}

impl SplitMix64 {
    /// Creates a generator starting at `counter`.
    pub fn new(counter: u64) -> Self {
        Self { counter }
    }

    /// Advances the counter and returns the next value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.counter = self.counter.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.counter;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn murmur64_known_values() {
        assert_eq!(murmur64(0), 0);
        assert_ne!(murmur64(1), murmur64(2));
        assert_eq!(mix_split(5, 0), murmur64(5));
        assert_eq!(mix_split(u64::MAX, 1), murmur64(0));
    }

    #[test]
    fn reduce_range() {
        assert_eq!(reduce(0, 100), 0);
        assert_eq!(reduce(u32::MAX, 100), 99);
        assert_eq!(reduce(u32::MAX / 2, 100), 49);
        assert_eq!(reduce(u32::MAX, 1), 0);
        for n in [1u32, 3, 7, 100, 11153, u32::MAX] {
            for h in [0u32, 1, 12345, 0x8000_0000, u32::MAX] {
                assert!(reduce(h, n) < n);
            }
        }
    }

    #[test]
    fn slots_are_ordered_in_adjacent_segments() {
        let segment_length = 11153u32;
        let len = segment_length as usize;
        let mut rng = SplitMix64::new(7);
        for _ in 0..10_000 {
            let hash = rng.next_u64();
            let s = Slots::from_hash(hash, segment_length);
            assert!(s.h0 < s.h1 && s.h1 < s.h2, "{s:?}");
            let segment = s.h0 / len;
            assert!(segment < SEGMENT_COUNT as usize);
            assert_eq!(s.h1 / len, segment + 1);
            assert_eq!(s.h2 / len, segment + 2);
            assert!(s.h2 < TOTAL_SEGMENTS as usize * len);
        }
    }

    #[test]
    fn derive_hashes_matches_from_hash() {
        let (hash, slots) = derive_hashes(42, 99, 1000);
        assert_eq!(hash, mix_split(42, 99));
        assert_eq!(slots, Slots::from_hash(hash, 1000));
        assert_eq!(slots.as_array(), [slots.h0, slots.h1, slots.h2]);
    }

    #[test]
    fn splitmix64_sequence() {
        // Reference values for a counter starting at 0.
        let mut rng = SplitMix64::new(0);
        assert_eq!(rng.next_u64(), 0xE220_A839_7B1D_CDAF);
        assert_eq!(rng.next_u64(), 0x6E78_9E6A_A1B9_65F4);
        assert_eq!(rng.next_u64(), 0x06C4_5D18_8009_454F);

        let mut a = SplitMix64::new(1);
        let mut b = SplitMix64::new(1);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
        assert_ne!(SplitMix64::new(1).next_u64(), SplitMix64::new(2).next_u64());
    }
}
