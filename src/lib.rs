//! Approximate Membership Query Filter ([AMQ-Filter](https://en.wikipedia.org/wiki/Approximate_Membership_Query_Filter))
//! based on [fuse graphs](https://arxiv.org/abs/1907.04749), a segmented variant of the
//! [xor filter](https://arxiv.org/abs/1912.08258).
//!
//! A fuse filter is built once from a set of distinct 64-bit keys and is immutable afterwards.
//! It has no false negatives and a false positive rate of about `2^-W` for W-bit fingerprints,
//! while using close to the minimum space for that rate.
//!
//! ### Example
//!
//! ```rust
//! let keys: Vec<u64> = (0..500_000).collect();
//! let mut f = fusefilter::Fuse8::new(keys.len() as u64).unwrap();
//! f.populate(&keys).unwrap();
//! for k in &keys {
//!     assert!(f.contains(*k));
//! }
//! ```
//!
//! ### Keys
//!
//! Keys are plain `u64`s. Hashing arbitrary items down to 64 bits is left to the caller;
//! any good 64-bit hash will do as long as the resulting keys are distinct.
//! Construction retries with fresh seeds and fails with [`Error::ConstructionFailed`] when
//! every attempt fails, which in practice means the keys contained duplicates.
//!
//! ### Filter size
//!
//! The fingerprint array holds `size / 0.879` slots, so storage per key is:
//!
//! | Filter | Bits per key | False positive rate |
//! |:---:|:---:|:---:|
//! | [`Fuse4`] | 9.10 | 6.25e-02 |
//! | [`Fuse8`] | 9.10 | 3.91e-03 |
//! | [`Fuse16`] | 18.2 | 1.53e-05 |
//! | [`Fuse32`] | 36.4 | 2.33e-10 |
//!
//! [`Fuse4`] stores each 4-bit fingerprint in a full byte, trading space for a
//! simpler array layout.
//!
//! Fuse graphs only peel reliably over large key sets. Below a few hundred thousand
//! keys, construction is likely to exhaust its attempts and fail with
//! [`Error::ConstructionFailed`] even when the keys are distinct.
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

use std::mem;

use log::{debug, warn};
#[cfg(feature = "jsonschema")]
use schemars::JsonSchema;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod fingerprint;
mod hashing;
mod keys;

pub use fingerprint::{Fingerprint, Fingerprint4};
pub use hashing::SplitMix64;
pub use keys::{KeySource, RestartableIter, SliceKeys};

use hashing::{derive_hashes, Slots, TOTAL_SEGMENTS};

/// Target occupancy of the fingerprint array.
const FILL_FACTOR: f64 = 0.879;

/// Default bound on construction attempts.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;
/// Default starting counter of the seed generator.
pub const DEFAULT_RNG_SEED: u64 = 1;

/// Fuse filter with 4-bit fingerprints.
pub type Fuse4 = FuseFilter<Fingerprint4>;
/// Fuse filter with 8-bit fingerprints.
pub type Fuse8 = FuseFilter<u8>;
/// Fuse filter with 16-bit fingerprints.
pub type Fuse16 = FuseFilter<u16>;
/// Fuse filter with 32-bit fingerprints.
pub type Fuse32 = FuseFilter<u32>;

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Every construction attempt left keys unpeeled, the keys are likely not unique
    ConstructionFailed,
    /// The capacity hint is zero
    ZeroCapacity,
    /// Capacity is too large (segment length must fit in 32 bits)
    CapacityTooLarge,
    /// There are no keys to build the filter from
    EmptyKeySet,
    /// The key source yielded a different number of keys than it reported
    KeyCountMismatch,
    /// Storage or scratch memory could not be allocated
    AllocationFailed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for Error {}

/// Construction settings of a [`FuseFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "jsonschema", derive(JsonSchema))]
pub struct FilterOptions {
    /// Maximum number of seeds tried before giving up.
    pub max_iterations: u32,
    /// Starting counter of the [`SplitMix64`] seed generator.
    pub rng_seed: u64,
}

impl Default for FilterOptions {
    fn default() -> Self {
        FilterOptions {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            rng_seed: DEFAULT_RNG_SEED,
        }
    }
}

impl FilterOptions {
    /// Sets the maximum number of construction attempts.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the starting counter of the seed generator.
    pub fn with_rng_seed(mut self, rng_seed: u64) -> Self {
        self.rng_seed = rng_seed;
        self
    }
}

/// Approximate Membership Query Filter (AMQ-Filter) built by peeling a fuse graph.
///
/// Each key maps to three slots in three consecutive segments of the fingerprint array.
/// Construction assigns slot values so that the XOR of a key's three slots equals its
/// fingerprint; a query recomputes the slots and checks that equality.
///
/// The fingerprint width is chosen by `F`, see [`Fuse4`], [`Fuse8`], [`Fuse16`] and [`Fuse32`].
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "jsonschema", derive(JsonSchema))]
pub struct FuseFilter<F: Fingerprint> {
    #[cfg_attr(feature = "serde", serde(rename = "s"))]
    seed: u64,
    #[cfg_attr(feature = "serde", serde(rename = "l"))]
    segment_length: u64,
    #[cfg_attr(feature = "serde", serde(rename = "f"))]
    fingerprints: Vec<F>,
    #[cfg_attr(feature = "serde", serde(rename = "r"))]
    rng_seed: u64,
    #[cfg_attr(feature = "serde", serde(rename = "m"))]
    max_iterations: u32,
    #[cfg_attr(feature = "serde", serde(rename = "b"))]
    built: bool,
}

/// Per-slot peeling state.
#[derive(Debug, Clone, Copy, Default)]
struct SlotState {
    /// XOR of the hashes of the keys still claiming the slot.
    mask: u64,
    /// Number of keys still claiming the slot.
    count: u32,
}

#[derive(Debug, Clone, Copy)]
struct KeyIndex {
    hash: u64,
    index: usize,
}

fn try_filled<T: Clone>(len: usize, value: T) -> Result<Vec<T>, Error> {
    let mut v = try_with_capacity(len)?;
    v.resize(len, value);
    Ok(v)
}

fn try_with_capacity<T>(len: usize) -> Result<Vec<T>, Error> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| Error::AllocationFailed)?;
    Ok(v)
}

impl<F: Fingerprint> FuseFilter<F> {
    /// Creates an empty filter sized to hold `capacity` keys.
    ///
    /// The filter must be [populated](Self::populate) before it answers queries.
    ///
    /// Errors if capacity is 0 or if the resulting segment length doesn't fit in 32 bits.
    #[inline]
    pub fn new(capacity: u64) -> Result<Self, Error> {
        Self::with_options(capacity, FilterOptions::default())
    }

    /// Creates an empty filter sized to hold `capacity` keys with custom construction options.
    pub fn with_options(capacity: u64, options: FilterOptions) -> Result<Self, Error> {
        let segment_length = Self::plan_segment_length(capacity)?;
        let slots = segment_length
            .checked_mul(TOTAL_SEGMENTS)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or(Error::CapacityTooLarge)?;
        let fingerprints = try_filled(slots, F::default())?;
        Ok(Self {
            seed: 0,
            segment_length,
            fingerprints,
            rng_seed: options.rng_seed,
            max_iterations: options.max_iterations,
            built: false,
        })
    }

    /// Creates and populates a filter from `keys`.
    #[inline]
    pub fn build(keys: &[u64]) -> Result<Self, Error> {
        Self::build_with_options(keys, FilterOptions::default())
    }

    /// Creates and populates a filter from `keys` with custom construction options.
    pub fn build_with_options(keys: &[u64], options: FilterOptions) -> Result<Self, Error> {
        if keys.is_empty() {
            return Err(Error::EmptyKeySet);
        }
        let mut filter = Self::with_options(keys.len() as u64, options)?;
        filter.populate(keys)?;
        Ok(filter)
    }

    fn plan_segment_length(size: u64) -> Result<u64, Error> {
        if size == 0 {
            return Err(Error::ZeroCapacity);
        }
        // Slots for up to 87.9% occupancy, rounded down to whole segments.
        let capacity = (size as f64 / FILL_FACTOR) as u64;
        let segment_length = (capacity / TOTAL_SEGMENTS).max(1);
        if segment_length > u32::MAX as u64 {
            return Err(Error::CapacityTooLarge);
        }
        Ok(segment_length)
    }

    /// Builds the filter from the distinct `keys`, replacing any previous contents.
    ///
    /// Returns `Err(Error::ConstructionFailed)` if no seed out of `max_iterations` worked,
    /// which almost always means `keys` contains duplicates.
    /// On error the filter is left unbuilt and contains nothing.
    #[inline]
    pub fn populate(&mut self, keys: &[u64]) -> Result<(), Error> {
        self.populate_from(&mut SliceKeys::new(keys))
    }

    /// Builds the filter from a restartable key source, see [`KeySource`].
    ///
    /// Seeds are drawn from a fresh [`SplitMix64`] started at the configured `rng_seed`,
    /// so the same keys in the same order always produce the same filter.
    pub fn populate_from<K: KeySource + ?Sized>(&mut self, keys: &mut K) -> Result<(), Error> {
        let mut rng = SplitMix64::new(self.rng_seed);
        self.populate_with_rng(keys, &mut rng)
    }

    /// Builds the filter from a restartable key source, drawing seeds from `rng`.
    pub fn populate_with_rng<K: KeySource + ?Sized>(
        &mut self,
        keys: &mut K,
        rng: &mut SplitMix64,
    ) -> Result<(), Error> {
        self.built = false;
        let size = keys.len();
        if size == 0 {
            return Err(Error::EmptyKeySet);
        }
        let segment_length = self.segment_length as u32;
        let mut slots = try_filled(self.fingerprints.len(), SlotState::default())?;
        let mut queue = try_with_capacity::<KeyIndex>(self.fingerprints.len())?;
        let mut stack = try_with_capacity::<KeyIndex>(size)?;

        let mut attempt = 0;
        let seed = loop {
            if attempt == self.max_iterations {
                warn!(
                    "fuse filter construction over {size} keys failed after {attempt} attempts, keys are likely not unique"
                );
                return Err(Error::ConstructionFailed);
            }
            attempt += 1;
            let seed = rng.next_u64();
            slots.fill(SlotState::default());
            queue.clear();
            stack.clear();

            let mut seen = 0;
            while let Some(key) = keys.next_key() {
                let (hash, key_slots) = derive_hashes(key, seed, segment_length);
                for index in key_slots.as_array() {
                    let slot = &mut slots[index];
                    slot.mask ^= hash;
                    slot.count += 1;
                }
                seen += 1;
            }
            if seen != size {
                warn!("key source yielded {seen} keys but reported {size}");
                return Err(Error::KeyCountMismatch);
            }

            // A slot claimed by a single key holds that key's hash as its mask.
            for (index, slot) in slots.iter().enumerate() {
                if slot.count == 1 {
                    queue.push(KeyIndex {
                        hash: slot.mask,
                        index,
                    });
                }
            }

            while let Some(peeled) = queue.pop() {
                if slots[peeled.index].count == 0 {
                    // already peeled through another of its slots
                    continue;
                }
                stack.push(peeled);
                for index in Slots::from_hash(peeled.hash, segment_length).as_array() {
                    let slot = &mut slots[index];
                    slot.mask ^= peeled.hash;
                    slot.count -= 1;
                    if slot.count == 1 {
                        queue.push(KeyIndex {
                            hash: slot.mask,
                            index,
                        });
                    }
                }
            }

            if stack.len() == size {
                break seed;
            }
            debug!(
                "attempt {attempt} with seed {seed:#018x} left {} of {size} keys unpeeled",
                size - stack.len()
            );
        };

        // Assign in reverse peel order: when a key is reached, its two other
        // slots already hold their final values.
        self.fingerprints.fill(F::default());
        while let Some(peeled) = stack.pop() {
            let mut fingerprint = F::from_hash(peeled.hash);
            for index in Slots::from_hash(peeled.hash, segment_length).as_array() {
                if index != peeled.index {
                    fingerprint = fingerprint ^ self.fingerprints[index];
                }
            }
            self.fingerprints[peeled.index] = fingerprint;
        }
        self.seed = seed;
        self.built = true;
        debug!("built fuse filter over {size} keys in {attempt} attempt(s), seed {seed:#018x}");
        Ok(())
    }

    /// Returns whether `key` is present (probabilistically) in the filter.
    ///
    /// Keys the filter was built from always return `true`. A filter that is not
    /// built contains nothing.
    #[inline]
    pub fn contains(&self, key: u64) -> bool {
        if !self.built {
            return false;
        }
        let (hash, slots) = derive_hashes(key, self.seed, self.segment_length as u32);
        F::from_hash(hash)
            == self.fingerprints[slots.h0] ^ self.fingerprints[slots.h1] ^ self.fingerprints[slots.h2]
    }

    /// Memory footprint of the filter: the fingerprint array plus the fixed header.
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.fingerprints.len() * mem::size_of::<F>() + mem::size_of::<Self>()
    }

    /// Resets the filter to the unbuilt state, keeping its geometry.
    pub fn clear(&mut self) {
        self.fingerprints.fill(F::default());
        self.seed = 0;
        self.built = false;
    }

    /// Whether the last [`populate`](Self::populate) succeeded.
    #[inline]
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Seed of the current construction.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of slots in each segment.
    #[inline]
    pub fn segment_length(&self) -> u64 {
        self.segment_length
    }

    /// Number of fingerprint slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    /// Whether the filter has no slots. Never true for a constructed filter.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    /// The fingerprint array.
    #[inline]
    pub fn fingerprints(&self) -> &[F] {
        &self.fingerprints
    }

    /// The fingerprint size in bits.
    #[inline]
    pub fn fingerprint_size(&self) -> u32 {
        F::BITS
    }

    /// Expected false positive ratio for keys not in the set.
    pub fn false_positive_rate(&self) -> f64 {
        2f64.powi(-(F::BITS as i32))
    }

    /// Bits of fingerprint storage per key for a set of `keys` keys.
    pub fn bits_per_key(&self, keys: u64) -> f64 {
        (self.fingerprints.len() * mem::size_of::<F>() * 8) as f64 / keys as f64
    }

    /// Checks the XOR invariant for every key.
    #[doc(hidden)]
    #[cfg(any(fuzzing, test))]
    pub fn validate(&self, keys: &[u64]) {
        assert!(self.built, "filter is not built");
        for &key in keys {
            let (hash, slots) = derive_hashes(key, self.seed, self.segment_length as u32);
            let xor = slots
                .as_array()
                .iter()
                .fold(F::default(), |acc, &i| acc ^ self.fingerprints[i]);
            assert_eq!(F::from_hash(hash), xor, "key {key} seed {:#x}", self.seed);
        }
    }
}

impl<F: Fingerprint> std::fmt::Debug for FuseFilter<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuseFilter")
            .field("fingerprints", &"[..]")
            .field("fingerprint_size", &F::BITS)
            .field("seed", &self.seed)
            .field("segment_length", &self.segment_length)
            .field("max_iterations", &self.max_iterations)
            .field("built", &self.built)
            .finish()
    }
}

impl<F: Fingerprint> TryFrom<&[u64]> for FuseFilter<F> {
    type Error = Error;

    fn try_from(keys: &[u64]) -> Result<Self, Self::Error> {
        Self::build(keys)
    }
}

impl<F: Fingerprint> TryFrom<&Vec<u64>> for FuseFilter<F> {
    type Error = Error;

    fn try_from(keys: &Vec<u64>) -> Result<Self, Self::Error> {
        Self::build(keys)
    }
}

impl<F: Fingerprint> TryFrom<Vec<u64>> for FuseFilter<F> {
    type Error = Error;

    fn try_from(keys: Vec<u64>) -> Result<Self, Self::Error> {
        Self::build(&keys)
    }
}
