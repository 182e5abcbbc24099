use std::{fmt::Debug, ops::BitXor};

#[cfg(feature = "jsonschema")]
use schemars::JsonSchema;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A fixed-width fingerprint stored in each slot of a [`FuseFilter`](crate::FuseFilter).
///
/// Wider fingerprints lower the false positive rate (about `2^-BITS`) at the cost
/// of memory. Implemented for [`Fingerprint4`], `u8`, `u16` and `u32`.
pub trait Fingerprint:
    Copy + Default + Eq + Debug + BitXor<Output = Self> + Send + Sync + 'static
{
    /// Number of meaningful bits.
    const BITS: u32;

    /// Truncates a mixed key hash to its low `BITS` bits.
    fn from_hash(hash: u64) -> Self;
}

impl Fingerprint for u8 {
    const BITS: u32 = 8;

    #[inline]
    fn from_hash(hash: u64) -> Self {
        hash as u8
    }
}

impl Fingerprint for u16 {
    const BITS: u32 = 16;

    #[inline]
    fn from_hash(hash: u64) -> Self {
        hash as u16
    }
}

impl Fingerprint for u32 {
    const BITS: u32 = 32;

    #[inline]
    fn from_hash(hash: u64) -> Self {
        hash as u32
    }
}

/// A 4-bit fingerprint, stored one per byte.
///
/// The high nibble is always zero, which XOR preserves.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "jsonschema", derive(JsonSchema))]
pub struct Fingerprint4(u8);

impl Fingerprint4 {
    const MASK: u8 = 0x0F;

    /// The fingerprint value in `0..16`.
    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl From<u8> for Fingerprint4 {
    #[inline]
    fn from(value: u8) -> Self {
        Fingerprint4(value & Self::MASK)
    }
}

impl BitXor for Fingerprint4 {
    type Output = Self;

    #[inline]
    fn bitxor(self, rhs: Self) -> Self {
        Fingerprint4(self.0 ^ rhs.0)
    }
}

impl Fingerprint for Fingerprint4 {
    const BITS: u32 = 4;

    #[inline]
    fn from_hash(hash: u64) -> Self {
        Fingerprint4(hash as u8 & Self::MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_low_bits() {
        let hash = 0x0123_4567_89AB_CDEFu64;
        assert_eq!(u8::from_hash(hash), 0xEF);
        assert_eq!(u16::from_hash(hash), 0xCDEF);
        assert_eq!(u32::from_hash(hash), 0x89AB_CDEF);
        assert_eq!(Fingerprint4::from_hash(hash).get(), 0xF);
        assert_eq!(Fingerprint4::from_hash(0x10).get(), 0);
    }

    #[test]
    fn fingerprint4_stays_in_nibble() {
        for a in 0..=u8::MAX {
            for b in [0u8, 0x5, 0xA, 0xF, 0xFF] {
                let x = Fingerprint4::from(a) ^ Fingerprint4::from(b);
                assert!(x.get() <= 0xF, "{a} ^ {b} = {x:?}");
                assert_eq!(x.get(), (a ^ b) & 0xF);
            }
        }
    }

    #[test]
    fn storage_widths() {
        assert_eq!(std::mem::size_of::<Fingerprint4>(), 1);
        assert_eq!(std::mem::size_of::<u8>(), 1);
        assert_eq!(std::mem::size_of::<u16>(), 2);
        assert_eq!(<Fingerprint4 as Fingerprint>::BITS, 4);
        assert_eq!(<u16 as Fingerprint>::BITS, 16);
    }
}
