//! 256-bit targets and the compact "nBits" difficulty encoding.
//!
//! The compact form is `[size (1 byte)][mantissa (3 bytes)]` with
//! `target = mantissa * 256^(size - 3)`. Bit 23 of the mantissa is a sign
//! flag; a negative or overflowing compact decodes to a zero target.

use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uint::construct_uint;

use crate::error::{PowError, PowResult};
use crate::fixed::{Fixed, Scale};

construct_uint! {
    /// Unsigned 256-bit integer.
    /// Consists of 4x64-bit words.
    pub struct U256(4);
}

construct_uint! {
    /// Unsigned 512-bit integer used for intermediate products.
    struct U512(8);
}

fn widen(value: U256) -> U512 {
    let mut words = [0u64; 8];
    words[..4].copy_from_slice(&value.0);
    U512(words)
}

fn narrow_saturating(value: U512) -> U256 {
    if value.0[4..].iter().any(|w| *w != 0) {
        U256::MAX
    } else {
        U256([value.0[0], value.0[1], value.0[2], value.0[3]])
    }
}

/// Bits used for the "difficulty 1" reference target.
const DIFFICULTY_ONE_BITS: u32 = 0x1d00ffff;

/// A 256-bit proof-of-work target. Larger is easier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target(U256);

impl Target {
    pub const ZERO: Target = Target(U256([0; 4]));
    pub const MAX: Target = Target(U256([u64::MAX; 4]));

    pub fn from_u256(value: U256) -> Self {
        Target(value)
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }

    /// Interpret a hash (internal byte order) as a 256-bit number.
    pub fn from_hash(hash: &[u8; 32]) -> Self {
        Target(U256::from_little_endian(hash))
    }

    /// Parse a 32-byte big-endian value.
    pub fn from_be_bytes(bytes: &[u8; 32]) -> Self {
        Target(U256::from_big_endian(bytes))
    }

    /// 32-byte big-endian form, the way targets are displayed.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0.to_big_endian()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Encode as compact bits. The result is normalized: decoding it gives
    /// this target truncated to a 3-byte mantissa.
    pub fn to_compact(&self) -> Compact {
        let mut size = (self.0.bits() as u32 + 7) / 8;
        let mut mantissa = if size <= 3 {
            (self.0.low_u64() << (8 * (3 - size))) as u32
        } else {
            (self.0 >> (8 * (size - 3)) as usize).low_u64() as u32
        };

        // Keep the sign bit clear by moving to a larger exponent
        if mantissa & 0x0080_0000 != 0 {
            mantissa >>= 8;
            size += 1;
        }

        Compact(mantissa | (size << 24))
    }

    /// `self * num / den` with a 512-bit intermediate, saturating at the
    /// largest 256-bit value.
    pub fn mul_div(&self, num: u64, den: u64) -> Target {
        assert!(den != 0, "division by zero target ratio");
        let product = widen(self.0) * U512::from(num);
        Target(narrow_saturating(product / U512::from(den)))
    }

    /// Multiply by a non-negative fixed-point factor.
    pub fn scale<S: Scale>(&self, factor: Fixed<S>) -> PowResult<Target> {
        let (num, den) = factor.ratio()?;
        let num = u64::try_from(num).map_err(|_| {
            PowError::InvalidParameters(format!("negative target factor {}", factor))
        })?;
        Ok(self.mul_div(num, den as u64))
    }

    /// Multiply by `numerator / denominator` of the same scale.
    pub fn scale_by<S: Scale>(
        &self,
        numerator: Fixed<S>,
        denominator: Fixed<S>,
    ) -> PowResult<Target> {
        let (num, _) = numerator.ratio()?;
        let (den, _) = denominator.ratio()?;
        if num < 0 || den <= 0 {
            return Err(PowError::InvalidParameters(format!(
                "target ratio {} / {} out of range",
                numerator, denominator
            )));
        }
        Ok(self.mul_div(num as u64, den as u64))
    }

    /// Shift left, saturating instead of dropping high bits.
    pub fn shl(&self, bits: u32) -> Target {
        if self.is_zero() {
            return *self;
        }
        if self.0.bits() as u32 + bits > 256 {
            return Target::MAX;
        }
        Target(self.0 << bits as usize)
    }

    pub fn shr(&self, bits: u32) -> Target {
        if bits >= 256 {
            return Target::ZERO;
        }
        Target(self.0 >> bits as usize)
    }

    /// Sum of `targets` divided by `divisor`, which need not match the
    /// number of targets. The sum is kept at 512 bits.
    pub fn sum_div<I>(targets: I, divisor: u64) -> Target
    where
        I: IntoIterator<Item = Target>,
    {
        assert!(divisor != 0, "division by zero target sum");
        let sum = targets
            .into_iter()
            .fold(U512::zero(), |sum, target| sum + widen(target.0));
        Target(narrow_saturating(sum / U512::from(divisor)))
    }

    /// Approximate value as `f64`.
    pub fn to_f64(&self) -> f64 {
        self.0
            .0
            .iter()
            .rev()
            .fold(0.0, |acc, word| acc * 18_446_744_073_709_551_616.0 + *word as f64)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_be_bytes()))
    }
}

/// Compact difficulty bits, as stored in a block header's `nBits`.
///
/// Equality and ordering compare the decoded targets, so two encodings of
/// the same value are equal and a "greater" compact is an easier target.
#[derive(Clone, Copy, Debug, Default)]
pub struct Compact(u32);

impl Compact {
    pub const fn new(bits: u32) -> Self {
        Compact(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Decode into a target plus the `(negative, overflow)` flags.
    pub fn decode(&self) -> (Target, bool, bool) {
        let size = self.0 >> 24;
        let word = self.0 & 0x007f_ffff;

        let value = if size <= 3 {
            U256::from(word >> (8 * (3 - size)))
        } else if size > 34 {
            U256::zero()
        } else {
            U256::from(word) << (8 * (size - 3)) as usize
        };

        let negative = word != 0 && (self.0 & 0x0080_0000) != 0;
        let overflow = word != 0
            && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));

        (Target(value), negative, overflow)
    }

    /// Decoded target; negative or overflowing encodings yield zero.
    pub fn to_target(&self) -> Target {
        match self.decode() {
            (target, false, false) => target,
            _ => Target::ZERO,
        }
    }

    /// Difficulty relative to the 0x1d00ffff reference target.
    pub fn difficulty(&self) -> f64 {
        let current = self.to_target().to_f64();
        if current == 0.0 {
            return f64::INFINITY;
        }
        Compact(DIFFICULTY_ONE_BITS).to_target().to_f64() / current
    }
}

impl From<Target> for Compact {
    fn from(target: Target) -> Self {
        target.to_compact()
    }
}

impl PartialEq for Compact {
    fn eq(&self, other: &Self) -> bool {
        self.to_target() == other.to_target()
    }
}

impl Eq for Compact {}

impl PartialOrd for Compact {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Compact {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_target().cmp(&other.to_target())
    }
}

impl Hash for Compact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_target().hash(state);
    }
}

impl fmt::Display for Compact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl fmt::LowerHex for Compact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Serialize for Compact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:08x}", self.0))
    }
}

impl<'de> Deserialize<'de> for Compact {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let digits = text.trim_start_matches("0x");
        u32::from_str_radix(digits, 16)
            .map(Compact)
            .map_err(serde::de::Error::custom)
    }
}

/// Check if a hash meets the difficulty target.
///
/// Returns true if hash <= target (valid proof of work).
#[inline]
pub fn hash_meets_target(hash: &[u8; 32], target: &Target) -> bool {
    Target::from_hash(hash) <= *target
}

/// Format difficulty for display (e.g., "1.23T" for trillion).
pub fn format_difficulty(difficulty: f64) -> String {
    if difficulty >= 1e15 {
        format!("{:.2}P", difficulty / 1e15)
    } else if difficulty >= 1e12 {
        format!("{:.2}T", difficulty / 1e12)
    } else if difficulty >= 1e9 {
        format!("{:.2}G", difficulty / 1e9)
    } else if difficulty >= 1e6 {
        format!("{:.2}M", difficulty / 1e6)
    } else if difficulty >= 1e3 {
        format!("{:.2}K", difficulty / 1e3)
    } else {
        format!("{:.2}", difficulty)
    }
}

/// Average number of hashes needed to meet a target.
pub fn expected_hashes(target: &Target) -> f64 {
    if target.is_zero() {
        return f64::INFINITY;
    }
    // 2^256 / (target + 1)
    115_792_089_237_316_195_423_570_985_008_687_907_853_269_984_665_640_564_039_457_584_007_913_129_639_936.0
        / (target.to_f64() + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::{percent, Seconds};
    use proptest::prelude::*;

    fn target_of(bits: u32) -> Target {
        Compact::new(bits).to_target()
    }

    #[test]
    fn test_bits_to_target_genesis() {
        let target = target_of(0x1d00ffff).to_be_bytes();

        // Expected target starts with 00000000ffff...
        assert_eq!(&target[..6], &[0x00, 0x00, 0x00, 0x00, 0xff, 0xff]);
        for (i, byte) in target.iter().enumerate().skip(6) {
            assert_eq!(*byte, 0x00, "byte {} should be 0", i);
        }
    }

    #[test]
    fn test_bits_to_target_high_difficulty() {
        let target = target_of(0x17034219).to_be_bytes();

        // Exponent = 0x17 = 23, so target starts at byte 32-23 = 9
        assert!(target[..9].iter().all(|b| *b == 0));
        assert_eq!(&target[9..12], &[0x03, 0x42, 0x19]);
    }

    #[test]
    fn test_small_exponents_truncate() {
        assert_eq!(target_of(0x01003456), Target::ZERO);
        assert_eq!(target_of(0x01123456).as_u256(), U256::from(0x12));
        assert_eq!(target_of(0x02123456).as_u256(), U256::from(0x1234));
        assert_eq!(target_of(0x03123456).as_u256(), U256::from(0x123456));
        assert_eq!(target_of(0x04123456).as_u256(), U256::from(0x12345600u64));
    }

    #[test]
    fn test_sign_bit_handling() {
        // Mantissa with the sign bit set decodes to zero
        let (_, negative, _) = Compact::new(0x04923456).decode();
        assert!(negative);
        assert_eq!(target_of(0x04923456), Target::ZERO);

        // Encoding moves a high mantissa byte into the exponent
        let target = Target::from_u256(U256::from(0x92340000u64));
        assert_eq!(target.to_compact().bits(), 0x05009234);
        assert_eq!(target_of(0x05009234), target);
    }

    #[test]
    fn test_overflow_decodes_to_zero() {
        let (_, _, overflow) = Compact::new(0xff123456).decode();
        assert!(overflow);
        assert_eq!(target_of(0xff123456), Target::ZERO);
        assert_eq!(target_of(0x22010000), Target::ZERO);

        // The largest size that still fits
        let top = target_of(0x20123456);
        assert!(!top.is_zero());
        assert_eq!(top.to_compact().bits(), 0x20123456);
    }

    #[test]
    fn test_bits_roundtrip() {
        let test_cases = [
            0x1d00ffff, // bitcoin genesis
            0x1e0ffff0, // litecoin genesis
            0x1e0fffff,
            0x17034219,
            0x1b0404cb,
            0x207fffff,
        ];

        for &bits in &test_cases {
            let recovered = target_of(bits).to_compact();
            assert_eq!(bits, recovered.bits(), "Roundtrip failed for bits {:08x}", bits);
        }
        assert_eq!(Target::ZERO.to_compact().bits(), 0);
    }

    #[test]
    fn test_compact_equality_is_by_value() {
        assert_eq!(Compact::new(0x01003456), Compact::new(0));
        assert_eq!(Compact::new(0x04923456), Compact::new(0));
        assert!(Compact::new(0x1d00ffff) < Compact::new(0x1e0fffff));
        assert_eq!(Compact::new(0x1e0fffff).to_string(), "1e0fffff");
    }

    #[test]
    fn test_hash_meets_target() {
        let target = target_of(0x1d00ffff);

        // Hashes are little-endian: leading zeros live at the end
        let mut good_hash = [0u8; 32];
        good_hash[27] = 0x12;
        assert!(hash_meets_target(&good_hash, &target));

        let mut bad_hash = [0u8; 32];
        bad_hash[28] = 0x01;
        assert!(!hash_meets_target(&bad_hash, &target));
    }

    #[test]
    fn test_arithmetic_saturates() {
        assert_eq!(Target::MAX.mul_div(2, 1), Target::MAX);
        assert_eq!(Target::MAX.shl(1), Target::MAX);
        assert_eq!(Target::MAX.shr(256), Target::ZERO);

        let t = target_of(0x1d00ffff);
        assert_eq!(t.shl(1).shr(1), t);
        assert_eq!(t.mul_div(3, 3), t);
    }

    #[test]
    fn test_fixed_scaling() {
        let t = target_of(0x1d00ffff);
        let up = t.scale(percent(110.0).unwrap()).unwrap();
        assert_eq!(up, t.mul_div(11, 10));

        let half = t
            .scale_by(Seconds::from_int(75), Seconds::from_int(150))
            .unwrap();
        assert_eq!(half, t.shr(1));

        assert!(t.scale(percent(-10.0).unwrap()).is_err());
        assert!(t
            .scale_by(Seconds::from_int(1), Seconds::from_int(0))
            .is_err());
    }

    #[test]
    fn test_sum_div() {
        let a = Target::from_u256(U256::from(10));
        let b = Target::from_u256(U256::from(21));
        assert_eq!(Target::sum_div([a, b], 2).as_u256(), U256::from(15));
        assert_eq!(Target::sum_div([a, b], 3).as_u256(), U256::from(10));
        assert_eq!(Target::sum_div([], 1), Target::ZERO);

        // Sum wider than 256 bits still divides correctly
        assert_eq!(Target::sum_div([Target::MAX, Target::MAX], 2), Target::MAX);
    }

    #[test]
    fn test_difficulty_calculation() {
        let genesis_diff = Compact::new(0x1d00ffff).difficulty();
        assert!((genesis_diff - 1.0).abs() < 0.01);
        assert_eq!(format_difficulty(1234.0), "1.23K");
        assert!((expected_hashes(&target_of(0x1d00ffff)) / 4_295_032_833.0 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_compact_serde() {
        let json = serde_json::to_string(&Compact::new(0x1e0fffff)).unwrap();
        assert_eq!(json, "\"1e0fffff\"");
        let back: Compact = serde_json::from_str("\"0x1d00ffff\"").unwrap();
        assert_eq!(back.bits(), 0x1d00ffff);
    }

    proptest! {
        #[test]
        fn prop_normalized_compact_roundtrips(size in 3u32..=32, mantissa in 0x010000u32..=0x7fffff) {
            let bits = (size << 24) | mantissa;
            prop_assert_eq!(target_of(bits).to_compact().bits(), bits);
        }

        #[test]
        fn prop_encode_is_idempotent(words in prop::array::uniform4(any::<u64>())) {
            let target = Target::from_u256(U256(words));
            let once = target.to_compact();
            let twice = once.to_target().to_compact();
            prop_assert_eq!(once.bits(), twice.bits());
            prop_assert!(once.to_target() <= target);
        }
    }
}
