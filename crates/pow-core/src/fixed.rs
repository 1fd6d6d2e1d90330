//! Fixed-point numbers over [`Safe`] integers.
//!
//! A `Fixed<S>` counts units of `1 / S::DEN`. Retarget formulas scale
//! 256-bit targets by these values as exact numerator/denominator pairs, so
//! no floating point reaches consensus arithmetic.

use core::fmt;
use core::marker::PhantomData;
use core::ops::{Add, Div, Mul, Rem, Sub};

use crate::error::{PowError, PowResult};
use crate::safe::Safe;

/// Denominator of a fixed-point representation.
pub trait Scale: Copy + fmt::Debug {
    const DEN: i64;
}

/// Whole units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Units;

impl Scale for Units {
    const DEN: i64 = 1;
}

/// Hundredths of a unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Hundredths;

impl Scale for Hundredths {
    const DEN: i64 = 100;
}

/// Fixed-point value with denominator `S::DEN`.
#[derive(Clone, Copy, Debug)]
pub struct Fixed<S> {
    raw: Safe<i64>,
    scale: PhantomData<S>,
}

/// Whole seconds, the operand type for duration ratios.
pub type Seconds = Fixed<Units>;

/// A percentage; `percent(110.0)` is the multiplier 1.10.
pub type Percent = Fixed<Hundredths>;

impl<S: Scale> Fixed<S> {
    /// Build from a raw count of `1 / S::DEN` units.
    pub const fn from_raw(raw: i64) -> Self {
        Self {
            raw: Safe::new(raw),
            scale: PhantomData,
        }
    }

    pub fn from_int(value: i64) -> Self {
        Self {
            raw: Safe::new(value) * S::DEN,
            scale: PhantomData,
        }
    }

    /// Nearest representable value, and whether it differs from `value`.
    ///
    /// Values outside the `i64` range (and NaN) come back overflowed.
    pub fn from_f64(value: f64) -> (Self, bool) {
        let scaled = (value * S::DEN as f64).round();
        if !scaled.is_finite() || scaled < i64::MIN as f64 || scaled >= i64::MAX as f64 {
            return (
                Self {
                    raw: Safe::overflowed(),
                    scale: PhantomData,
                },
                true,
            );
        }
        let fixed = Self::from_raw(scaled as i64);
        let lost = fixed.raw_f64() != value;
        (fixed, lost)
    }

    /// Exact conversion from `f64`, failing with `PrecisionLost`.
    pub fn try_from_f64(value: f64) -> PowResult<Self> {
        match Self::from_f64(value) {
            (fixed, false) => Ok(fixed),
            (_, true) => Err(PowError::PrecisionLost { value }),
        }
    }

    /// The value as `f64`, and whether the conversion (or any earlier
    /// truncating division) lost precision.
    pub fn to_f64(&self) -> (f64, bool) {
        let value = self.raw_f64();
        let (back, _) = Self::from_f64(value);
        let lost = self.raw.is_overflow()
            || self.raw.lost_precision()
            || back.raw.get().ok() != self.raw.get().ok();
        (value, lost)
    }

    /// Underlying count of `1 / S::DEN` units.
    pub fn raw(&self) -> Safe<i64> {
        self.raw
    }

    /// Exact `(numerator, denominator)` pair of this value.
    pub fn ratio(&self) -> PowResult<(i64, i64)> {
        Ok((self.raw.get()?, S::DEN))
    }

    pub fn is_overflow(&self) -> bool {
        self.raw.is_overflow()
    }

    fn raw_f64(&self) -> f64 {
        match self.raw.get() {
            Ok(raw) => raw as f64 / S::DEN as f64,
            Err(_) => f64::NAN,
        }
    }

    fn wrap(raw: Safe<i64>) -> Self {
        Self {
            raw,
            scale: PhantomData,
        }
    }
}

/// Percentage from a literal such as `110.0`, failing if the value has a
/// fractional hundredth.
pub fn percent(value: f64) -> PowResult<Percent> {
    let rounded = value.round();
    if !rounded.is_finite() || rounded != value || rounded.abs() >= i64::MAX as f64 {
        return Err(PowError::PrecisionLost { value });
    }
    Ok(Percent::from_raw(rounded as i64))
}

impl<S: Scale> Add for Fixed<S> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::wrap(self.raw + rhs.raw)
    }
}

impl<S: Scale> Sub for Fixed<S> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::wrap(self.raw - rhs.raw)
    }
}

impl<S: Scale> Mul for Fixed<S> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::wrap(self.raw * rhs.raw / S::DEN)
    }
}

impl<S: Scale> Div for Fixed<S> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        Self::wrap(self.raw * S::DEN / rhs.raw)
    }
}

impl<S: Scale> Rem for Fixed<S> {
    type Output = Self;

    fn rem(self, rhs: Self) -> Self {
        Self::wrap(self.raw % rhs.raw)
    }
}

impl<S: Scale> Mul<i64> for Fixed<S> {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self {
        Self::wrap(self.raw * rhs)
    }
}

impl<S: Scale> Div<i64> for Fixed<S> {
    type Output = Self;

    fn div(self, rhs: i64) -> Self {
        Self::wrap(self.raw / rhs)
    }
}

impl<S: Scale> PartialEq for Fixed<S> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<S: Scale> PartialOrd for Fixed<S> {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        self.raw.partial_cmp(&other.raw)
    }
}

impl<S: Scale> fmt::Display for Fixed<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.raw.get() {
            Ok(raw) if S::DEN == 1 => write!(f, "{}", raw),
            Ok(raw) => write!(f, "{}", raw as f64 / S::DEN as f64),
            Err(_) => f.write_str("#overflow"),
        }
    }
}

/// Serialize a [`Percent`] as its percentage number (`110` for 1.10).
pub mod percent_serde {
    use super::{percent, Percent};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Percent, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let raw = value.raw().get().map_err(serde::ser::Error::custom)?;
        serializer.serialize_i64(raw)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Percent, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        percent(value).map_err(D::Error::custom)
    }
}
