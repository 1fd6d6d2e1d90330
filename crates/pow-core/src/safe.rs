//! Overflow-tracking integer arithmetic.
//!
//! `Safe<T>` wraps a signed integer and never panics: an overflowing
//! operation (or a division by zero) poisons the value with a sticky flag
//! that propagates through every later operation. Integer division with a
//! non-zero remainder is also remembered, so fixed-point code can tell an
//! exact quotient from a truncated one.

use core::cmp::Ordering;
use core::fmt;
use core::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, Sub, SubAssign};

use crate::error::{PowError, PowResult};

/// Signed primitive integers usable inside [`Safe`].
pub trait SafeInt: Copy + Default + PartialEq + PartialOrd + fmt::Debug + fmt::Display {
    fn checked_add(self, rhs: Self) -> Option<Self>;
    fn checked_sub(self, rhs: Self) -> Option<Self>;
    fn checked_mul(self, rhs: Self) -> Option<Self>;
    fn checked_div(self, rhs: Self) -> Option<Self>;
    fn checked_rem(self, rhs: Self) -> Option<Self>;
    fn checked_neg(self) -> Option<Self>;
    fn is_zero(self) -> bool;
}

macro_rules! impl_safe_int {
    ($($t:ty),*) => {$(
        impl SafeInt for $t {
            #[inline]
            fn checked_add(self, rhs: Self) -> Option<Self> { <$t>::checked_add(self, rhs) }
            #[inline]
            fn checked_sub(self, rhs: Self) -> Option<Self> { <$t>::checked_sub(self, rhs) }
            #[inline]
            fn checked_mul(self, rhs: Self) -> Option<Self> { <$t>::checked_mul(self, rhs) }
            #[inline]
            fn checked_div(self, rhs: Self) -> Option<Self> { <$t>::checked_div(self, rhs) }
            #[inline]
            fn checked_rem(self, rhs: Self) -> Option<Self> { <$t>::checked_rem(self, rhs) }
            #[inline]
            fn checked_neg(self) -> Option<Self> { <$t>::checked_neg(self) }
            #[inline]
            fn is_zero(self) -> bool { self == 0 }
        }
    )*};
}

impl_safe_int!(i8, i16, i32, i64, i128);

/// A signed integer with sticky overflow and lost-precision flags.
///
/// An overflowed value behaves like NaN: it compares unequal to everything,
/// itself included, and has no ordering.
#[derive(Clone, Copy, Debug, Default)]
pub struct Safe<T> {
    value: T,
    overflow: bool,
    lost_precision: bool,
}

impl<T: SafeInt> Safe<T> {
    pub const fn new(value: T) -> Self {
        Self {
            value,
            overflow: false,
            lost_precision: false,
        }
    }

    /// A value already poisoned by overflow.
    pub fn overflowed() -> Self {
        Self {
            value: T::default(),
            overflow: true,
            lost_precision: false,
        }
    }

    pub fn is_overflow(&self) -> bool {
        self.overflow
    }

    /// True if any division on the way to this value truncated.
    pub fn lost_precision(&self) -> bool {
        self.lost_precision
    }

    /// The wrapped integer, or `Overflow` if any step overflowed.
    pub fn get(self) -> PowResult<T> {
        if self.overflow {
            Err(PowError::Overflow)
        } else {
            Ok(self.value)
        }
    }

    pub(crate) fn with_lost_precision(mut self, lost: bool) -> Self {
        self.lost_precision |= lost;
        self
    }

    fn combine(self, rhs: Self, op: impl FnOnce(T, T) -> Option<T>) -> Self {
        let lost_precision = self.lost_precision || rhs.lost_precision;
        let result = if self.overflow || rhs.overflow {
            None
        } else {
            op(self.value, rhs.value)
        };
        match result {
            Some(value) => Self {
                value,
                overflow: false,
                lost_precision,
            },
            None => Self {
                value: T::default(),
                overflow: true,
                lost_precision,
            },
        }
    }
}

impl<T: SafeInt> From<T> for Safe<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

macro_rules! safe_binop {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign:ident, $checked:ident) => {
        impl<T: SafeInt> $trait for Safe<T> {
            type Output = Self;
            #[inline]
            fn $method(self, rhs: Self) -> Self {
                self.combine(rhs, T::$checked)
            }
        }

        impl<T: SafeInt> $trait<T> for Safe<T> {
            type Output = Self;
            #[inline]
            fn $method(self, rhs: T) -> Self {
                self.combine(Safe::new(rhs), T::$checked)
            }
        }

        impl<T: SafeInt> $assign_trait for Safe<T> {
            #[inline]
            fn $assign(&mut self, rhs: Self) {
                *self = $trait::$method(*self, rhs);
            }
        }
    };
}

safe_binop!(Add, add, AddAssign, add_assign, checked_add);
safe_binop!(Sub, sub, SubAssign, sub_assign, checked_sub);
safe_binop!(Mul, mul, MulAssign, mul_assign, checked_mul);

impl<T: SafeInt> Div for Safe<T> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let inexact = !self.overflow
            && !rhs.overflow
            && matches!(self.value.checked_rem(rhs.value), Some(r) if !r.is_zero());
        self.combine(rhs, T::checked_div).with_lost_precision(inexact)
    }
}

impl<T: SafeInt> Div<T> for Safe<T> {
    type Output = Self;

    fn div(self, rhs: T) -> Self {
        self / Safe::new(rhs)
    }
}

impl<T: SafeInt> DivAssign for Safe<T> {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl<T: SafeInt> Rem for Safe<T> {
    type Output = Self;

    fn rem(self, rhs: Self) -> Self {
        self.combine(rhs, T::checked_rem)
    }
}

impl<T: SafeInt> Neg for Safe<T> {
    type Output = Self;

    fn neg(self) -> Self {
        if self.overflow {
            return self;
        }
        match self.value.checked_neg() {
            Some(value) => Self { value, ..self },
            None => Self::overflowed().with_lost_precision(self.lost_precision),
        }
    }
}

impl<T: SafeInt> PartialEq for Safe<T> {
    fn eq(&self, other: &Self) -> bool {
        !self.overflow && !other.overflow && self.value == other.value
    }
}

impl<T: SafeInt> PartialOrd for Safe<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.overflow || other.overflow {
            None
        } else {
            self.value.partial_cmp(&other.value)
        }
    }
}

impl<T: SafeInt> fmt::Display for Safe<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.overflow {
            f.write_str("#overflow")
        } else {
            fmt::Display::fmt(&self.value, f)
        }
    }
}
