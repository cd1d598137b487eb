//! The [`Base`] trait: the scalar type a tape records and replays.
//!
//! Implemented for `f32`, `f64` and for [`Ad<B>`](crate::Ad) itself, so a
//! tape over `Ad<f64>` replays by recording onto an `f64` tape.

use std::fmt::{Debug, Display};
use std::ops::{Add, Div, Mul, Neg, Sub};

use num_traits::Float as NumFloat;

use crate::opcode::CompareOp;

/// Numeric capability set required of a tape's base type.
///
/// Arithmetic, ordering, conversion to and from `f64`, and the elementary
/// functions the catalog records.
pub trait Base:
    Copy
    + Debug
    + Display
    + PartialOrd
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    fn zero() -> Self;
    fn one() -> Self;
    fn nan() -> Self;
    fn from_f64(value: f64) -> Self;
    fn to_f64(&self) -> f64;

    /// True only when the value is the constant zero and can never change.
    fn is_identical_zero(&self) -> bool;
    /// True only when the value is the constant one and can never change.
    fn is_identical_one(&self) -> bool;

    fn abs(self) -> Self;
    /// `-1`, `0` or `1`.
    fn sign(self) -> Self;
    fn sqrt(self) -> Self;
    fn exp(self) -> Self;
    fn exp_m1(self) -> Self;
    fn ln(self) -> Self;
    fn ln_1p(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tan(self) -> Self;
    fn sinh(self) -> Self;
    fn cosh(self) -> Self;
    fn tanh(self) -> Self;
    fn asin(self) -> Self;
    fn acos(self) -> Self;
    fn atan(self) -> Self;
    fn asinh(self) -> Self;
    fn acosh(self) -> Self;
    fn atanh(self) -> Self;
    fn erf(self) -> Self;
    fn powf(self, exponent: Self) -> Self;

    /// Vector index selected by this value, truncating toward zero.
    ///
    /// `None` for NaN, infinities and values that truncate below zero.
    #[inline]
    fn to_index(&self) -> Option<usize> {
        let v = self.to_f64().trunc();
        if v.is_finite() && v >= 0.0 {
            Some(v as usize)
        } else {
            None
        }
    }

    /// Integer-valued constant.
    #[inline]
    fn from_usize(n: usize) -> Self {
        Self::from_f64(n as f64)
    }

    /// Absolute-zero multiply: zero whenever `self` is zero, even if `y` is
    /// not finite.
    #[inline]
    fn azmul(self, y: Self) -> Self {
        if self == Self::zero() {
            Self::zero()
        } else {
            self * y
        }
    }

    /// `if left rel right { if_true } else { if_false }`.
    ///
    /// Recording types override this to record the selection itself.
    #[inline]
    fn cond_select(rel: CompareOp, left: Self, right: Self, if_true: Self, if_false: Self) -> Self {
        if rel.eval(left, right) {
            if_true
        } else {
            if_false
        }
    }
}

macro_rules! impl_base_for_float {
    ($t:ty, $erf:path) => {
        impl Base for $t {
            #[inline]
            fn zero() -> Self {
                0.0
            }
            #[inline]
            fn one() -> Self {
                1.0
            }
            #[inline]
            fn nan() -> Self {
                <$t as NumFloat>::nan()
            }
            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $t
            }
            #[inline]
            fn to_f64(&self) -> f64 {
                *self as f64
            }
            #[inline]
            fn is_identical_zero(&self) -> bool {
                *self == 0.0
            }
            #[inline]
            fn is_identical_one(&self) -> bool {
                *self == 1.0
            }
            #[inline]
            fn abs(self) -> Self {
                NumFloat::abs(self)
            }
            #[inline]
            fn sign(self) -> Self {
                if self > 0.0 {
                    1.0
                } else if self < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            #[inline]
            fn sqrt(self) -> Self {
                NumFloat::sqrt(self)
            }
            #[inline]
            fn exp(self) -> Self {
                NumFloat::exp(self)
            }
            #[inline]
            fn exp_m1(self) -> Self {
                NumFloat::exp_m1(self)
            }
            #[inline]
            fn ln(self) -> Self {
                NumFloat::ln(self)
            }
            #[inline]
            fn ln_1p(self) -> Self {
                NumFloat::ln_1p(self)
            }
            #[inline]
            fn sin(self) -> Self {
                NumFloat::sin(self)
            }
            #[inline]
            fn cos(self) -> Self {
                NumFloat::cos(self)
            }
            #[inline]
            fn tan(self) -> Self {
                NumFloat::tan(self)
            }
            #[inline]
            fn sinh(self) -> Self {
                NumFloat::sinh(self)
            }
            #[inline]
            fn cosh(self) -> Self {
                NumFloat::cosh(self)
            }
            #[inline]
            fn tanh(self) -> Self {
                NumFloat::tanh(self)
            }
            #[inline]
            fn asin(self) -> Self {
                NumFloat::asin(self)
            }
            #[inline]
            fn acos(self) -> Self {
                NumFloat::acos(self)
            }
            #[inline]
            fn atan(self) -> Self {
                NumFloat::atan(self)
            }
            #[inline]
            fn asinh(self) -> Self {
                NumFloat::asinh(self)
            }
            #[inline]
            fn acosh(self) -> Self {
                NumFloat::acosh(self)
            }
            #[inline]
            fn atanh(self) -> Self {
                NumFloat::atanh(self)
            }
            #[inline]
            fn erf(self) -> Self {
                $erf(self)
            }
            #[inline]
            fn powf(self, exponent: Self) -> Self {
                NumFloat::powf(self, exponent)
            }
        }
    };
}

impl_base_for_float!(f32, libm::erff);
impl_base_for_float!(f64, libm::erf);
