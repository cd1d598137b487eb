//! `std::ops` implementations for [`Ad<B>`].
//!
//! Each operator records onto the active tape for `B`. Operand faults
//! (mixed tapes, stale values) panic with the [`TapeError`](crate::TapeError)
//! message; the `try_*` methods on [`Ad`] return them instead.

use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::ad::{or_panic, Ad};
use crate::tape::{BinaryOp, TapeLocal};

macro_rules! ad_binary_op {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign:ident, $op:expr) => {
        impl<B: TapeLocal> $trait for Ad<B> {
            type Output = Self;
            #[inline]
            fn $method(self, rhs: Self) -> Self {
                or_panic(self.try_binary($op, rhs))
            }
        }

        impl<B: TapeLocal> $trait<B> for Ad<B> {
            type Output = Self;
            #[inline]
            fn $method(self, rhs: B) -> Self {
                or_panic(self.try_binary($op, Ad::constant(rhs)))
            }
        }

        impl<B: TapeLocal> $assign_trait for Ad<B> {
            #[inline]
            fn $assign(&mut self, rhs: Self) {
                *self = $trait::$method(*self, rhs);
            }
        }

        impl<B: TapeLocal> $assign_trait<B> for Ad<B> {
            #[inline]
            fn $assign(&mut self, rhs: B) {
                *self = $trait::$method(*self, rhs);
            }
        }

        ad_binary_op!(@primitive $trait, $method, $op, f32, f64);
    };
    (@primitive $trait:ident, $method:ident, $op:expr, $($t:ty),*) => {
        $(
            impl $trait<Ad<$t>> for $t {
                type Output = Ad<$t>;
                #[inline]
                fn $method(self, rhs: Ad<$t>) -> Ad<$t> {
                    or_panic(Ad::constant(self).try_binary($op, rhs))
                }
            }
        )*
    };
}

ad_binary_op!(Add, add, AddAssign, add_assign, BinaryOp::Add);
ad_binary_op!(Sub, sub, SubAssign, sub_assign, BinaryOp::Sub);
ad_binary_op!(Mul, mul, MulAssign, mul_assign, BinaryOp::Mul);
ad_binary_op!(Div, div, DivAssign, div_assign, BinaryOp::Div);

/// Recorded as `0 - x`.
impl<B: TapeLocal> Neg for Ad<B> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        or_panic(Ad::constant(crate::Base::zero()).try_sub(self))
    }
}

/// Recorded as a single cumulative sum.
impl<B: TapeLocal> Sum for Ad<B> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        let terms: Vec<Self> = iter.collect();
        or_panic(Ad::sum(&terms, &[]))
    }
}

impl<'a, B: TapeLocal> Sum<&'a Ad<B>> for Ad<B> {
    fn sum<I: Iterator<Item = &'a Ad<B>>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
