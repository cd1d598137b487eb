//! `num_traits` implementations for [`Ad<B>`].

use num_traits::{One, ToPrimitive, Zero};

use crate::ad::Ad;
use crate::base::Base;
use crate::tape::TapeLocal;

impl<B: TapeLocal> Zero for Ad<B> {
    #[inline]
    fn zero() -> Self {
        Ad::constant(B::zero())
    }

    /// Value test only; see [`Base::is_identical_zero`] for the constant test.
    #[inline]
    fn is_zero(&self) -> bool {
        self.value() == B::zero()
    }
}

impl<B: TapeLocal> One for Ad<B> {
    #[inline]
    fn one() -> Self {
        Ad::constant(B::one())
    }
}

impl<B: TapeLocal> ToPrimitive for Ad<B> {
    #[inline]
    fn to_i64(&self) -> Option<i64> {
        self.value().to_f64().to_i64()
    }

    #[inline]
    fn to_u64(&self) -> Option<u64> {
        self.value().to_f64().to_u64()
    }

    #[inline]
    fn to_f64(&self) -> Option<f64> {
        Some(self.value().to_f64())
    }
}
