//! The recording value type.
//!
//! [`Ad<B>`] carries a value of the base type plus a tag identifying the tape
//! it belongs to. A zero tag means the value is a constant. Arithmetic on
//! tagged values appends instructions to the thread's active recording for
//! `B`; values from another tape, or from a recording that has ended, are
//! rejected instead of silently corrupting the tape.

use std::cmp::Ordering;
use std::fmt;

use crate::base::Base;
use crate::error::{Result, TapeError};
use crate::opcode::{eval_unary, Addr, CompareOp, OpCode};
use crate::tape::{with_recorder, BinaryOp, Operand, Recorder, TapeId, TapeLocal};

/// Scalar recorded onto a tape of base type `B`.
#[derive(Clone, Copy, Debug)]
pub struct Ad<B: Base> {
    value: B,
    /// Raw [`TapeId`]; `0` for constants.
    tape: u32,
    index: Addr,
    dynamic: bool,
}

/// Unwrap a front-end result inside an operator overload.
#[inline]
pub(crate) fn or_panic<T>(result: Result<T>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("{}", e),
    }
}

impl<B: Base> Ad<B> {
    /// A value on no tape.
    #[inline]
    pub fn constant(value: B) -> Self {
        Ad {
            value,
            tape: 0,
            index: 0,
            dynamic: false,
        }
    }

    #[inline]
    pub(crate) fn variable(value: B, tape: TapeId, index: Addr) -> Self {
        Ad {
            value,
            tape: tape.get(),
            index,
            dynamic: false,
        }
    }

    #[inline]
    pub(crate) fn dynamic(value: B, tape: TapeId, index: Addr) -> Self {
        Ad {
            value,
            tape: tape.get(),
            index,
            dynamic: true,
        }
    }

    pub(crate) fn from_operand(op: Operand<B>, tape: TapeId) -> Self {
        match op {
            Operand::Constant(v) => Ad::constant(v),
            Operand::Dynamic { addr, value } => Ad::dynamic(value, tape, addr),
            Operand::Variable { addr, value } => Ad::variable(value, tape, addr),
        }
    }

    #[inline]
    pub fn value(&self) -> B {
        self.value
    }

    /// The tape this value was recorded on, if any.
    #[inline]
    pub fn tape_id(&self) -> Option<TapeId> {
        TapeId::from_raw(self.tape)
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.tape == 0
    }

    #[inline]
    pub fn is_variable(&self) -> bool {
        self.tape != 0 && !self.dynamic
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.tape != 0 && self.dynamic
    }

    /// Variable index (or parameter address for a dynamic parameter) on
    /// its tape.
    #[inline]
    pub fn index(&self) -> Option<Addr> {
        (self.tape != 0).then_some(self.index)
    }

    /// Resolve against the tape recording now (`current`).
    pub(crate) fn operand(&self, current: Option<TapeId>) -> Result<Operand<B>> {
        let Some(tape) = TapeId::from_raw(self.tape) else {
            return Ok(Operand::Constant(self.value));
        };
        match current {
            Some(c) if c == tape => Ok(if self.dynamic {
                Operand::Dynamic {
                    addr: self.index,
                    value: self.value,
                }
            } else {
                Operand::Variable {
                    addr: self.index,
                    value: self.value,
                }
            }),
            Some(c) => Err(TapeError::ForeignOperand {
                operand: tape,
                current: c,
            }),
            None => Err(TapeError::StaleOperand { operand: tape }),
        }
    }

    /// The single tape shared by every non-constant value.
    pub(crate) fn common_tape<'a>(values: impl IntoIterator<Item = &'a Self>) -> Result<Option<TapeId>> {
        let mut tape = None;
        for v in values {
            match (tape, v.tape_id()) {
                (_, None) => {}
                (None, Some(t)) => tape = Some(t),
                (Some(u), Some(t)) if u != t => {
                    return Err(TapeError::TapeMismatch { left: u, right: t })
                }
                _ => {}
            }
        }
        Ok(tape)
    }
}

impl<B: TapeLocal> Ad<B> {
    /// Resolve `operands` against the active recording and let `f` append
    /// the instruction.
    fn record<const N: usize>(
        operands: [Self; N],
        f: impl FnOnce(&mut Recorder<B>, [Operand<B>; N]) -> Result<Operand<B>>,
    ) -> Result<Self> {
        Self::common_tape(&operands)?;
        with_recorder::<B, _>(|rec| {
            let current = rec.as_ref().map(|r| r.id());
            let mut resolved = [Operand::Constant(B::zero()); N];
            for (slot, a) in resolved.iter_mut().zip(&operands) {
                *slot = a.operand(current)?;
            }
            let Some(rec) = rec else {
                return Err(TapeError::NotRecording);
            };
            let out = f(rec, resolved)?;
            Ok(Ad::from_operand(out, rec.id()))
        })
    }

    pub fn try_binary(self, op: BinaryOp, rhs: Self) -> Result<Self> {
        let value = op.eval(self.value, rhs.value);
        if self.is_constant() && rhs.is_constant() {
            return Ok(Ad::constant(value));
        }
        Self::record([self, rhs], |rec, [x, y]| rec.record_binary(op, x, y, value))
    }

    #[inline]
    pub fn try_add(self, rhs: Self) -> Result<Self> {
        self.try_binary(BinaryOp::Add, rhs)
    }

    #[inline]
    pub fn try_sub(self, rhs: Self) -> Result<Self> {
        self.try_binary(BinaryOp::Sub, rhs)
    }

    #[inline]
    pub fn try_mul(self, rhs: Self) -> Result<Self> {
        self.try_binary(BinaryOp::Mul, rhs)
    }

    #[inline]
    pub fn try_div(self, rhs: Self) -> Result<Self> {
        self.try_binary(BinaryOp::Div, rhs)
    }

    #[inline]
    pub fn try_pow(self, rhs: Self) -> Result<Self> {
        self.try_binary(BinaryOp::Pow, rhs)
    }

    /// Absolute-zero multiply, see [`Base::azmul`].
    #[inline]
    pub fn try_azmul(self, rhs: Self) -> Result<Self> {
        self.try_binary(BinaryOp::Azmul, rhs)
    }

    /// Apply a unary function kind.
    ///
    /// # Panics
    ///
    /// Panics if `op` is not a unary function kind.
    pub fn try_unary(self, op: OpCode) -> Result<Self> {
        let value = eval_unary(op, self.value);
        if self.is_constant() {
            return Ok(Ad::constant(value));
        }
        Self::record([self], |rec, [x]| rec.record_unary(op, x, value))
    }

    /// Evaluate `self rel rhs` and record the outcome for later
    /// comparison-change detection.
    pub fn compare(self, rel: CompareOp, rhs: Self) -> Result<bool> {
        let result = rel.eval(self.value, rhs.value);
        if self.is_constant() && rhs.is_constant() {
            return Ok(result);
        }
        Self::common_tape([&self, &rhs])?;
        with_recorder::<B, _>(|rec| {
            let current = rec.as_ref().map(|r| r.id());
            let (x, y) = (self.operand(current)?, rhs.operand(current)?);
            let Some(rec) = rec else {
                return Err(TapeError::NotRecording);
            };
            rec.record_compare(rel, x, y, result)?;
            Ok(result)
        })
    }

    /// `if left rel right { if_true } else { if_false }`, recorded so that a
    /// replay at another point selects again.
    pub fn cond_exp(
        rel: CompareOp,
        left: Self,
        right: Self,
        if_true: Self,
        if_false: Self,
    ) -> Result<Self> {
        let value = B::cond_select(rel, left.value, right.value, if_true.value, if_false.value);
        let args = [left, right, if_true, if_false];
        if args.iter().all(Ad::is_constant) {
            return Ok(Ad::constant(value));
        }
        Self::record(args, |rec, [l, r, t, f]| {
            rec.record_cond_exp(rel, l, r, t, f, value)
        })
    }

    /// Record both branches of a conditional and select between them like
    /// [`cond_exp`](Self::cond_exp). On replay, the instructions of the
    /// branch that is not selected are skipped.
    ///
    /// With constant comparison operands only the selected branch is
    /// evaluated.
    pub fn cond_branch<T, F>(
        rel: CompareOp,
        left: Self,
        right: Self,
        if_true: T,
        if_false: F,
    ) -> Result<Self>
    where
        T: FnOnce() -> Result<Self>,
        F: FnOnce() -> Result<Self>,
    {
        if left.is_constant() && right.is_constant() {
            return if rel.eval(left.value, right.value) {
                if_true()
            } else {
                if_false()
            };
        }
        Self::common_tape([&left, &right])?;
        let (skip, start) = with_recorder::<B, _>(|rec| {
            let current = rec.as_ref().map(|r| r.id());
            let (l, r) = (left.operand(current)?, right.operand(current)?);
            let Some(rec) = rec else {
                return Err(TapeError::NotRecording);
            };
            let skip = rec.begin_skip(rel, l, r);
            Ok((skip, rec.num_op()))
        })?;
        let t = if_true()?;
        let mid = num_op::<B>();
        let f = if_false()?;
        let end = num_op::<B>();
        let out = Self::cond_exp(rel, left, right, t, f)?;
        with_recorder::<B, _>(|rec| match rec {
            Some(rec) => rec.finish_skip(skip, start..mid, mid..end),
            None => Err(TapeError::NotRecording),
        })?;
        Ok(out)
    }

    /// `Σ add - Σ sub`, recorded as a single cumulative sum.
    pub fn sum(add: &[Self], sub: &[Self]) -> Result<Self> {
        let value = add.iter().fold(B::zero(), |acc, a| acc + a.value);
        let value = sub.iter().fold(value, |acc, a| acc - a.value);
        if add.iter().chain(sub).all(Ad::is_constant) {
            return Ok(Ad::constant(value));
        }
        Self::common_tape(add.iter().chain(sub))?;
        with_recorder::<B, _>(|rec| {
            let current = rec.as_ref().map(|r| r.id());
            let mut init = B::zero();
            let (mut add_var, mut sub_var) = (Vec::new(), Vec::new());
            let (mut add_dyn, mut sub_dyn) = (Vec::new(), Vec::new());
            let signed = add.iter().map(|a| (a, true));
            for (a, plus) in signed.chain(sub.iter().map(|a| (a, false))) {
                match a.operand(current)? {
                    Operand::Constant(v) if plus => init = init + v,
                    Operand::Constant(v) => init = init - v,
                    Operand::Dynamic { addr, .. } if plus => add_dyn.push(addr),
                    Operand::Dynamic { addr, .. } => sub_dyn.push(addr),
                    Operand::Variable { addr, .. } if plus => add_var.push(addr),
                    Operand::Variable { addr, .. } => sub_var.push(addr),
                }
            }
            let Some(rec) = rec else {
                return Err(TapeError::NotRecording);
            };
            if add_var.is_empty() && sub_var.is_empty() {
                return Err(TapeError::DynamicOperand { op: "sum" });
            }
            let addr = rec.put_csum(init, &add_var, &sub_var, &add_dyn, &sub_dyn);
            Ok(Ad::variable(value, rec.id(), addr))
        })
    }

    /// Record a print of `before value after`, emitted by zero-order
    /// forward sweeps where `pos <= 0`.
    pub fn print_for(pos: Self, before: &str, value: Self, after: &str) -> Result<()> {
        Self::common_tape([&pos, &value])?;
        with_recorder::<B, _>(|rec| {
            let current = rec.as_ref().map(|r| r.id());
            let (p, v) = (pos.operand(current)?, value.operand(current)?);
            let Some(rec) = rec else {
                return Err(TapeError::NotRecording);
            };
            rec.put_print(p, before, v, after);
            Ok(())
        })
    }
}

/// Instructions recorded so far on this thread's tape for `B`.
fn num_op<B: TapeLocal>() -> usize {
    with_recorder::<B, _>(|rec| rec.map_or(0, |r| r.num_op()))
}

impl<B: Base> Default for Ad<B> {
    fn default() -> Self {
        Ad::constant(B::zero())
    }
}

impl<B: Base> From<B> for Ad<B> {
    fn from(value: B) -> Self {
        Ad::constant(value)
    }
}

impl<B: Base> fmt::Display for Ad<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

/// Compares values only; use [`Ad::compare`] to record the outcome.
impl<B: Base> PartialEq for Ad<B> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<B: Base> PartialOrd for Ad<B> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

macro_rules! recorded_unary {
    ($($method:ident => $op:ident),* $(,)?) => {
        $(
            #[inline]
            fn $method(self) -> Self {
                or_panic(self.try_unary(OpCode::$op))
            }
        )*
    };
}

impl<B: TapeLocal> Base for Ad<B> {
    #[inline]
    fn zero() -> Self {
        Ad::constant(B::zero())
    }

    #[inline]
    fn one() -> Self {
        Ad::constant(B::one())
    }

    #[inline]
    fn nan() -> Self {
        Ad::constant(B::nan())
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        Ad::constant(B::from_f64(value))
    }

    #[inline]
    fn to_f64(&self) -> f64 {
        self.value.to_f64()
    }

    #[inline]
    fn is_identical_zero(&self) -> bool {
        self.is_constant() && self.value.is_identical_zero()
    }

    #[inline]
    fn is_identical_one(&self) -> bool {
        self.is_constant() && self.value.is_identical_one()
    }

    recorded_unary! {
        abs => Abs,
        sign => Sign,
        sqrt => Sqrt,
        exp => Exp,
        exp_m1 => Expm1,
        ln => Log,
        ln_1p => Log1p,
        sin => Sin,
        cos => Cos,
        tan => Tan,
        sinh => Sinh,
        cosh => Cosh,
        tanh => Tanh,
        asin => Asin,
        acos => Acos,
        atan => Atan,
        asinh => Asinh,
        acosh => Acosh,
        atanh => Atanh,
        erf => Erf,
    }

    #[inline]
    fn powf(self, exponent: Self) -> Self {
        or_panic(self.try_pow(exponent))
    }

    #[inline]
    fn azmul(self, y: Self) -> Self {
        or_panic(self.try_azmul(y))
    }

    #[inline]
    fn cond_select(rel: CompareOp, left: Self, right: Self, if_true: Self, if_false: Self) -> Self {
        or_panic(Ad::cond_exp(rel, left, right, if_true, if_false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::{abort_recording, start_recording};

    #[test]
    fn constants_need_no_recording() {
        let x = Ad::constant(2.0_f64);
        let y = x.try_mul(Ad::constant(3.0)).unwrap();
        assert!(y.is_constant());
        assert_eq!(y.value(), 6.0);
        assert!(x.compare(CompareOp::Lt, y).unwrap());
    }

    #[test]
    fn stale_operand_is_rejected() {
        let tape = start_recording::<f32>().unwrap();
        let x = with_recorder::<f32, _>(|rec| {
            let rec = rec.unwrap();
            Ad::variable(1.0, rec.id(), rec.new_independent())
        });
        abort_recording::<f32>();
        let err = x.try_add(Ad::constant(1.0)).unwrap_err();
        assert_eq!(err, TapeError::StaleOperand { operand: tape });
    }

    #[test]
    fn mixed_tapes_are_rejected() {
        let t1 = TapeId::fresh();
        let t2 = TapeId::fresh();
        let a = Ad::variable(1.0_f64, t1, 1);
        let b = Ad::variable(2.0_f64, t2, 1);
        assert_eq!(
            a.try_add(b).unwrap_err(),
            TapeError::TapeMismatch {
                left: t1,
                right: t2
            }
        );
    }

    #[test]
    fn equality_ignores_tape() {
        let t = TapeId::fresh();
        assert_eq!(Ad::variable(1.5_f64, t, 3), Ad::constant(1.5));
        assert!(Ad::constant(1.0_f64) < Ad::variable(2.0, t, 1));
    }
}
