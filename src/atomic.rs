//! User-defined atomic operations.
//!
//! An atomic operation is recorded as a single call bracket instead of its
//! elementary operations; the sweeps call back into it for Taylor
//! coefficients and adjoints. Operations are registered once per process
//! and referred to by an [`AtomicHandle`]. A tape snapshots the callbacks it
//! uses at record time, so sweeps never touch the registry.

use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::debug;

use crate::ad::Ad;
use crate::base::Base;
use crate::error::{Result, TapeError};
use crate::opcode::OpCode;
use crate::tape::{with_recorder, Operand, TapeLocal};

/// Callbacks of an atomic operation `y = f(x)` with `n` arguments and `m`
/// results.
///
/// Coefficient arrays are laid out per component: with `p = order + 1`
/// coefficients each, `tx[j * p + k]` is coefficient `k` of argument `j`.
pub trait AtomicOp<B: Base>: Send + Sync {
    fn name(&self) -> &str;

    /// Fill coefficient `order` of every result in `ty`. Orders below
    /// `order` are already present in both `tx` and `ty`.
    fn forward(&self, order: usize, tx: &[B], ty: &mut [B]);

    /// Accumulate `px[j] += Σ_i py[i] * ∂y_i/∂x_j` at the order-zero point
    /// `tx`, `ty`.
    fn reverse(&self, tx: &[B], ty: &[B], px: &mut [B], py: &[B]);

    /// Which results depend on variable arguments. Results that do not are
    /// recorded as constants.
    fn result_depends(&self, arg_is_variable: &[bool], num_res: usize) -> Vec<bool> {
        vec![arg_is_variable.iter().any(|&v| v); num_res]
    }
}

/// Process-wide identifier of a registered atomic operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AtomicHandle(usize);

impl AtomicHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

struct Entry {
    name: String,
    num_arg: usize,
    num_res: usize,
    base: TypeId,
    base_name: &'static str,
    /// `Arc<dyn AtomicOp<B>>` for the registered base type.
    op: Box<dyn Any + Send + Sync>,
}

fn registry() -> &'static RwLock<Vec<Entry>> {
    static REGISTRY: OnceLock<RwLock<Vec<Entry>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(Vec::new()))
}

/// Register an atomic operation with `num_arg` arguments and `num_res`
/// results. Handles are never reused.
pub fn register_atomic<B, A>(op: A, num_arg: usize, num_res: usize) -> AtomicHandle
where
    B: Base,
    A: AtomicOp<B> + 'static,
{
    let name = op.name().to_owned();
    let op: Arc<dyn AtomicOp<B>> = Arc::new(op);
    let mut entries = registry().write().unwrap_or_else(PoisonError::into_inner);
    entries.push(Entry {
        name,
        num_arg,
        num_res,
        base: TypeId::of::<B>(),
        base_name: std::any::type_name::<B>(),
        op: Box::new(op),
    });
    let handle = AtomicHandle(entries.len() - 1);
    debug!(handle = handle.0, name = %entries[handle.0].name, num_arg, num_res, "atomic registered");
    handle
}

/// Name an atomic operation was registered with.
pub fn atomic_name(handle: AtomicHandle) -> Option<String> {
    let entries = registry().read().unwrap_or_else(PoisonError::into_inner);
    entries.get(handle.0).map(|e| e.name.clone())
}

/// Callbacks and shape of a registered operation.
///
/// # Panics
///
/// Panics if `handle` was not issued by [`register_atomic`] or was
/// registered for a different base type.
pub fn atomic_entry<B: Base>(handle: AtomicHandle) -> (Arc<dyn AtomicOp<B>>, usize, usize) {
    let entries = registry().read().unwrap_or_else(PoisonError::into_inner);
    let Some(entry) = entries.get(handle.0) else {
        panic!("unknown atomic handle {}", handle.0);
    };
    match entry.op.downcast_ref::<Arc<dyn AtomicOp<B>>>() {
        Some(op) if entry.base == TypeId::of::<B>() => (Arc::clone(op), entry.num_arg, entry.num_res),
        _ => panic!(
            "atomic '{}' registered for {} used with {}",
            entry.name,
            entry.base_name,
            std::any::type_name::<B>()
        ),
    }
}

/// Apply a registered atomic operation to recorded arguments.
///
/// Outside a recording (all arguments constants) the operation is simply
/// evaluated. Arguments that are all dynamic parameters or constants are a
/// [`TapeError::DynamicOperand`] fault: the results would not follow a
/// later [`Tape::set_dynamic`](crate::Tape::set_dynamic).
pub fn call_atomic<B: TapeLocal>(handle: AtomicHandle, args: &[Ad<B>]) -> Result<Vec<Ad<B>>> {
    let (op, num_arg, num_res) = atomic_entry::<B>(handle);
    if args.len() != num_arg {
        return Err(TapeError::LengthMismatch {
            what: "atomic arguments",
            expected: num_arg,
            got: args.len(),
        });
    }
    let tape = Ad::common_tape(args)?;
    let tx: Vec<B> = args.iter().map(|a| a.value()).collect();
    let mut ty = vec![B::zero(); num_res];
    op.forward(0, &tx, &mut ty);
    if tape.is_none() {
        return Ok(ty.into_iter().map(Ad::constant).collect());
    }

    with_recorder::<B, _>(|rec| {
        let current = rec.as_ref().map(|r| r.id());
        let operands = args
            .iter()
            .map(|a| a.operand(current))
            .collect::<Result<Vec<Operand<B>>>>()?;
        let Some(rec) = rec else {
            return Err(TapeError::NotRecording);
        };
        let is_var: Vec<bool> = operands.iter().map(Operand::is_variable).collect();
        if !is_var.contains(&true) && operands.iter().any(Operand::is_dynamic) {
            return Err(TapeError::DynamicOperand { op: OpCode::User.name() });
        }
        let depends = op.result_depends(&is_var, num_res);
        let results = rec.put_user_call(handle, op, &operands, &depends, &ty);
        let id = rec.id();
        Ok(results.into_iter().map(|r| Ad::from_operand(r, id)).collect())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scale(f64);

    impl AtomicOp<f64> for Scale {
        fn name(&self) -> &str {
            "scale"
        }

        fn forward(&self, order: usize, tx: &[f64], ty: &mut [f64]) {
            ty[order] = self.0 * tx[order];
        }

        fn reverse(&self, _: &[f64], _: &[f64], px: &mut [f64], py: &[f64]) {
            px[0] += self.0 * py[0];
        }
    }

    #[test]
    fn handles_are_distinct_and_named() {
        let a = register_atomic(Scale(2.0), 1, 1);
        let b = register_atomic(Scale(3.0), 1, 1);
        assert_ne!(a, b);
        assert_eq!(atomic_name(a).as_deref(), Some("scale"));
        let (_, n, m) = atomic_entry::<f64>(b);
        assert_eq!((n, m), (1, 1));
    }

    #[test]
    #[should_panic(expected = "registered for f64 used with f32")]
    fn wrong_base_type_is_fatal() {
        let h = register_atomic(Scale(2.0), 1, 1);
        let _ = atomic_entry::<f32>(h);
    }

    #[test]
    fn constant_arguments_evaluate_directly() {
        let h = register_atomic(Scale(4.0), 1, 1);
        let y = call_atomic(h, &[Ad::constant(2.0)]).unwrap();
        assert_eq!(y[0].value(), 8.0);
        assert!(!y[0].is_variable());
    }
}
