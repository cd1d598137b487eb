//! Discrete functions: piecewise-constant user functions of one value.
//!
//! A discrete function is re-evaluated on every order-zero replay and has a
//! zero derivative everywhere, which makes it the tool for table lookups,
//! rounding and other step functions of a variable. Functions are
//! registered once per process; a tape snapshots the functions it calls.

use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::debug;

use crate::ad::Ad;
use crate::base::Base;
use crate::error::{Result, TapeError};
use crate::opcode::OpCode;
use crate::tape::{with_recorder, Operand, TapeLocal};

/// Shared callback of a registered discrete function.
pub type DiscreteFn<B> = Arc<dyn Fn(B) -> B + Send + Sync>;

/// Process-wide identifier of a registered discrete function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DiscreteHandle(usize);

impl DiscreteHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

struct Entry {
    name: String,
    base: TypeId,
    base_name: &'static str,
    /// `DiscreteFn<B>` for the registered base type.
    f: Box<dyn Any + Send + Sync>,
}

fn registry() -> &'static RwLock<Vec<Entry>> {
    static REGISTRY: OnceLock<RwLock<Vec<Entry>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(Vec::new()))
}

/// Register `f` under `name`. Handles are never reused.
pub fn register_discrete<B, F>(name: &str, f: F) -> DiscreteHandle
where
    B: Base,
    F: Fn(B) -> B + Send + Sync + 'static,
{
    let f: DiscreteFn<B> = Arc::new(f);
    let mut entries = registry().write().unwrap_or_else(PoisonError::into_inner);
    entries.push(Entry {
        name: name.to_owned(),
        base: TypeId::of::<B>(),
        base_name: std::any::type_name::<B>(),
        f: Box::new(f),
    });
    let handle = DiscreteHandle(entries.len() - 1);
    debug!(handle = handle.0, name, "discrete function registered");
    handle
}

pub fn discrete_name(handle: DiscreteHandle) -> Option<String> {
    let entries = registry().read().unwrap_or_else(PoisonError::into_inner);
    entries.get(handle.0).map(|e| e.name.clone())
}

/// The callback registered under `handle`.
///
/// # Panics
///
/// Panics if `handle` was not issued by [`register_discrete`] or was
/// registered for a different base type.
pub fn discrete_entry<B: Base>(handle: DiscreteHandle) -> DiscreteFn<B> {
    let entries = registry().read().unwrap_or_else(PoisonError::into_inner);
    let Some(entry) = entries.get(handle.0) else {
        panic!("unknown discrete handle {}", handle.0);
    };
    match entry.f.downcast_ref::<DiscreteFn<B>>() {
        Some(f) if entry.base == TypeId::of::<B>() => Arc::clone(f),
        _ => panic!(
            "discrete '{}' registered for {} used with {}",
            entry.name,
            entry.base_name,
            std::any::type_name::<B>()
        ),
    }
}

impl<B: TapeLocal> Ad<B> {
    /// Apply the discrete function `handle` to `self`.
    ///
    /// A constant argument is evaluated directly. A variable argument
    /// records a `Dis` instruction whose result is re-evaluated at every
    /// order-zero replay; its derivatives are zero.
    pub fn discrete(self, handle: DiscreteHandle) -> Result<Self> {
        let f = discrete_entry::<B>(handle);
        let value = f(self.value());
        if self.is_constant() {
            return Ok(Ad::constant(value));
        }
        with_recorder::<B, _>(|rec| {
            let current = rec.as_ref().map(|r| r.id());
            let x = self.operand(current)?;
            let Some(rec) = rec else {
                return Err(TapeError::NotRecording);
            };
            let out = match x {
                Operand::Variable { addr, .. } => rec.put_discrete(handle, f, addr, value),
                Operand::Dynamic { .. } => {
                    return Err(TapeError::DynamicOperand { op: OpCode::Dis.name() })
                }
                Operand::Constant(v) => Operand::Constant(v),
            };
            Ok(Ad::from_operand(out, rec.id()))
        })
    }
}
