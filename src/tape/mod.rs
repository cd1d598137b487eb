//! Finalized instruction tapes and the machinery that records and replays them.
//!
//! A [`Recorder`] is the mutable recording target owned by one thread. Its
//! [`end`](Recorder::end) freezes it into a [`Tape`], which is read-only and
//! may be replayed from any number of threads, each sweep with its own
//! [`Workspace`].
//!
//! # Layout
//!
//! Instructions are stored as a flat operator stream plus a flat argument
//! stream. Fixed-arity kinds take their argument count from the catalog;
//! `CSum` and `CSkip` embed their own length at both ends of their payload,
//! so a [`Player`] can walk the tape in either direction without an index
//! table.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::atomic::{AtomicHandle, AtomicOp};
use crate::base::Base;
use crate::discrete::{DiscreteFn, DiscreteHandle};
use crate::error::Result;
use crate::opcode::{Addr, OpCode};

mod forward;
mod player;
mod pool;
mod recorder;
mod reverse;
mod thread_local;
mod trace;
mod workspace;

#[cfg(feature = "parallel")]
mod parallel;

pub use self::player::{CSkipArgs, CSumArgs, Instruction, Instructions, Player};
pub use self::pool::ParamPool;
pub use self::recorder::{BinaryOp, Operand, Recorder, SkipId};
pub use self::thread_local::{
    abort_recording, current_tape_id, is_recording, start_recording, stop_recording,
    with_recorder, RecordingGuard, TapeLocal,
};
pub use self::workspace::Workspace;

/// Identity of a tape: strictly positive and never reused within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TapeId(u32);

static NEXT_TAPE_ID: AtomicU32 = AtomicU32::new(1);

impl TapeId {
    pub(crate) fn fresh() -> TapeId {
        loop {
            let id = NEXT_TAPE_ID.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return TapeId(id);
            }
        }
    }

    /// Raw tag as stored in a value; `0` means "no tape".
    #[inline]
    pub(crate) fn from_raw(raw: u32) -> Option<TapeId> {
        if raw == 0 {
            None
        } else {
            Some(TapeId(raw))
        }
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Atomic callback snapshot taken at record time.
pub(crate) type AtomicSlot<B> = (AtomicHandle, Arc<dyn AtomicOp<B>>);

/// Discrete function snapshot taken at record time.
pub(crate) type DiscreteSlot<B> = (DiscreteHandle, DiscreteFn<B>);

/// A finalized recording.
///
/// Created by [`Recorder::end`] (usually through [`crate::api::finish`] or
/// [`crate::api::record`]). Replay with [`forward`](Self::forward) and
/// [`reverse`](Self::reverse).
#[derive(Clone)]
pub struct Tape<B: Base> {
    pub(crate) id: TapeId,
    pub(crate) ops: Vec<OpCode>,
    pub(crate) args: Vec<Addr>,
    pub(crate) pool: ParamPool<B>,
    pub(crate) text: Vec<String>,
    /// `[len, e0, e1, .., len, e0, ..]`: initial element parameters of every
    /// indexed vector, each block prefixed by its length.
    pub(crate) vecad: Vec<Addr>,
    pub(crate) num_var: usize,
    pub(crate) num_load: usize,
    pub(crate) ind_var: Vec<Addr>,
    pub(crate) dep_var: Vec<Addr>,
    pub(crate) atomics: Vec<AtomicSlot<B>>,
    pub(crate) discretes: Vec<DiscreteSlot<B>>,
}

impl<B: Base> Tape<B> {
    #[inline]
    pub fn id(&self) -> TapeId {
        self.id
    }

    /// Number of instructions, including `Begin` and `End`.
    #[inline]
    pub fn num_op(&self) -> usize {
        self.ops.len()
    }

    /// Number of variables, including the `Begin` result at index 0.
    #[inline]
    pub fn num_var(&self) -> usize {
        self.num_var
    }

    #[inline]
    pub fn num_ind(&self) -> usize {
        self.ind_var.len()
    }

    #[inline]
    pub fn num_dep(&self) -> usize {
        self.dep_var.len()
    }

    /// Size of the parameter pool, including the placeholder at index 0.
    #[inline]
    pub fn num_par(&self) -> usize {
        self.pool.len()
    }

    #[inline]
    pub fn num_dynamic(&self) -> usize {
        self.pool.num_dynamic()
    }

    /// Variable indices of the independent variables.
    #[inline]
    pub fn ind_var(&self) -> &[Addr] {
        &self.ind_var
    }

    /// Variable indices of the dependent variables.
    #[inline]
    pub fn dep_var(&self) -> &[Addr] {
        &self.dep_var
    }

    #[inline]
    pub fn parameter(&self, addr: Addr) -> B {
        self.pool.value(addr)
    }

    pub fn dynamic_values(&self) -> Vec<B> {
        self.pool.dynamic_values()
    }

    /// Re-bind the dynamic parameters for subsequent sweeps.
    pub fn set_dynamic(&mut self, values: &[B]) -> Result<()> {
        self.pool.set_dynamic(values)?;
        tracing::debug!(tape = %self.id, n = values.len(), "dynamic parameters rebound");
        Ok(())
    }

    #[inline]
    pub fn player(&self) -> Player<'_, B> {
        Player::new(self)
    }

    /// Number of instructions of kind `op`.
    pub fn count_op(&self, op: OpCode) -> usize {
        self.ops.iter().filter(|&&o| o == op).count()
    }

    /// Fresh scratch storage for sweeps over this tape.
    pub fn new_workspace(&self) -> Workspace<B> {
        Workspace::new(self)
    }
}

impl<B: Base> fmt::Debug for Tape<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tape")
            .field("id", &self.id)
            .field("num_op", &self.ops.len())
            .field("num_var", &self.num_var)
            .field("num_par", &self.pool.len())
            .field("num_ind", &self.ind_var.len())
            .field("num_dep", &self.dep_var.len())
            .field("num_atomic", &self.atomics.len())
            .field("num_discrete", &self.discretes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tape_ids_are_positive_and_distinct() {
        let a = TapeId::fresh();
        let b = TapeId::fresh();
        assert_ne!(a, b);
        assert!(a.get() > 0 && b.get() > 0);
        assert_eq!(TapeId::from_raw(0), None);
        assert_eq!(TapeId::from_raw(a.get()), Some(a));
    }
}
