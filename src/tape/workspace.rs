use crate::base::Base;
use crate::error::{Result, TapeError};
use crate::opcode::Addr;

use super::{Tape, TapeId};

/// Per-sweep scratch storage for one tape.
///
/// Holds the Taylor coefficients of every variable plus the replay state
/// of the last zero-order forward sweep: which instructions a conditional
/// skip removed, which variable every load resolved to, the indexed vector
/// contents and the comparison-change count. A workspace belongs to one
/// tape and one thread; the tape itself stays read-only.
#[derive(Clone, Debug)]
pub struct Workspace<B: Base> {
    pub(crate) tape: TapeId,
    /// Orders `0..num_order` hold valid coefficients.
    pub(crate) num_order: usize,
    /// Coefficients stored per variable: `taylor[var * cap + k]`.
    pub(crate) cap: usize,
    pub(crate) num_var: usize,
    pub(crate) taylor: Vec<B>,
    pub(crate) cskip: Vec<bool>,
    pub(crate) load_op: Vec<Addr>,
    /// Current element of every indexed vector: a variable index when the
    /// matching `vecad_is_var` flag is set, otherwise a parameter address.
    pub(crate) vecad_value: Vec<Addr>,
    pub(crate) vecad_is_var: Vec<bool>,
    pub(crate) compare_change_count: usize,
    pub(crate) compare_change_op: Option<usize>,
    pub(crate) print_log: Vec<String>,
    pub(crate) executed: usize,
}

impl<B: Base> Workspace<B> {
    pub fn new(tape: &Tape<B>) -> Self {
        Workspace {
            tape: tape.id,
            num_order: 0,
            cap: 1,
            num_var: tape.num_var,
            taylor: vec![B::zero(); tape.num_var],
            cskip: vec![false; tape.ops.len()],
            load_op: vec![0; tape.num_load],
            vecad_value: tape.vecad.clone(),
            vecad_is_var: vec![false; tape.vecad.len()],
            compare_change_count: 0,
            compare_change_op: None,
            print_log: Vec::new(),
            executed: 0,
        }
    }

    #[inline]
    pub fn tape_id(&self) -> TapeId {
        self.tape
    }

    /// Number of Taylor orders computed by the last forward sweeps.
    #[inline]
    pub fn num_order(&self) -> usize {
        self.num_order
    }

    /// Taylor coefficient `k` of variable `var`, if computed.
    pub fn coefficient(&self, var: Addr, k: usize) -> Option<B> {
        let var = var as usize;
        if var < self.num_var && k < self.num_order {
            Some(self.taylor[var * self.cap + k])
        } else {
            None
        }
    }

    /// Comparisons whose outcome differs from record time, counted by the
    /// last zero-order forward sweep.
    #[inline]
    pub fn compare_change_count(&self) -> usize {
        self.compare_change_count
    }

    /// Instruction index of the first changed comparison.
    #[inline]
    pub fn compare_change_op(&self) -> Option<usize> {
        self.compare_change_op
    }

    /// Lines emitted by `Pri` instructions during the last zero-order sweep.
    #[inline]
    pub fn print_log(&self) -> &[String] {
        &self.print_log
    }

    /// Instructions executed (not skipped) by the last forward sweep.
    #[inline]
    pub fn executed_ops(&self) -> usize {
        self.executed
    }

    /// Whether instruction `i_op` is skipped under the current outcomes.
    #[inline]
    pub fn is_skipped(&self, i_op: usize) -> bool {
        self.cskip.get(i_op).copied().unwrap_or(false)
    }

    pub(crate) fn check(&self, tape: &Tape<B>) -> Result<()> {
        if self.tape != tape.id {
            return Err(TapeError::WorkspaceMismatch {
                workspace: self.tape,
                tape: tape.id,
            });
        }
        Ok(())
    }

    /// Make room for coefficients `0..orders` of every variable.
    pub(crate) fn reserve_orders(&mut self, orders: usize) {
        if orders <= self.cap {
            return;
        }
        let cap = orders.max(2 * self.cap);
        let mut taylor = vec![B::zero(); self.num_var * cap];
        for var in 0..self.num_var {
            let old = &self.taylor[var * self.cap..var * self.cap + self.num_order];
            taylor[var * cap..var * cap + old.len()].copy_from_slice(old);
        }
        self.taylor = taylor;
        self.cap = cap;
    }

    /// Reset the replay state before a zero-order sweep.
    pub(crate) fn reset_replay(&mut self, tape: &Tape<B>) {
        self.cskip.iter_mut().for_each(|s| *s = false);
        self.load_op.iter_mut().for_each(|l| *l = 0);
        self.vecad_value.copy_from_slice(&tape.vecad);
        self.vecad_is_var.iter_mut().for_each(|v| *v = false);
        self.compare_change_count = 0;
        self.compare_change_op = None;
        self.print_log.clear();
    }

    /// Coefficients `0..cap` of one variable.
    #[inline]
    pub(crate) fn column(&self, var: Addr) -> &[B] {
        let start = var as usize * self.cap;
        &self.taylor[start..start + self.cap]
    }

    #[inline]
    pub(crate) fn set(&mut self, var: Addr, k: usize, value: B) {
        self.taylor[var as usize * self.cap + k] = value;
    }
}
