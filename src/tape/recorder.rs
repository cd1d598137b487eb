//! The mutable recording target.
//!
//! A [`Recorder`] assigns variable indices in increasing order and appends
//! instructions whose operands are already resolved. Operand resolution
//! itself (which tape a value belongs to) happens in the front end; the
//! recorder chooses the operator kind from the operand classes, applies the
//! identity short-circuits, and interns constants.

use std::ops::Range;
use std::sync::Arc;

use tracing::debug;

use crate::atomic::{AtomicHandle, AtomicOp};
use crate::base::Base;
use crate::discrete::{DiscreteFn, DiscreteHandle};
use crate::error::{Result, TapeError};
use crate::opcode::{arg_is_variable, Addr, Arity, CompareOp, OpCode};

use super::player::{forward_arg_len, CSkipArgs, CSumArgs};
use super::pool::ParamPool;
use super::{Tape, TapeId};

/// A resolved operand: what an instruction argument can refer to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand<B> {
    /// Not on any tape; interned as a constant parameter when used.
    Constant(B),
    /// A dynamic parameter of the recording tape.
    Dynamic { addr: Addr, value: B },
    /// A variable of the recording tape.
    Variable { addr: Addr, value: B },
}

impl<B: Base> Operand<B> {
    #[inline]
    pub fn value(&self) -> B {
        match *self {
            Operand::Constant(v) => v,
            Operand::Dynamic { value, .. } | Operand::Variable { value, .. } => value,
        }
    }

    #[inline]
    pub fn is_variable(&self) -> bool {
        matches!(self, Operand::Variable { .. })
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        matches!(self, Operand::Constant(_))
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Operand::Dynamic { .. })
    }

    /// Only constants qualify: a dynamic parameter may be re-bound.
    #[inline]
    fn is_identical_zero(&self) -> bool {
        matches!(self, Operand::Constant(v) if v.is_identical_zero())
    }

    #[inline]
    fn is_identical_one(&self) -> bool {
        matches!(self, Operand::Constant(v) if v.is_identical_one())
    }
}

/// Binary operations with `pv`/`vp`/`vv` operator kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Azmul,
}

impl BinaryOp {
    #[inline]
    pub fn eval<B: Base>(self, x: B, y: B) -> B {
        match self {
            BinaryOp::Add => x + y,
            BinaryOp::Sub => x - y,
            BinaryOp::Mul => x * y,
            BinaryOp::Div => x / y,
            BinaryOp::Pow => x.powf(y),
            BinaryOp::Azmul => x.azmul(y),
        }
    }

    /// `(pv, vp, vv)` kinds; commutative operations have no `vp` kind and
    /// swap their operands instead.
    fn kinds(self) -> (OpCode, Option<OpCode>, OpCode) {
        match self {
            BinaryOp::Add => (OpCode::AddPv, None, OpCode::AddVv),
            BinaryOp::Sub => (OpCode::SubPv, Some(OpCode::SubVp), OpCode::SubVv),
            BinaryOp::Mul => (OpCode::MulPv, None, OpCode::MulVv),
            BinaryOp::Div => (OpCode::DivPv, Some(OpCode::DivVp), OpCode::DivVv),
            BinaryOp::Pow => (OpCode::PowPv, Some(OpCode::PowVp), OpCode::PowVv),
            BinaryOp::Azmul => (OpCode::ZmulPv, Some(OpCode::ZmulVp), OpCode::ZmulVv),
        }
    }

    fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Pow => "pow",
            BinaryOp::Azmul => "azmul",
        }
    }
}

/// Reservation for a conditional skip, see [`Recorder::begin_skip`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SkipId {
    tape: TapeId,
    index: usize,
}

#[derive(Clone, Debug)]
struct PendingSkip {
    before_op: usize,
    rel: CompareOp,
    flags: Addr,
    left: Addr,
    right: Addr,
    /// Outcome when both comparison operands are constants.
    constant: Option<bool>,
    branches: Option<(Range<usize>, Range<usize>)>,
}

/// Recording state of one tape.
pub struct Recorder<B: Base> {
    id: TapeId,
    ops: Vec<OpCode>,
    args: Vec<Addr>,
    pool: ParamPool<B>,
    text: Vec<String>,
    vecad: Vec<Addr>,
    num_var: usize,
    num_load: usize,
    ind_var: Vec<Addr>,
    skips: Vec<PendingSkip>,
    atomics: Vec<super::AtomicSlot<B>>,
    discretes: Vec<super::DiscreteSlot<B>>,
    /// Constants `0` and `2/√π` shared by every `Erf`.
    erf_par: Option<(Addr, Addr)>,
    is_var: Vec<bool>,
}

impl<B: Base> Recorder<B> {
    /// Start a new tape: variable 0 is the `Begin` marker.
    pub fn begin() -> Self {
        Self::with_capacity(0)
    }

    /// Like [`begin`](Self::begin) with room for `est_ops` instructions.
    pub fn with_capacity(est_ops: usize) -> Self {
        let mut rec = Recorder {
            id: TapeId::fresh(),
            ops: Vec::with_capacity(est_ops),
            args: Vec::with_capacity(2 * est_ops),
            pool: ParamPool::new(),
            text: Vec::new(),
            vecad: Vec::new(),
            num_var: 0,
            num_load: 0,
            ind_var: Vec::new(),
            skips: Vec::new(),
            atomics: Vec::new(),
            discretes: Vec::new(),
            erf_par: None,
            is_var: Vec::new(),
        };
        rec.append(OpCode::Begin, &[0]);
        debug!(tape = %rec.id, "recording started");
        rec
    }

    #[inline]
    pub fn id(&self) -> TapeId {
        self.id
    }

    #[inline]
    pub fn num_op(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub fn num_var(&self) -> usize {
        self.num_var
    }

    #[inline]
    pub fn num_ind(&self) -> usize {
        self.ind_var.len()
    }

    /// Record an independent variable.
    pub fn new_independent(&mut self) -> Addr {
        let addr = self.append(OpCode::Inv, &[]);
        self.ind_var.push(addr);
        addr
    }

    #[inline]
    pub fn put_con_par(&mut self, value: B) -> Addr {
        self.pool.put_con_par(value)
    }

    #[inline]
    pub fn put_dyn_par(&mut self, value: B) -> Addr {
        self.pool.put_dyn_par(value)
    }

    /// Store text for a `Pri` instruction.
    pub fn put_text(&mut self, text: &str) -> Addr {
        self.text.push(text.to_owned());
        (self.text.len() - 1) as Addr
    }

    /// Store the initial elements (parameter addresses) of an indexed
    /// vector. Returns the offset of its first element.
    pub fn put_vecad(&mut self, initial: &[Addr]) -> Addr {
        self.vecad.push(initial.len() as Addr);
        let offset = self.vecad.len() as Addr;
        self.vecad.extend_from_slice(initial);
        offset
    }

    /// Parameter address of a non-variable operand, interning constants.
    fn param_addr(&mut self, x: Operand<B>) -> Addr {
        match x {
            Operand::Constant(v) => self.pool.put_con_par(v),
            Operand::Dynamic { addr, .. } => addr,
            Operand::Variable { .. } => unreachable!("variable used as parameter"),
        }
    }

    /// Variable or parameter address, interning constants.
    fn addr(&mut self, x: Operand<B>) -> Addr {
        match x {
            Operand::Variable { addr, .. } => addr,
            other => self.param_addr(other),
        }
    }

    /// Record one fixed-arity instruction. Returns its primary result index.
    pub fn append(&mut self, op: OpCode, args: &[Addr]) -> Addr {
        if cfg!(debug_assertions) {
            self.check_instruction(op, args);
        }
        self.ops.push(op);
        self.args.extend_from_slice(args);
        self.num_var += op.num_res();
        self.num_var.saturating_sub(1) as Addr
    }

    fn check_instruction(&mut self, op: OpCode, args: &[Addr]) {
        if let Arity::Fixed(n) = op.num_arg() {
            assert_eq!(args.len(), n, "{}: expected {} arguments", op, n);
        }
        arg_is_variable(op, args, &mut self.is_var);
        for (slot, (&a, &is_var)) in args.iter().zip(self.is_var.iter()).enumerate() {
            if is_var {
                assert!(
                    (a as usize) < self.num_var && a != 0,
                    "{}: argument {} references variable {} of {}",
                    op,
                    slot,
                    a,
                    self.num_var
                );
            } else if holds_parameter(op, slot, args) {
                assert!(
                    (a as usize) < self.pool.len(),
                    "{}: argument {} references parameter {} of {}",
                    op,
                    slot,
                    a,
                    self.pool.len()
                );
            }
        }
    }

    /// Record a cumulative sum `init + Σ add_var - Σ sub_var + Σ add_dyn - Σ sub_dyn`.
    pub fn put_csum(
        &mut self,
        init: B,
        add_var: &[Addr],
        sub_var: &[Addr],
        add_dyn: &[Addr],
        sub_dyn: &[Addr],
    ) -> Addr {
        let init = self.pool.put_con_par(init);
        let start = self.args.len();
        CSumArgs::encode(init, add_var, sub_var, add_dyn, sub_dyn, &mut self.args);
        if cfg!(debug_assertions) {
            let payload = self.args[start..].to_vec();
            self.check_instruction(OpCode::CSum, &payload);
        }
        self.ops.push(OpCode::CSum);
        self.num_var += 1;
        (self.num_var - 1) as Addr
    }

    /// Record `x op y`, or alias an operand when `y` (or `x`) is the
    /// operation's identity.
    pub fn record_binary(
        &mut self,
        op: BinaryOp,
        x: Operand<B>,
        y: Operand<B>,
        value: B,
    ) -> Result<Operand<B>> {
        if let Some(alias) = short_circuit(op, x, y, value) {
            return Ok(alias);
        }
        let (pv, vp, vv) = op.kinds();
        let (kind, args) = match (x.is_variable(), y.is_variable()) {
            (true, true) => (vv, [self.addr(x), self.addr(y)]),
            (false, true) => (pv, [self.param_addr(x), self.addr(y)]),
            (true, false) => match vp {
                Some(vp) => (vp, [self.addr(x), self.param_addr(y)]),
                None => (pv, [self.param_addr(y), self.addr(x)]),
            },
            (false, false) => {
                if x.is_dynamic() || y.is_dynamic() {
                    return Err(TapeError::DynamicOperand { op: op.name() });
                }
                return Ok(Operand::Constant(value));
            }
        };
        let addr = self.append(kind, &args);
        Ok(Operand::Variable { addr, value })
    }

    /// Record a unary function kind (including the multi-result kinds).
    pub fn record_unary(&mut self, op: OpCode, x: Operand<B>, value: B) -> Result<Operand<B>> {
        match x {
            Operand::Constant(_) => Ok(Operand::Constant(value)),
            Operand::Dynamic { .. } => Err(TapeError::DynamicOperand { op: op.name() }),
            Operand::Variable { addr: xa, .. } => {
                let addr = if op == OpCode::Erf {
                    let (zero, two_over_sqrt_pi) = self.erf_parameters();
                    self.append(op, &[xa, zero, two_over_sqrt_pi])
                } else {
                    debug_assert_eq!(op.num_arg(), Arity::Fixed(1), "{} is not unary", op);
                    self.append(op, &[xa])
                };
                Ok(Operand::Variable { addr, value })
            }
        }
    }

    fn erf_parameters(&mut self) -> (Addr, Addr) {
        if let Some(pair) = self.erf_par {
            return pair;
        }
        let zero = self.pool.put_con_par(B::zero());
        let c = self
            .pool
            .put_con_par(B::from_f64(std::f64::consts::FRAC_2_SQRT_PI));
        self.erf_par = Some((zero, c));
        (zero, c)
    }

    /// Record the relation between `x` and `y` that held at record time.
    ///
    /// `result` is `x rel y` evaluated now. The recorded instruction is the
    /// one among `Lt`, `Le`, `Eq`, `Ne` that is true, so a replay can count
    /// how many comparisons changed outcome.
    pub fn record_compare(
        &mut self,
        rel: CompareOp,
        x: Operand<B>,
        y: Operand<B>,
        result: bool,
    ) -> Result<()> {
        if x.is_constant() && y.is_constant() {
            return Ok(());
        }
        use CompareOp::*;
        let (rel, a, b) = match (rel, result) {
            (Lt, true) => (Lt, x, y),
            (Lt, false) => (Le, y, x),
            (Le, true) => (Le, x, y),
            (Le, false) => (Lt, y, x),
            (Gt, true) => (Lt, y, x),
            (Gt, false) => (Le, x, y),
            (Ge, true) => (Le, y, x),
            (Ge, false) => (Lt, x, y),
            (Eq, true) => (Eq, x, y),
            (Eq, false) => (Ne, x, y),
            (Ne, true) => (Ne, x, y),
            (Ne, false) => (Eq, x, y),
        };
        let (a, b) = match rel {
            // symmetric relations have no `vp` kind
            Eq | Ne if a.is_variable() && !b.is_variable() => (b, a),
            _ => (a, b),
        };
        let kind = match (rel, a.is_variable(), b.is_variable()) {
            (Lt, false, false) => OpCode::LtPp,
            (Lt, false, true) => OpCode::LtPv,
            (Lt, true, false) => OpCode::LtVp,
            (Lt, true, true) => OpCode::LtVv,
            (Le, false, false) => OpCode::LePp,
            (Le, false, true) => OpCode::LePv,
            (Le, true, false) => OpCode::LeVp,
            (Le, true, true) => OpCode::LeVv,
            (Eq, false, false) => OpCode::EqPp,
            (Eq, false, true) => OpCode::EqPv,
            (Eq, true, true) => OpCode::EqVv,
            (Ne, false, false) => OpCode::NePp,
            (Ne, false, true) => OpCode::NePv,
            (Ne, true, true) => OpCode::NeVv,
            _ => unreachable!("relation normalized above"),
        };
        let args = [self.addr(a), self.addr(b)];
        self.append(kind, &args);
        Ok(())
    }

    /// Record `if left rel right { if_true } else { if_false }`.
    ///
    /// With two constant comparison operands the selected operand is
    /// returned as is.
    pub fn record_cond_exp(
        &mut self,
        rel: CompareOp,
        left: Operand<B>,
        right: Operand<B>,
        if_true: Operand<B>,
        if_false: Operand<B>,
        value: B,
    ) -> Result<Operand<B>> {
        if left.is_constant() && right.is_constant() {
            return Ok(if rel.eval(left.value(), right.value()) {
                if_true
            } else {
                if_false
            });
        }
        let operands = [left, right, if_true, if_false];
        if !operands.iter().any(Operand::is_variable) {
            return Err(TapeError::DynamicOperand { op: "cond_exp" });
        }
        let mut flags = 0;
        for (bit, x) in operands.iter().enumerate() {
            if x.is_variable() {
                flags |= 1 << bit;
            }
        }
        let args = [
            rel as Addr,
            flags,
            self.addr(left),
            self.addr(right),
            self.addr(if_true),
            self.addr(if_false),
        ];
        let addr = self.append(OpCode::CExp, &args);
        Ok(Operand::Variable { addr, value })
    }

    /// Reserve a conditional skip in front of the next instruction.
    ///
    /// The branches recorded afterwards are registered with
    /// [`finish_skip`](Self::finish_skip); the skip is written into the
    /// instruction stream by [`end`](Self::end). A reservation that is never
    /// finished is dropped.
    pub fn begin_skip(&mut self, rel: CompareOp, left: Operand<B>, right: Operand<B>) -> SkipId {
        let constant = if left.is_constant() && right.is_constant() {
            Some(rel.eval(left.value(), right.value()))
        } else {
            None
        };
        let flags = left.is_variable() as Addr | (right.is_variable() as Addr) << 1;
        let skip = PendingSkip {
            before_op: self.ops.len(),
            rel,
            flags,
            left: self.addr(left),
            right: self.addr(right),
            constant,
            branches: None,
        };
        self.skips.push(skip);
        SkipId {
            tape: self.id,
            index: self.skips.len() - 1,
        }
    }

    /// Register the instruction ranges of the true and false branches.
    ///
    /// A reservation made on another recording is a
    /// [`TapeError::ForeignOperand`] fault.
    pub fn finish_skip(&mut self, id: SkipId, if_true: Range<usize>, if_false: Range<usize>) -> Result<()> {
        let skip = match self.skips.get_mut(id.index) {
            Some(skip) if id.tape == self.id => skip,
            _ => {
                return Err(TapeError::ForeignOperand {
                    operand: id.tape,
                    current: self.id,
                })
            }
        };
        debug_assert!(skip.before_op <= if_true.start && if_true.end <= if_false.start);
        skip.branches = Some((if_true, if_false));
        Ok(())
    }

    /// Record a load from an indexed vector.
    pub fn put_load(&mut self, offset: Addr, index: Operand<B>, value: B) -> Operand<B> {
        let load = self.num_load as Addr;
        self.num_load += 1;
        let (kind, idx) = if index.is_variable() {
            (OpCode::Ldv, self.addr(index))
        } else {
            (OpCode::Ldp, self.param_addr(index))
        };
        let addr = self.append(kind, &[offset, idx, load]);
        Operand::Variable { addr, value }
    }

    /// Record a store into an indexed vector.
    pub fn put_store(&mut self, offset: Addr, index: Operand<B>, value: Operand<B>) {
        let kind = match (index.is_variable(), value.is_variable()) {
            (false, false) => OpCode::StPp,
            (false, true) => OpCode::StPv,
            (true, false) => OpCode::StVp,
            (true, true) => OpCode::StVv,
        };
        let args = [offset, self.addr(index), self.addr(value)];
        self.append(kind, &args);
    }

    /// Record a forward-mode print of `before value after` when `pos <= 0`.
    pub fn put_print(&mut self, pos: Operand<B>, before: &str, value: Operand<B>, after: &str) {
        let flags = pos.is_variable() as Addr | (value.is_variable() as Addr) << 1;
        let args = [
            flags,
            self.addr(pos),
            self.put_text(before),
            self.addr(value),
            self.put_text(after),
        ];
        self.append(OpCode::Pri, &args);
    }

    /// Record an atomic call bracket. `results` are the order-zero values
    /// and `depends[i]` tells whether result `i` is a variable.
    pub fn put_user_call(
        &mut self,
        handle: AtomicHandle,
        op: Arc<dyn AtomicOp<B>>,
        args: &[Operand<B>],
        depends: &[bool],
        results: &[B],
    ) -> Vec<Operand<B>> {
        let slot = match self.atomics.iter().position(|(h, _)| *h == handle) {
            Some(slot) => slot,
            None => {
                self.atomics.push((handle, op));
                self.atomics.len() - 1
            }
        };
        let header = [
            handle.index() as Addr,
            slot as Addr,
            args.len() as Addr,
            results.len() as Addr,
        ];
        self.append(OpCode::User, &header);
        for &x in args {
            if x.is_variable() {
                let a = self.addr(x);
                self.append(OpCode::UsrAv, &[a]);
            } else {
                let p = self.param_addr(x);
                self.append(OpCode::UsrAp, &[p]);
            }
        }
        let out = results
            .iter()
            .zip(depends)
            .map(|(&value, &depends)| {
                if depends {
                    let addr = self.append(OpCode::UsrRv, &[]);
                    Operand::Variable { addr, value }
                } else {
                    let p = self.pool.put_con_par(value);
                    self.append(OpCode::UsrRp, &[p]);
                    Operand::Constant(value)
                }
            })
            .collect();
        self.append(OpCode::User, &header);
        out
    }

    /// Record `f(x)` for a discrete function; the first argument is the
    /// tape-local slot of `f`.
    pub fn put_discrete(&mut self, handle: DiscreteHandle, f: DiscreteFn<B>, x: Addr, value: B) -> Operand<B> {
        let slot = match self.discretes.iter().position(|(h, _)| *h == handle) {
            Some(slot) => slot,
            None => {
                self.discretes.push((handle, f));
                self.discretes.len() - 1
            }
        };
        let addr = self.append(OpCode::Dis, &[slot as Addr, x]);
        Operand::Variable { addr, value }
    }

    /// Freeze the recording into a [`Tape`].
    ///
    /// A dependent that is a parameter is first turned into a variable with
    /// `Par`.
    pub fn end(mut self, dependents: &[Operand<B>]) -> Tape<B> {
        self.materialize_skips();
        let dep_var: Vec<Addr> = dependents
            .iter()
            .map(|&d| match d {
                Operand::Variable { addr, .. } => addr,
                other => {
                    let p = self.param_addr(other);
                    self.append(OpCode::Par, &[p])
                }
            })
            .collect();
        self.append(OpCode::End, &[]);
        debug!(
            tape = %self.id,
            num_op = self.ops.len(),
            num_var = self.num_var,
            num_par = self.pool.len(),
            num_dep = dep_var.len(),
            "recording finished"
        );
        Tape {
            id: self.id,
            ops: self.ops,
            args: self.args,
            pool: self.pool,
            text: self.text,
            vecad: self.vecad,
            num_var: self.num_var,
            num_load: self.num_load,
            ind_var: self.ind_var,
            dep_var,
            atomics: self.atomics,
            discretes: self.discretes,
        }
    }

    /// Insert every finished skip reservation into the instruction stream.
    fn materialize_skips(&mut self) {
        struct Ready {
            before_op: usize,
            skip: PendingSkip,
            if_true: Vec<usize>,
            if_false: Vec<usize>,
        }

        let ops = &self.ops;
        let skippable = |i: &usize| {
            let op = ops[*i];
            !(op.is_comparison() || op.is_store() || op == OpCode::Pri)
        };
        let mut ready: Vec<Ready> = std::mem::take(&mut self.skips)
            .into_iter()
            .filter_map(|skip| {
                let (t, f) = skip.branches.clone()?;
                let true_ops: Vec<usize> = t.filter(skippable).collect();
                let false_ops: Vec<usize> = f.filter(skippable).collect();
                // `if_true` lists what to skip when the comparison holds
                let (if_true, if_false) = match skip.constant {
                    Some(true) => (false_ops, Vec::new()),
                    Some(false) => (Vec::new(), true_ops),
                    None => (false_ops, true_ops),
                };
                if if_true.is_empty() && if_false.is_empty() {
                    return None;
                }
                Some(Ready {
                    before_op: skip.before_op,
                    skip,
                    if_true,
                    if_false,
                })
            })
            .collect();
        if ready.is_empty() {
            return;
        }
        ready.sort_by_key(|r| r.before_op);

        // new position of every existing instruction
        let mut new_index = Vec::with_capacity(self.ops.len());
        let mut inserted = 0;
        for i in 0..self.ops.len() {
            while inserted < ready.len() && ready[inserted].before_op <= i {
                inserted += 1;
            }
            new_index.push(i + inserted);
        }

        let mut ops = Vec::with_capacity(self.ops.len() + ready.len());
        let mut args = Vec::with_capacity(self.args.len());
        let mut next = ready.iter().peekable();
        let mut arg_pos = 0;
        for (i, &op) in self.ops.iter().enumerate() {
            while let Some(r) = next.next_if(|r| r.before_op == i) {
                let map = |list: &[usize]| list.iter().map(|&k| new_index[k] as Addr).collect::<Vec<_>>();
                CSkipArgs::encode(
                    r.skip.rel,
                    r.skip.flags,
                    r.skip.left,
                    r.skip.right,
                    &map(&r.if_true),
                    &map(&r.if_false),
                    &mut args,
                );
                ops.push(OpCode::CSkip);
            }
            let n_arg = forward_arg_len(op, i, &self.args[arg_pos..]);
            args.extend_from_slice(&self.args[arg_pos..arg_pos + n_arg]);
            arg_pos += n_arg;
            ops.push(op);
        }
        debug!(tape = %self.id, count = ready.len(), "conditional skips inserted");
        self.ops = ops;
        self.args = args;
    }
}

/// Identity and absorbing-element aliases. Only constants qualify.
///
/// An absorbing alias keeps the value computed at record time (`0 / 0` is
/// NaN, `0^0` is one) rather than assuming zero.
fn short_circuit<B: Base>(op: BinaryOp, x: Operand<B>, y: Operand<B>, value: B) -> Option<Operand<B>> {
    let computed = Operand::Constant(value);
    match op {
        BinaryOp::Add if y.is_identical_zero() => Some(x),
        BinaryOp::Add if x.is_identical_zero() => Some(y),
        BinaryOp::Sub if y.is_identical_zero() => Some(x),
        BinaryOp::Mul if y.is_identical_one() => Some(x),
        BinaryOp::Mul if x.is_identical_one() => Some(y),
        BinaryOp::Mul if x.is_identical_zero() || y.is_identical_zero() => Some(computed),
        BinaryOp::Div if y.is_identical_one() => Some(x),
        BinaryOp::Div if x.is_identical_zero() => Some(computed),
        BinaryOp::Pow if y.is_identical_zero() => Some(computed),
        BinaryOp::Pow if y.is_identical_one() => Some(x),
        BinaryOp::Pow if x.is_identical_zero() => Some(computed),
        BinaryOp::Azmul if x.is_identical_zero() || y.is_identical_zero() => Some(computed),
        BinaryOp::Azmul if x.is_identical_one() => Some(y),
        BinaryOp::Azmul if y.is_identical_one() => Some(x),
        _ => None,
    }
}

/// Whether a non-variable slot holds a parameter address (as opposed to a
/// relation, flag word, offset, text index or count).
fn holds_parameter(op: OpCode, slot: usize, args: &[Addr]) -> bool {
    match op {
        OpCode::CExp => slot >= 2,
        OpCode::CSkip => slot == 2 || slot == 3,
        OpCode::CSum => slot == 0 || (args[2] as usize..args[4] as usize).contains(&slot),
        OpCode::Pri => slot == 1 || slot == 3,
        OpCode::Ldp | OpCode::Ldv => slot == 1,
        OpCode::StPp | OpCode::StPv | OpCode::StVp | OpCode::StVv => slot >= 1,
        OpCode::User | OpCode::Dis => false,
        _ => true,
    }
}
