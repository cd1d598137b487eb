//! First-order reverse sweep.
//!
//! Walks the tape backward from the dependents, propagating adjoints
//! through the order-zero values left in a [`Workspace`] by a prior
//! zero-order forward sweep. Instructions removed by a conditional skip
//! during that sweep are skipped here too.

use tracing::{debug, trace};

use crate::base::Base;
use crate::error::{Result, TapeError};
use crate::opcode::{Addr, CompareOp, OpCode};

use super::player::{corrupt, CSumArgs, Instruction};
use super::{Tape, Workspace};

type ReverseFn<B> = fn(&mut ReverseSweep<'_, B>, &Instruction<'_>);

/// Argument values and result adjoints of the atomic call being reversed.
struct UserCall<B> {
    slot: usize,
    j: usize,
    i: usize,
    tx: Vec<B>,
    ty: Vec<B>,
    py: Vec<B>,
    arg_var: Vec<Addr>,
}

struct ReverseSweep<'a, B: Base> {
    tape: &'a Tape<B>,
    ws: &'a Workspace<B>,
    adj: Vec<B>,
    user: Option<UserCall<B>>,
}

impl<B: Base> ReverseSweep<'_, B> {
    /// Order-zero value of a variable.
    #[inline]
    fn x0(&self, var: Addr) -> B {
        self.ws.column(var)[0]
    }

    #[inline]
    fn par(&self, addr: Addr) -> B {
        self.tape.pool.value(addr)
    }

    #[inline]
    fn value(&self, addr: Addr, is_var: bool) -> B {
        if is_var {
            self.x0(addr)
        } else {
            self.par(addr)
        }
    }

    #[inline]
    fn add(&mut self, var: Addr, v: B) {
        let slot = &mut self.adj[var as usize];
        *slot = *slot + v;
    }

    fn user_call(&mut self, ins: &Instruction<'_>) -> &mut UserCall<B> {
        match self.user.as_mut() {
            Some(call) => call,
            None => corrupt(ins.i_op, ins.op, "atomic argument outside a call bracket"),
        }
    }
}

impl<B: Base> Tape<B> {
    /// Adjoints of the independent variables for `Σ weights[i] * y[i]`.
    ///
    /// `ws` must hold order zero from a forward sweep over this tape.
    pub fn reverse(&self, ws: &Workspace<B>, weights: &[B]) -> Result<Vec<B>> {
        let adj = self.reverse_all(ws, weights)?;
        Ok(self.ind_var.iter().map(|&v| adj[v as usize]).collect())
    }

    /// Like [`reverse`](Self::reverse), returning the adjoint of every
    /// variable.
    pub fn reverse_all(&self, ws: &Workspace<B>, weights: &[B]) -> Result<Vec<B>> {
        ws.check(self)?;
        if weights.len() != self.dep_var.len() {
            return Err(TapeError::LengthMismatch {
                what: "dependent weights",
                expected: self.dep_var.len(),
                got: weights.len(),
            });
        }
        if ws.num_order == 0 {
            return Err(TapeError::OrderNotAvailable {
                requested: 0,
                available: 0,
            });
        }
        debug!(tape = %self.id, num_op = self.ops.len(), "reverse sweep");

        let mut adj = vec![B::zero(); self.num_var];
        for (&v, &w) in self.dep_var.iter().zip(weights) {
            adj[v as usize] = adj[v as usize] + w;
        }

        let table: [ReverseFn<B>; OpCode::COUNT] =
            std::array::from_fn(|i| reverse_fn::<B>(OpCode::from_index(i)));
        let mut sweep = ReverseSweep {
            tape: self,
            ws,
            adj,
            user: None,
        };
        for ins in self.player().instructions().rev() {
            if ws.cskip[ins.i_op] {
                continue;
            }
            trace!(i_op = ins.i_op, op = %ins.op, i_var = ins.i_var, "reverse");
            table[ins.op as usize](&mut sweep, &ins);
        }
        Ok(sweep.adj)
    }

    /// Gradient of a scalar-valued tape at `x`.
    pub fn gradient(&self, x: &[B]) -> Result<Vec<B>> {
        if self.dep_var.len() != 1 {
            return Err(TapeError::LengthMismatch {
                what: "dependent variables",
                expected: 1,
                got: self.dep_var.len(),
            });
        }
        let mut ws = self.new_workspace();
        self.forward(0, x, &mut ws)?;
        self.reverse(&ws, &[B::one()])
    }

    /// Jacobian at `x`, row-major with one row per dependent.
    pub fn jacobian(&self, x: &[B]) -> Result<Vec<B>> {
        let mut ws = self.new_workspace();
        self.forward(0, x, &mut ws)?;
        let m = self.dep_var.len();
        let mut jac = Vec::with_capacity(m * self.ind_var.len());
        let mut weights = vec![B::zero(); m];
        for i in 0..m {
            weights[i] = B::one();
            jac.extend(self.reverse(&ws, &weights)?);
            weights[i] = B::zero();
        }
        Ok(jac)
    }
}

fn reverse_fn<B: Base>(op: OpCode) -> ReverseFn<B> {
    use OpCode::*;
    match op {
        Abs => rev_abs,
        Acos | Acosh | Asin | Asinh | Atan | Atanh => rev_inverse,
        AddPv => rev_add_pv,
        AddVv => rev_add_vv,
        Begin | End | Inv | Par | Sign | Pri | CSkip | Dis => rev_nothing,
        EqPp | EqPv | EqVv | LePp | LePv | LeVp | LeVv | LtPp | LtPv | LtVp | LtVv | NePp
        | NePv | NeVv => rev_nothing,
        StPp | StPv | StVp | StVv => rev_nothing,
        CExp => rev_cexp,
        Cos => rev_cos,
        Cosh => rev_cosh,
        CSum => rev_csum,
        DivPv => rev_div_pv,
        DivVp => rev_div_vp,
        DivVv => rev_div_vv,
        Erf => rev_erf,
        Exp => rev_exp,
        Expm1 => rev_expm1,
        Ldp | Ldv => rev_load,
        Log => rev_log,
        Log1p => rev_log1p,
        MulPv => rev_mul_pv,
        MulVv => rev_mul_vv,
        PowPv => rev_pow_pv,
        PowVp => rev_pow_vp,
        PowVv => rev_pow_vv,
        Sin => rev_sin,
        Sinh => rev_sinh,
        Sqrt => rev_sqrt,
        SubPv => rev_sub_pv,
        SubVp => rev_sub_vp,
        SubVv => rev_sub_vv,
        Tan => rev_tan,
        Tanh => rev_tanh,
        User => rev_user,
        UsrAp => rev_usr_ap,
        UsrAv => rev_usr_av,
        UsrRp => rev_usr_rp,
        UsrRv => rev_usr_rv,
        ZmulPv => rev_zmul_pv,
        ZmulVp => rev_zmul_vp,
        ZmulVv => rev_zmul_vv,
    }
}

/// Adjoint of the primary result, or `None` when it is an exact zero.
#[inline]
fn seed<B: Base>(s: &ReverseSweep<'_, B>, ins: &Instruction<'_>) -> Option<B> {
    let pz = s.adj[ins.i_var];
    if pz.is_identical_zero() {
        None
    } else {
        Some(pz)
    }
}

fn rev_nothing<B: Base>(_: &mut ReverseSweep<'_, B>, _: &Instruction<'_>) {}

fn rev_add_vv<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    s.add(ins.args[0], pz);
    s.add(ins.args[1], pz);
}

fn rev_add_pv<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    s.add(ins.args[1], pz);
}

fn rev_sub_vv<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    s.add(ins.args[0], pz);
    s.add(ins.args[1], -pz);
}

fn rev_sub_pv<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    s.add(ins.args[1], -pz);
}

fn rev_sub_vp<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    s.add(ins.args[0], pz);
}

fn rev_mul_vv<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    let (x, y) = (ins.args[0], ins.args[1]);
    let (x0, y0) = (s.x0(x), s.x0(y));
    s.add(x, pz * y0);
    s.add(y, pz * x0);
}

fn rev_mul_pv<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    let p = s.par(ins.args[0]);
    s.add(ins.args[1], pz * p);
}

fn rev_div_vv<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    let (x, y) = (ins.args[0], ins.args[1]);
    let y0 = s.x0(y);
    let z0 = s.x0(ins.i_var as Addr);
    s.add(x, pz / y0);
    s.add(y, -(pz * z0 / y0));
}

fn rev_div_pv<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    let y = ins.args[1];
    let y0 = s.x0(y);
    let z0 = s.x0(ins.i_var as Addr);
    s.add(y, -(pz * z0 / y0));
}

fn rev_div_vp<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    let p = s.par(ins.args[1]);
    s.add(ins.args[0], pz / p);
}

fn rev_zmul_vv<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    let (x, y) = (ins.args[0], ins.args[1]);
    let (x0, y0) = (s.x0(x), s.x0(y));
    s.add(x, pz.azmul(y0));
    s.add(y, x0.azmul(pz));
}

fn rev_zmul_pv<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    let p = s.par(ins.args[0]);
    s.add(ins.args[1], p.azmul(pz));
}

fn rev_zmul_vp<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    let p = s.par(ins.args[1]);
    s.add(ins.args[0], pz.azmul(p));
}

fn rev_pow_vv<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    let (x, y, z) = (ins.args[0], ins.args[1], ins.i_var as Addr);
    let (x0, y0, z0) = (s.x0(x), s.x0(y), s.x0(z));
    let log_x = s.x0(z - 2);
    s.add(x, pz * y0 * x0.powf(y0 - B::one()));
    s.add(y, pz * z0 * log_x);
}

fn rev_pow_pv<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    let z = ins.i_var as Addr;
    let (z0, log_p) = (s.x0(z), s.x0(z - 2));
    s.add(ins.args[1], pz * z0 * log_p);
}

fn rev_pow_vp<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    let x = ins.args[0];
    let p = s.par(ins.args[1]);
    let x0 = s.x0(x);
    s.add(x, pz * p * x0.powf(p - B::one()));
}

/// Unary kinds whose partial is a function of the operand and the result.
macro_rules! unary_partial {
    ($name:ident, |$x0:ident, $z0:ident, $pz:ident| $partial:expr) => {
        #[allow(unused_variables)]
        fn $name<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
            let Some($pz) = seed(s, ins) else { return };
            let x = ins.args[0];
            let $x0 = s.x0(x);
            let $z0 = s.x0(ins.i_var as Addr);
            s.add(x, $partial);
        }
    };
}

unary_partial!(rev_abs, |x0, z0, pz| pz * x0.sign());
unary_partial!(rev_sqrt, |x0, z0, pz| pz / (z0 + z0));
unary_partial!(rev_exp, |x0, z0, pz| pz * z0);
unary_partial!(rev_expm1, |x0, z0, pz| pz * (B::one() + z0));
unary_partial!(rev_log, |x0, z0, pz| pz / x0);
unary_partial!(rev_log1p, |x0, z0, pz| pz / (B::one() + x0));

/// Unary kinds whose partial comes from the auxiliary result before `z`.
macro_rules! aux_partial {
    ($name:ident, |$aux:ident, $pz:ident| $partial:expr) => {
        fn $name<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
            let Some($pz) = seed(s, ins) else { return };
            let $aux = s.x0(ins.i_var as Addr - 1);
            s.add(ins.args[0], $partial);
        }
    };
}

aux_partial!(rev_sin, |cos, pz| pz * cos);
aux_partial!(rev_cos, |sin, pz| -(pz * sin));
aux_partial!(rev_sinh, |cosh, pz| pz * cosh);
aux_partial!(rev_cosh, |sinh, pz| pz * sinh);
aux_partial!(rev_tan, |sq, pz| pz * (B::one() + sq));
aux_partial!(rev_tanh, |sq, pz| pz * (B::one() - sq));
// `2/√π exp(-x²)` is the result just before `erf(x)`
aux_partial!(rev_erf, |d, pz| pz * d);

fn rev_inverse<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    let b = s.x0(ins.i_var as Addr - 1);
    let partial = if ins.op == OpCode::Acos {
        -(pz / b)
    } else {
        pz / b
    };
    s.add(ins.args[0], partial);
}

fn rev_csum<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    let view = CSumArgs::new(ins.args);
    for &v in view.add_var() {
        s.add(v, pz);
    }
    for &v in view.sub_var() {
        s.add(v, -pz);
    }
}

fn rev_cexp<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    let a = ins.args;
    let rel = CompareOp::from_addr(a[0]);
    let flags = a[1];
    let left = s.value(a[2], flags & 1 != 0);
    let right = s.value(a[3], flags & 2 != 0);
    let zero = B::zero();
    if flags & 4 != 0 {
        s.add(a[4], B::cond_select(rel, left, right, pz, zero));
    }
    if flags & 8 != 0 {
        s.add(a[5], B::cond_select(rel, left, right, zero, pz));
    }
}

fn rev_load<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let Some(pz) = seed(s, ins) else { return };
    let var = s.ws.load_op[ins.args[2] as usize];
    if var != 0 {
        s.add(var, pz);
    }
}

// ══════════════════════════════════════════════
//  Atomic call bracket, visited back to front
// ══════════════════════════════════════════════

fn rev_user<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let a = ins.args;
    match s.user.take() {
        None => {
            let slot = a[1] as usize;
            match s.tape.atomics.get(slot) {
                Some((handle, _)) if handle.index() == a[0] as usize => {}
                _ => corrupt(ins.i_op, ins.op, "unknown atomic slot"),
            }
            let (n, m) = (a[2] as usize, a[3] as usize);
            s.user = Some(UserCall {
                slot,
                j: n,
                i: m,
                tx: vec![B::zero(); n],
                ty: vec![B::zero(); m],
                py: vec![B::zero(); m],
                arg_var: vec![0; n],
            });
        }
        Some(call) => {
            if call.j != 0 || call.i != 0 {
                corrupt(ins.i_op, ins.op, "atomic bracket opened early");
            }
            if call.py.iter().all(|p| p.is_identical_zero()) {
                return;
            }
            let mut px = vec![B::zero(); call.tx.len()];
            let op = &s.tape.atomics[call.slot].1;
            op.reverse(&call.tx, &call.ty, &mut px, &call.py);
            for (&var, &p) in call.arg_var.iter().zip(&px) {
                if var != 0 {
                    s.add(var, p);
                }
            }
        }
    }
}

fn rev_usr_ap<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let value = s.par(ins.args[0]);
    let call = s.user_call(ins);
    if call.j == 0 {
        corrupt(ins.i_op, ins.op, "too many atomic arguments");
    }
    call.j -= 1;
    call.tx[call.j] = value;
}

fn rev_usr_av<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let var = ins.args[0];
    let value = s.x0(var);
    let call = s.user_call(ins);
    if call.j == 0 {
        corrupt(ins.i_op, ins.op, "too many atomic arguments");
    }
    call.j -= 1;
    call.tx[call.j] = value;
    call.arg_var[call.j] = var;
}

fn rev_usr_rp<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let value = s.par(ins.args[0]);
    let call = s.user_call(ins);
    if call.i == 0 {
        corrupt(ins.i_op, ins.op, "too many atomic results");
    }
    call.i -= 1;
    call.ty[call.i] = value;
}

fn rev_usr_rv<B: Base>(s: &mut ReverseSweep<'_, B>, ins: &Instruction<'_>) {
    let var = ins.i_var as Addr;
    let (value, pz) = (s.x0(var), s.adj[var as usize]);
    let call = s.user_call(ins);
    if call.i == 0 {
        corrupt(ins.i_op, ins.op, "too many atomic results");
    }
    call.i -= 1;
    call.ty[call.i] = value;
    call.py[call.i] = pz;
}
