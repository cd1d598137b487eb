//! Forward Taylor sweep.
//!
//! `forward(q, ..)` computes order `q` of every variable given orders
//! `0..q` already in the workspace. Order zero also replays the data-flow
//! state: conditional skips, indexed-vector contents, comparison changes
//! and print output.

use tracing::{debug, info, trace};

use crate::base::Base;
use crate::error::{Result, TapeError};
use crate::opcode::{Addr, CompareOp, OpCode};
use crate::taylor_ops::*;

use super::player::{corrupt, CSkipArgs, CSumArgs, Instruction};
use super::{Tape, Workspace};

type ForwardFn<B> = fn(&mut ForwardSweep<'_, B>, &Instruction<'_>) -> Result<()>;

/// Argument and result coefficients of the atomic call being replayed.
struct UserCall<B> {
    slot: usize,
    n: usize,
    m: usize,
    j: usize,
    i: usize,
    tx: Vec<B>,
    ty: Vec<B>,
    res_var: Vec<Addr>,
}

struct ForwardSweep<'a, B: Base> {
    tape: &'a Tape<B>,
    ws: &'a mut Workspace<B>,
    q: usize,
    user: Option<UserCall<B>>,
}

impl<B: Base> ForwardSweep<'_, B> {
    #[inline]
    fn col(&self, var: Addr) -> &[B] {
        self.ws.column(var)
    }

    #[inline]
    fn par(&self, addr: Addr) -> B {
        self.tape.pool.value(addr)
    }

    /// Order-`q` coefficient of a parameter: the value at order zero.
    #[inline]
    fn par_q(&self, addr: Addr) -> B {
        if self.q == 0 {
            self.par(addr)
        } else {
            B::zero()
        }
    }

    /// Order-zero value of a variable or parameter argument.
    #[inline]
    fn value(&self, addr: Addr, is_var: bool) -> B {
        if is_var {
            self.col(addr)[0]
        } else {
            self.par(addr)
        }
    }

    /// Order-`q` coefficient of a variable or parameter argument.
    #[inline]
    fn coeff(&self, addr: Addr, is_var: bool) -> B {
        if is_var {
            self.col(addr)[self.q]
        } else {
            self.par_q(addr)
        }
    }

    #[inline]
    fn set(&mut self, var: usize, value: B) {
        self.ws.set(var as Addr, self.q, value);
    }

    /// Resolve an indexed-vector element position, checking the bound.
    fn element(&self, offset: Addr, index: B) -> Result<usize> {
        let len = self.tape.vecad[offset as usize - 1] as usize;
        let Some(idx) = index.to_index() else {
            return Err(TapeError::InvalidIndex { len });
        };
        if idx >= len {
            return Err(TapeError::IndexOutOfRange { index: idx, len });
        }
        Ok(offset as usize + idx)
    }

    fn user_call(&mut self, ins: &Instruction<'_>) -> &mut UserCall<B> {
        match self.user.as_mut() {
            Some(call) => call,
            None => corrupt(ins.i_op, ins.op, "atomic argument outside a call bracket"),
        }
    }
}

impl<B: Base> Tape<B> {
    /// Compute Taylor order `order` of every variable.
    ///
    /// `x` holds coefficient `order` of each independent variable. Orders
    /// below `order` must already be in `ws`; order zero resets it. Returns
    /// coefficient `order` of each dependent variable.
    pub fn forward(&self, order: usize, x: &[B], ws: &mut Workspace<B>) -> Result<Vec<B>> {
        ws.check(self)?;
        if x.len() != self.ind_var.len() {
            return Err(TapeError::LengthMismatch {
                what: "independent variables",
                expected: self.ind_var.len(),
                got: x.len(),
            });
        }
        if order > ws.num_order {
            return Err(TapeError::OrderNotAvailable {
                requested: order,
                available: ws.num_order,
            });
        }
        debug!(tape = %self.id, order, num_op = self.ops.len(), "forward sweep");

        ws.reserve_orders(order + 1);
        if order == 0 {
            ws.reset_replay(self);
        }
        // the coefficients of this order are rebuilt from scratch
        ws.num_order = order;
        for (&var, &xq) in self.ind_var.iter().zip(x) {
            ws.set(var, order, xq);
        }

        let table: [ForwardFn<B>; OpCode::COUNT] =
            std::array::from_fn(|i| forward_fn::<B>(OpCode::from_index(i)));
        let mut sweep = ForwardSweep {
            tape: self,
            ws,
            q: order,
            user: None,
        };
        let mut executed = 0;
        for ins in self.player().instructions() {
            if sweep.ws.cskip[ins.i_op] {
                continue;
            }
            trace!(i_op = ins.i_op, op = %ins.op, i_var = ins.i_var, "forward");
            table[ins.op as usize](&mut sweep, &ins)?;
            executed += 1;
        }

        let ws = sweep.ws;
        ws.executed = executed;
        ws.num_order = order + 1;
        if order == 0 && ws.compare_change_count > 0 {
            debug!(
                tape = %self.id,
                count = ws.compare_change_count,
                first = ?ws.compare_change_op,
                "comparison outcomes changed since recording"
            );
        }
        Ok(self
            .dep_var
            .iter()
            .map(|&v| ws.column(v)[order])
            .collect())
    }

    /// Zero-order sweep in a fresh workspace: the recorded function at `x`.
    pub fn function_value(&self, x: &[B]) -> Result<Vec<B>> {
        let mut ws = self.new_workspace();
        self.forward(0, x, &mut ws)
    }
}

fn forward_fn<B: Base>(op: OpCode) -> ForwardFn<B> {
    use OpCode::*;
    match op {
        Abs => fwd_abs,
        Acos => fwd_inverse::<B, { Acos as u8 }>,
        Acosh => fwd_inverse::<B, { Acosh as u8 }>,
        AddPv => fwd_add_pv,
        AddVv => fwd_add_vv,
        Asin => fwd_inverse::<B, { Asin as u8 }>,
        Asinh => fwd_inverse::<B, { Asinh as u8 }>,
        Atan => fwd_inverse::<B, { Atan as u8 }>,
        Atanh => fwd_inverse::<B, { Atanh as u8 }>,
        Begin => fwd_begin,
        CExp => fwd_cexp,
        Cos => fwd_cos,
        Cosh => fwd_cosh,
        CSkip => fwd_cskip,
        CSum => fwd_csum,
        Dis => fwd_dis,
        DivPv => fwd_div_pv,
        DivVp => fwd_div_vp,
        DivVv => fwd_div_vv,
        End | Inv => fwd_nothing,
        EqPp => fwd_compare::<B, { CompareOp::Eq as u8 }, false, false>,
        EqPv => fwd_compare::<B, { CompareOp::Eq as u8 }, false, true>,
        EqVv => fwd_compare::<B, { CompareOp::Eq as u8 }, true, true>,
        Erf => fwd_erf,
        Exp => fwd_exp,
        Expm1 => fwd_expm1,
        Ldp => fwd_load::<B, false>,
        Ldv => fwd_load::<B, true>,
        LePp => fwd_compare::<B, { CompareOp::Le as u8 }, false, false>,
        LePv => fwd_compare::<B, { CompareOp::Le as u8 }, false, true>,
        LeVp => fwd_compare::<B, { CompareOp::Le as u8 }, true, false>,
        LeVv => fwd_compare::<B, { CompareOp::Le as u8 }, true, true>,
        Log => fwd_log,
        Log1p => fwd_log1p,
        LtPp => fwd_compare::<B, { CompareOp::Lt as u8 }, false, false>,
        LtPv => fwd_compare::<B, { CompareOp::Lt as u8 }, false, true>,
        LtVp => fwd_compare::<B, { CompareOp::Lt as u8 }, true, false>,
        LtVv => fwd_compare::<B, { CompareOp::Lt as u8 }, true, true>,
        MulPv => fwd_mul_pv,
        MulVv => fwd_mul_vv,
        NePp => fwd_compare::<B, { CompareOp::Ne as u8 }, false, false>,
        NePv => fwd_compare::<B, { CompareOp::Ne as u8 }, false, true>,
        NeVv => fwd_compare::<B, { CompareOp::Ne as u8 }, true, true>,
        Par => fwd_par,
        PowPv => fwd_pow_pv,
        PowVp => fwd_pow_vp,
        PowVv => fwd_pow_vv,
        Pri => fwd_print,
        Sign => fwd_sign,
        Sin => fwd_sin,
        Sinh => fwd_sinh,
        Sqrt => fwd_sqrt,
        StPp => fwd_store::<B, false, false>,
        StPv => fwd_store::<B, false, true>,
        StVp => fwd_store::<B, true, false>,
        StVv => fwd_store::<B, true, true>,
        SubPv => fwd_sub_pv,
        SubVp => fwd_sub_vp,
        SubVv => fwd_sub_vv,
        Tan => fwd_tan,
        Tanh => fwd_tanh,
        User => fwd_user,
        UsrAp => fwd_usr_ap,
        UsrAv => fwd_usr_av,
        UsrRp => fwd_usr_rp,
        UsrRv => fwd_usr_rv,
        ZmulPv => fwd_zmul_pv,
        ZmulVp => fwd_zmul_vp,
        ZmulVv => fwd_zmul_vv,
    }
}

fn fwd_nothing<B: Base>(_: &mut ForwardSweep<'_, B>, _: &Instruction<'_>) -> Result<()> {
    Ok(())
}

fn fwd_begin<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = s.par_q(ins.args[0]);
    s.set(0, z);
    Ok(())
}

/// Discrete functions are re-evaluated at order zero and are flat above it.
fn fwd_dis<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = if s.q == 0 {
        let Some((_, f)) = s.tape.discretes.get(ins.args[0] as usize) else {
            corrupt(ins.i_op, ins.op, "unknown discrete slot")
        };
        f(s.col(ins.args[1])[0])
    } else {
        B::zero()
    };
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_par<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = s.par_q(ins.args[0]);
    s.set(ins.i_var, z);
    Ok(())
}

// ══════════════════════════════════════════════
//  Arithmetic
// ══════════════════════════════════════════════

fn fwd_add_vv<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let q = s.q;
    let z = s.col(ins.args[0])[q] + s.col(ins.args[1])[q];
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_add_pv<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = s.par_q(ins.args[0]) + s.col(ins.args[1])[s.q];
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_sub_vv<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let q = s.q;
    let z = s.col(ins.args[0])[q] - s.col(ins.args[1])[q];
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_sub_pv<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = s.par_q(ins.args[0]) - s.col(ins.args[1])[s.q];
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_sub_vp<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = s.col(ins.args[0])[s.q] - s.par_q(ins.args[1]);
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_mul_vv<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = taylor_mul(s.q, s.col(ins.args[0]), s.col(ins.args[1]));
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_mul_pv<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = s.par(ins.args[0]) * s.col(ins.args[1])[s.q];
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_div_vv<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = taylor_div(
        s.q,
        s.col(ins.args[0]),
        s.col(ins.args[1]),
        s.col(ins.i_var as Addr),
    );
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_div_pv<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = taylor_div_pv(
        s.q,
        s.par(ins.args[0]),
        s.col(ins.args[1]),
        s.col(ins.i_var as Addr),
    );
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_div_vp<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = s.col(ins.args[0])[s.q] / s.par(ins.args[1]);
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_zmul_vv<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = taylor_azmul(s.q, s.col(ins.args[0]), s.col(ins.args[1]));
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_zmul_pv<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = s.par(ins.args[0]).azmul(s.col(ins.args[1])[s.q]);
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_zmul_vp<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = s.col(ins.args[0])[s.q].azmul(s.par(ins.args[1]));
    s.set(ins.i_var, z);
    Ok(())
}

/// `x^y` as `exp(y log x)`: results are `log x`, `y log x` and `x^y`. The
/// primal is computed directly so that `0^y` and negative bases with
/// integral exponents keep their value.
fn pow_tail<B: Base>(s: &mut ForwardSweep<'_, B>, z: usize, x0: B, y0: B) {
    let q = s.q;
    let w = if q == 0 {
        x0.powf(y0)
    } else {
        taylor_exp(q, s.col(z as Addr - 1), s.col(z as Addr))
    };
    s.set(z, w);
}

fn fwd_pow_vv<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let q = s.q;
    let (x, y, z) = (ins.args[0], ins.args[1], ins.i_var);
    let log = taylor_ln(q, s.col(x), s.col(z as Addr - 2));
    s.set(z - 2, log);
    let prod = taylor_mul(q, s.col(z as Addr - 2), s.col(y));
    s.set(z - 1, prod);
    let (x0, y0) = (s.col(x)[0], s.col(y)[0]);
    pow_tail(s, z, x0, y0);
    Ok(())
}

fn fwd_pow_pv<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let q = s.q;
    let (p, y, z) = (s.par(ins.args[0]), ins.args[1], ins.i_var);
    let log = if q == 0 { p.ln() } else { B::zero() };
    s.set(z - 2, log);
    let prod = s.col(z as Addr - 2)[0] * s.col(y)[q];
    s.set(z - 1, prod);
    let y0 = s.col(y)[0];
    pow_tail(s, z, p, y0);
    Ok(())
}

fn fwd_pow_vp<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let q = s.q;
    let (x, p, z) = (ins.args[0], s.par(ins.args[1]), ins.i_var);
    let log = taylor_ln(q, s.col(x), s.col(z as Addr - 2));
    s.set(z - 2, log);
    let prod = s.col(z as Addr - 2)[q] * p;
    s.set(z - 1, prod);
    let x0 = s.col(x)[0];
    pow_tail(s, z, x0, p);
    Ok(())
}

// ══════════════════════════════════════════════
//  Unary functions
// ══════════════════════════════════════════════

macro_rules! simple_unary {
    ($name:ident, $rule:ident) => {
        fn $name<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
            let z = $rule(s.q, s.col(ins.args[0]), s.col(ins.i_var as Addr));
            s.set(ins.i_var, z);
            Ok(())
        }
    };
}

simple_unary!(fwd_exp, taylor_exp);
simple_unary!(fwd_expm1, taylor_expm1);
simple_unary!(fwd_log, taylor_ln);
simple_unary!(fwd_log1p, taylor_ln_1p);
simple_unary!(fwd_sqrt, taylor_sqrt);

fn fwd_abs<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = taylor_abs(s.q, s.col(ins.args[0]));
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_sign<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = taylor_sign(s.q, s.col(ins.args[0]));
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_sin<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = ins.i_var;
    let (sin, cos) = taylor_sin_cos(
        s.q,
        s.col(ins.args[0]),
        s.col(z as Addr),
        s.col(z as Addr - 1),
    );
    s.set(z - 1, cos);
    s.set(z, sin);
    Ok(())
}

fn fwd_cos<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = ins.i_var;
    let (sin, cos) = taylor_sin_cos(
        s.q,
        s.col(ins.args[0]),
        s.col(z as Addr - 1),
        s.col(z as Addr),
    );
    s.set(z - 1, sin);
    s.set(z, cos);
    Ok(())
}

fn fwd_sinh<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = ins.i_var;
    let (sinh, cosh) = taylor_sinh_cosh(
        s.q,
        s.col(ins.args[0]),
        s.col(z as Addr),
        s.col(z as Addr - 1),
    );
    s.set(z - 1, cosh);
    s.set(z, sinh);
    Ok(())
}

fn fwd_cosh<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = ins.i_var;
    let (sinh, cosh) = taylor_sinh_cosh(
        s.q,
        s.col(ins.args[0]),
        s.col(z as Addr - 1),
        s.col(z as Addr),
    );
    s.set(z - 1, sinh);
    s.set(z, cosh);
    Ok(())
}

fn fwd_tan<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = ins.i_var;
    let tan = taylor_tan(s.q, s.col(ins.args[0]), s.col(z as Addr - 1));
    s.set(z, tan);
    let sq = taylor_square(s.q, s.col(z as Addr));
    s.set(z - 1, sq);
    Ok(())
}

fn fwd_tanh<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let z = ins.i_var;
    let tanh = taylor_tanh(s.q, s.col(ins.args[0]), s.col(z as Addr - 1));
    s.set(z, tanh);
    let sq = taylor_square(s.q, s.col(z as Addr));
    s.set(z - 1, sq);
    Ok(())
}

/// Inverse trigonometric and hyperbolic kinds, all of the form
/// `z' = ± x' / b` with an auxiliary `b` stored just before `z`.
fn fwd_inverse<B: Base, const OP: u8>(
    s: &mut ForwardSweep<'_, B>,
    ins: &Instruction<'_>,
) -> Result<()> {
    let op = OpCode::from_index(OP as usize);
    let (q, x, z) = (s.q, ins.args[0], ins.i_var);
    let one = B::one();
    let b = if q == 0 {
        let x0 = s.col(x)[0];
        let sq = x0 * x0;
        match op {
            OpCode::Asin | OpCode::Acos => (one - sq).sqrt(),
            OpCode::Asinh => (one + sq).sqrt(),
            OpCode::Acosh => (sq - one).sqrt(),
            OpCode::Atan => one + sq,
            _ => one - sq,
        }
    } else {
        match op {
            OpCode::Asin | OpCode::Acos => taylor_radical(q, true, s.col(x), s.col(z as Addr - 1)),
            OpCode::Asinh | OpCode::Acosh => {
                taylor_radical(q, false, s.col(x), s.col(z as Addr - 1))
            }
            OpCode::Atan => taylor_one_plus_square(q, false, s.col(x)),
            _ => taylor_one_plus_square(q, true, s.col(x)),
        }
    };
    s.set(z - 1, b);
    let value = if q == 0 {
        crate::opcode::eval_unary(op, s.col(x)[0])
    } else {
        taylor_inverse(
            q,
            op == OpCode::Acos,
            s.col(x),
            s.col(z as Addr - 1),
            s.col(z as Addr),
        )
    };
    s.set(z, value);
    Ok(())
}

/// Results: `x²`, `-x²`, `exp(-x²)`, `2/√π exp(-x²)`, `erf(x)`.
fn fwd_erf<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let (q, x, z) = (s.q, ins.args[0], ins.i_var);
    let sq = taylor_square(q, s.col(x));
    s.set(z - 4, sq);
    s.set(z - 3, -sq);
    let e = taylor_exp(q, s.col(z as Addr - 3), s.col(z as Addr - 2));
    s.set(z - 2, e);
    let d = s.par(ins.args[2]) * e;
    s.set(z - 1, d);
    let erf = taylor_erf(q, s.col(x), s.col(z as Addr - 1));
    s.set(z, erf);
    Ok(())
}

// ══════════════════════════════════════════════
//  Fused and conditional kinds
// ══════════════════════════════════════════════

fn fwd_csum<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let view = CSumArgs::new(ins.args);
    let mut z = s.par_q(view.init());
    if s.q == 0 {
        z = view.add_dyn().iter().fold(z, |acc, &p| acc + s.par(p));
        z = view.sub_dyn().iter().fold(z, |acc, &p| acc - s.par(p));
    }
    let q = s.q;
    z = view.add_var().iter().fold(z, |acc, &v| acc + s.col(v)[q]);
    z = view.sub_var().iter().fold(z, |acc, &v| acc - s.col(v)[q]);
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_cexp<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let a = ins.args;
    let rel = CompareOp::from_addr(a[0]);
    let flags = a[1];
    let left = s.value(a[2], flags & 1 != 0);
    let right = s.value(a[3], flags & 2 != 0);
    let if_true = s.coeff(a[4], flags & 4 != 0);
    let if_false = s.coeff(a[5], flags & 8 != 0);
    let z = B::cond_select(rel, left, right, if_true, if_false);
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_cskip<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    if s.q > 0 {
        return Ok(());
    }
    let view = CSkipArgs::new(ins.args);
    let left = s.value(view.left(), view.left_is_variable());
    let right = s.value(view.right(), view.right_is_variable());
    let skip = if view.rel().eval(left, right) {
        view.skip_if_true()
    } else {
        view.skip_if_false()
    };
    for &i in skip {
        s.ws.cskip[i as usize] = true;
    }
    Ok(())
}

fn fwd_compare<B: Base, const REL: u8, const LEFT_VAR: bool, const RIGHT_VAR: bool>(
    s: &mut ForwardSweep<'_, B>,
    ins: &Instruction<'_>,
) -> Result<()> {
    if s.q > 0 {
        return Ok(());
    }
    let rel = CompareOp::from_addr(REL as Addr);
    let left = s.value(ins.args[0], LEFT_VAR);
    let right = s.value(ins.args[1], RIGHT_VAR);
    if !rel.eval(left, right) {
        s.ws.compare_change_count += 1;
        s.ws.compare_change_op.get_or_insert(ins.i_op);
    }
    Ok(())
}

fn fwd_print<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    if s.q > 0 {
        return Ok(());
    }
    let a = ins.args;
    let pos = s.value(a[1], a[0] & 1 != 0);
    if pos > B::zero() {
        return Ok(());
    }
    let value = s.value(a[3], a[0] & 2 != 0);
    let line = format!(
        "{}{}{}",
        s.tape.text[a[2] as usize],
        value,
        s.tape.text[a[4] as usize]
    );
    info!(target: "adtape::print", "{}", line);
    s.ws.print_log.push(line);
    Ok(())
}

// ══════════════════════════════════════════════
//  Indexed vectors
// ══════════════════════════════════════════════

fn fwd_load<B: Base, const INDEX_VAR: bool>(
    s: &mut ForwardSweep<'_, B>,
    ins: &Instruction<'_>,
) -> Result<()> {
    let a = ins.args;
    let load = a[2] as usize;
    let z = if s.q == 0 {
        let pos = s.element(a[0], s.value(a[1], INDEX_VAR))?;
        if s.ws.vecad_is_var[pos] {
            let var = s.ws.vecad_value[pos];
            s.ws.load_op[load] = var;
            s.col(var)[0]
        } else {
            s.ws.load_op[load] = 0;
            s.par(s.ws.vecad_value[pos])
        }
    } else {
        match s.ws.load_op[load] {
            0 => B::zero(),
            var => s.col(var)[s.q],
        }
    };
    s.set(ins.i_var, z);
    Ok(())
}

fn fwd_store<B: Base, const INDEX_VAR: bool, const VALUE_VAR: bool>(
    s: &mut ForwardSweep<'_, B>,
    ins: &Instruction<'_>,
) -> Result<()> {
    if s.q > 0 {
        return Ok(());
    }
    let a = ins.args;
    let pos = s.element(a[0], s.value(a[1], INDEX_VAR))?;
    s.ws.vecad_value[pos] = a[2];
    s.ws.vecad_is_var[pos] = VALUE_VAR;
    Ok(())
}

// ══════════════════════════════════════════════
//  Atomic call bracket
// ══════════════════════════════════════════════

fn fwd_user<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let a = ins.args;
    let p = s.q + 1;
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
                n,
                m,
                j: 0,
                i: 0,
                tx: vec![B::zero(); n * p],
                ty: vec![B::zero(); m * p],
                res_var: vec![0; m],
            });
        }
        Some(mut call) => {
            if call.j != call.n || call.i != call.m {
                corrupt(ins.i_op, ins.op, "atomic bracket closed early");
            }
            let op = &s.tape.atomics[call.slot].1;
            op.forward(s.q, &call.tx, &mut call.ty);
            for (i, &var) in call.res_var.iter().enumerate() {
                if var != 0 {
                    s.set(var as usize, call.ty[i * p + s.q]);
                }
            }
        }
    }
    Ok(())
}

fn fwd_usr_ap<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let value = s.par(ins.args[0]);
    let p = s.q + 1;
    let call = s.user_call(ins);
    if call.j >= call.n {
        corrupt(ins.i_op, ins.op, "too many atomic arguments");
    }
    call.tx[call.j * p] = value;
    call.j += 1;
    Ok(())
}

fn fwd_usr_av<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let p = s.q + 1;
    let coeffs: Vec<B> = s.col(ins.args[0])[..p].to_vec();
    let call = s.user_call(ins);
    if call.j >= call.n {
        corrupt(ins.i_op, ins.op, "too many atomic arguments");
    }
    call.tx[call.j * p..(call.j + 1) * p].copy_from_slice(&coeffs);
    call.j += 1;
    Ok(())
}

fn fwd_usr_rp<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let value = s.par(ins.args[0]);
    let p = s.q + 1;
    let call = s.user_call(ins);
    if call.i >= call.m {
        corrupt(ins.i_op, ins.op, "too many atomic results");
    }
    call.ty[call.i * p] = value;
    call.i += 1;
    Ok(())
}

fn fwd_usr_rv<B: Base>(s: &mut ForwardSweep<'_, B>, ins: &Instruction<'_>) -> Result<()> {
    let p = s.q + 1;
    let var = ins.i_var as Addr;
    let known: Vec<B> = s.col(var)[..s.q].to_vec();
    let call = s.user_call(ins);
    if call.i >= call.m {
        corrupt(ins.i_op, ins.op, "too many atomic results");
    }
    call.ty[call.i * p..call.i * p + known.len()].copy_from_slice(&known);
    call.res_var[call.i] = var;
    call.i += 1;
    Ok(())
}
