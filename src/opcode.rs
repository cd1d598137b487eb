//! Operator catalog for the instruction tape.
//!
//! Each [`OpCode`] is one recorded elementary operation. Ignoring case, the
//! kinds are in alphabetical order. Binary kinds whose operands are both
//! scalars carry a two-letter suffix naming the operand classes:
//!
//! ```text
//!   suffix  left       right
//!   Pv      parameter  variable
//!   Vp      variable   parameter
//!   Vv      variable   variable
//!   Pp      parameter  parameter
//! ```
//!
//! Arity, result count and display name come from one table, [`op_info`].

use std::fmt;
use std::sync::OnceLock;

use crate::base::Base;

/// Operand address: a parameter index or a variable index depending on the
/// argument slot (see [`arg_is_variable`]).
pub type Addr = u32;

/// Elementary operation codes.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpCode {
    Abs,
    /// Two results: `sqrt(1 - x²)` then `acos(x)`.
    Acos,
    /// Two results: `sqrt(x² - 1)` then `acosh(x)`.
    Acosh,
    AddPv,
    AddVv,
    /// Two results: `sqrt(1 - x²)` then `asin(x)`.
    Asin,
    /// Two results: `sqrt(1 + x²)` then `asinh(x)`.
    Asinh,
    /// Two results: `1 + x²` then `atan(x)`.
    Atan,
    /// Two results: `1 - x²` then `atanh(x)`.
    Atanh,
    /// Marks the start of the tape; its result is variable 0.
    Begin,
    /// `cond_exp(rel, left, right, if_true, if_false)`.
    CExp,
    /// Two results: `sin(x)` then `cos(x)`.
    Cos,
    /// Two results: `sinh(x)` then `cosh(x)`.
    Cosh,
    /// Conditional skip (variable number of arguments).
    CSkip,
    /// Cumulative summation (variable number of arguments).
    CSum,
    /// Piecewise-constant user function of a variable: `[slot, x]`.
    Dis,
    DivPv,
    DivVp,
    DivVv,
    /// Marks the end of the tape.
    End,
    EqPp,
    EqPv,
    EqVv,
    /// Five results: `x²`, `-x²`, `exp(-x²)`, `2/√π exp(-x²)`, `erf(x)`.
    Erf,
    Exp,
    Expm1,
    /// Independent variable.
    Inv,
    /// `v[p]`: load with a parameter index.
    Ldp,
    /// `v[x]`: load with a variable index.
    Ldv,
    LePp,
    LePv,
    LeVp,
    LeVv,
    Log,
    Log1p,
    LtPp,
    LtPv,
    LtVp,
    LtVv,
    MulPv,
    MulVv,
    NePp,
    NePv,
    NeVv,
    /// A parameter turned into a variable (dependent that is a parameter).
    Par,
    /// Three results: `log(x)`, `y log(x)`, `x^y`.
    PowPv,
    PowVp,
    PowVv,
    /// Forward-mode print: `before`, value, `after` when `pos <= 0`.
    Pri,
    Sign,
    /// Two results: `cos(x)` then `sin(x)`.
    Sin,
    /// Two results: `cosh(x)` then `sinh(x)`.
    Sinh,
    Sqrt,
    /// `v[p] = p`.
    StPp,
    /// `v[p] = x`.
    StPv,
    /// `v[x] = p`.
    StVp,
    /// `v[x] = y`.
    StVv,
    SubPv,
    SubVp,
    SubVv,
    /// Two results: `tan²(x)` then `tan(x)`.
    Tan,
    /// Two results: `tanh²(x)` then `tanh(x)`.
    Tanh,
    /// Opens and closes an atomic call bracket.
    User,
    /// Atomic call argument that is a parameter.
    UsrAp,
    /// Atomic call argument that is a variable.
    UsrAv,
    /// Atomic call result that is a parameter.
    UsrRp,
    /// Atomic call result that is a variable.
    UsrRv,
    /// `azmul(p, y)`: absolute-zero multiply.
    ZmulPv,
    ZmulVp,
    ZmulVv,
}

/// Number of arguments an operator stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    /// Length is embedded in the instruction's own payload.
    Variable,
}

/// Catalog entry for one operator kind.
#[derive(Clone, Copy, Debug)]
pub struct OpInfo {
    pub op: OpCode,
    pub name: &'static str,
    pub num_arg: Arity,
    pub num_res: usize,
}

const fn fixed(op: OpCode, name: &'static str, num_arg: usize, num_res: usize) -> OpInfo {
    OpInfo {
        op,
        name,
        num_arg: Arity::Fixed(num_arg),
        num_res,
    }
}

const fn variable(op: OpCode, name: &'static str, num_res: usize) -> OpInfo {
    OpInfo {
        op,
        name,
        num_arg: Arity::Variable,
        num_res,
    }
}

use OpCode::*;

static OP_TABLE: [OpInfo; OpCode::COUNT] = [
    fixed(Abs, "Abs", 1, 1),
    fixed(Acos, "Acos", 1, 2),
    fixed(Acosh, "Acosh", 1, 2),
    fixed(AddPv, "Addpv", 2, 1),
    fixed(AddVv, "Addvv", 2, 1),
    fixed(Asin, "Asin", 1, 2),
    fixed(Asinh, "Asinh", 1, 2),
    fixed(Atan, "Atan", 1, 2),
    fixed(Atanh, "Atanh", 1, 2),
    fixed(Begin, "Begin", 1, 1),
    fixed(CExp, "CExp", 6, 1),
    fixed(Cos, "Cos", 1, 2),
    fixed(Cosh, "Cosh", 1, 2),
    variable(CSkip, "CSkip", 0),
    variable(CSum, "CSum", 1),
    fixed(Dis, "Dis", 2, 1),
    fixed(DivPv, "Divpv", 2, 1),
    fixed(DivVp, "Divvp", 2, 1),
    fixed(DivVv, "Divvv", 2, 1),
    fixed(End, "End", 0, 0),
    fixed(EqPp, "Eqpp", 2, 0),
    fixed(EqPv, "Eqpv", 2, 0),
    fixed(EqVv, "Eqvv", 2, 0),
    fixed(Erf, "Erf", 3, 5),
    fixed(Exp, "Exp", 1, 1),
    fixed(Expm1, "Expm1", 1, 1),
    fixed(Inv, "Inv", 0, 1),
    fixed(Ldp, "Ldp", 3, 1),
    fixed(Ldv, "Ldv", 3, 1),
    fixed(LePp, "Lepp", 2, 0),
    fixed(LePv, "Lepv", 2, 0),
    fixed(LeVp, "Levp", 2, 0),
    fixed(LeVv, "Levv", 2, 0),
    fixed(Log, "Log", 1, 1),
    fixed(Log1p, "Log1p", 1, 1),
    fixed(LtPp, "Ltpp", 2, 0),
    fixed(LtPv, "Ltpv", 2, 0),
    fixed(LtVp, "Ltvp", 2, 0),
    fixed(LtVv, "Ltvv", 2, 0),
    fixed(MulPv, "Mulpv", 2, 1),
    fixed(MulVv, "Mulvv", 2, 1),
    fixed(NePp, "Nepp", 2, 0),
    fixed(NePv, "Nepv", 2, 0),
    fixed(NeVv, "Nevv", 2, 0),
    fixed(Par, "Par", 1, 1),
    fixed(PowPv, "Powpv", 2, 3),
    fixed(PowVp, "Powvp", 2, 3),
    fixed(PowVv, "Powvv", 2, 3),
    fixed(Pri, "Pri", 5, 0),
    fixed(Sign, "Sign", 1, 1),
    fixed(Sin, "Sin", 1, 2),
    fixed(Sinh, "Sinh", 1, 2),
    fixed(Sqrt, "Sqrt", 1, 1),
    fixed(StPp, "Stpp", 3, 0),
    fixed(StPv, "Stpv", 3, 0),
    fixed(StVp, "Stvp", 3, 0),
    fixed(StVv, "Stvv", 3, 0),
    fixed(SubPv, "Subpv", 2, 1),
    fixed(SubVp, "Subvp", 2, 1),
    fixed(SubVv, "Subvv", 2, 1),
    fixed(Tan, "Tan", 1, 2),
    fixed(Tanh, "Tanh", 1, 2),
    fixed(User, "User", 4, 0),
    fixed(UsrAp, "Usrap", 1, 0),
    fixed(UsrAv, "Usrav", 1, 0),
    fixed(UsrRp, "Usrrp", 1, 0),
    fixed(UsrRv, "Usrrv", 0, 1),
    fixed(ZmulPv, "Zmulpv", 2, 1),
    fixed(ZmulVp, "Zmulvp", 2, 1),
    fixed(ZmulVv, "Zmulvv", 2, 1),
];

/// The verified catalog. The consistency check runs on first use only.
fn op_table() -> &'static [OpInfo; OpCode::COUNT] {
    static CHECKED: OnceLock<()> = OnceLock::new();
    CHECKED.get_or_init(|| {
        for (i, (info, &op)) in OP_TABLE.iter().zip(OpCode::ALL.iter()).enumerate() {
            assert!(
                info.op == op && op as usize == i,
                "operator catalog out of order at position {}: table has {:?}, enum has {:?}",
                i,
                info.op,
                op
            );
        }
    });
    &OP_TABLE
}

impl OpCode {
    /// Number of operator kinds.
    pub const COUNT: usize = 70;

    /// Every operator kind, in catalog order.
    pub const ALL: [OpCode; OpCode::COUNT] = [
        Abs, Acos, Acosh, AddPv, AddVv, Asin, Asinh, Atan, Atanh, Begin, CExp, Cos, Cosh, CSkip,
        CSum, Dis, DivPv, DivVp, DivVv, End, EqPp, EqPv, EqVv, Erf, Exp, Expm1, Inv, Ldp, Ldv, LePp,
        LePv, LeVp, LeVv, Log, Log1p, LtPp, LtPv, LtVp, LtVv, MulPv, MulVv, NePp, NePv, NeVv, Par,
        PowPv, PowVp, PowVv, Pri, Sign, Sin, Sinh, Sqrt, StPp, StPv, StVp, StVv, SubPv, SubVp,
        SubVv, Tan, Tanh, User, UsrAp, UsrAv, UsrRp, UsrRv, ZmulPv, ZmulVp, ZmulVv,
    ];

    /// Operator kind at catalog position `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= OpCode::COUNT`; the catalog is closed.
    #[inline]
    pub fn from_index(index: usize) -> OpCode {
        match OpCode::ALL.get(index) {
            Some(&op) => op,
            None => panic!(
                "operator index {} outside the catalog of {} kinds",
                index,
                OpCode::COUNT
            ),
        }
    }

    #[inline]
    pub fn info(self) -> &'static OpInfo {
        &op_table()[self as usize]
    }

    #[inline]
    pub fn name(self) -> &'static str {
        self.info().name
    }

    #[inline]
    pub fn num_arg(self) -> Arity {
        self.info().num_arg
    }

    #[inline]
    pub fn num_res(self) -> usize {
        self.info().num_res
    }

    /// Comparison kinds record a relation that held at record time.
    #[inline]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            EqPp | EqPv | EqVv | LePp | LePv | LeVp | LeVv | LtPp | LtPv | LtVp | LtVv | NePp
                | NePv | NeVv
        )
    }

    #[inline]
    pub fn is_store(self) -> bool {
        matches!(self, StPp | StPv | StVp | StVv)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Catalog entry for `op`.
#[inline]
pub fn op_info(op: OpCode) -> &'static OpInfo {
    op.info()
}

/// Relational operator stored in the first argument of CExp and CSkip.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
}

impl CompareOp {
    const ALL: [CompareOp; 6] = [
        CompareOp::Lt,
        CompareOp::Le,
        CompareOp::Eq,
        CompareOp::Ge,
        CompareOp::Gt,
        CompareOp::Ne,
    ];

    /// # Panics
    ///
    /// Panics on a value that does not name a relation.
    #[inline]
    pub fn from_addr(value: Addr) -> CompareOp {
        match CompareOp::ALL.get(value as usize) {
            Some(&rel) => rel,
            None => panic!("comparison code {} is not a relation", value),
        }
    }

    #[inline]
    pub fn abbrev(self) -> &'static str {
        match self {
            CompareOp::Lt => "Lt",
            CompareOp::Le => "Le",
            CompareOp::Eq => "Eq",
            CompareOp::Ge => "Ge",
            CompareOp::Gt => "Gt",
            CompareOp::Ne => "Ne",
        }
    }

    #[inline]
    pub fn eval<B: PartialOrd>(self, left: B, right: B) -> bool {
        match self {
            CompareOp::Lt => left < right,
            CompareOp::Le => left <= right,
            CompareOp::Eq => left == right,
            CompareOp::Ge => left >= right,
            CompareOp::Gt => left > right,
            CompareOp::Ne => left != right,
        }
    }
}

/// Which argument slots of an instruction hold variable indices.
///
/// `args` is the instruction's full argument slice. On return `is_variable`
/// has one entry per argument.
pub fn arg_is_variable(op: OpCode, args: &[Addr], is_variable: &mut Vec<bool>) {
    is_variable.clear();
    match op {
        End | Inv | UsrRv => {}

        Abs | Acos | Acosh | Asin | Asinh | Atan | Atanh | Cos | Cosh | Exp | Expm1 | Log
        | Log1p | Sign | Sin | Sinh | Sqrt | Tan | Tanh | UsrAv => is_variable.push(true),

        Begin | Par | UsrAp | UsrRp => is_variable.push(false),

        AddPv | DivPv | EqPv | LePv | LtPv | MulPv | NePv | PowPv | SubPv | ZmulPv => {
            is_variable.extend_from_slice(&[false, true])
        }

        DivVp | LeVp | LtVp | PowVp | SubVp | ZmulVp => is_variable.extend_from_slice(&[true, false]),

        AddVv | DivVv | EqVv | LeVv | LtVv | MulVv | NeVv | PowVv | SubVv | ZmulVv => {
            is_variable.extend_from_slice(&[true, true])
        }

        EqPp | LePp | LtPp | NePp => is_variable.extend_from_slice(&[false, false]),

        Erf => is_variable.extend_from_slice(&[true, false, false]),

        Dis => is_variable.extend_from_slice(&[false, true]),

        Ldp | StPp => is_variable.extend_from_slice(&[false, false, false]),
        Ldv | StVp => is_variable.extend_from_slice(&[false, true, false]),
        StPv => is_variable.extend_from_slice(&[false, false, true]),
        StVv => is_variable.extend_from_slice(&[false, true, true]),

        User => is_variable.extend_from_slice(&[false; 4]),

        Pri => {
            let flags = args[0];
            is_variable.extend_from_slice(&[
                false,
                flags & 1 != 0,
                false,
                flags & 2 != 0,
                false,
            ]);
        }

        CExp => {
            let flags = args[1];
            is_variable.extend_from_slice(&[
                false,
                false,
                flags & 1 != 0,
                flags & 2 != 0,
                flags & 4 != 0,
                flags & 8 != 0,
            ]);
        }

        CSkip => {
            let flags = args[1];
            is_variable.resize(args.len(), false);
            is_variable[2] = flags & 1 != 0;
            is_variable[3] = flags & 2 != 0;
        }

        CSum => {
            let end_var = args[2] as usize;
            is_variable.extend((0..args.len()).map(|i| (5..end_var).contains(&i)));
        }
    }
}

/// Primal value of a unary kind (the last result for multi-result kinds).
///
/// # Panics
///
/// Panics if `op` is not a unary function kind.
#[inline]
pub fn eval_unary<B: Base>(op: OpCode, x: B) -> B {
    match op {
        Abs => x.abs(),
        Acos => x.acos(),
        Acosh => x.acosh(),
        Asin => x.asin(),
        Asinh => x.asinh(),
        Atan => x.atan(),
        Atanh => x.atanh(),
        Cos => x.cos(),
        Cosh => x.cosh(),
        Erf => x.erf(),
        Exp => x.exp(),
        Expm1 => x.exp_m1(),
        Log => x.ln(),
        Log1p => x.ln_1p(),
        Sign => x.sign(),
        Sin => x.sin(),
        Sinh => x.sinh(),
        Sqrt => x.sqrt(),
        Tan => x.tan(),
        Tanh => x.tanh(),
        _ => panic!("{} is not a unary function", op.name()),
    }
}
