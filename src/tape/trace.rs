//! Human-readable instruction listing.
//!
//! One line per instruction: `o=` instruction index, `v=` primary result
//! (blank for kinds without results), the operator name and its operands.
//! Fields are left-justified to a fixed width; a value that does not fit
//! is cut and marked with `*`.

use std::fmt::{self, Display, Write};

use crate::base::Base;
use crate::opcode::{CompareOp, OpCode};

use super::player::{CSkipArgs, CSumArgs, Instruction};
use super::Tape;

const WIDTH: usize = 5;

fn field(f: &mut impl Write, leader: &str, value: impl Display, width: usize) -> fmt::Result {
    let text = value.to_string();
    f.write_str(leader)?;
    let len = text.chars().count();
    if len > width {
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        write!(f, "{}*", cut)
    } else {
        write!(f, "{}{:pad$}", text, "", pad = width - len)
    }
}

impl<B: Base> Tape<B> {
    /// Every instruction, one per line.
    pub fn listing(&self) -> String {
        self.to_string()
    }

    fn write_instruction(&self, f: &mut impl Write, ins: &Instruction<'_>) -> fmt::Result {
        let (op, a) = (ins.op, ins.args);
        let par = |addr: u32| self.pool.value(addr);
        field(f, "o=", ins.i_op, WIDTH)?;
        if op.num_res() > 0 && op != OpCode::Begin {
            field(f, "v=", ins.i_var, WIDTH)?;
        } else {
            field(f, "v=", "", WIDTH)?;
        }
        if matches!(op, OpCode::CExp | OpCode::CSkip) {
            field(f, "", op, 5)?;
            field(f, "", CompareOp::from_addr(a[0]).abbrev(), 3)?;
        } else {
            field(f, "", op, 8)?;
        }

        use OpCode::*;
        match op {
            CSkip => {
                let view = CSkipArgs::new(a);
                if view.left_is_variable() {
                    field(f, " vl=", view.left(), WIDTH)?;
                } else {
                    field(f, " pl=", par(view.left()), WIDTH)?;
                }
                if view.right_is_variable() {
                    field(f, " vr=", view.right(), WIDTH)?;
                } else {
                    field(f, " pr=", par(view.right()), WIDTH)?;
                }
                for (i, &o) in view.skip_if_true().iter().enumerate() {
                    let leader = if i == 0 && view.skip_if_true().len() >= 3 { "\n\tot=" } else { " ot=" };
                    field(f, leader, o, WIDTH)?;
                }
                for (i, &o) in view.skip_if_false().iter().enumerate() {
                    let leader = if i == 0 && view.skip_if_false().len() >= 3 { "\n\tof=" } else { " of=" };
                    field(f, leader, o, WIDTH)?;
                }
            }
            CSum => {
                let view = CSumArgs::new(a);
                field(f, " pr=", par(view.init()), WIDTH)?;
                for &v in view.add_var() {
                    field(f, " +v=", v, WIDTH)?;
                }
                for &v in view.sub_var() {
                    field(f, " -v=", v, WIDTH)?;
                }
                for &p in view.add_dyn() {
                    field(f, " +d=", par(p), WIDTH)?;
                }
                for &p in view.sub_dyn() {
                    field(f, " -d=", par(p), WIDTH)?;
                }
            }
            CExp => {
                let flags = a[1];
                let names = [(" vl=", " pl="), (" vr=", " pr="), (" vt=", " pt="), (" vf=", " pf=")];
                for (bit, (var, param)) in names.iter().enumerate() {
                    let addr = a[2 + bit];
                    if flags & (1 << bit) != 0 {
                        field(f, var, addr, WIDTH)?;
                    } else {
                        field(f, param, par(addr), WIDTH)?;
                    }
                }
            }
            Ldp => {
                field(f, "off=", a[0], WIDTH)?;
                field(f, "idx=", par(a[1]), WIDTH)?;
            }
            Ldv => {
                field(f, "off=", a[0], WIDTH)?;
                field(f, "  v=", a[1], WIDTH)?;
            }
            StPp | StPv | StVp | StVv => {
                field(f, "off=", a[0], WIDTH)?;
                if op == StVp || op == StVv {
                    field(f, " vl=", a[1], WIDTH)?;
                } else {
                    field(f, "idx=", par(a[1]), WIDTH)?;
                }
                if op == StPv || op == StVv {
                    field(f, " vr=", a[2], WIDTH)?;
                } else {
                    field(f, " pr=", par(a[2]), WIDTH)?;
                }
            }
            Pri => {
                if a[0] & 1 != 0 {
                    field(f, " vl=", a[1], WIDTH)?;
                } else {
                    field(f, " pl=", par(a[1]), WIDTH)?;
                }
                write!(f, " \"{}\"", self.text[a[2] as usize])?;
                if a[0] & 2 != 0 {
                    field(f, " vr=", a[3], WIDTH)?;
                } else {
                    field(f, " pr=", par(a[3]), WIDTH)?;
                }
                write!(f, " \"{}\"", self.text[a[4] as usize])?;
            }
            Dis => {
                field(f, " h=", self.discretes[a[0] as usize].0.index(), WIDTH)?;
                field(f, "  v=", a[1], WIDTH)?;
            }
            User => {
                field(f, " h=", a[0], WIDTH)?;
                field(f, " n=", a[2], WIDTH)?;
                field(f, " m=", a[3], WIDTH)?;
            }
            AddVv | DivVv | EqVv | LeVv | LtVv | NeVv | MulVv | PowVv | SubVv | ZmulVv => {
                field(f, " vl=", a[0], WIDTH)?;
                field(f, " vr=", a[1], WIDTH)?;
            }
            AddPv | DivPv | EqPv | LePv | LtPv | NePv | MulPv | PowPv | SubPv | ZmulPv => {
                field(f, " pl=", par(a[0]), WIDTH)?;
                field(f, " vr=", a[1], WIDTH)?;
            }
            DivVp | LeVp | LtVp | PowVp | SubVp | ZmulVp => {
                field(f, " vl=", a[0], WIDTH)?;
                field(f, " pr=", par(a[1]), WIDTH)?;
            }
            EqPp | LePp | LtPp | NePp => {
                field(f, " pl=", par(a[0]), WIDTH)?;
                field(f, " pr=", par(a[1]), WIDTH)?;
            }
            Abs | Acos | Acosh | Asin | Asinh | Atan | Atanh | Cos | Cosh | Erf | Exp | Expm1
            | Log | Log1p | Sign | Sin | Sinh | Sqrt | Tan | Tanh | UsrAv => {
                field(f, "  v=", a[0], WIDTH)?;
            }
            Begin | Par | UsrAp | UsrRp => {
                field(f, "  p=", par(a[0]), WIDTH)?;
            }
            End | Inv | UsrRv => {}
        }
        Ok(())
    }
}

impl<B: Base> Display for Tape<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ins in self.player().instructions() {
            self.write_instruction(f, &ins)?;
            f.write_char('\n')?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_padded_and_cut() {
        let mut s = String::new();
        field(&mut s, "v=", 12, 5).unwrap();
        assert_eq!(s, "v=12   ");
        s.clear();
        field(&mut s, "", "Expm1xx", 5).unwrap();
        assert_eq!(s, "Expm*");
    }
}
