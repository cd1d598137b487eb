//! Read-only decoding of a finalized tape, in either direction.

use crate::base::Base;
use crate::opcode::{Addr, Arity, CompareOp, OpCode};

use super::Tape;

/// One decoded instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction<'a> {
    pub op: OpCode,
    pub args: &'a [Addr],
    /// Position in the operator stream.
    pub i_op: usize,
    /// Primary (last) result variable. For kinds without results, the most
    /// recently assigned variable.
    pub i_var: usize,
}

/// Decoder over a finalized tape.
#[derive(Clone, Copy)]
pub struct Player<'a, B: Base> {
    tape: &'a Tape<B>,
}

impl<'a, B: Base> Player<'a, B> {
    pub fn new(tape: &'a Tape<B>) -> Self {
        Player { tape }
    }

    /// Double-ended iterator over every instruction from `Begin` to `End`.
    pub fn instructions(&self) -> Instructions<'a> {
        Instructions::new(&self.tape.ops, &self.tape.args, self.tape.num_var)
    }

    #[inline]
    pub fn num_op(&self) -> usize {
        self.tape.ops.len()
    }

    #[inline]
    pub fn num_var(&self) -> usize {
        self.tape.num_var
    }

    #[inline]
    pub fn parameter(&self, addr: Addr) -> B {
        self.tape.pool.value(addr)
    }

    #[inline]
    pub fn is_dynamic(&self, addr: Addr) -> bool {
        self.tape.pool.is_dynamic(addr)
    }

    /// Text recorded for a `Pri` instruction.
    #[inline]
    pub fn text(&self, index: Addr) -> &'a str {
        &self.tape.text[index as usize]
    }
}

/// Iterator returned by [`Player::instructions`].
#[derive(Clone, Debug)]
pub struct Instructions<'a> {
    ops: &'a [OpCode],
    args: &'a [Addr],
    front_op: usize,
    back_op: usize,
    front_arg: usize,
    back_arg: usize,
    front_var: usize,
    back_var: usize,
}

impl<'a> Instructions<'a> {
    pub(crate) fn new(ops: &'a [OpCode], args: &'a [Addr], num_var: usize) -> Self {
        Instructions {
            ops,
            args,
            front_op: 0,
            back_op: ops.len(),
            front_arg: 0,
            back_arg: args.len(),
            front_var: 0,
            back_var: num_var,
        }
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Instruction<'a>;

    fn next(&mut self) -> Option<Instruction<'a>> {
        if self.front_op == self.back_op {
            return None;
        }
        let i_op = self.front_op;
        let op = self.ops[i_op];
        let n_arg = forward_arg_len(op, i_op, &self.args[self.front_arg..self.back_arg]);
        let args = &self.args[self.front_arg..self.front_arg + n_arg];
        self.front_op += 1;
        self.front_arg += n_arg;
        self.front_var += op.num_res();
        Some(Instruction {
            op,
            args,
            i_op,
            i_var: self.front_var.saturating_sub(1),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back_op - self.front_op;
        (n, Some(n))
    }
}

impl<'a> DoubleEndedIterator for Instructions<'a> {
    fn next_back(&mut self) -> Option<Instruction<'a>> {
        if self.front_op == self.back_op {
            return None;
        }
        let i_op = self.back_op - 1;
        let op = self.ops[i_op];
        let n_arg = backward_arg_len(op, i_op, &self.args[self.front_arg..self.back_arg]);
        let start = self.back_arg - n_arg;
        let args = &self.args[start..self.back_arg];
        let i_var = self.back_var.saturating_sub(1);
        self.back_op -= 1;
        self.back_arg = start;
        self.back_var -= op.num_res();
        Some(Instruction {
            op,
            args,
            i_op,
            i_var,
        })
    }
}

impl<'a> ExactSizeIterator for Instructions<'a> {}

#[cold]
pub(crate) fn corrupt(i_op: usize, op: OpCode, detail: &str) -> ! {
    panic!("corrupted tape at instruction {} ({}): {}", i_op, op, detail)
}

#[inline]
fn get(slice: &[Addr], at: usize, i_op: usize, op: OpCode) -> usize {
    match slice.get(at) {
        Some(&a) => a as usize,
        None => corrupt(i_op, op, "argument stream ends inside the instruction"),
    }
}

/// Argument count of the instruction starting at `tail[0]`.
pub(crate) fn forward_arg_len(op: OpCode, i_op: usize, tail: &[Addr]) -> usize {
    let (n_arg, trailing, expected) = match op.num_arg() {
        Arity::Fixed(n) => {
            if tail.len() < n {
                corrupt(i_op, op, "argument stream ends inside the instruction");
            }
            return n;
        }
        Arity::Variable => match op {
            OpCode::CSum => {
                let end = get(tail, 4, i_op, op);
                (end + 1, get(tail, end, i_op, op), end)
            }
            OpCode::CSkip => {
                let listed = get(tail, 4, i_op, op) + get(tail, 5, i_op, op);
                (7 + listed, get(tail, 6 + listed, i_op, op), listed)
            }
            _ => corrupt(i_op, op, "variable arity on a fixed kind"),
        },
    };
    if trailing != expected {
        corrupt(
            i_op,
            op,
            &format!("trailing length {} does not match {}", trailing, expected),
        );
    }
    n_arg
}

/// Argument count of the instruction ending at `head[head.len() - 1]`.
pub(crate) fn backward_arg_len(op: OpCode, i_op: usize, head: &[Addr]) -> usize {
    let n_arg = match op.num_arg() {
        Arity::Fixed(n) => n,
        Arity::Variable => {
            let trailing = match head.last() {
                Some(&t) => t as usize,
                None => corrupt(i_op, op, "argument stream is empty"),
            };
            match op {
                OpCode::CSum => trailing + 1,
                OpCode::CSkip => trailing + 7,
                _ => corrupt(i_op, op, "variable arity on a fixed kind"),
            }
        }
    };
    if n_arg > head.len() {
        corrupt(i_op, op, "argument stream ends inside the instruction");
    }
    let start = head.len() - n_arg;
    let payload = &head[start..];
    let consistent = match op {
        OpCode::CSum => payload[4] as usize == n_arg - 1,
        OpCode::CSkip => (payload[4] + payload[5]) as usize == n_arg - 7,
        _ => true,
    };
    if !consistent {
        corrupt(
            i_op,
            op,
            &format!("trailing length {} does not match its leading fields", head[head.len() - 1]),
        );
    }
    n_arg
}

/// Typed view of a `CSum` payload:
/// `[init, e1, e2, e3, e4, +v.., -v.., +d.., -d.., e4]`.
///
/// `e1..e4` are offsets from the first argument; `init` is a constant
/// parameter.
#[derive(Clone, Copy, Debug)]
pub struct CSumArgs<'a> {
    args: &'a [Addr],
}

impl<'a> CSumArgs<'a> {
    #[inline]
    pub fn new(args: &'a [Addr]) -> Self {
        debug_assert_eq!(args.len(), args[4] as usize + 1);
        CSumArgs { args }
    }

    #[inline]
    fn bound(&self, k: usize) -> usize {
        self.args[k] as usize
    }

    #[inline]
    pub fn init(&self) -> Addr {
        self.args[0]
    }

    #[inline]
    pub fn add_var(&self) -> &'a [Addr] {
        &self.args[5..self.bound(1)]
    }

    #[inline]
    pub fn sub_var(&self) -> &'a [Addr] {
        &self.args[self.bound(1)..self.bound(2)]
    }

    #[inline]
    pub fn add_dyn(&self) -> &'a [Addr] {
        &self.args[self.bound(2)..self.bound(3)]
    }

    #[inline]
    pub fn sub_dyn(&self) -> &'a [Addr] {
        &self.args[self.bound(3)..self.bound(4)]
    }

    pub(crate) fn encode(
        init: Addr,
        add_var: &[Addr],
        sub_var: &[Addr],
        add_dyn: &[Addr],
        sub_dyn: &[Addr],
        out: &mut Vec<Addr>,
    ) {
        let e1 = 5 + add_var.len();
        let e2 = e1 + sub_var.len();
        let e3 = e2 + add_dyn.len();
        let e4 = e3 + sub_dyn.len();
        out.extend_from_slice(&[init, e1 as Addr, e2 as Addr, e3 as Addr, e4 as Addr]);
        out.extend_from_slice(add_var);
        out.extend_from_slice(sub_var);
        out.extend_from_slice(add_dyn);
        out.extend_from_slice(sub_dyn);
        out.push(e4 as Addr);
    }
}

/// Typed view of a `CSkip` payload:
/// `[rel, flags, left, right, n_true, n_false, if_true.., if_false.., n_true + n_false]`.
///
/// `if_true` lists the instructions skipped when `left rel right` holds.
#[derive(Clone, Copy, Debug)]
pub struct CSkipArgs<'a> {
    args: &'a [Addr],
}

impl<'a> CSkipArgs<'a> {
    #[inline]
    pub fn new(args: &'a [Addr]) -> Self {
        debug_assert_eq!(args.len(), 7 + (args[4] + args[5]) as usize);
        CSkipArgs { args }
    }

    #[inline]
    pub fn rel(&self) -> CompareOp {
        CompareOp::from_addr(self.args[0])
    }

    #[inline]
    pub fn left_is_variable(&self) -> bool {
        self.args[1] & 1 != 0
    }

    #[inline]
    pub fn right_is_variable(&self) -> bool {
        self.args[1] & 2 != 0
    }

    #[inline]
    pub fn left(&self) -> Addr {
        self.args[2]
    }

    #[inline]
    pub fn right(&self) -> Addr {
        self.args[3]
    }

    #[inline]
    pub fn skip_if_true(&self) -> &'a [Addr] {
        &self.args[6..6 + self.args[4] as usize]
    }

    #[inline]
    pub fn skip_if_false(&self) -> &'a [Addr] {
        let start = 6 + self.args[4] as usize;
        &self.args[start..start + self.args[5] as usize]
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn encode(
        rel: CompareOp,
        flags: Addr,
        left: Addr,
        right: Addr,
        if_true: &[Addr],
        if_false: &[Addr],
        out: &mut Vec<Addr>,
    ) {
        let (n_true, n_false) = (if_true.len() as Addr, if_false.len() as Addr);
        out.extend_from_slice(&[rel as Addr, flags, left, right, n_true, n_false]);
        out.extend_from_slice(if_true);
        out.extend_from_slice(if_false);
        out.push(n_true + n_false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Begin, Inv, Inv, CSum, CSkip, End.
    fn stream() -> (Vec<OpCode>, Vec<Addr>) {
        let mut args = vec![0];
        CSumArgs::encode(1, &[1], &[2], &[], &[], &mut args);
        CSkipArgs::encode(CompareOp::Lt, 1, 1, 2, &[5], &[], &mut args);
        let ops = vec![
            OpCode::Begin,
            OpCode::Inv,
            OpCode::Inv,
            OpCode::CSum,
            OpCode::CSkip,
            OpCode::End,
        ];
        (ops, args)
    }

    #[test]
    fn forward_and_backward_agree() {
        let (ops, args) = stream();
        let fwd: Vec<Instruction<'_>> = Instructions::new(&ops, &args, 4).collect();
        let mut bwd: Vec<Instruction<'_>> = Instructions::new(&ops, &args, 4).rev().collect();
        bwd.reverse();
        assert_eq!(fwd, bwd);
        assert_eq!(fwd[3].i_var, 3);
        assert_eq!(fwd[3].args.len(), 8);
        assert_eq!(fwd[4].args.len(), 8);
    }

    #[test]
    fn csum_view_splits_lists() {
        let mut args = Vec::new();
        CSumArgs::encode(9, &[1, 2], &[3], &[4], &[5, 6], &mut args);
        let view = CSumArgs::new(&args);
        assert_eq!(view.init(), 9);
        assert_eq!(view.add_var(), &[1, 2]);
        assert_eq!(view.sub_var(), &[3]);
        assert_eq!(view.add_dyn(), &[4]);
        assert_eq!(view.sub_dyn(), &[5, 6]);
    }

    #[test]
    fn cskip_view_splits_lists() {
        let mut args = Vec::new();
        CSkipArgs::encode(CompareOp::Ge, 2, 7, 3, &[10, 11], &[12], &mut args);
        let view = CSkipArgs::new(&args);
        assert_eq!(view.rel(), CompareOp::Ge);
        assert!(!view.left_is_variable() && view.right_is_variable());
        assert_eq!(view.skip_if_true(), &[10, 11]);
        assert_eq!(view.skip_if_false(), &[12]);
    }

    #[test]
    #[should_panic(expected = "corrupted tape at instruction 4 (CSkip)")]
    fn inconsistent_trailing_length_is_fatal_backward() {
        let (ops, mut args) = stream();
        let last = args.len() - 1;
        args[last] = 0;
        let _ = Instructions::new(&ops, &args, 4).rev().count();
    }

    #[test]
    #[should_panic(expected = "corrupted tape at instruction 3 (CSum)")]
    fn inconsistent_trailing_length_is_fatal_forward() {
        let (ops, mut args) = stream();
        args[1 + 7] = 2;
        let _ = Instructions::new(&ops, &args, 4).count();
    }
}
