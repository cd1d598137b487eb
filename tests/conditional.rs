//! Conditional expressions and conditional skips.

use approx::assert_relative_eq;
use adtape::{record, record_dynamic, Ad, Base, CompareOp, OpCode, Result};

fn relu(x: Ad<f64>) -> Ad<f64> {
    Ad::cond_exp(CompareOp::Gt, x, Ad::constant(0.0), x, Ad::constant(0.0)).unwrap()
}

#[test]
fn cond_exp_selects_again_on_replay() {
    let tape = record(&[1.0_f64], |x| vec![relu(x[0]) * 3.0]).unwrap();
    assert_eq!(tape.count_op(OpCode::CExp), 1);
    assert_eq!(tape.function_value(&[2.0]).unwrap(), vec![6.0]);
    assert_eq!(tape.function_value(&[-2.0]).unwrap(), vec![0.0]);
    assert_eq!(tape.gradient(&[2.0]).unwrap(), vec![3.0]);
    assert_eq!(tape.gradient(&[-2.0]).unwrap(), vec![0.0]);
}

#[test]
fn cond_exp_with_variable_branches() {
    let tape = record(&[1.0_f64, 2.0], |x| {
        vec![Ad::cond_exp(CompareOp::Le, x[0], x[1], x[0] * x[1], x[1].sin()).unwrap()]
    })
    .unwrap();
    assert_eq!(tape.gradient(&[1.0, 2.0]).unwrap(), vec![2.0, 1.0]);
    let g = tape.gradient(&[3.0, 2.0]).unwrap();
    assert_eq!(g[0], 0.0);
    assert_relative_eq!(g[1], 2.0_f64.cos(), max_relative = 1e-14);
}

#[test]
fn constant_comparison_aliases_the_selected_operand() {
    let tape = record(&[1.0_f64], |x| {
        vec![Ad::cond_exp(CompareOp::Lt, Ad::constant(1.0), Ad::constant(2.0), x[0], x[0].exp())
            .unwrap()]
    })
    .unwrap();
    assert_eq!(tape.count_op(OpCode::CExp), 0);
    assert_eq!(tape.dep_var(), tape.ind_var());
}

/// `x < 0 ? x e^x : sin(x)` with both branches recorded.
fn branchy(x: Ad<f64>) -> Result<Ad<f64>> {
    Ad::cond_branch(
        CompareOp::Lt,
        x,
        Ad::constant(0.0),
        || Ok(x.exp() * x),
        || Ok(x.sin()),
    )
}

#[test]
fn skipped_branch_is_not_executed() {
    let tape = record(&[-2.0_f64], |x| vec![branchy(x[0]).unwrap()]).unwrap();
    // Begin, Inv, CSkip, Exp, Mulvv, Sin, CExp, End
    assert_eq!(tape.num_op(), 8);
    assert_eq!(tape.count_op(OpCode::CSkip), 1);

    let mut ws = tape.new_workspace();
    let y = tape.forward(0, &[-2.0], &mut ws).unwrap();
    assert_relative_eq!(y[0], -2.0 * (-2.0_f64).exp(), max_relative = 1e-14);
    assert_eq!(ws.executed_ops(), 7);
    assert!(ws.is_skipped(5));

    let y = tape.forward(0, &[1.0], &mut ws).unwrap();
    assert_relative_eq!(y[0], 1.0_f64.sin(), max_relative = 1e-14);
    assert_eq!(ws.executed_ops(), 6);
    assert!(ws.is_skipped(3) && ws.is_skipped(4) && !ws.is_skipped(5));
}

#[test]
fn gradients_follow_the_taken_branch() {
    let tape = record(&[1.0_f64], |x| vec![branchy(x[0]).unwrap()]).unwrap();
    let g = tape.gradient(&[-2.0]).unwrap();
    assert_relative_eq!(g[0], -(-2.0_f64).exp(), max_relative = 1e-12);
    let g = tape.gradient(&[0.5]).unwrap();
    assert_relative_eq!(g[0], 0.5_f64.cos(), max_relative = 1e-12);
}

#[test]
fn higher_orders_skip_the_same_instructions() {
    let tape = record(&[1.0_f64], |x| vec![branchy(x[0]).unwrap()]).unwrap();
    let mut ws = tape.new_workspace();
    tape.forward(0, &[0.5], &mut ws).unwrap();
    let c1 = tape.forward(1, &[1.0], &mut ws).unwrap();
    assert_relative_eq!(c1[0], 0.5_f64.cos(), max_relative = 1e-12);
    assert_eq!(ws.executed_ops(), 6);
}

#[test]
fn constant_condition_evaluates_one_branch() {
    let mut false_branch_ran = false;
    let tape = record(&[1.0_f64], |x| {
        let y = Ad::cond_branch(
            CompareOp::Ge,
            Ad::constant(2.0),
            Ad::constant(1.0),
            || Ok(x[0].cos()),
            || {
                false_branch_ran = true;
                Ok(x[0].sin())
            },
        )
        .unwrap();
        vec![y]
    })
    .unwrap();
    assert!(!false_branch_ran);
    assert_eq!(tape.count_op(OpCode::CSkip), 0);
    assert_eq!(tape.count_op(OpCode::Sin), 0);
    assert_eq!(tape.count_op(OpCode::Cos), 1);
}

#[test]
fn rebinding_a_dynamic_condition_reroutes_the_skip() {
    let mut tape = record_dynamic(&[2.0_f64], &[-1.0], |x, p| {
        let y = Ad::cond_branch(
            CompareOp::Lt,
            p[0],
            Ad::constant(0.0),
            || Ok(x[0].exp()),
            || Ok(x[0].sin()),
        )
        .unwrap();
        vec![y]
    })
    .unwrap();
    // Begin, Inv, CSkip, Exp, Sin, CExp, End
    assert_eq!(tape.num_op(), 7);

    let mut ws = tape.new_workspace();
    let y = tape.forward(0, &[2.0], &mut ws).unwrap();
    assert_relative_eq!(y[0], 2.0_f64.exp(), max_relative = 1e-14);
    assert_eq!(ws.executed_ops(), 6);
    assert!(ws.is_skipped(4) && !ws.is_skipped(3));

    tape.set_dynamic(&[1.0]).unwrap();
    let mut ws = tape.new_workspace();
    let y = tape.forward(0, &[2.0], &mut ws).unwrap();
    assert_relative_eq!(y[0], 2.0_f64.sin(), max_relative = 1e-14);
    assert_eq!(ws.executed_ops(), 6);
    assert!(ws.is_skipped(3) && !ws.is_skipped(4));
    assert_relative_eq!(tape.gradient(&[2.0]).unwrap()[0], 2.0_f64.cos(), max_relative = 1e-14);
}

/// `x0 < 0 ? (x1 > 0 ? e^x1 : cos x1) : sin x0`
fn nested(x: &[Ad<f64>]) -> Vec<Ad<f64>> {
    let (a, b) = (x[0], x[1]);
    let y = Ad::cond_branch(
        CompareOp::Lt,
        a,
        Ad::constant(0.0),
        || Ad::cond_branch(CompareOp::Gt, b, Ad::constant(0.0), || Ok(b.exp()), || Ok(b.cos())),
        || Ok(a.sin()),
    )
    .unwrap();
    vec![y]
}

#[test]
fn nested_branches_share_an_insertion_point() {
    let tape = record(&[-1.0_f64, 1.0], nested).unwrap();
    // Begin, Inv, Inv, CSkip, CSkip, Exp, Cos, CExp, Sin, CExp, End
    assert_eq!(tape.num_op(), 11);
    assert_eq!(tape.count_op(OpCode::CSkip), 2);
    // the outer skip comes first and lists the whole inner branch
    let listing = tape.listing();
    assert!(
        listing.contains("o=3    v=     CSkipLt  vl=1     pr=0     ot=8    \n\tof=5     of=6     of=7    \n"),
        "{}",
        listing
    );
    assert!(
        listing.contains("o=4    v=     CSkipGt  vl=2     pr=0     ot=6     of=5    \n"),
        "{}",
        listing
    );

    let mut ws = tape.new_workspace();
    let y = tape.forward(0, &[1.0, 5.0], &mut ws).unwrap();
    assert_relative_eq!(y[0], 1.0_f64.sin(), max_relative = 1e-14);
    assert_eq!(ws.executed_ops(), 8);
    assert!((5..8).all(|i| ws.is_skipped(i)) && !ws.is_skipped(8));

    let y = tape.forward(0, &[-1.0, 1.0], &mut ws).unwrap();
    assert_relative_eq!(y[0], 1.0_f64.exp(), max_relative = 1e-14);
    assert_eq!(ws.executed_ops(), 9);
    assert!(ws.is_skipped(6) && ws.is_skipped(8) && !ws.is_skipped(5));

    let y = tape.forward(0, &[-1.0, -2.0], &mut ws).unwrap();
    assert_relative_eq!(y[0], (-2.0_f64).cos(), max_relative = 1e-14);
    assert_eq!(ws.executed_ops(), 9);
    assert!(ws.is_skipped(5) && !ws.is_skipped(6));
}

#[test]
fn nested_branch_gradients() {
    let tape = record(&[-1.0_f64, 1.0], nested).unwrap();
    let g = tape.gradient(&[0.5, 3.0]).unwrap();
    assert_relative_eq!(g[0], 0.5_f64.cos(), max_relative = 1e-14);
    assert_eq!(g[1], 0.0);
    let g = tape.gradient(&[-0.5, 0.3]).unwrap();
    assert_eq!(g[0], 0.0);
    assert_relative_eq!(g[1], 0.3_f64.exp(), max_relative = 1e-14);
    let g = tape.gradient(&[-0.5, -0.3]).unwrap();
    assert_eq!(g[0], 0.0);
    assert_relative_eq!(g[1], 0.3_f64.sin(), max_relative = 1e-14);
}
