//! Dynamic parameters: re-binding values on a finished tape.

use approx::assert_relative_eq;
use adtape::{independent_dynamic, finish, record_dynamic, Ad, Base, OpCode, TapeError};

#[test]
fn rebinding_changes_values_and_derivatives() {
    let mut tape = record_dynamic(&[2.0_f64], &[3.0], |x, p| vec![x[0] * p[0] + p[0]]).unwrap();
    assert_eq!(tape.num_dynamic(), 1);
    assert_eq!(tape.function_value(&[2.0]).unwrap(), vec![9.0]);
    assert_eq!(tape.gradient(&[2.0]).unwrap(), vec![3.0]);

    tape.set_dynamic(&[5.0]).unwrap();
    assert_eq!(tape.dynamic_values(), vec![5.0]);
    assert_eq!(tape.function_value(&[2.0]).unwrap(), vec![15.0]);
    assert_eq!(tape.gradient(&[2.0]).unwrap(), vec![5.0]);
}

#[test]
fn dynamic_parameters_are_not_identities() {
    // p = 1 at record time must not alias `x * p` to `x`
    let mut tape = record_dynamic(&[2.0_f64], &[1.0], |x, p| vec![x[0] * p[0]]).unwrap();
    assert_eq!(tape.count_op(OpCode::MulPv), 1);
    tape.set_dynamic(&[4.0]).unwrap();
    assert_eq!(tape.function_value(&[2.0]).unwrap(), vec![8.0]);
}

#[test]
fn dynamic_dependent_is_replayed_through_par() {
    let mut tape = record_dynamic(&[1.0_f64], &[4.0], |x, p| vec![x[0], p[0]]).unwrap();
    assert_eq!(tape.count_op(OpCode::Par), 1);
    tape.set_dynamic(&[7.0]).unwrap();
    assert_eq!(tape.function_value(&[1.0]).unwrap(), vec![1.0, 7.0]);
}

#[test]
fn dynamic_terms_in_sums_and_conditionals() {
    let mut tape = record_dynamic(&[1.0_f64, 2.0], &[10.0, 1.0], |x, p| {
        let s = Ad::sum(&[x[0], p[0]], &[x[1], p[1]]).unwrap();
        let c = Ad::cond_exp(adtape::CompareOp::Lt, x[0], p[1], s, x[1]).unwrap();
        vec![s, c]
    })
    .unwrap();
    assert_eq!(tape.function_value(&[1.0, 2.0]).unwrap(), vec![8.0, 2.0]);
    tape.set_dynamic(&[20.0, 5.0]).unwrap();
    assert_eq!(tape.function_value(&[1.0, 2.0]).unwrap(), vec![14.0, 14.0]);
    assert_eq!(tape.jacobian(&[1.0, 2.0]).unwrap(), vec![1.0, -1.0, 1.0, -1.0]);
}

#[test]
fn operations_on_dynamic_parameters_alone_are_rejected() {
    let (x, p) = independent_dynamic(&[1.0_f64], &[2.0, 3.0]).unwrap();
    assert_eq!(
        p[0].try_mul(p[1]).unwrap_err(),
        TapeError::DynamicOperand { op: "mul" }
    );
    assert_eq!(
        p[0].try_unary(OpCode::Exp).unwrap_err(),
        TapeError::DynamicOperand { op: "Exp" }
    );
    let before = adtape::tape::with_recorder::<f64, _>(|r| r.map(|r| r.num_op()));
    assert!(p[0].try_add(p[1]).is_err());
    let after = adtape::tape::with_recorder::<f64, _>(|r| r.map(|r| r.num_op()));
    assert_eq!(before, after);

    let tape = finish(&[x[0] * p[0]]).unwrap();
    assert_relative_eq!(tape.gradient(&[0.5]).unwrap()[0], 2.0);
}

#[test]
fn rebinding_checks_the_count() {
    let mut tape = record_dynamic(&[1.0_f64], &[2.0], |x, p| vec![x[0].sin() * p[0]]).unwrap();
    assert_eq!(
        tape.set_dynamic(&[1.0, 2.0]).unwrap_err(),
        TapeError::LengthMismatch {
            what: "dynamic parameters",
            expected: 1,
            got: 2
        }
    );
}
