//! Indexed vectors: loads and stores resolved again on every replay.

use adtape::{record, Ad, OpCode, TapeError, VecAd};

fn pick(x: &[Ad<f64>]) -> Vec<Ad<f64>> {
    let mut v = VecAd::new(&[10.0, 20.0, 30.0]);
    v.store(Ad::constant(1.0), x[1] * 2.0).unwrap();
    let y = v.load(x[0]).unwrap();
    vec![y * y]
}

#[test]
fn variable_index_is_resolved_at_replay() {
    let tape = record(&[0.0_f64, 5.0], pick).unwrap();
    assert_eq!(tape.count_op(OpCode::StPv), 1);
    assert_eq!(tape.count_op(OpCode::Ldv), 1);

    assert_eq!(tape.function_value(&[0.0, 5.0]).unwrap(), vec![100.0]);
    assert_eq!(tape.function_value(&[2.0, 5.0]).unwrap(), vec![900.0]);
    assert_eq!(tape.function_value(&[1.0, 5.0]).unwrap(), vec![100.0]);
    assert_eq!(tape.function_value(&[1.0, 4.0]).unwrap(), vec![64.0]);
}

#[test]
fn loads_propagate_adjoints_to_stored_variables() {
    let tape = record(&[0.0_f64, 5.0], pick).unwrap();
    assert_eq!(tape.gradient(&[1.0, 5.0]).unwrap(), vec![0.0, 40.0]);
    assert_eq!(tape.gradient(&[2.0, 5.0]).unwrap(), vec![0.0, 0.0]);
}

#[test]
fn loads_carry_higher_orders() {
    let tape = record(&[0.0_f64, 5.0], pick).unwrap();
    let mut ws = tape.new_workspace();
    tape.forward(0, &[1.0, 3.0], &mut ws).unwrap();
    // y = (2 x1)^2, dy = 8 x1 dx1
    let d = tape.forward(1, &[0.0, 1.0], &mut ws).unwrap();
    assert_eq!(d, vec![24.0]);
}

#[test]
fn out_of_range_index_at_replay_is_an_error() {
    let tape = record(&[0.0_f64, 5.0], pick).unwrap();
    assert_eq!(
        tape.function_value(&[3.0, 5.0]).unwrap_err(),
        TapeError::IndexOutOfRange { index: 3, len: 3 }
    );
}

#[test]
fn non_finite_index_at_replay_is_an_error() {
    let tape = record(&[0.0_f64, 5.0], pick).unwrap();
    assert_eq!(
        tape.function_value(&[f64::NAN, 5.0]).unwrap_err(),
        TapeError::InvalidIndex { len: 3 }
    );
    assert_eq!(
        tape.function_value(&[-1.0, 5.0]).unwrap_err(),
        TapeError::InvalidIndex { len: 3 }
    );
    assert_eq!(tape.function_value(&[2.9, 5.0]).unwrap(), vec![900.0]);
}

#[test]
fn constant_index_loads_a_parameter() {
    let tape = record(&[1.0_f64], |x| {
        let mut v = VecAd::new(&[1.5, 2.5]);
        v.store(Ad::constant(0.0), x[0]).unwrap();
        let y = v.load(Ad::constant(1.0)).unwrap();
        vec![y * x[0]]
    })
    .unwrap();
    assert_eq!(tape.count_op(OpCode::Ldp), 1);
    assert_eq!(tape.function_value(&[2.0]).unwrap(), vec![5.0]);
    assert_eq!(tape.gradient(&[2.0]).unwrap(), vec![2.5]);
}

#[test]
fn vector_from_another_recording_is_rejected() {
    let mut v = VecAd::new(&[1.0_f64, 2.0]);
    let first = record(&[0.0_f64], |x| vec![v.load(x[0]).unwrap()]).unwrap();
    let second = record(&[0.0_f64], |x| {
        let err = v.load(x[0]).unwrap_err();
        vec![Ad::constant(err_code(&err))]
    })
    .unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(second.function_value(&[0.0]).unwrap(), vec![1.0]);
}

fn err_code(err: &TapeError) -> f64 {
    match err {
        TapeError::ForeignOperand { .. } => 1.0,
        _ => 0.0,
    }
}
