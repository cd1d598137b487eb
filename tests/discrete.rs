//! Discrete functions: re-evaluated at replay, flat for derivatives.

use std::sync::OnceLock;

use approx::assert_relative_eq;
use adtape::{record, record_dynamic, register_discrete, Ad, DiscreteHandle, OpCode, TapeError};

fn floor() -> DiscreteHandle {
    static HANDLE: OnceLock<DiscreteHandle> = OnceLock::new();
    *HANDLE.get_or_init(|| register_discrete("floor", |x: f64| x.floor()))
}

fn floor_times(x: &[Ad<f64>]) -> Vec<Ad<f64>> {
    vec![x[0].discrete(floor()).unwrap() * x[0]]
}

#[test]
fn value_follows_the_replay_point() {
    let tape = record(&[1.5_f64], floor_times).unwrap();
    assert_eq!(tape.count_op(OpCode::Dis), 1);
    assert_relative_eq!(tape.function_value(&[1.5]).unwrap()[0], 1.5);
    assert_relative_eq!(tape.function_value(&[2.7]).unwrap()[0], 5.4, max_relative = 1e-15);
    assert_relative_eq!(tape.function_value(&[-0.5]).unwrap()[0], 0.5);
}

#[test]
fn derivatives_treat_the_step_as_constant() {
    let tape = record(&[1.5_f64], floor_times).unwrap();
    assert_eq!(tape.gradient(&[2.7]).unwrap(), vec![2.0]);
    assert_eq!(tape.gradient(&[-0.5]).unwrap(), vec![-1.0]);

    let mut ws = tape.new_workspace();
    tape.forward(0, &[3.25], &mut ws).unwrap();
    assert_eq!(tape.forward(1, &[1.0], &mut ws).unwrap(), vec![3.0]);
    assert_eq!(tape.forward(2, &[0.0], &mut ws).unwrap(), vec![0.0]);
}

#[test]
fn listing_shows_the_argument() {
    let tape = record(&[1.5_f64], floor_times).unwrap();
    let listing = tape.listing();
    let line = listing.lines().nth(2).unwrap();
    assert!(line.starts_with("o=2    v=2    Dis      h="), "{}", listing);
    assert!(line.contains("  v=1    "), "{}", listing);
}

#[test]
fn constant_argument_stays_off_tape() {
    let tape = record(&[1.0_f64], |x| vec![x[0] * Ad::constant(2.5).discrete(floor()).unwrap()]).unwrap();
    assert_eq!(tape.count_op(OpCode::Dis), 0);
    assert_eq!(tape.function_value(&[3.0]).unwrap(), vec![6.0]);
}

#[test]
fn dynamic_argument_is_rejected() {
    let tape = record_dynamic(&[1.0_f64], &[2.5], |x, p| {
        assert_eq!(
            p[0].discrete(floor()).unwrap_err(),
            TapeError::DynamicOperand { op: "Dis" }
        );
        vec![x[0]]
    })
    .unwrap();
    assert_eq!(tape.count_op(OpCode::Dis), 0);
}
