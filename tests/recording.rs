//! Recording: tape shape, identity short-circuits and operand faults.

use std::thread;

use adtape::{
    abort, finish, independent, record, Ad, Base, CompareOp, OpCode, TapeError,
};

#[test]
fn identity_operations_add_no_instructions() {
    let tape = record(&[3.0_f64], |x| vec![(x[0] * 1.0 + 0.0) / 1.0 - 0.0]).unwrap();
    // Begin, Inv, End
    assert_eq!(tape.num_op(), 3);
    assert_eq!(tape.dep_var(), tape.ind_var());
}

#[test]
fn zero_times_variable_becomes_a_parameter_dependent() {
    let tape = record(&[3.0_f64], |x| vec![0.0 * x[0]]).unwrap();
    assert_eq!(tape.count_op(OpCode::Par), 1);
    assert_eq!(tape.function_value(&[7.0]).unwrap(), vec![0.0]);
    assert_eq!(tape.gradient(&[7.0]).unwrap(), vec![0.0]);
}

#[test]
fn absorbing_aliases_keep_the_computed_value() {
    let zero = Ad::constant(0.0_f64);
    for x0 in [0.0_f64, -1.0] {
        let tape = record(&[x0], |x| {
            let p = zero.try_pow(x[0]).unwrap();
            let q = zero.try_div(x[0]).unwrap();
            assert_eq!(p.value(), 0.0_f64.powf(x0));
            assert!(p.is_constant() && q.is_constant());
            vec![p, q]
        })
        .unwrap();
        let y = tape.function_value(&[x0]).unwrap();
        assert_eq!(y[0], 0.0_f64.powf(x0));
        assert_eq!(y[1].is_nan(), (0.0 / x0).is_nan());
        assert_eq!(tape.count_op(OpCode::PowPv) + tape.count_op(OpCode::DivPv), 0);
    }

    // 0^0 is one, 0^-1 is infinite, 0/0 is NaN
    let at_zero = record(&[0.0_f64], |x| vec![zero.try_pow(x[0]).unwrap(), zero.try_div(x[0]).unwrap()]).unwrap();
    let y = at_zero.function_value(&[0.0]).unwrap();
    assert_eq!(y[0], 1.0);
    assert!(y[1].is_nan());
    let at_minus_one = record(&[-1.0_f64], |x| vec![zero.try_pow(x[0]).unwrap()]).unwrap();
    assert_eq!(at_minus_one.function_value(&[-1.0]).unwrap(), vec![f64::INFINITY]);
}

#[test]
fn operator_kind_follows_operand_classes() {
    let tape = record(&[1.0_f64, 2.0], |x| {
        let a = x[0] * x[1];
        let b = 2.0 * x[0];
        let c = x[1] * 2.0;
        let d = x[0] - 2.0;
        let e = 2.0 - x[1];
        vec![a + b + c + d + e]
    })
    .unwrap();
    assert_eq!(tape.count_op(OpCode::MulVv), 1);
    // multiplication commutes: `x * p` is stored as `p * x`
    assert_eq!(tape.count_op(OpCode::MulPv), 2);
    assert_eq!(tape.count_op(OpCode::SubVp), 1);
    assert_eq!(tape.count_op(OpCode::SubPv), 1);
    assert_eq!(tape.count_op(OpCode::AddVv), 4);
}

#[test]
fn multi_result_kinds_reserve_auxiliary_variables() {
    let tape = record(&[0.5_f64], |x| vec![x[0].sin()]).unwrap();
    // variable 0, the independent, `cos` and `sin`
    assert_eq!(tape.num_var(), 4);
    assert_eq!(tape.dep_var(), &[3]);

    let tape = record(&[0.5_f64], |x| vec![x[0].erf()]).unwrap();
    assert_eq!(tape.num_var(), 2 + 5);
}

#[test]
fn constant_computations_stay_off_tape() {
    let tape = record(&[1.0_f64], |x| {
        let c = Ad::constant(2.0_f64).exp() * Ad::constant(3.0);
        assert!(c.is_constant());
        vec![x[0] * c]
    })
    .unwrap();
    assert_eq!(tape.count_op(OpCode::Exp), 0);
    assert_eq!(tape.num_op(), 4);
}

#[test]
fn second_recording_on_the_same_thread_is_rejected() {
    let x = independent(&[1.0_f64]).unwrap();
    let err = independent(&[2.0_f64]).unwrap_err();
    assert!(matches!(err, TapeError::AlreadyRecording(_)));
    let tape = finish(&[x[0] * x[0]]).unwrap();
    assert_eq!(tape.num_ind(), 1);
}

#[test]
fn values_outlive_their_recording_as_stale_operands() {
    let x = independent(&[1.0_f64]).unwrap();
    let id = x[0].tape_id().unwrap();
    assert!(abort::<f64>());
    assert!(!abort::<f64>());
    assert_eq!(
        x[0].try_add(Ad::constant(1.0)).unwrap_err(),
        TapeError::StaleOperand { operand: id }
    );
    assert_eq!(finish(&[x[0]]).unwrap_err(), TapeError::NotRecording);
}

#[test]
fn an_operand_from_another_thread_leaves_both_tapes_untouched() {
    let x = independent(&[2.0_f64]).unwrap();
    let y = x[0] * x[0];
    let mine = y.tape_id().unwrap();

    let (theirs, before, after) = thread::spawn(move || {
        let z = independent(&[5.0_f64]).unwrap();
        let w = z[0].sin();
        let theirs = w.tape_id().unwrap();
        let before = adtape::tape::with_recorder::<f64, _>(|r| r.map(|r| r.num_op()));
        let err = w.try_mul(y).unwrap_err();
        assert_eq!(
            err,
            TapeError::TapeMismatch {
                left: theirs,
                right: mine
            }
        );
        let err = y.try_add(Ad::constant(1.0)).unwrap_err();
        assert_eq!(
            err,
            TapeError::ForeignOperand {
                operand: mine,
                current: theirs
            }
        );
        let after = adtape::tape::with_recorder::<f64, _>(|r| r.map(|r| r.num_op()));
        let tape = finish(&[w]).unwrap();
        assert_eq!(tape.num_dep(), 1);
        (theirs, before, after)
    })
    .join()
    .unwrap();

    assert_ne!(theirs, mine);
    assert_eq!(before, after);
    let tape = finish(&[y]).unwrap();
    // Begin, Inv, MulVv, End
    assert_eq!(tape.num_op(), 4);
}

#[test]
#[should_panic(expected = "not recording")]
fn operators_panic_with_the_fault_message() {
    let x = independent(&[1.0_f64]).unwrap();
    abort::<f64>();
    let _ = x[0] + x[0];
}

#[test]
fn comparisons_record_the_relation_that_held() {
    let tape = record(&[1.0_f64, 2.0], |x| {
        assert!(x[0].compare(CompareOp::Lt, x[1]).unwrap());
        assert!(!x[0].compare(CompareOp::Gt, x[1]).unwrap());
        assert!(x[0].compare(CompareOp::Ne, Ad::constant(3.0)).unwrap());
        vec![x[0] + x[1]]
    })
    .unwrap();
    assert_eq!(tape.count_op(OpCode::LtVv), 1);
    assert_eq!(tape.count_op(OpCode::LeVv), 1);
    assert_eq!(tape.count_op(OpCode::NePv), 1);

    let mut ws = tape.new_workspace();
    tape.forward(0, &[1.0, 2.0], &mut ws).unwrap();
    assert_eq!(ws.compare_change_count(), 0);
    tape.forward(0, &[4.0, 2.0], &mut ws).unwrap();
    assert_eq!(ws.compare_change_count(), 2);
    assert_eq!(ws.compare_change_op(), Some(3));
    tape.forward(0, &[3.0, 4.0], &mut ws).unwrap();
    assert_eq!(ws.compare_change_count(), 1);
}

#[test]
fn tape_ids_are_never_reused() {
    let a = record(&[1.0_f64], |x| vec![x[0].exp()]).unwrap();
    let b = record(&[1.0_f64], |x| vec![x[0].exp()]).unwrap();
    assert_ne!(a.id(), b.id());

    let ws = a.new_workspace();
    assert_eq!(
        b.reverse(&ws, &[1.0]).unwrap_err(),
        TapeError::WorkspaceMismatch {
            workspace: a.id(),
            tape: b.id()
        }
    );
}
