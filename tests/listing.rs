//! Debug listing and forward-mode print output.

use adtape::{record, Ad, Base, CompareOp, TapeError};

#[test]
fn one_line_per_instruction() {
    let tape = record(&[1.0_f64, 2.0], |x| vec![x[0] * x[1]]).unwrap();
    let listing = tape.listing();
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(lines.len(), tape.num_op());
    assert!(lines[0].starts_with("o=0    v=     Begin"));
    assert_eq!(lines[1].trim_end(), "o=1    v=1    Inv");
    assert_eq!(lines[3], "o=3    v=3    Mulvv    vl=1     vr=2    ");
    assert_eq!(lines[4].trim_end(), "o=4    v=     End");
    assert_eq!(listing, tape.to_string());
}

#[test]
fn parameters_are_shown_by_value_and_cut_to_width() {
    let tape = record(&[1.0_f64], |x| vec![x[0] * 0.123456 - 2.0]).unwrap();
    let listing = tape.listing();
    assert!(listing.contains("Mulpv    pl=0.12* vr=1"), "{}", listing);
    assert!(listing.contains("Subvp    vl=2     pr=2"), "{}", listing);
}

#[test]
fn sums_and_skips_list_their_operands() {
    let tape = record(&[1.0_f64, 2.0, 3.0], |x| {
        let s = Ad::sum(&[x[0], x[1]], &[x[2]]).unwrap();
        let y = Ad::cond_branch(CompareOp::Lt, s, Ad::constant(0.0), || Ok(s.exp()), || Ok(s.cos()))
            .unwrap();
        vec![y]
    })
    .unwrap();
    let listing = tape.listing();
    assert!(listing.contains(" pr=0     +v=1     +v=2     -v=3"), "{}", listing);
    assert!(listing.contains("CSkipLt  vl=4     pr=0     ot=7     of=6"), "{}", listing);
    assert!(listing.contains("CExp Lt  vl=4     pr=0     vt=5     vf=7"), "{}", listing);
}

#[test]
fn print_runs_where_the_position_is_not_positive() {
    let tape = record(&[1.0_f64], |x| {
        Ad::print_for(x[0], "x = ", x[0] * 2.0, ";").unwrap();
        vec![x[0].exp()]
    })
    .unwrap();
    assert!(tape.listing().contains("Pri"));

    let mut ws = tape.new_workspace();
    tape.forward(0, &[1.0], &mut ws).unwrap();
    assert!(ws.print_log().is_empty());
    tape.forward(0, &[-1.5], &mut ws).unwrap();
    assert_eq!(ws.print_log(), &["x = -3;".to_string()]);
    tape.forward(1, &[1.0], &mut ws).unwrap();
    assert_eq!(ws.print_log().len(), 1);
    tape.forward(0, &[0.5], &mut ws).unwrap();
    assert!(ws.print_log().is_empty());
}

#[test]
fn print_needs_a_recording() {
    assert_eq!(
        Ad::print_for(Ad::constant(0.0_f64), "a", Ad::constant(1.0), "b").unwrap_err(),
        TapeError::NotRecording
    );
}
