use crate::ad::Ad;
use crate::error::{Result, TapeError};
use crate::tape::{
    abort_recording, start_recording, stop_recording, with_recorder, Operand, RecordingGuard,
    Tape, TapeLocal,
};

/// Start recording on this thread and declare the independent variables.
///
/// Fails with [`TapeError::AlreadyRecording`] if a recording for `B` is
/// already active on this thread.
pub fn independent<B: TapeLocal>(x: &[B]) -> Result<Vec<Ad<B>>> {
    start_recording::<B>()?;
    Ok(declare(x))
}

/// Like [`independent`], also declaring dynamic parameters whose values can
/// be re-bound on the finished tape with [`Tape::set_dynamic`].
pub fn independent_dynamic<B: TapeLocal>(x: &[B], dynamic: &[B]) -> Result<(Vec<Ad<B>>, Vec<Ad<B>>)> {
    start_recording::<B>()?;
    let vars = declare(x);
    Ok((vars, declare_dynamic(dynamic)))
}

fn declare<B: TapeLocal>(x: &[B]) -> Vec<Ad<B>> {
    with_recorder::<B, _>(|rec| match rec {
        Some(rec) => x
            .iter()
            .map(|&v| Ad::variable(v, rec.id(), rec.new_independent()))
            .collect(),
        None => Vec::new(),
    })
}

fn declare_dynamic<B: TapeLocal>(p: &[B]) -> Vec<Ad<B>> {
    with_recorder::<B, _>(|rec| match rec {
        Some(rec) => p
            .iter()
            .map(|&v| Ad::dynamic(v, rec.id(), rec.put_dyn_par(v)))
            .collect(),
        None => Vec::new(),
    })
}

/// Stop recording and freeze the tape with `dependents` as its results.
///
/// A dependent from another tape leaves the recording active so the caller
/// can retry or [`abort`].
pub fn finish<B: TapeLocal>(dependents: &[Ad<B>]) -> Result<Tape<B>> {
    Ad::common_tape(dependents)?;
    let operands = with_recorder::<B, _>(|rec| {
        let Some(rec) = rec else {
            return Err(TapeError::NotRecording);
        };
        let current = Some(rec.id());
        dependents
            .iter()
            .map(|d| d.operand(current))
            .collect::<Result<Vec<Operand<B>>>>()
    })?;
    let rec = stop_recording::<B>()?;
    Ok(rec.end(&operands))
}

/// Discard the active recording. Returns whether one was active.
pub fn abort<B: TapeLocal>() -> bool {
    abort_recording::<B>()
}

/// Record `f` at `x` into a [`Tape`].
///
/// The recording is discarded if `f` panics or returns values that cannot
/// be dependents of the tape.
///
/// ```
/// use adtape::{record, Base};
///
/// let tape = record(&[3.0_f64, 4.0], |x| vec![x[0] * x[0] + x[1].sin()]).unwrap();
/// let g = tape.gradient(&[1.0, 0.0]).unwrap();
/// assert!((g[0] - 2.0).abs() < 1e-12);
/// assert!((g[1] - 1.0).abs() < 1e-12);
/// ```
pub fn record<B: TapeLocal>(
    x: &[B],
    f: impl FnOnce(&[Ad<B>]) -> Vec<Ad<B>>,
) -> Result<Tape<B>> {
    let _guard = RecordingGuard::<B>::start()?;
    let inputs = declare(x);
    let outputs = f(&inputs);
    finish(&outputs)
}

/// Like [`record`] with dynamic parameters `p`.
pub fn record_dynamic<B: TapeLocal>(
    x: &[B],
    p: &[B],
    f: impl FnOnce(&[Ad<B>], &[Ad<B>]) -> Vec<Ad<B>>,
) -> Result<Tape<B>> {
    let _guard = RecordingGuard::<B>::start()?;
    let inputs = declare(x);
    let pars = declare_dynamic(p);
    let outputs = f(&inputs, &pars);
    finish(&outputs)
}
