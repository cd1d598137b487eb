use std::cell::RefCell;
use std::marker::PhantomData;
use std::thread::LocalKey;

use tracing::debug;

use crate::ad::Ad;
use crate::base::Base;
use crate::error::{Result, TapeError};

use super::recorder::Recorder;
use super::TapeId;

thread_local! {
    static RECORDER_F32: RefCell<Option<Recorder<f32>>> = const { RefCell::new(None) };
    static RECORDER_F64: RefCell<Option<Recorder<f64>>> = const { RefCell::new(None) };
    static RECORDER_AD_F32: RefCell<Option<Recorder<Ad<f32>>>> = const { RefCell::new(None) };
    static RECORDER_AD_F64: RefCell<Option<Recorder<Ad<f64>>>> = const { RefCell::new(None) };
}

/// Trait to select the recording slot for a given base type.
///
/// Implemented for `f32`, `f64`, `Ad<f32>` and `Ad<f64>`, enabling `Ad<B>`
/// (and one level of nesting) over these base types. Each thread has at most
/// one active recording per base type.
pub trait TapeLocal: Base {
    fn recorder_cell() -> &'static LocalKey<RefCell<Option<Recorder<Self>>>>;
}

impl TapeLocal for f32 {
    fn recorder_cell() -> &'static LocalKey<RefCell<Option<Recorder<Self>>>> {
        &RECORDER_F32
    }
}

impl TapeLocal for f64 {
    fn recorder_cell() -> &'static LocalKey<RefCell<Option<Recorder<Self>>>> {
        &RECORDER_F64
    }
}

impl TapeLocal for Ad<f32> {
    fn recorder_cell() -> &'static LocalKey<RefCell<Option<Recorder<Self>>>> {
        &RECORDER_AD_F32
    }
}

impl TapeLocal for Ad<f64> {
    fn recorder_cell() -> &'static LocalKey<RefCell<Option<Recorder<Self>>>> {
        &RECORDER_AD_F64
    }
}

/// Begin recording a new tape on this thread.
pub fn start_recording<B: TapeLocal>() -> Result<TapeId> {
    B::recorder_cell().with(|cell| {
        let mut slot = cell.borrow_mut();
        if let Some(rec) = slot.as_ref() {
            return Err(TapeError::AlreadyRecording(rec.id()));
        }
        let rec = Recorder::begin();
        let id = rec.id();
        *slot = Some(rec);
        Ok(id)
    })
}

/// Detach the active recorder from this thread.
pub fn stop_recording<B: TapeLocal>() -> Result<Recorder<B>> {
    B::recorder_cell()
        .with(|cell| cell.borrow_mut().take())
        .ok_or(TapeError::NotRecording)
}

/// Discard the active recording, if any. Returns whether one was active.
pub fn abort_recording<B: TapeLocal>() -> bool {
    match B::recorder_cell().with(|cell| cell.borrow_mut().take()) {
        Some(rec) => {
            debug!(tape = %rec.id(), num_op = rec.num_op(), "recording aborted");
            true
        }
        None => false,
    }
}

#[inline]
pub fn is_recording<B: TapeLocal>() -> bool {
    current_tape_id::<B>().is_some()
}

/// Identity of the tape currently recording on this thread.
#[inline]
pub fn current_tape_id<B: TapeLocal>() -> Option<TapeId> {
    B::recorder_cell().with(|cell| cell.borrow().as_ref().map(Recorder::id))
}

/// Access the active recorder for the current thread, if any.
///
/// # Panics
///
/// Panics if called re-entrantly from inside `f` for the same base type.
#[inline]
pub fn with_recorder<B: TapeLocal, R>(f: impl FnOnce(Option<&mut Recorder<B>>) -> R) -> R {
    B::recorder_cell().with(|cell| {
        let mut slot = cell.borrow_mut();
        f(slot.as_mut())
    })
}

/// RAII guard over a recording started on this thread.
///
/// Dropping the guard while its tape is still recording (an error path or
/// a panic inside the recorded function) discards the recording, so the
/// thread can record again.
pub struct RecordingGuard<B: TapeLocal> {
    id: TapeId,
    _base: PhantomData<*const B>,
}

impl<B: TapeLocal> RecordingGuard<B> {
    pub fn start() -> Result<Self> {
        let id = start_recording::<B>()?;
        Ok(RecordingGuard {
            id,
            _base: PhantomData,
        })
    }

    #[inline]
    pub fn id(&self) -> TapeId {
        self.id
    }
}

impl<B: TapeLocal> Drop for RecordingGuard<B> {
    fn drop(&mut self) {
        if current_tape_id::<B>() == Some(self.id) {
            abort_recording::<B>();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_start_is_rejected() {
        let id = start_recording::<f32>().unwrap();
        assert_eq!(
            start_recording::<f32>().unwrap_err(),
            TapeError::AlreadyRecording(id)
        );
        assert_eq!(current_tape_id::<f32>(), Some(id));
        assert!(abort_recording::<f32>());
        assert!(!is_recording::<f32>());
    }

    #[test]
    fn guard_discards_unfinished_recording() {
        {
            let guard = RecordingGuard::<f64>::start().unwrap();
            assert_eq!(current_tape_id::<f64>(), Some(guard.id()));
        }
        assert!(!is_recording::<f64>());
        assert!(matches!(
            stop_recording::<f64>(),
            Err(TapeError::NotRecording)
        ));
    }

    #[test]
    fn base_types_record_independently() {
        let outer = start_recording::<f64>().unwrap();
        let inner = start_recording::<Ad<f64>>().unwrap();
        assert_ne!(outer, inner);
        assert!(abort_recording::<Ad<f64>>());
        assert_eq!(current_tape_id::<f64>(), Some(outer));
        assert!(abort_recording::<f64>());
    }
}
