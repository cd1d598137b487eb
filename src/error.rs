//! Usage errors reported by recording and replay.
//!
//! Integrity faults (a corrupted instruction stream, an unknown atomic
//! handle, an out-of-range operand) are not represented here: they panic.

use thiserror::Error;

use crate::tape::TapeId;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, TapeError>;

/// A caller mistake detected at the point of occurrence.
///
/// None of these leave a partially appended instruction behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TapeError {
    #[error("operands belong to different tapes ({left} and {right})")]
    TapeMismatch { left: TapeId, right: TapeId },

    #[error("operand belongs to tape {operand} but this thread is recording {current}")]
    ForeignOperand { operand: TapeId, current: TapeId },

    #[error("operand belongs to tape {operand} but this thread is not recording")]
    StaleOperand { operand: TapeId },

    #[error("{op}: dynamic parameter used where a variable is required")]
    DynamicOperand { op: &'static str },

    #[error("this thread is already recording tape {0}")]
    AlreadyRecording(TapeId),

    #[error("no tape is recording on this thread")]
    NotRecording,

    #[error("expected {expected} {what}, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("order {requested} requested but the workspace only holds orders below {available}")]
    OrderNotAvailable { requested: usize, available: usize },

    #[error("workspace was created for tape {workspace}, not tape {tape}")]
    WorkspaceMismatch { workspace: TapeId, tape: TapeId },

    #[error("index {index} out of range for vector of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("index is negative or not finite for vector of length {len}")]
    InvalidIndex { len: usize },
}
