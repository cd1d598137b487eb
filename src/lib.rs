//! Operator-recording algorithmic differentiation.
//!
//! Computations on [`Ad<B>`] values are recorded onto a per-thread tape.
//! The finished [`Tape`] replays forward (Taylor coefficients of any order)
//! and reverse (adjoints of the dependents) without re-running user code.
//!
//! ```
//! use adtape::{independent, finish, Base};
//!
//! let x = independent(&[0.5_f64]).unwrap();
//! let y = x[0].sin() * x[0];
//! let tape = finish(&[y]).unwrap();
//!
//! let mut ws = tape.new_workspace();
//! let y0 = tape.forward(0, &[0.5], &mut ws).unwrap();
//! assert!((y0[0] - 0.5_f64.sin() * 0.5).abs() < 1e-12);
//! ```

pub mod ad;
pub mod api;
pub mod atomic;
pub mod base;
pub mod discrete;
pub mod error;
pub mod opcode;
pub mod tape;
pub mod taylor_ops;
mod traits;
pub mod vec_ad;

pub use ad::Ad;
pub use api::{abort, finish, independent, independent_dynamic, record, record_dynamic};
pub use atomic::{atomic_name, call_atomic, register_atomic, AtomicHandle, AtomicOp};
pub use base::Base;
pub use discrete::{discrete_name, register_discrete, DiscreteHandle};
pub use error::{Result, TapeError};
pub use opcode::{Addr, CompareOp, OpCode};
pub use tape::{Tape, TapeId, TapeLocal, Workspace};
pub use vec_ad::VecAd;

/// Recorded values over `f64`.
pub type Ad64 = Ad<f64>;
/// Recorded values over `f32`.
pub type Ad32 = Ad<f32>;
