#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod runtime;
pub mod sequence;
pub mod time;

pub use error::Error;
pub use runtime::{RuntimeSnapshot, SessionPhase, SessionRuntime, SessionStateError, SessionTimers};
pub use sequence::{ItemRange, QuestionSequence, QuestionSlot, SequenceItem};
pub use time::{Clock, DeltaTimer};
