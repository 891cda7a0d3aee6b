//! Core types: identifiers, time, cancellation reasons and task outcomes.

pub mod cancel;
pub mod id;
pub mod outcome;
pub mod time;

pub use cancel::{CancelKind, CancelReason};
pub use id::TaskId;
pub use outcome::Outcome;
pub use time::Time;
