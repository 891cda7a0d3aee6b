//! Compositions over task handles.
//!
//! - [`gather`]: all children, input-order results, fail-fast with sibling
//!   cancellation.
//! - [`gather_all`]: all children, every outcome collected per position,
//!   never short-circuits.
//! - [`wait_for`]: race a task against a deadline; the loser is cancelled.
//! - [`retry`]: re-run a continuation factory until it succeeds.

mod gather;
mod retry;
mod wait_for;

pub use gather::{gather, gather_all, Gather, GatherAll};
pub use retry::retry;
pub use wait_for::{wait_for, WaitFor};
