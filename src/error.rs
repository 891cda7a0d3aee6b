//! Error types for the runtime.
//!
//! Failures fall into four groups:
//!
//! - **Ordinary failure**: an error produced inside a task's continuation,
//!   propagated through the task's outcome to whoever joins it.
//! - **Cancellation**: the distinguished condition delivered at a suspension
//!   point after a cancel request; carries a [`CancelReason`].
//! - **Timeout**: raised by [`wait_for`](crate::combinator::wait_for) when
//!   the deadline wins the race; the losing task sees a cancellation with
//!   reason `Timeout`.
//! - **Usage errors**: misuse of the API (re-entrant `run`, releasing a lock
//!   you do not hold, resolving a promise twice, joining twice). These are
//!   returned synchronously to the caller, never deferred into an outcome.

use crate::types::CancelReason;
use std::time::Duration;

/// The error type used throughout the runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// An application-level failure raised inside a continuation.
    #[error("task failed: {0}")]
    App(String),

    /// The cancellation condition.
    ///
    /// Cleanup code may catch this to release resources, but should re-raise
    /// it (propagate the `Err`) so the task reaches the `Cancelled` state.
    #[error("cancelled: {0}")]
    Cancelled(CancelReason),

    /// A `wait_for` deadline fired before the awaited task completed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// A panic escaped a task's continuation.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// `run` was called on an event loop that is already running.
    #[error("event loop is already running")]
    ReentrantRun,

    /// The loop ran out of wake sources while tasks were still suspended.
    ///
    /// This is not deadlock detection: the loop merely observed that the
    /// ready and deadline queues are empty and nothing can ever wake the
    /// remaining tasks. They are left untouched in the `Suspended` state.
    #[error("event loop stalled: {suspended} tasks suspended with no pending wake-ups")]
    Stalled {
        /// Number of live tasks left suspended.
        suspended: usize,
    },

    /// `release` was called by a task that does not hold the lock.
    #[error("lock released by a task that does not hold it")]
    NotHolder,

    /// A promise was resolved or failed more than once.
    #[error("promise already settled")]
    AlreadySettled,

    /// A task's success value was already consumed by an earlier join.
    #[error("task outcome already consumed")]
    OutcomeConsumed,
}

impl Error {
    /// Creates an application failure from a message.
    #[must_use]
    pub fn app(message: impl Into<String>) -> Self {
        Self::App(message.into())
    }

    /// Creates the cancellation condition for the given reason.
    #[must_use]
    pub const fn cancelled(reason: CancelReason) -> Self {
        Self::Cancelled(reason)
    }

    /// Returns true if this error is the cancellation condition.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns true if this error is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns the cancellation reason, if this error carries one.
    #[must_use]
    pub const fn cancel_reason(&self) -> Option<&CancelReason> {
        match self {
            Self::Cancelled(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Convenience alias for results produced by continuations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
