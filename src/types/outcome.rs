//! Three-valued task outcomes.
//!
//! A finished task is `Ok`, `Err`, or `Cancelled`. Cancellation is kept
//! separate from ordinary failure so callers can tell "it broke" apart from
//! "someone asked it to stop"; [`Outcome::into_result`] folds the two
//! together when a plain `Result` is more convenient.

use crate::error::Error;
use crate::types::CancelReason;
use core::fmt;

/// The outcome of a completed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The task finished with a value.
    Ok(T),
    /// The task failed with an error (including caught panics).
    Err(Error),
    /// The task was cancelled.
    Cancelled(CancelReason),
}

impl<T> Outcome<T> {
    /// Returns true if the task finished with a value.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Returns true if the task failed.
    #[must_use]
    pub const fn is_err(&self) -> bool {
        matches!(self, Self::Err(_))
    }

    /// Returns true if the task was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns the success value, discarding failure detail.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(v) => Some(v),
            _ => None,
        }
    }

    /// Converts to a `Result`, turning cancellation into the cancellation
    /// condition so it keeps propagating when the caller uses `?`.
    pub fn into_result(self) -> Result<T, Error> {
        match self {
            Self::Ok(v) => Ok(v),
            Self::Err(e) => Err(e),
            Self::Cancelled(reason) => Err(Error::cancelled(reason)),
        }
    }

    /// Maps the success value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Ok(v) => Outcome::Ok(f(v)),
            Self::Err(e) => Outcome::Err(e),
            Self::Cancelled(reason) => Outcome::Cancelled(reason),
        }
    }

    /// Returns the success value or panics.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is not `Ok`.
    #[track_caller]
    pub fn unwrap(self) -> T {
        match self {
            Self::Ok(v) => v,
            Self::Err(e) => panic!("called `Outcome::unwrap()` on a failed task: {e}"),
            Self::Cancelled(reason) => {
                panic!("called `Outcome::unwrap()` on a cancelled task: {reason}")
            }
        }
    }
}

impl<T> From<Result<T, Error>> for Outcome<T> {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(v) => Self::Ok(v),
            Err(Error::Cancelled(reason)) => Self::Cancelled(reason),
            Err(e) => Self::Err(e),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(v) => write!(f, "ok: {v}"),
            Self::Err(e) => write!(f, "error: {e}"),
            Self::Cancelled(reason) => write!(f, "cancelled: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CancelKind;

    #[test]
    fn from_result_separates_cancellation() {
        let ok: Outcome<i32> = Ok(1).into();
        assert!(ok.is_ok());

        let cancelled: Outcome<i32> = Err(Error::cancelled(CancelReason::timeout())).into();
        assert!(cancelled.is_cancelled());

        let failed: Outcome<i32> = Err(Error::app("boom")).into();
        assert!(failed.is_err());
    }

    #[test]
    fn into_result_round_trips_cancellation() {
        let outcome: Outcome<i32> = Outcome::Cancelled(CancelReason::shutdown());
        let err = outcome.into_result().unwrap_err();
        assert_eq!(err.cancel_reason().map(CancelReason::kind), Some(CancelKind::Shutdown));
    }
}
