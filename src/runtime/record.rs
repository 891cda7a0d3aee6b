//! Task records: the loop-side state of every task.
//!
//! A record tracks the task's lifecycle state, its cancellation request, the
//! tasks waiting on its completion, and (until terminal) its stored
//! continuation. The user-facing view of a record is a
//! [`TaskHandle`](crate::task::TaskHandle).

use crate::error::Error;
use crate::runtime::stored::StoredTask;
use crate::types::{CancelReason, TaskId};
use smallvec::SmallVec;

/// The lifecycle state of a task.
///
/// ```text
/// Created -> Scheduled -> Running -> Suspended -> Scheduled -> ...
///                              \-> Done | Failed | Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Record exists but is not yet on the ready queue.
    Created,
    /// On the ready queue, waiting to be resumed.
    Scheduled,
    /// Currently being resumed by the loop.
    Running,
    /// Parked on a promise, deadline, primitive or another task.
    Suspended,
    /// Finished with a value.
    Done,
    /// Finished with an error.
    Failed,
    /// Finished by accepting the cancellation condition.
    Cancelled,
}

impl TaskState {
    /// Returns true for the three terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

/// How a task finished. Mirrors the terminal [`TaskState`] and carries the
/// failure detail; the success value lives in the handle's typed slot.
#[derive(Debug, Clone)]
pub(crate) enum Completion {
    Done,
    Failed(Error),
    Cancelled(CancelReason),
}

impl Completion {
    /// Classifies a continuation's result: a cancellation error becomes the
    /// `Cancelled` completion, any other error `Failed`.
    pub(crate) fn from_error(error: Error) -> Self {
        match error {
            Error::Cancelled(reason) => Self::Cancelled(reason),
            other => Self::Failed(other),
        }
    }

    pub(crate) const fn state(&self) -> TaskState {
        match self {
            Self::Done => TaskState::Done,
            Self::Failed(_) => TaskState::Failed,
            Self::Cancelled(_) => TaskState::Cancelled,
        }
    }
}

/// Loop-side record for one task.
#[derive(Debug)]
pub(crate) struct TaskRecord {
    pub(crate) id: TaskId,
    pub(crate) state: TaskState,
    /// The stored continuation; taken while polling, dropped at completion.
    pub(crate) future: Option<StoredTask>,
    /// Pending cancellation request, if any. Survives delivery so suppression
    /// stays observable through the handle.
    pub(crate) cancel: Option<CancelReason>,
    /// Set once the cancellation condition has been raised inside the task.
    pub(crate) cancel_delivered: bool,
    /// Tasks to re-admit to the ready queue when this one completes, in
    /// registration order.
    pub(crate) waiters: SmallVec<[TaskId; 4]>,
    /// How the task finished; `None` while live.
    pub(crate) completion: Option<Completion>,
    /// True once the owning handle has been dropped.
    pub(crate) handle_dropped: bool,
    /// True once some joiner consumed the completion (or the failure was
    /// reported through the diagnostic hook).
    pub(crate) observed: bool,
}

impl TaskRecord {
    pub(crate) fn new(id: TaskId) -> Self {
        Self {
            id,
            state: TaskState::Created,
            future: None,
            cancel: None,
            cancel_delivered: false,
            waiters: SmallVec::new(),
            completion: None,
            handle_dropped: false,
            observed: false,
        }
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Registers or strengthens a cancellation request.
    ///
    /// Returns `true` if this was a new request. Terminal tasks ignore it,
    /// which is what makes `cancel` idempotent.
    pub(crate) fn request_cancel(&mut self, reason: CancelReason) -> bool {
        if self.is_terminal() {
            return false;
        }
        match &mut self.cancel {
            Some(existing) => {
                existing.strengthen(&reason);
                false
            }
            slot @ None => {
                *slot = Some(reason);
                true
            }
        }
    }

    /// Returns the cancellation condition to deliver, at most once.
    pub(crate) fn take_cancel_delivery(&mut self) -> Option<CancelReason> {
        if self.cancel_delivered || self.is_terminal() {
            return None;
        }
        let reason = self.cancel.clone()?;
        self.cancel_delivered = true;
        Some(reason)
    }

    /// Moves the record to a terminal state, returning the waiters to wake.
    ///
    /// Returns `None` if the task was already terminal.
    pub(crate) fn complete(&mut self, completion: Completion) -> Option<SmallVec<[TaskId; 4]>> {
        if self.is_terminal() {
            return None;
        }
        self.state = completion.state();
        self.completion = Some(completion);
        self.future = None;
        Some(std::mem::take(&mut self.waiters))
    }

    /// Adds a waiter for this task's completion, keeping registration order.
    pub(crate) fn add_waiter(&mut self, waiter: TaskId) {
        if !self.waiters.contains(&waiter) {
            self.waiters.push(waiter);
        }
    }

    /// Removes a waiter (used when the waiting future is dropped).
    pub(crate) fn remove_waiter(&mut self, waiter: TaskId) {
        self.waiters.retain(|w| *w != waiter);
    }

    /// Returns true once nothing can ever observe this record again.
    pub(crate) fn is_prunable(&self) -> bool {
        let unreported_failure = self.state == TaskState::Failed && !self.observed;
        self.is_terminal() && self.handle_dropped && self.waiters.is_empty() && !unreported_failure
    }
}
