//! Task context.
//!
//! A `Cx` is a task's capability to talk to its event loop: spawn siblings,
//! sleep, yield, create promises, observe time, and poll for cancellation.
//! Continuations receive their `Cx` as the argument of the closure passed to
//! `spawn`/`run`, and thread it explicitly into anything that suspends —
//! there is no ambient/thread-local context.

use crate::error::Error;
use crate::promise::Promise;
use crate::runtime::core::SharedCore;
use crate::task::{spawn_with, TaskHandle};
use crate::time::{Sleep, YieldNow};
use crate::types::{TaskId, Time};
use std::future::Future;
use std::time::Duration;

/// A task's handle to the runtime it lives on.
#[derive(Clone)]
pub struct Cx {
    core: SharedCore,
    task: TaskId,
}

impl Cx {
    pub(crate) fn new(core: SharedCore, task: TaskId) -> Self {
        Self { core, task }
    }

    pub(crate) fn core(&self) -> &SharedCore {
        &self.core
    }

    /// Returns the id of the task this context belongs to.
    #[must_use]
    pub fn task(&self) -> TaskId {
        self.task
    }

    /// Returns the loop's current instant.
    ///
    /// Time is sampled once per loop turn, so repeated calls between two
    /// suspension points return the same value.
    #[must_use]
    pub fn now(&self) -> Time {
        self.core.borrow().now
    }

    /// Creates a new task from a continuation and schedules it.
    ///
    /// The task is enqueued behind everything already ready; it does not run
    /// until the current task suspends. The returned handle observes the
    /// outcome but does not own the task.
    pub fn spawn<F, Fut, T>(&self, f: F) -> TaskHandle<T>
    where
        F: FnOnce(Cx) -> Fut + 'static,
        Fut: Future<Output = Result<T, Error>> + 'static,
        T: 'static,
    {
        spawn_with(&self.core, f)
    }

    /// Suspends the current task until `duration` has elapsed.
    pub fn sleep(&self, duration: Duration) -> Sleep {
        let deadline = self.now() + duration;
        Sleep::new(self.clone(), deadline)
    }

    /// Suspends once, re-admitting the task at the back of the ready queue.
    ///
    /// Lets sibling tasks run between two stretches of computation; also a
    /// cancellation point.
    pub fn yield_now(&self) -> YieldNow {
        YieldNow::new(self.clone())
    }

    /// Creates a fresh, unresolved [`Promise`].
    #[must_use]
    pub fn promise<T: Clone>(&self) -> Promise<T> {
        Promise::new(&self.core)
    }

    /// Delivers the cancellation condition if one is pending for this task.
    ///
    /// Every runtime suspension point already checks this; long stretches of
    /// computation can call it directly to stay responsive to `cancel`.
    ///
    /// # Errors
    ///
    /// Returns the cancellation condition exactly once after a cancel
    /// request.
    pub fn checkpoint(&self) -> Result<(), Error> {
        self.core.borrow_mut().checkpoint(self.task)
    }

    /// Requests cancellation of another task by id.
    ///
    /// Prefer [`TaskHandle::cancel`] when a handle is available; this exists
    /// for code that only kept an id.
    pub fn cancel(&self, task: TaskId) -> bool {
        self.core
            .borrow_mut()
            .cancel(task, crate::types::CancelReason::default())
    }
}

impl std::fmt::Debug for Cx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cx").field("task", &self.task).finish_non_exhaustive()
    }
}
