//! The event loop: the single authority deciding which task runs next and
//! how long the process may idle.
//!
//! One turn of the loop: snapshot the clock, move every due deadline onto
//! the ready queue (ascending wake time, FIFO among equals), then resume
//! exactly one ready task until it suspends or finishes. With nothing ready
//! but deadlines pending, the loop idles until the next wake — its only
//! blocking point. With both queues empty the loop is done: either the goal
//! has been reached or the remaining tasks can never be woken.
//!
//! Failures never escape a task: a continuation's `Err` marks it Failed, a
//! caught panic likewise, and the loop carries on.

use crate::clock::{Clock, MonotonicClock};
use crate::cx::Cx;
use crate::error::Error;
use crate::runtime::core::{Core, SharedCore};
use crate::runtime::record::Completion;
use crate::tracing_compat::{debug, warn};
use crate::types::{CancelReason, TaskId, Time};
use crate::task::{spawn_with, TaskHandle};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

/// A single-threaded cooperative event loop.
///
/// Tasks spawned onto the loop make interleaved, never simultaneous,
/// progress: all code between two suspension points runs atomically with
/// respect to every other task. The loop is the exclusive owner of all
/// scheduling state; handles (`Cx`, [`TaskHandle`], promises, primitives)
/// talk to it through a shared reference.
pub struct EventLoop {
    core: SharedCore,
    clock: Rc<dyn Clock>,
}

impl EventLoop {
    /// Creates a loop driven by wall-clock time.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Rc::new(MonotonicClock::new()))
    }

    /// Creates a loop driven by the given clock.
    ///
    /// Pass a [`VirtualClock`](crate::clock::VirtualClock) to make timer
    /// behavior deterministic and instantaneous in tests.
    #[must_use]
    pub fn with_clock(clock: Rc<dyn Clock>) -> Self {
        Self {
            core: Core::new_shared(),
            clock,
        }
    }

    /// Creates a task from a continuation and schedules it.
    ///
    /// Usable before `run` to set up initial tasks; inside tasks prefer
    /// [`Cx::spawn`]. The task does not execute until the loop runs.
    pub fn spawn<F, Fut, T>(&self, f: F) -> TaskHandle<T>
    where
        F: FnOnce(Cx) -> Fut + 'static,
        Fut: Future<Output = Result<T, Error>> + 'static,
        T: 'static,
    {
        spawn_with(&self.core, f)
    }

    /// Creates a fresh, unresolved [`Promise`](crate::promise::Promise).
    ///
    /// Useful for wiring an external completion source before the loop
    /// runs; inside tasks prefer [`Cx::promise`].
    #[must_use]
    pub fn promise<T: Clone>(&self) -> crate::promise::Promise<T> {
        crate::promise::Promise::new(&self.core)
    }

    /// Installs a diagnostic hook for failures nobody observed.
    ///
    /// The hook fires for tasks that finished `Failed` while no handle or
    /// joiner ever consumed the outcome — once per task, during the run in
    /// which the failure became unobservable or at loop shutdown.
    pub fn on_unobserved_failure<F>(&self, hook: F)
    where
        F: FnMut(TaskId, &Error) + 'static,
    {
        self.core.borrow_mut().set_hook(Box::new(hook));
    }

    /// Runs the loop until the entry task is terminal and returns its
    /// result.
    ///
    /// Any other tasks still live when the entry task finishes are
    /// cancelled (reason `Shutdown`) and drained before this returns.
    ///
    /// # Errors
    ///
    /// - the entry task's own failure or cancellation, re-raised;
    /// - [`Error::ReentrantRun`] if the loop is already running;
    /// - [`Error::Stalled`] if every task is suspended and no wake-up is
    ///   pending. The stuck tasks are left untouched — the loop does not
    ///   diagnose deadlocks, it only reports that it ran out of work.
    pub fn run<F, Fut, T>(&self, entry: F) -> Result<T, Error>
    where
        F: FnOnce(Cx) -> Fut + 'static,
        Fut: Future<Output = Result<T, Error>> + 'static,
        T: 'static,
    {
        {
            let mut core = self.core.borrow_mut();
            if core.running {
                return Err(Error::ReentrantRun);
            }
            core.running = true;
        }
        let _guard = RunGuard {
            core: self.core.clone(),
        };

        let handle = self.spawn(entry);
        let entry_id = handle.id();
        debug!(entry = %entry_id, "event loop starting");

        let stalled = self.drive(|core| {
            core.task_state(entry_id)
                .map_or(true, |state| state.is_terminal())
        });
        if stalled {
            let suspended = self.core.borrow().live_task_count();
            warn!(suspended, "event loop stalled");
            return Err(Error::Stalled { suspended });
        }

        self.shutdown_leftovers();

        self.core.borrow_mut().sweep_unobserved();
        self.flush_hook();

        debug!(entry = %entry_id, "event loop finished");
        handle
            .try_outcome()
            .map_or(Err(Error::OutcomeConsumed), crate::types::Outcome::into_result)
    }

    /// Cancels and drains every task that outlived the entry task.
    fn shutdown_leftovers(&self) {
        let leftovers: Vec<TaskId> = {
            let core = self.core.borrow();
            core.live_task_ids()
        };
        if leftovers.is_empty() {
            return;
        }
        debug!(count = leftovers.len(), "cancelling leftover tasks at shutdown");
        {
            let mut core = self.core.borrow_mut();
            for id in &leftovers {
                core.cancel(*id, CancelReason::shutdown());
            }
        }
        // A task that suppresses shutdown cancellation and parks again would
        // stall this drain; in that case the loop gives up on it.
        let _ = self.drive(|core| core.live_task_count() == 0);
    }

    /// Turns the loop until `done` holds. Returns true if the loop drained
    /// (no ready tasks, no deadlines) before the goal was reached.
    fn drive(&self, done: impl Fn(&Core) -> bool) -> bool {
        loop {
            self.flush_hook();
            if done(&self.core.borrow()) {
                return false;
            }
            match self.turn() {
                Turn::Worked => {}
                Turn::Idle(wake) => self.clock.idle_until(wake),
                Turn::Drained => return true,
            }
        }
    }

    /// One loop turn: expire deadlines, then resume at most one task.
    fn turn(&self) -> Turn {
        let (id, mut stored) = {
            let mut core = self.core.borrow_mut();
            core.now = self.clock.now();
            core.expire_due();

            let Some(id) = core.pop_runnable() else {
                return match core.next_wake() {
                    Some(wake) => Turn::Idle(wake),
                    None => Turn::Drained,
                };
            };
            let Some(stored) = core.begin_poll(id) else {
                return Turn::Worked;
            };
            (id, stored)
        };

        // The core borrow is released while the continuation runs: the task
        // re-enters the core through its own Cx for every operation.
        let waker = noop_waker();
        let mut poll_cx = Context::from_waker(&waker);
        let polled = catch_unwind(AssertUnwindSafe(|| stored.poll(&mut poll_cx)));

        let mut core = self.core.borrow_mut();
        match polled {
            Ok(Poll::Pending) => core.finish_poll_pending(id, stored),
            Ok(Poll::Ready(completion)) => core.finish_poll_complete(id, completion),
            Err(payload) => {
                let message = panic_message(&*payload);
                warn!(task = %id, %message, "task panicked");
                core.finish_poll_complete(id, Completion::Failed(Error::Panicked(message)));
            }
        }
        Turn::Worked
    }

    /// Delivers queued unobserved-failure events outside any core borrow,
    /// so the hook may call back into the runtime.
    fn flush_hook(&self) {
        let Some((mut hook, events)) = self.core.borrow_mut().take_hook_work() else {
            return;
        };
        for (id, error) in &events {
            hook(*id, error);
        }
        self.core.borrow_mut().restore_hook(hook);
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        // Stored continuations hold Cx clones and thus an Rc back to the
        // core; taking them out before the core goes away breaks the cycle
        // and lets their destructors unregister cleanly.
        let futures = match self.core.try_borrow_mut() {
            Ok(mut core) => core.take_all_futures(),
            Err(_) => Vec::new(),
        };
        drop(futures);
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("core", &self.core.borrow())
            .finish_non_exhaustive()
    }
}

enum Turn {
    /// A task was resumed (or a stale queue entry skipped).
    Worked,
    /// Nothing ready; the next deadline is at the given instant.
    Idle(Time),
    /// Nothing ready and nothing timed.
    Drained,
}

/// Clears the re-entrancy flag when `run` exits by any path.
struct RunGuard {
    core: SharedCore,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Ok(mut core) = self.core.try_borrow_mut() {
            core.running = false;
        }
    }
}

struct NoopWaker;

impl Wake for NoopWaker {
    fn wake(self: Arc<Self>) {}
}

/// The loop tracks readiness in its own queues; the `Waker` handed to
/// continuations is inert.
fn noop_waker() -> Waker {
    Waker::from(Arc::new(NoopWaker))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic payload of unknown type".to_string()
    }
}
