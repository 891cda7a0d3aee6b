//! Racing a task against a deadline.

use crate::cx::Cx;
use crate::error::Error;
use crate::runtime::deadline::TimerKey;
use crate::task::{resolve_completion, ChildRef, TaskHandle};
use crate::types::{CancelReason, Time};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Awaits `handle` for at most `timeout`.
///
/// If the task completes first, its result is returned and the task ends in
/// its natural terminal state. If the deadline fires first, the task
/// receives a cancellation request with reason `Timeout` and the caller gets
/// [`Error::Timeout`] right away. Exactly one of the two happens; a task
/// completing on the very deadline instant counts as completed.
pub fn wait_for<T>(cx: &Cx, handle: &TaskHandle<T>, timeout: Duration) -> WaitFor<T> {
    WaitFor {
        cx: cx.clone(),
        target: handle.child_ref(),
        timeout,
        deadline: cx.now() + timeout,
        key: None,
        registered: false,
        done: false,
    }
}

/// Future returned by [`wait_for`].
#[derive(Debug)]
pub struct WaitFor<T> {
    cx: Cx,
    target: ChildRef<T>,
    timeout: Duration,
    deadline: Time,
    key: Option<TimerKey>,
    registered: bool,
    done: bool,
}

impl<T> Future for WaitFor<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, _ctx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let me = this.cx.task();
        let mut core = this.cx.core().borrow_mut();

        if let Err(e) = core.checkpoint(me) {
            if let Some(key) = this.key.take() {
                core.cancel_deadline(key);
            }
            if this.registered {
                core.remove_task_waiter(this.target.id, me);
                this.registered = false;
            }
            this.done = true;
            return Poll::Ready(Err(e));
        }

        // Completion is checked before the deadline so ties favor the task.
        let completion = core
            .record(this.target.id)
            .and_then(|rec| rec.completion.clone());
        if let Some(completion) = completion {
            if let Some(key) = this.key.take() {
                core.cancel_deadline(key);
            }
            core.observe(this.target.id);
            this.registered = false;
            this.done = true;
            return Poll::Ready(resolve_completion(&completion, &this.target.value).into_result());
        }

        if core.now >= this.deadline {
            core.cancel(this.target.id, CancelReason::timeout());
            if this.registered {
                core.remove_task_waiter(this.target.id, me);
                this.registered = false;
            }
            if let Some(key) = this.key.take() {
                core.cancel_deadline(key);
            }
            this.done = true;
            return Poll::Ready(Err(Error::Timeout(this.timeout)));
        }

        if !this.registered {
            core.add_task_waiter(this.target.id, me);
            this.key = Some(core.insert_deadline(this.deadline, me));
            this.registered = true;
        }
        Poll::Pending
    }
}

impl<T> Drop for WaitFor<T> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Ok(mut core) = self.cx.core().try_borrow_mut() {
            if let Some(key) = self.key.take() {
                core.cancel_deadline(key);
            }
            if self.registered {
                core.remove_task_waiter(self.target.id, self.cx.task());
            }
        }
    }
}
