//! Task handles and joining.
//!
//! Spawning wraps a user continuation so its typed result lands in a slot
//! shared with the returned [`TaskHandle`], while the loop sees a uniform
//! type-erased future. The handle is a non-owning observer: the loop owns
//! the task until it is terminal, the handle can only watch, join and
//! request cancellation.

use crate::cx::Cx;
use crate::error::Error;
use crate::runtime::core::SharedCore;
use crate::runtime::record::Completion;
use crate::runtime::stored::StoredTask;
use crate::runtime::TaskState;
use crate::types::{CancelReason, Outcome, TaskId};
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// Slot shared between a task's wrapper future and its handle.
type ValueSlot<T> = Rc<RefCell<Option<T>>>;

/// Creates a task from a continuation: record, wrapper future, handle.
pub(crate) fn spawn_with<F, Fut, T>(core: &SharedCore, f: F) -> TaskHandle<T>
where
    F: FnOnce(Cx) -> Fut + 'static,
    Fut: Future<Output = Result<T, Error>> + 'static,
    T: 'static,
{
    let id = core.borrow_mut().create_task();
    let value: ValueSlot<T> = Rc::new(RefCell::new(None));

    let cx = Cx::new(core.clone(), id);
    let slot = value.clone();
    let wrapped = async move {
        match f(cx).await {
            Ok(v) => {
                *slot.borrow_mut() = Some(v);
                Completion::Done
            }
            Err(e) => Completion::from_error(e),
        }
    };
    core.borrow_mut().attach_future(id, StoredTask::new(wrapped, id));

    TaskHandle {
        core: core.clone(),
        id,
        value,
    }
}

/// A non-owning observer of one task.
///
/// Dropping the handle does not cancel the task; it keeps running to
/// completion (a dropped handle merely means nobody will consume the
/// outcome, which for failures is what the loop's diagnostic hook reports).
#[derive(Debug)]
pub struct TaskHandle<T> {
    core: SharedCore,
    id: TaskId,
    value: ValueSlot<T>,
}

impl<T> TaskHandle<T> {
    /// Returns the task's id.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the task's current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.core
            .borrow()
            .task_state(self.id)
            .expect("task record outlives its handle")
    }

    /// Returns true once the task reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Returns true if cancellation has been requested, whether or not the
    /// task has observed it yet. Stays true even when the task suppresses
    /// the condition and finishes `Done`.
    #[must_use]
    pub fn cancel_requested(&self) -> bool {
        self.core
            .borrow()
            .record(self.id)
            .is_some_and(|rec| rec.cancel.is_some())
    }

    /// Requests cooperative cancellation; idempotent.
    ///
    /// Returns `true` if this was the first request. The condition is
    /// delivered at the task's next suspension point; a task parked on a
    /// deadline or waiter list is rescheduled immediately to receive it.
    pub fn cancel(&self) -> bool {
        self.cancel_with(CancelReason::default())
    }

    /// Requests cancellation with an explicit reason.
    pub fn cancel_with(&self, reason: CancelReason) -> bool {
        self.core.borrow_mut().cancel(self.id, reason)
    }

    /// Suspends the calling task until this task completes, yielding its
    /// outcome.
    ///
    /// The success value is consumed by the first join; later joins see
    /// `Outcome::Err(Error::OutcomeConsumed)`. Joining a cancelled task
    /// yields `Outcome::Cancelled`, which `into_result` turns back into the
    /// cancellation condition.
    pub fn join(&self, cx: &Cx) -> Join<T> {
        Join {
            cx: cx.clone(),
            target: self.id,
            value: self.value.clone(),
            registered: false,
            done: false,
        }
    }

    /// Non-blocking outcome accessor for use outside the loop (for example
    /// after `run` returns). `None` while the task is still live.
    pub fn try_outcome(&self) -> Option<Outcome<T>> {
        let mut core = self.core.borrow_mut();
        let completion = core.record(self.id).and_then(|rec| rec.completion.clone())?;
        let outcome = resolve_completion(&completion, &self.value);
        core.observe(self.id);
        Some(outcome)
    }

    pub(crate) fn child_ref(&self) -> ChildRef<T> {
        ChildRef {
            id: self.id,
            value: self.value.clone(),
        }
    }
}

impl<T> Drop for TaskHandle<T> {
    fn drop(&mut self) {
        if let Ok(mut core) = self.core.try_borrow_mut() {
            core.mark_handle_dropped(self.id);
        }
    }
}

/// Loop-independent reference to a task used by joins and combinators.
#[derive(Debug)]
pub(crate) struct ChildRef<T> {
    pub(crate) id: TaskId,
    pub(crate) value: ValueSlot<T>,
}

impl<T> Clone for ChildRef<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: self.value.clone(),
        }
    }
}

/// Turns a terminal completion plus the typed slot into an outcome.
pub(crate) fn resolve_completion<T>(completion: &Completion, value: &ValueSlot<T>) -> Outcome<T> {
    match completion {
        Completion::Done => match value.borrow_mut().take() {
            Some(v) => Outcome::Ok(v),
            None => Outcome::Err(Error::OutcomeConsumed),
        },
        Completion::Failed(e) => Outcome::Err(e.clone()),
        Completion::Cancelled(reason) => Outcome::Cancelled(reason.clone()),
    }
}

/// Future returned by [`TaskHandle::join`].
#[derive(Debug)]
pub struct Join<T> {
    cx: Cx,
    target: TaskId,
    value: ValueSlot<T>,
    registered: bool,
    done: bool,
}

impl<T> Future for Join<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, _ctx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let me = this.cx.task();
        let mut core = this.cx.core().borrow_mut();

        if let Err(e) = core.checkpoint(me) {
            if this.registered {
                core.remove_task_waiter(this.target, me);
                this.registered = false;
            }
            this.done = true;
            return Poll::Ready(Outcome::from(Err(e)));
        }

        let Some(rec) = core.record(this.target) else {
            // The record was pruned; nothing observable remains.
            this.done = true;
            return Poll::Ready(Outcome::Err(Error::OutcomeConsumed));
        };
        match rec.completion.clone() {
            Some(completion) => {
                let outcome = resolve_completion(&completion, &this.value);
                core.remove_task_waiter(this.target, me);
                core.observe(this.target);
                this.registered = false;
                this.done = true;
                Poll::Ready(outcome)
            }
            None => {
                if !this.registered {
                    core.add_task_waiter(this.target, me);
                    this.registered = true;
                }
                Poll::Pending
            }
        }
    }
}

impl<T> Drop for Join<T> {
    fn drop(&mut self) {
        if self.registered && !self.done {
            if let Ok(mut core) = self.cx.core().try_borrow_mut() {
                core.remove_task_waiter(self.target, self.cx.task());
            }
        }
    }
}
