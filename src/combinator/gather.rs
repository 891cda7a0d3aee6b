//! Aggregate completion of a set of tasks.

use crate::cx::Cx;
use crate::error::Error;
use crate::runtime::core::Core;
use crate::runtime::record::Completion;
use crate::task::{resolve_completion, ChildRef, TaskHandle};
use crate::types::{CancelReason, Outcome, TaskId};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Waits for every child and collects their results in input order.
///
/// The first child failure (or cancellation) fails the aggregate
/// immediately: the error is returned and every still-running child gets a
/// fail-fast cancellation request. The aggregate does not wait for those
/// children to drain; they finish cancelling on their own.
pub fn gather<T>(cx: &Cx, handles: &[TaskHandle<T>]) -> Gather<T> {
    Gather {
        cx: cx.clone(),
        children: handles.iter().map(TaskHandle::child_ref).collect(),
        registered: false,
        done: false,
    }
}

/// Waits for every child and collects every outcome, one per position.
///
/// Never short-circuits: failures and cancellations are reported in place
/// as [`Outcome`] values. The only error is the aggregate task's own
/// cancellation.
pub fn gather_all<T>(cx: &Cx, handles: &[TaskHandle<T>]) -> GatherAll<T> {
    GatherAll {
        cx: cx.clone(),
        children: handles.iter().map(TaskHandle::child_ref).collect(),
        registered: false,
        done: false,
    }
}

fn unregister_all<T>(core: &mut Core, children: &[ChildRef<T>], me: TaskId) {
    for child in children {
        core.remove_task_waiter(child.id, me);
    }
}

fn register_pending<T>(core: &mut Core, children: &[ChildRef<T>], me: TaskId) {
    for child in children {
        let live = core.record(child.id).is_some_and(|rec| rec.completion.is_none());
        if live {
            core.add_task_waiter(child.id, me);
        }
    }
}

/// Future returned by [`gather`].
#[derive(Debug)]
pub struct Gather<T> {
    cx: Cx,
    children: Vec<ChildRef<T>>,
    registered: bool,
    done: bool,
}

impl<T> Future for Gather<T> {
    type Output = Result<Vec<T>, Error>;

    fn poll(self: Pin<&mut Self>, _ctx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let me = this.cx.task();
        let mut core = this.cx.core().borrow_mut();

        if let Err(e) = core.checkpoint(me) {
            for child in &this.children {
                core.cancel(child.id, CancelReason::parent_cancelled());
            }
            unregister_all(&mut core, &this.children, me);
            this.done = true;
            return Poll::Ready(Err(e));
        }

        // A missing record means the completion was consumed elsewhere.
        let mut all_terminal = true;
        let mut first_failure: Option<Error> = None;
        for child in &this.children {
            match core.record(child.id).map(|rec| rec.completion.clone()) {
                Some(None) => all_terminal = false,
                Some(Some(Completion::Done)) | None => {}
                Some(Some(Completion::Failed(e))) => {
                    first_failure = Some(e);
                    break;
                }
                Some(Some(Completion::Cancelled(reason))) => {
                    first_failure = Some(Error::cancelled(reason));
                    break;
                }
            }
        }

        if let Some(error) = first_failure {
            for child in &this.children {
                core.cancel(child.id, CancelReason::sibling_failed());
                let terminal = core
                    .record(child.id)
                    .map_or(true, |rec| rec.completion.is_some());
                if terminal {
                    core.observe(child.id);
                }
            }
            unregister_all(&mut core, &this.children, me);
            this.done = true;
            return Poll::Ready(Err(error));
        }

        if all_terminal {
            let mut results = Vec::with_capacity(this.children.len());
            for child in &this.children {
                let value = child.value.borrow_mut().take();
                core.observe(child.id);
                match value {
                    Some(v) => results.push(v),
                    None => {
                        this.done = true;
                        return Poll::Ready(Err(Error::OutcomeConsumed));
                    }
                }
            }
            this.done = true;
            return Poll::Ready(Ok(results));
        }

        if !this.registered {
            register_pending(&mut core, &this.children, me);
            this.registered = true;
        }
        Poll::Pending
    }
}

impl<T> Drop for Gather<T> {
    fn drop(&mut self) {
        if self.registered && !self.done {
            if let Ok(mut core) = self.cx.core().try_borrow_mut() {
                unregister_all(&mut core, &self.children, self.cx.task());
            }
        }
    }
}

/// Future returned by [`gather_all`].
#[derive(Debug)]
pub struct GatherAll<T> {
    cx: Cx,
    children: Vec<ChildRef<T>>,
    registered: bool,
    done: bool,
}

impl<T> Future for GatherAll<T> {
    type Output = Result<Vec<Outcome<T>>, Error>;

    fn poll(self: Pin<&mut Self>, _ctx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let me = this.cx.task();
        let mut core = this.cx.core().borrow_mut();

        if let Err(e) = core.checkpoint(me) {
            for child in &this.children {
                core.cancel(child.id, CancelReason::parent_cancelled());
            }
            unregister_all(&mut core, &this.children, me);
            this.done = true;
            return Poll::Ready(Err(e));
        }

        let all_terminal = this.children.iter().all(|child| {
            core.record(child.id)
                .map_or(true, |rec| rec.completion.is_some())
        });
        if !all_terminal {
            if !this.registered {
                register_pending(&mut core, &this.children, me);
                this.registered = true;
            }
            return Poll::Pending;
        }

        let mut outcomes = Vec::with_capacity(this.children.len());
        for child in &this.children {
            let completion = core.record(child.id).and_then(|rec| rec.completion.clone());
            let outcome = match completion {
                Some(completion) => resolve_completion(&completion, &child.value),
                None => Outcome::Err(Error::OutcomeConsumed),
            };
            core.observe(child.id);
            outcomes.push(outcome);
        }
        this.done = true;
        Poll::Ready(Ok(outcomes))
    }
}

impl<T> Drop for GatherAll<T> {
    fn drop(&mut self) {
        if self.registered && !self.done {
            if let Ok(mut core) = self.cx.core().try_borrow_mut() {
                unregister_all(&mut core, &self.children, self.cx.task());
            }
        }
    }
}
