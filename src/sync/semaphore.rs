//! Counting semaphore with direct permit hand-off.

use crate::cx::Cx;
use crate::error::Error;
use crate::runtime::core::SharedCore;
use crate::tracing_compat::trace;
use crate::types::TaskId;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

#[derive(Debug)]
struct SemWaiter {
    task: TaskId,
    granted: bool,
}

#[derive(Debug)]
struct SemState {
    permits: usize,
    waiters: VecDeque<SemWaiter>,
}

impl SemState {
    /// Routes one released permit: to the first ungranted waiter if there is
    /// one (keeping `permits` from transiently overshooting), otherwise back
    /// to the counter. Returns the task to wake, if any.
    fn release_one(&mut self) -> Option<TaskId> {
        if let Some(waiter) = self.waiters.iter_mut().find(|w| !w.granted) {
            waiter.granted = true;
            Some(waiter.task)
        } else {
            self.permits += 1;
            None
        }
    }
}

/// A counting semaphore.
///
/// `acquire` takes one permit, suspending FIFO when none are available;
/// `release` returns one. A release with waiters present hands the permit
/// directly to the head waiter, so the permit count never transiently rises
/// while someone is queued. Permits are not tied to tasks: release is a
/// plain operation, and a `Semaphore::new(cx, 1)` behaves exactly like a
/// [`Lock`](crate::sync::Lock) minus the holder check.
///
/// Clones share the same permit pool.
#[derive(Debug, Clone)]
pub struct Semaphore {
    core: SharedCore,
    state: Rc<RefCell<SemState>>,
}

impl Semaphore {
    /// Creates a semaphore with `permits` initial permits.
    #[must_use]
    pub fn new(cx: &Cx, permits: usize) -> Self {
        Self {
            core: cx.core().clone(),
            state: Rc::new(RefCell::new(SemState {
                permits,
                waiters: VecDeque::new(),
            })),
        }
    }

    /// Returns the number of permits currently available.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.state.borrow().permits
    }

    /// Returns the number of tasks waiting for a permit.
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.state.borrow().waiters.len()
    }

    /// Acquires one permit, suspending until one is available.
    pub fn acquire(&self, cx: &Cx) -> AcquirePermit {
        AcquirePermit {
            semaphore: self.clone(),
            cx: cx.clone(),
            registered: false,
            acquired: false,
        }
    }

    /// Releases one permit.
    ///
    /// If tasks are waiting, the head waiter receives the permit directly
    /// and is scheduled; otherwise the permit count increments.
    pub fn release(&self) {
        let next = self.state.borrow_mut().release_one();
        if let Some(next) = next {
            trace!(task = %next, "permit handed off");
            self.core.borrow_mut().reschedule(next);
        }
    }
}

/// Future returned by [`Semaphore::acquire`].
#[derive(Debug)]
pub struct AcquirePermit {
    semaphore: Semaphore,
    cx: Cx,
    registered: bool,
    acquired: bool,
}

impl AcquirePermit {
    /// Abandons the attempt; a permit granted but never observed is routed
    /// to the next waiter (or back to the counter) untouched.
    fn abandon(&mut self) {
        if self.acquired || !self.registered {
            return;
        }
        let me = self.cx.task();
        let next = {
            let Ok(mut state) = self.semaphore.state.try_borrow_mut() else {
                return;
            };
            let granted = state
                .waiters
                .iter()
                .find(|w| w.task == me)
                .is_some_and(|w| w.granted);
            state.waiters.retain(|w| w.task != me);
            if granted {
                state.release_one()
            } else {
                None
            }
        };
        self.registered = false;
        if let Some(next) = next {
            if let Ok(mut core) = self.semaphore.core.try_borrow_mut() {
                core.reschedule(next);
            }
        }
    }
}

impl Future for AcquirePermit {
    type Output = Result<(), Error>;

    fn poll(self: Pin<&mut Self>, _ctx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let me = this.cx.task();

        let checkpoint = this.cx.core().borrow_mut().checkpoint(me);
        if let Err(e) = checkpoint {
            this.abandon();
            return Poll::Ready(Err(e));
        }

        let mut state = this.semaphore.state.borrow_mut();
        if this.registered {
            let granted = state
                .waiters
                .iter()
                .find(|w| w.task == me)
                .is_some_and(|w| w.granted);
            if granted {
                state.waiters.retain(|w| w.task != me);
                this.registered = false;
                this.acquired = true;
                return Poll::Ready(Ok(()));
            }
            return Poll::Pending;
        }

        // A fresh acquire may take from the pool only when nobody is queued
        // ahead of it.
        if state.permits > 0 && state.waiters.iter().all(|w| w.granted) {
            state.permits -= 1;
            this.acquired = true;
            return Poll::Ready(Ok(()));
        }

        state.waiters.push_back(SemWaiter {
            task: me,
            granted: false,
        });
        this.registered = true;
        Poll::Pending
    }
}

impl Drop for AcquirePermit {
    fn drop(&mut self) {
        self.abandon();
    }
}
