//! Mutual exclusion with FIFO hand-off.

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

#[derive(Debug, Default)]
struct LockState {
    holder: Option<TaskId>,
    waiters: VecDeque<TaskId>,
}

impl LockState {
    /// Passes the lock to the next waiter, or frees it. Returns the task to
    /// wake, if any.
    fn hand_off(&mut self) -> Option<TaskId> {
        match self.waiters.pop_front() {
            Some(next) => {
                self.holder = Some(next);
                Some(next)
            }
            None => {
                self.holder = None;
                None
            }
        }
    }
}

/// An asynchronous mutual-exclusion lock.
///
/// At most one task holds the lock at a time; waiters are granted it in
/// arrival order, directly on release, so no later arrival can barge in
/// between. Release is explicit — there is no guard — and releasing a lock
/// you do not hold is a usage error, reported synchronously.
///
/// Clones share the same lock.
#[derive(Debug, Clone)]
pub struct Lock {
    core: SharedCore,
    state: Rc<RefCell<LockState>>,
}

impl Lock {
    /// Creates an unheld lock on the calling task's event loop.
    #[must_use]
    pub fn new(cx: &Cx) -> Self {
        Self {
            core: cx.core().clone(),
            state: Rc::new(RefCell::new(LockState::default())),
        }
    }

    /// Returns true while some task holds the lock.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.state.borrow().holder.is_some()
    }

    /// Returns the number of tasks waiting to acquire.
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.state.borrow().waiters.len()
    }

    /// Acquires the lock, suspending while another task holds it.
    pub fn acquire(&self, cx: &Cx) -> Acquire {
        Acquire {
            lock: self.clone(),
            cx: cx.clone(),
            registered: false,
            acquired: false,
        }
    }

    /// Releases the lock held by the calling task.
    ///
    /// If tasks are waiting, the head waiter becomes the holder immediately
    /// and is scheduled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotHolder`] if the calling task does not hold the
    /// lock.
    pub fn release(&self, cx: &Cx) -> Result<(), Error> {
        let next = {
            let mut state = self.state.borrow_mut();
            if state.holder != Some(cx.task()) {
                return Err(Error::NotHolder);
            }
            state.hand_off()
        };
        if let Some(next) = next {
            trace!(task = %next, "lock handed off");
            self.core.borrow_mut().reschedule(next);
        }
        Ok(())
    }
}

/// Future returned by [`Lock::acquire`].
#[derive(Debug)]
pub struct Acquire {
    lock: Lock,
    cx: Cx,
    registered: bool,
    acquired: bool,
}

impl Acquire {
    /// Abandons the attempt: deregisters, and passes on a hand-off that
    /// arrived before cancellation was observed.
    fn abandon(&mut self) {
        if self.acquired {
            return;
        }
        let me = self.cx.task();
        let next = {
            let Ok(mut state) = self.lock.state.try_borrow_mut() else {
                return;
            };
            if self.registered && state.holder == Some(me) {
                // Granted but never observed; the grant moves on.
                state.hand_off()
            } else {
                state.waiters.retain(|t| *t != me);
                None
            }
        };
        self.registered = false;
        if let Some(next) = next {
            if let Ok(mut core) = self.lock.core.try_borrow_mut() {
                core.reschedule(next);
            }
        }
    }
}

impl Future for Acquire {
    type Output = Result<(), Error>;

    fn poll(self: Pin<&mut Self>, _ctx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let me = this.cx.task();

        let checkpoint = this.cx.core().borrow_mut().checkpoint(me);
        if let Err(e) = checkpoint {
            this.abandon();
            return Poll::Ready(Err(e));
        }

        let mut state = this.lock.state.borrow_mut();
        if this.registered && state.holder == Some(me) {
            // Direct hand-off from a releasing task.
            this.registered = false;
            this.acquired = true;
            return Poll::Ready(Ok(()));
        }
        if !this.registered && state.holder.is_none() && state.waiters.is_empty() {
            state.holder = Some(me);
            this.acquired = true;
            return Poll::Ready(Ok(()));
        }
        if !this.registered {
            state.waiters.push_back(me);
            this.registered = true;
        }
        Poll::Pending
    }
}

impl Drop for Acquire {
    fn drop(&mut self) {
        self.abandon();
    }
}
