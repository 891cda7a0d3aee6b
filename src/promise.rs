//! Single-assignment result slots.
//!
//! A [`Promise`] resolves (or fails) exactly once; after that its state never
//! changes. Tasks waiting on it are re-admitted to the ready queue in
//! registration order, and every waiter observes the same result. Settling
//! an already-settled promise is a usage error returned to the caller
//! immediately, never deferred.

use crate::cx::Cx;
use crate::error::Error;
use crate::runtime::core::SharedCore;
use crate::tracing_compat::trace;
use crate::types::TaskId;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

#[derive(Debug)]
enum PromiseState<T> {
    Pending { waiters: SmallVec<[TaskId; 4]> },
    Resolved(T),
    Failed(Error),
}

/// A single-assignment container for an eventual value or failure.
///
/// Clones share the same slot; any clone may settle it, any task may wait on
/// it. `T: Clone` is required only for waiting, since every waiter gets its
/// own copy of the result.
#[derive(Debug)]
pub struct Promise<T> {
    core: SharedCore,
    state: Rc<RefCell<PromiseState<T>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T> Promise<T> {
    pub(crate) fn new(core: &SharedCore) -> Self {
        Self {
            core: core.clone(),
            state: Rc::new(RefCell::new(PromiseState::Pending {
                waiters: SmallVec::new(),
            })),
        }
    }

    /// Returns true once the promise has been resolved or failed.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(&*self.state.borrow(), PromiseState::Pending { .. })
    }

    /// Resolves the promise with a value, waking all waiters in
    /// registration order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadySettled`] if the promise was settled before.
    pub fn resolve(&self, value: T) -> Result<(), Error> {
        self.settle(PromiseState::Resolved(value))
    }

    /// Fails the promise with an error, waking all waiters in registration
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadySettled`] if the promise was settled before.
    pub fn fail(&self, error: Error) -> Result<(), Error> {
        self.settle(PromiseState::Failed(error))
    }

    fn settle(&self, new_state: PromiseState<T>) -> Result<(), Error> {
        let waiters = {
            let mut state = self.state.borrow_mut();
            let PromiseState::Pending { waiters } = &mut *state else {
                return Err(Error::AlreadySettled);
            };
            let waiters = std::mem::take(waiters);
            *state = new_state;
            waiters
        };
        trace!(waiters = waiters.len(), "promise settled");
        let mut core = self.core.borrow_mut();
        for waiter in waiters {
            core.reschedule(waiter);
        }
        Ok(())
    }

    /// Suspends the current task until the promise settles.
    pub fn wait(&self, cx: &Cx) -> PromiseWait<T>
    where
        T: Clone,
    {
        PromiseWait {
            cx: cx.clone(),
            state: self.state.clone(),
            registered: false,
            done: false,
        }
    }
}

/// Future returned by [`Promise::wait`].
#[derive(Debug)]
pub struct PromiseWait<T> {
    cx: Cx,
    state: Rc<RefCell<PromiseState<T>>>,
    registered: bool,
    done: bool,
}

impl<T: Clone> Future for PromiseWait<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, _ctx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let me = this.cx.task();

        let checkpoint = this.cx.core().borrow_mut().checkpoint(me);
        if let Err(e) = checkpoint {
            this.unregister();
            this.done = true;
            return Poll::Ready(Err(e));
        }

        let mut state = this.state.borrow_mut();
        match &mut *state {
            PromiseState::Resolved(value) => {
                let value = value.clone();
                this.registered = false;
                this.done = true;
                Poll::Ready(Ok(value))
            }
            PromiseState::Failed(error) => {
                let error = error.clone();
                this.registered = false;
                this.done = true;
                Poll::Ready(Err(error))
            }
            PromiseState::Pending { waiters } => {
                if !this.registered && !waiters.contains(&me) {
                    waiters.push(me);
                    this.registered = true;
                }
                Poll::Pending
            }
        }
    }
}

impl<T> PromiseWait<T> {
    fn unregister(&mut self) {
        if !self.registered {
            return;
        }
        let me = self.cx.task();
        if let Ok(mut state) = self.state.try_borrow_mut() {
            if let PromiseState::Pending { waiters } = &mut *state {
                waiters.retain(|w| *w != me);
            }
        }
        self.registered = false;
    }
}

impl<T> Drop for PromiseWait<T> {
    fn drop(&mut self) {
        if !self.done {
            self.unregister();
        }
    }
}
