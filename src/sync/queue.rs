//! Bounded producer/consumer hand-off.
//!
//! Capacity is enforced through reservations: a put-waiter that is granted
//! space holds a reservation until it pushes its item, and a get-waiter that
//! is granted an item holds a claim until it pops it. Reservations and
//! claims are released untouched when a waiter is cancelled, so the buffer
//! and counters are never disturbed by cancellation.

use crate::cx::Cx;
use crate::error::Error;
use crate::runtime::core::SharedCore;
use crate::types::TaskId;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

#[derive(Debug)]
struct Waiter {
    task: TaskId,
    granted: bool,
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    capacity: usize,
    put_waiters: VecDeque<Waiter>,
    get_waiters: VecDeque<Waiter>,
    /// Space reservations held by granted put-waiters.
    reserved: usize,
    /// Buffered items claimed by granted get-waiters.
    claims: usize,
}

impl<T> QueueState<T> {
    fn has_space(&self) -> bool {
        self.capacity == 0 || self.items.len() + self.reserved < self.capacity
    }

    fn unclaimed_items(&self) -> usize {
        self.items.len() - self.claims
    }

    /// Grants freed space to the first ungranted put-waiter, if any.
    fn grant_putter(&mut self) -> Option<TaskId> {
        if !self.has_space() {
            return None;
        }
        let waiter = self.put_waiters.iter_mut().find(|w| !w.granted)?;
        waiter.granted = true;
        self.reserved += 1;
        Some(waiter.task)
    }

    /// Grants an unclaimed item to the first ungranted get-waiter, if any.
    fn grant_getter(&mut self) -> Option<TaskId> {
        if self.unclaimed_items() == 0 {
            return None;
        }
        let waiter = self.get_waiters.iter_mut().find(|w| !w.granted)?;
        waiter.granted = true;
        self.claims += 1;
        Some(waiter.task)
    }

    fn waiter_granted(waiters: &VecDeque<Waiter>, task: TaskId) -> bool {
        waiters
            .iter()
            .find(|w| w.task == task)
            .is_some_and(|w| w.granted)
    }
}

/// A bounded FIFO queue connecting producer and consumer tasks.
///
/// `put` suspends while the buffer is full; `get` suspends while it is
/// empty. Each successful `get` that frees space wakes at most one
/// put-waiter, each `put` that makes an item available wakes at most one
/// get-waiter, and both waiter lists are strict FIFO independently.
///
/// A capacity of `0` means unbounded: `put` never suspends.
///
/// Clones share the same buffer.
#[derive(Debug)]
pub struct Queue<T> {
    core: SharedCore,
    state: Rc<RefCell<QueueState<T>>>,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T> Queue<T> {
    /// Creates a queue holding at most `capacity` items (`0` = unbounded).
    #[must_use]
    pub fn new(cx: &Cx, capacity: usize) -> Self {
        Self {
            core: cx.core().clone(),
            state: Rc::new(RefCell::new(QueueState {
                items: VecDeque::new(),
                capacity,
                put_waiters: VecDeque::new(),
                get_waiters: VecDeque::new(),
                reserved: 0,
                claims: 0,
            })),
        }
    }

    /// Returns the number of buffered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    /// Returns true if no items are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().items.is_empty()
    }

    /// Returns the configured capacity (`0` = unbounded).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.state.borrow().capacity
    }

    /// Appends an item, suspending while the buffer is full.
    pub fn put(&self, cx: &Cx, item: T) -> Put<T> {
        Put {
            queue: self.clone(),
            cx: cx.clone(),
            item: Some(item),
            registered: false,
            done: false,
        }
    }

    /// Removes and returns the head item, suspending while the buffer is
    /// empty.
    pub fn get(&self, cx: &Cx) -> Get<T> {
        Get {
            queue: self.clone(),
            cx: cx.clone(),
            registered: false,
            done: false,
        }
    }

    fn wake(&self, task: Option<TaskId>) {
        if let Some(task) = task {
            self.core.borrow_mut().reschedule(task);
        }
    }
}

/// Future returned by [`Queue::put`].
#[derive(Debug)]
pub struct Put<T> {
    queue: Queue<T>,
    cx: Cx,
    item: Option<T>,
    registered: bool,
    done: bool,
}

// All state is ordinary; the pending item is never pinned.
impl<T> Unpin for Put<T> {}

impl<T> Put<T> {
    fn abandon(&mut self) {
        if self.done || !self.registered {
            return;
        }
        let me = self.cx.task();
        let next = {
            let Ok(mut state) = self.queue.state.try_borrow_mut() else {
                return;
            };
            let granted = QueueState::<T>::waiter_granted(&state.put_waiters, me);
            state.put_waiters.retain(|w| w.task != me);
            if granted {
                // The reservation is released and offered to the next waiter.
                state.reserved -= 1;
                state.grant_putter()
            } else {
                None
            }
        };
        self.registered = false;
        if let Ok(mut core) = self.queue.core.try_borrow_mut() {
            if let Some(next) = next {
                core.reschedule(next);
            }
        }
    }
}

impl<T> Future for Put<T> {
    type Output = Result<(), Error>;

    fn poll(self: Pin<&mut Self>, _ctx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let me = this.cx.task();

        let checkpoint = this.cx.core().borrow_mut().checkpoint(me);
        if let Err(e) = checkpoint {
            this.abandon();
            return Poll::Ready(Err(e));
        }

        let wake = {
            let mut state = this.queue.state.borrow_mut();
            if this.registered {
                if !QueueState::<T>::waiter_granted(&state.put_waiters, me) {
                    return Poll::Pending;
                }
                state.put_waiters.retain(|w| w.task != me);
                state.reserved -= 1;
            } else {
                let nobody_ahead = state.put_waiters.iter().all(|w| w.granted);
                if !(nobody_ahead && state.has_space()) {
                    state.put_waiters.push_back(Waiter {
                        task: me,
                        granted: false,
                    });
                    this.registered = true;
                    return Poll::Pending;
                }
            }
            let item = this.item.take().expect("put polled after completion");
            state.items.push_back(item);
            state.grant_getter()
        };
        this.registered = false;
        this.done = true;
        this.queue.wake(wake);
        Poll::Ready(Ok(()))
    }
}

impl<T> Drop for Put<T> {
    fn drop(&mut self) {
        self.abandon();
    }
}

/// Future returned by [`Queue::get`].
#[derive(Debug)]
pub struct Get<T> {
    queue: Queue<T>,
    cx: Cx,
    registered: bool,
    done: bool,
}

impl<T> Get<T> {
    fn abandon(&mut self) {
        if self.done || !self.registered {
            return;
        }
        let me = self.cx.task();
        let next = {
            let Ok(mut state) = self.queue.state.try_borrow_mut() else {
                return;
            };
            let granted = QueueState::<T>::waiter_granted(&state.get_waiters, me);
            state.get_waiters.retain(|w| w.task != me);
            if granted {
                // The claimed item goes to the next waiter instead.
                state.claims -= 1;
                state.grant_getter()
            } else {
                None
            }
        };
        self.registered = false;
        if let Ok(mut core) = self.queue.core.try_borrow_mut() {
            if let Some(next) = next {
                core.reschedule(next);
            }
        }
    }
}

impl<T> Future for Get<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, _ctx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let me = this.cx.task();

        let checkpoint = this.cx.core().borrow_mut().checkpoint(me);
        if let Err(e) = checkpoint {
            this.abandon();
            return Poll::Ready(Err(e));
        }

        let (item, wake) = {
            let mut state = this.queue.state.borrow_mut();
            if this.registered {
                if !QueueState::<T>::waiter_granted(&state.get_waiters, me) {
                    return Poll::Pending;
                }
                state.get_waiters.retain(|w| w.task != me);
                state.claims -= 1;
            } else {
                let nobody_ahead = state.get_waiters.iter().all(|w| w.granted);
                if !(nobody_ahead && state.unclaimed_items() > 0) {
                    state.get_waiters.push_back(Waiter {
                        task: me,
                        granted: false,
                    });
                    this.registered = true;
                    return Poll::Pending;
                }
            }
            let item = state.items.pop_front().expect("granted item present");
            // Freed space goes to the next queued producer.
            (item, state.grant_putter())
        };
        this.registered = false;
        this.done = true;
        this.queue.wake(wake);
        Poll::Ready(Ok(item))
    }
}

impl<T> Drop for Get<T> {
    fn drop(&mut self) {
        self.abandon();
    }
}
