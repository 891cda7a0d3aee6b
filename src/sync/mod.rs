//! Synchronization primitives built on task suspension.
//!
//! All three primitives share the same shape: shared state behind an
//! `Rc<RefCell<..>>`, a strict-FIFO waiter list per wait condition, and
//! acquire-style futures that deliver the cancellation condition at the head
//! of their poll and unregister themselves on drop — so cancelling a waiting
//! task removes it from the list without disturbing the primitive's counters
//! or buffer.
//!
//! Hand-offs are direct: a release with waiters present grants the resource
//! to the head waiter before any newcomer can see it, so there is no
//! barging and no transient counter overshoot.

mod lock;
mod queue;
mod semaphore;

pub use lock::{Acquire, Lock};
pub use queue::{Get, Put, Queue};
pub use semaphore::{AcquirePermit, Semaphore};
