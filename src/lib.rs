//! Soliton: a single-threaded cooperative task runtime.
//!
//! # Overview
//!
//! Soliton runs many tasks on one thread of control. Tasks make interleaved,
//! never simultaneous, progress: control changes hands only at explicit
//! suspension points (awaiting a promise, sleeping, blocking on a primitive,
//! joining another task). Everything between two suspension points executes
//! atomically with respect to every other task, which is the model's core
//! safety property — shared state touched only between suspension points
//! needs no locking at all.
//!
//! # Core Guarantees
//!
//! - **FIFO scheduling**: tasks become ready in the order their wait
//!   condition was satisfied and are resumed in that order; deadlines fire
//!   in ascending time order with creation-order ties.
//! - **Cooperative cancellation**: `cancel` is an idempotent request; the
//!   cancellation condition is delivered exactly once, at the target's next
//!   suspension point. Cleanup code may catch it, and should re-raise it.
//! - **Failure isolation**: an error or panic escaping a task marks that
//!   task Failed and never crashes the loop; unobserved failures surface
//!   through a diagnostic hook.
//! - **Fair primitives**: [`Lock`], [`Semaphore`] and [`Queue`] grant
//!   resources to waiters directly, in strict arrival order, with no
//!   barging.
//!
//! # Example
//!
//! ```
//! use soliton::EventLoop;
//! use std::time::Duration;
//!
//! let event_loop = EventLoop::new();
//! let total = event_loop.run(|cx| async move {
//!     let doubler = cx.spawn(|cx| async move {
//!         cx.sleep(Duration::from_millis(1)).await?;
//!         Ok(21 * 2)
//!     });
//!     doubler.join(&cx).await.into_result()
//! });
//! assert_eq!(total, Ok(42));
//! ```
//!
//! # Module Structure
//!
//! - [`runtime`]: the event loop, task states, ready/deadline queues
//! - [`cx`]: the task context threaded through continuations
//! - [`task`]: task handles and joining
//! - [`promise`]: single-assignment result slots with waiter lists
//! - [`sync`]: lock, semaphore and bounded queue
//! - [`combinator`]: gather, wait_for, retry
//! - [`time`]: sleep and yield futures
//! - [`clock`]: monotonic and virtual time sources
//! - [`types`]: identifiers, time, cancellation reasons, outcomes
//!
//! The loop consumes nothing from its environment but a monotonic clock; any
//! real I/O readiness source lives outside and feeds the loop by resolving
//! promises or spawning tasks.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod clock;
pub mod combinator;
pub mod cx;
pub mod error;
pub mod promise;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;
pub mod tracing_compat;
pub mod types;

pub(crate) mod util;

pub use clock::{Clock, MonotonicClock, VirtualClock};
pub use combinator::{gather, gather_all, retry, wait_for};
pub use cx::Cx;
pub use error::{Error, Result};
pub use promise::Promise;
pub use runtime::{EventLoop, TaskState};
pub use sync::{Lock, Queue, Semaphore};
pub use task::TaskHandle;
pub use types::{CancelKind, CancelReason, Outcome, TaskId, Time};
