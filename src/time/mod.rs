//! Time-based suspension: sleeping and yielding.
//!
//! Both futures here are cancellation points, like every runtime suspension
//! point: the cancellation condition is delivered at the head of their poll.

mod sleep;
mod yield_now;

pub use sleep::Sleep;
pub use yield_now::YieldNow;
