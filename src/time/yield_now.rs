//! Voluntary yielding.

use crate::cx::Cx;
use crate::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A future that suspends exactly once, re-admitting its task at the back
/// of the ready queue.
///
/// Created by [`Cx::yield_now`]. Equivalent to a zero-length sleep without
/// touching the deadline queue.
#[derive(Debug)]
pub struct YieldNow {
    cx: Cx,
    yielded: bool,
}

impl YieldNow {
    pub(crate) fn new(cx: Cx) -> Self {
        Self { cx, yielded: false }
    }
}

impl Future for YieldNow {
    type Output = Result<(), Error>;

    fn poll(self: Pin<&mut Self>, _ctx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut core = this.cx.core().borrow_mut();

        if let Err(e) = core.checkpoint(this.cx.task()) {
            return Poll::Ready(Err(e));
        }

        if this.yielded {
            Poll::Ready(Ok(()))
        } else {
            this.yielded = true;
            core.reschedule(this.cx.task());
            Poll::Pending
        }
    }
}
