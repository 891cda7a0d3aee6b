//! The sleep future.

use crate::cx::Cx;
use crate::error::Error;
use crate::runtime::deadline::TimerKey;
use crate::types::Time;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A future that completes once the loop's clock reaches its deadline.
///
/// Created by [`Cx::sleep`]. Arms a deadline entry on first poll; dropping
/// the future before expiry (including via cancellation delivery) disarms
/// the entry, so the deadline queue never wakes a task that stopped
/// sleeping.
#[derive(Debug)]
pub struct Sleep {
    cx: Cx,
    deadline: Time,
    key: Option<TimerKey>,
}

impl Sleep {
    pub(crate) fn new(cx: Cx, deadline: Time) -> Self {
        Self {
            cx,
            deadline,
            key: None,
        }
    }

    /// Returns the absolute instant this sleep completes at.
    #[must_use]
    pub fn deadline(&self) -> Time {
        self.deadline
    }
}

impl Future for Sleep {
    type Output = Result<(), Error>;

    fn poll(self: Pin<&mut Self>, _ctx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut core = this.cx.core().borrow_mut();

        if let Err(e) = core.checkpoint(this.cx.task()) {
            if let Some(key) = this.key.take() {
                core.cancel_deadline(key);
            }
            return Poll::Ready(Err(e));
        }

        if core.now >= this.deadline {
            if let Some(key) = this.key.take() {
                core.cancel_deadline(key);
            }
            return Poll::Ready(Ok(()));
        }

        if this.key.is_none() {
            this.key = Some(core.insert_deadline(this.deadline, this.cx.task()));
        }
        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            if let Ok(mut core) = self.cx.core().try_borrow_mut() {
                core.cancel_deadline(key);
            }
        }
    }
}
