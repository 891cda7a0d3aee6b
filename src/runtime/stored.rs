//! Type-erased stored continuations.
//!
//! Every spawned continuation is wrapped so its typed result lands in the
//! handle's slot, leaving a uniform `Future<Output = Completion>` for the
//! loop to poll. The box is deliberately not `Send`: this runtime is
//! single-threaded by construction.

use crate::runtime::record::Completion;
use crate::tracing_compat::trace;
use crate::types::TaskId;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A pinned, type-erased continuation owned by a task record.
pub(crate) struct StoredTask {
    future: Pin<Box<dyn Future<Output = Completion>>>,
    task_id: TaskId,
    poll_count: u64,
}

impl StoredTask {
    pub(crate) fn new<F>(future: F, task_id: TaskId) -> Self
    where
        F: Future<Output = Completion> + 'static,
    {
        Self {
            future: Box::pin(future),
            task_id,
            poll_count: 0,
        }
    }

    /// Resumes the continuation until its next suspension point.
    pub(crate) fn poll(&mut self, cx: &mut Context<'_>) -> Poll<Completion> {
        self.poll_count += 1;
        trace!(task = %self.task_id, poll = self.poll_count, "resuming task");
        let result = self.future.as_mut().poll(cx);
        trace!(
            task = %self.task_id,
            suspended = result.is_pending(),
            "task yielded control"
        );
        result
    }

    #[cfg(test)]
    pub(crate) fn poll_count(&self) -> u64 {
        self.poll_count
    }
}

impl std::fmt::Debug for StoredTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTask")
            .field("task_id", &self.task_id)
            .field("poll_count", &self.poll_count)
            .finish_non_exhaustive()
    }
}
