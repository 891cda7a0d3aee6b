//! Loop-internal state: the task arena, both queues, and the rules that
//! connect them.
//!
//! Exactly one `Core` exists per event loop, behind an `Rc<RefCell<..>>`
//! shared by every handle the runtime gives out (`Cx`, `TaskHandle`,
//! `Promise`, the sync primitives). Because only one task ever executes at a
//! time, the `RefCell` is never contended; the discipline is simply that the
//! loop releases its borrow before polling a continuation, and everything a
//! continuation does re-enters through short, non-reentrant borrows.

use crate::error::Error;
use crate::runtime::deadline::{DeadlineQueue, TimerKey};
use crate::runtime::ready::ReadyQueue;
use crate::runtime::record::{Completion, TaskRecord, TaskState};
use crate::runtime::stored::StoredTask;
use crate::tracing_compat::{debug, trace};
use crate::types::{CancelReason, TaskId, Time};
use crate::util::Arena;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to the loop state.
pub(crate) type SharedCore = Rc<RefCell<Core>>;

/// Diagnostic hook for failures nobody observed.
pub(crate) type FailureHook = Box<dyn FnMut(TaskId, &Error)>;

/// The event loop's internal state.
pub(crate) struct Core {
    tasks: Arena<TaskRecord>,
    ready: ReadyQueue,
    pub(crate) deadlines: DeadlineQueue,
    /// Snapshot of the clock, taken once per loop turn. Everything inside a
    /// single resume observes the same instant.
    pub(crate) now: Time,
    /// Re-entrancy guard for `run`.
    pub(crate) running: bool,
    hook: Option<FailureHook>,
    /// Failures awaiting delivery to the hook; drained by the loop outside
    /// any core borrow so the hook can call back into the runtime.
    unreported: Vec<(TaskId, Error)>,
}

impl Core {
    pub(crate) fn new() -> Self {
        Self {
            tasks: Arena::new(),
            ready: ReadyQueue::new(),
            deadlines: DeadlineQueue::new(),
            now: Time::ZERO,
            running: false,
            hook: None,
            unreported: Vec::new(),
        }
    }

    pub(crate) fn new_shared() -> SharedCore {
        Rc::new(RefCell::new(Self::new()))
    }

    // === Records ===

    /// Creates a record for a new task and schedules it immediately.
    pub(crate) fn create_task(&mut self) -> TaskId {
        let idx = self
            .tasks
            .insert_with(|idx| TaskRecord::new(TaskId::from_arena(idx)));
        let id = TaskId::from_arena(idx);
        self.tasks
            .get_mut(idx)
            .expect("freshly inserted record")
            .state = TaskState::Scheduled;
        self.ready.push(id);
        debug!(task = %id, "task created");
        id
    }

    pub(crate) fn attach_future(&mut self, id: TaskId, stored: StoredTask) {
        if let Some(rec) = self.tasks.get_mut(id.arena_index()) {
            rec.future = Some(stored);
        }
    }

    pub(crate) fn record(&self, id: TaskId) -> Option<&TaskRecord> {
        self.tasks.get(id.arena_index())
    }

    #[cfg(test)]
    pub(crate) fn record_mut(&mut self, id: TaskId) -> Option<&mut TaskRecord> {
        self.tasks.get_mut(id.arena_index())
    }

    /// Returns the externally visible state, or `None` for pruned tasks.
    pub(crate) fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.record(id).map(|rec| rec.state)
    }

    // === Scheduling ===

    /// Re-admits a task to the ready queue if it can run.
    ///
    /// The `Running -> Scheduled` arm serves a task yielding to itself; a
    /// task that is already Scheduled or terminal is left alone, which is
    /// what makes wake-ups idempotent.
    pub(crate) fn reschedule(&mut self, id: TaskId) {
        let Some(rec) = self.tasks.get_mut(id.arena_index()) else {
            return;
        };
        match rec.state {
            TaskState::Created | TaskState::Suspended | TaskState::Running => {
                rec.state = TaskState::Scheduled;
                self.ready.push(id);
                trace!(task = %id, "task scheduled");
            }
            TaskState::Scheduled
            | TaskState::Done
            | TaskState::Failed
            | TaskState::Cancelled => {}
        }
    }

    /// Pops the next runnable task, skipping entries whose task moved on.
    pub(crate) fn pop_runnable(&mut self) -> Option<TaskId> {
        while let Some(id) = self.ready.pop() {
            if self.task_state(id) == Some(TaskState::Scheduled) {
                return Some(id);
            }
        }
        None
    }

    /// Takes the stored continuation out for polling and marks the task
    /// Running. The loop must hand it back (or a completion) afterwards.
    pub(crate) fn begin_poll(&mut self, id: TaskId) -> Option<StoredTask> {
        let rec = self.tasks.get_mut(id.arena_index())?;
        if rec.state != TaskState::Scheduled {
            return None;
        }
        rec.state = TaskState::Running;
        rec.future.take()
    }

    /// Returns a continuation that suspended; the task parks unless it
    /// rescheduled itself during the poll.
    pub(crate) fn finish_poll_pending(&mut self, id: TaskId, stored: StoredTask) {
        if let Some(rec) = self.tasks.get_mut(id.arena_index()) {
            rec.future = Some(stored);
            if rec.state == TaskState::Running {
                rec.state = TaskState::Suspended;
            }
        }
    }

    /// Records a task's completion and wakes its waiters in registration
    /// order.
    pub(crate) fn finish_poll_complete(&mut self, id: TaskId, completion: Completion) {
        let Some(rec) = self.tasks.get_mut(id.arena_index()) else {
            return;
        };
        let Some(waiters) = rec.complete(completion) else {
            return;
        };
        debug!(task = %id, state = ?self.task_state(id), "task completed");
        for waiter in waiters {
            self.reschedule(waiter);
        }
        self.try_reap(id);
    }

    // === Cancellation ===

    /// Requests cancellation of a task; idempotent.
    ///
    /// A task parked on a deadline or a waiter list is rescheduled at once so
    /// the condition reaches it without waiting for the original wake-up.
    pub(crate) fn cancel(&mut self, id: TaskId, reason: CancelReason) -> bool {
        let Some(rec) = self.tasks.get_mut(id.arena_index()) else {
            return false;
        };
        let was_new = rec.request_cancel(reason);
        if was_new {
            debug!(task = %id, "cancellation requested");
        }
        if self.task_state(id) == Some(TaskState::Suspended) {
            self.reschedule(id);
        }
        was_new
    }

    /// Delivers the cancellation condition for `id` if one is pending.
    ///
    /// Every runtime suspension future calls this at the top of its poll;
    /// long computations can call it through [`Cx::checkpoint`].
    ///
    /// [`Cx::checkpoint`]: crate::cx::Cx::checkpoint
    pub(crate) fn checkpoint(&mut self, id: TaskId) -> Result<(), Error> {
        let Some(rec) = self.tasks.get_mut(id.arena_index()) else {
            return Ok(());
        };
        match rec.take_cancel_delivery() {
            Some(reason) => {
                debug!(task = %id, %reason, "delivering cancellation");
                Err(Error::cancelled(reason))
            }
            None => Ok(()),
        }
    }

    // === Completion waiters ===

    pub(crate) fn add_task_waiter(&mut self, target: TaskId, waiter: TaskId) {
        if let Some(rec) = self.tasks.get_mut(target.arena_index()) {
            rec.add_waiter(waiter);
        }
    }

    pub(crate) fn remove_task_waiter(&mut self, target: TaskId, waiter: TaskId) {
        if let Some(rec) = self.tasks.get_mut(target.arena_index()) {
            rec.remove_waiter(waiter);
        }
    }

    /// Marks a task's completion as consumed by a joiner.
    pub(crate) fn observe(&mut self, id: TaskId) {
        if let Some(rec) = self.tasks.get_mut(id.arena_index()) {
            rec.observed = true;
        }
        self.try_reap(id);
    }

    pub(crate) fn mark_handle_dropped(&mut self, id: TaskId) {
        if let Some(rec) = self.tasks.get_mut(id.arena_index()) {
            rec.handle_dropped = true;
        }
        self.try_reap(id);
    }

    /// Reports an unobserved failure to the hook queue and prunes the record
    /// once nothing can reach it anymore.
    fn try_reap(&mut self, id: TaskId) {
        let Some(rec) = self.tasks.get(id.arena_index()) else {
            return;
        };
        if !rec.is_terminal() || !rec.handle_dropped || !rec.waiters.is_empty() {
            return;
        }
        let unreported = if rec.state == TaskState::Failed && !rec.observed {
            match &rec.completion {
                Some(Completion::Failed(e)) => Some(e.clone()),
                _ => None,
            }
        } else {
            None
        };
        if let Some(error) = unreported {
            self.unreported.push((id, error));
            if let Some(rec) = self.tasks.get_mut(id.arena_index()) {
                rec.observed = true;
            }
        }
        let prunable = self
            .tasks
            .get(id.arena_index())
            .is_some_and(TaskRecord::is_prunable);
        if prunable {
            trace!(task = %id, "task record pruned");
            self.tasks.remove(id.arena_index());
        }
    }

    /// Queues hook events for every terminal failure nobody consumed.
    /// Called once when the loop winds down.
    pub(crate) fn sweep_unobserved(&mut self) {
        let mut pending = Vec::new();
        for (_, rec) in self.tasks.iter_mut() {
            if rec.state == TaskState::Failed && !rec.observed {
                if let Some(Completion::Failed(e)) = &rec.completion {
                    pending.push((rec.id, e.clone()));
                }
                rec.observed = true;
            }
        }
        self.unreported.extend(pending);
    }

    pub(crate) fn set_hook(&mut self, hook: FailureHook) {
        self.hook = Some(hook);
    }

    /// Takes the hook and its queued events so the loop can run them without
    /// holding the core borrow.
    pub(crate) fn take_hook_work(&mut self) -> Option<(FailureHook, Vec<(TaskId, Error)>)> {
        if self.hook.is_none() || self.unreported.is_empty() {
            return None;
        }
        let hook = self.hook.take()?;
        let events = std::mem::take(&mut self.unreported);
        Some((hook, events))
    }

    pub(crate) fn restore_hook(&mut self, hook: FailureHook) {
        self.hook = Some(hook);
    }

    // === Timers ===

    pub(crate) fn insert_deadline(&mut self, wake: Time, task: TaskId) -> TimerKey {
        trace!(task = %task, at = %wake, "deadline armed");
        self.deadlines.insert(wake, task)
    }

    pub(crate) fn cancel_deadline(&mut self, key: TimerKey) {
        self.deadlines.cancel(key);
    }

    /// Moves every due deadline's task onto the ready queue, in ascending
    /// wake/FIFO order.
    pub(crate) fn expire_due(&mut self) {
        for task in self.deadlines.pop_due(self.now) {
            trace!(task = %task, "deadline fired");
            self.reschedule(task);
        }
    }

    pub(crate) fn next_wake(&mut self) -> Option<Time> {
        self.deadlines.next_wake()
    }

    // === Accounting ===

    /// Number of tasks that have not reached a terminal state.
    pub(crate) fn live_task_count(&self) -> usize {
        self.tasks.iter().filter(|(_, rec)| !rec.is_terminal()).count()
    }

    /// Ids of every live task; used by the shutdown sweep.
    pub(crate) fn live_task_ids(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|(_, rec)| !rec.is_terminal())
            .map(|(_, rec)| rec.id)
            .collect()
    }

    /// Takes every stored continuation out of the arena. Used when the loop
    /// is dropped with tasks still pending, so their destructors run without
    /// the core borrowed (and without keeping the `Rc` cycle alive).
    pub(crate) fn take_all_futures(&mut self) -> Vec<StoredTask> {
        self.tasks
            .iter_mut()
            .filter_map(|(_, rec)| rec.future.take())
            .collect()
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("tasks", &self.tasks.len())
            .field("ready", &self.ready.len())
            .field("deadlines", &self.deadlines.len())
            .field("now", &self.now)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}
