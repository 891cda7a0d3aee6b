//! Type-safe identifiers for runtime entities.
//!
//! A [`TaskId`] wraps an arena index with a generation counter, so a stale id
//! held by a waiter list or deadline entry can never be confused with a newer
//! task that reused the same slot.

use crate::util::ArenaIndex;
use core::fmt;

/// A unique identifier for a task owned by the event loop.
///
/// Handles, waiter lists and deadline entries all refer to tasks by id, never
/// by pointer; the owning arena validates the generation on every lookup.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) ArenaIndex);

impl TaskId {
    pub(crate) const fn from_arena(index: ArenaIndex) -> Self {
        Self(index)
    }

    pub(crate) const fn arena_index(self) -> ArenaIndex {
        self.0
    }

    /// Creates a task id for unit tests that need a stand-in value.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(index: u32, generation: u32) -> Self {
        Self(ArenaIndex::new(index, generation))
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({}:{})", self.0.index(), self.0.generation())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0.index())
    }
}
