use std::collections::VecDeque;

/// Work the scheduler can run on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Repaginate,
}

/// Collapses bursts of change notifications into one repagination per tick.
///
/// A dirty flag guards the queue: `request()` enqueues only when nothing
/// is pending, so any number of edits between two ticks yields one task.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    pending: bool,
    queue: VecDeque<Task>,
    runs: u64,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when this call queued a new task.
    pub fn request(&mut self) -> bool {
        if self.pending {
            return false;
        }
        self.pending = true;
        self.queue.push_back(Task::Repaginate);
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Takes the task to run on this tick, if any. The flag clears before
    /// the task runs so edits made while it runs schedule another pass.
    pub fn take(&mut self) -> Option<Task> {
        let task = self.queue.pop_front()?;
        // duplicates cannot be queued, but drain anyway
        self.queue.clear();
        self.pending = false;
        self.runs += 1;
        Some(task)
    }

    /// Number of tasks handed out so far.
    pub fn runs(&self) -> u64 {
        self.runs
    }
}
