use alloc::boxed::Box;
use core::cmp::Ordering;
use core::time::Duration;

/// Opaque handle to a scheduled task, returned by [`super::TaskExecutor::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub(super) u64);

/// A task paired with the deadline it should run at, ordered for a min-heap (earliest first).
///
/// `std::collections::BinaryHeap` is a max-heap, so [`Ord`] is implemented reversed — the smallest
/// `deadline` compares as `Greater` — letting the executor just call `peek`/`pop` for "next due".
pub(super) struct ScheduledTask {
    pub(super) deadline: Duration,
    pub(super) id: TimerId,
    pub(super) task: Box<dyn FnOnce() + Send>,
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}
impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.0.cmp(&self.id.0))
    }
}
