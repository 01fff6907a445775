use core::fmt;

/// Why a spawned task's result never arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskError {
    /// The task panicked while running.
    Panicked,
    /// The executor shut down before the task ran.
    Cancelled,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Panicked => f.write_str("task panicked"),
            TaskError::Cancelled => f.write_str("task cancelled before running"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TaskError {}

/// A future-like handle to a task's eventual result.
///
/// Built on `std::sync::mpsc` rather than a oneshot crate — the executor already depends on `mpsc`
/// for its task queue, and a join handle only ever needs one value, once, from one producer.
#[cfg(feature = "std")]
pub struct JoinHandle<T> {
    receiver: std::sync::mpsc::Receiver<core::result::Result<T, TaskError>>,
}

#[cfg(feature = "std")]
impl<T> JoinHandle<T> {
    pub(super) fn new(receiver: std::sync::mpsc::Receiver<core::result::Result<T, TaskError>>) -> Self {
        Self { receiver }
    }

    /// Blocks the calling thread until the task completes.
    ///
    /// Never call this from the same executor the task was spawned on — the task will never run
    /// because this call is occupying the very thread meant to drain its queue.
    pub fn join(self) -> core::result::Result<T, TaskError> {
        self.receiver.recv().unwrap_or(Err(TaskError::Cancelled))
    }

    /// Non-blocking poll for the result, without consuming the handle.
    pub fn try_join(&self) -> Option<core::result::Result<T, TaskError>> {
        self.receiver.try_recv().ok()
    }
}
