//! The single-threaded event executor and the group that round-robins channels across several.
//!
//! # Why
//! A channel's handlers must never run concurrently with each other (see the pipeline's
//! serialization invariant); the cheapest way to guarantee that in safe Rust is to pin every
//! channel to exactly one OS thread for its whole lifetime and route all work for it through that
//! thread's task queue, the way Netty pins a channel to one `EventLoop`.
#[cfg(feature = "std")]
mod executor;
#[cfg(feature = "std")]
mod group;
mod task;
mod timer;

#[cfg(feature = "std")]
pub use executor::{EventExecutor, ExecutorState};
#[cfg(feature = "std")]
pub use group::EventLoopGroup;
pub use task::TaskError;
#[cfg(feature = "std")]
pub use task::JoinHandle;
pub use timer::TimerId;

use crate::error::Result;
use crate::future::BoxFuture;
use crate::sealed::Sealed;
use core::time::Duration;

/// Object-safe handle to a single-threaded task runner.
///
/// # Contract
/// - `execute` is thread-safe and never blocks the caller; if the caller is already
///   [`Self::in_event_loop`], implementations are free to run the task inline.
/// - Relative submission order from any one caller thread is preserved; interleaving between
///   distinct caller threads is unspecified beyond that.
#[cfg(feature = "std")]
pub trait TaskExecutor: Sealed + Send + Sync {
    /// Submits a task to run on this executor's thread. Never blocks.
    fn execute(&self, task: Box<dyn FnOnce() + Send>) -> Result<()>;

    /// Submits a task to run after `delay` has elapsed, ordered against other scheduled tasks by
    /// deadline. Returns an id that [`TimeDriver::cancel_scheduled`] can use to cancel it.
    fn schedule(&self, task: Box<dyn FnOnce() + Send>, delay: Duration) -> Result<TimerId>;

    /// `true` if the calling thread *is* this executor's dedicated thread.
    fn in_event_loop(&self) -> bool;

    /// Current lifecycle state.
    fn state(&self) -> ExecutorState;

    /// Begins graceful shutdown: stops accepting new arbitrary tasks, keeps draining the queue
    /// until `quiet_period` has passed with nothing submitted or `timeout` elapses, then
    /// transitions to `Shutdown`. The returned future resolves once that transition completes.
    fn shutdown_gracefully(&self, quiet_period: Duration, timeout: Duration) -> BoxFuture<'static, ()>;
}

/// The timer half of an executor: scheduling and cancelling delayed work.
#[cfg(feature = "std")]
pub trait TimeDriver: Sealed + Send + Sync {
    /// Cancels a previously scheduled task. Returns `false` if it already ran or doesn't exist.
    fn cancel_scheduled(&self, id: TimerId) -> bool;
}
