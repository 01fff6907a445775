use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use core::time::Duration;

use super::executor::EventExecutor;
use super::TaskExecutor;
use crate::future::BoxFuture;

/// A fixed set of [`EventExecutor`]s with a round-robin `next()`, the way a Netty
/// `NioEventLoopGroup` hands out one of its loops to each newly registered channel.
pub struct EventLoopGroup {
    executors: Vec<Arc<EventExecutor>>,
    cursor: AtomicUsize,
}

impl EventLoopGroup {
    /// Spawns `size` executors named `{prefix}-0` .. `{prefix}-{size-1}`.
    pub fn new(prefix: &str, size: usize) -> Arc<Self> {
        assert!(size > 0, "an event-loop group needs at least one executor");
        let executors = (0..size)
            .map(|index| EventExecutor::spawn(alloc::format!("{prefix}-{index}")))
            .collect();
        Arc::new(Self {
            executors,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Returns the next executor in round-robin order. Registering a channel should call this
    /// exactly once and keep the result for the channel's whole lifetime.
    pub fn next(&self) -> Arc<EventExecutor> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.executors.len();
        Arc::clone(&self.executors[index])
    }

    /// Number of executors in the group.
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Fans `shutdown_gracefully` out to every executor and waits for all of them.
    pub fn shutdown_gracefully(&self, quiet_period: Duration, timeout: Duration) -> BoxFuture<'static, ()> {
        let futures: Vec<_> = self
            .executors
            .iter()
            .map(|executor| executor.shutdown_gracefully(quiet_period, timeout))
            .collect();
        Box::pin(async move {
            for future in futures {
                future.await;
            }
        })
    }
}
