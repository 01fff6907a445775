//! Small shared vocabulary types used across the pipeline and runtime modules.
use alloc::sync::Arc;
use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicBool, Ordering};
use core::task::{Context as TaskContext, Poll, Waker};

use spin::Mutex;

use crate::sealed::Sealed;

/// A zero-sized placeholder used where a handler or task has no meaningful output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Empty;

/// Sealed conversion trait letting generic code accept either `()` or [`Empty`] as "no result".
pub trait IntoEmpty: Sealed {
    fn into_empty(self) -> Empty;
}

impl IntoEmpty for () {
    fn into_empty(self) -> Empty {
        Empty
    }
}

impl IntoEmpty for Empty {
    fn into_empty(self) -> Empty {
        self
    }
}

struct CompletionInner {
    done: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

/// A one-shot, multi-waiter completion signal: transports use this to back [`Channel::closed`]
/// without pulling in an executor of their own. `complete()` can be called from any thread (the
/// channel's own executor, typically); every [`CompletionFuture`] cloned from this handle wakes.
///
/// [`Channel::closed`]: crate::pipeline::Channel::closed
#[derive(Clone)]
pub struct Completion {
    inner: Arc<CompletionInner>,
}

impl Completion {
    pub fn new() -> Self {
        Self { inner: Arc::new(CompletionInner { done: AtomicBool::new(false), waker: Mutex::new(None) }) }
    }

    /// Marks the signal complete, waking whoever is polling [`Self::future`]. Idempotent.
    pub fn complete(&self) {
        self.inner.done.store(true, Ordering::Release);
        if let Some(waker) = self.inner.waker.lock().take() {
            waker.wake();
        }
    }

    pub fn is_complete(&self) -> bool {
        self.inner.done.load(Ordering::Acquire)
    }

    /// A future resolving once [`Self::complete`] has been called at least once.
    pub fn future(&self) -> CompletionFuture {
        CompletionFuture { inner: Arc::clone(&self.inner) }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CompletionFuture {
    inner: Arc<CompletionInner>,
}

impl Future for CompletionFuture {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<()> {
        if self.inner.done.load(Ordering::Acquire) {
            return Poll::Ready(());
        }
        *self.inner.waker.lock() = Some(cx.waker().clone());
        // Re-check after registering the waker to close the race against a `complete()` that ran
        // between the first load and the store above.
        if self.inner.done.load(Ordering::Acquire) {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}
