//! Reference-counted, dual-index byte buffers and the pool that hands them out.
//!
//! # Why
//! Every handler in a pipeline passes bytes to the next one without copying; the buffer has to
//! carry its own lifetime (a refcount) rather than rely purely on the borrow checker, because
//! handlers may retain a buffer across multiple `channel_read` invocations (the cumulation buffer
//! used by [`crate::codec::ByteToMessageDecoder`] both appends newly-arrived bytes and consumes a
//! decoded prefix on the very same instance).
//!
//! # How
//! [`Buf`] is the one concrete buffer type: a `Vec<u8>`-backed region with independent
//! `reader_index`/`writer_index` behind an `Arc`. [`ReadableBuffer::retain`] shares that `Arc`
//! directly — a true zero-copy view at the same indices, bumping the logical refcount rather than
//! Rust's own strong count. [`ReadableBuffer::split_to`] is deliberately *not* zero-copy: it copies
//! the taken bytes into their own freshly-owned `Buf` rather than tracking a sub-range into shared,
//! mutable, growable storage, which would need per-view byte ranges this crate doesn't implement.
//! There is no `slice`/`duplicate` method — `retain` (same view) and `split_to` (independent copy)
//! are the only two ways to get a second handle on a buffer's bytes. [`ReadableBuffer`] and
//! [`WritableBuffer`] are the object-safe traits handlers are written against; [`ByteBuffer`] is
//! their object-safe union, which is what [`BufferAllocator::acquire`] hands back — a fresh buffer
//! is simultaneously readable (empty) and writable (full remaining capacity).
mod message;
mod pool;
mod readable;
mod writable;

pub use message::{Bytes, PipelineMessage};
pub use pool::{BufferPool, FixedClassPool, PoolStatisticsView};
pub use readable::{Buf, ReadableBuffer};
pub use writable::WritableBuffer;

use alloc::boxed::Box;
use crate::sealed::Sealed;

/// Object-safe union of [`ReadableBuffer`] and [`WritableBuffer`] — what a buffer looks like
/// before either side of it has been specialized away.
pub trait ByteBuffer: ReadableBuffer + WritableBuffer {}

impl<T: ReadableBuffer + WritableBuffer + ?Sized> ByteBuffer for T {}

/// Type-erased allocator handle, object-safe enough to live behind `&dyn` in a pipeline
/// [`crate::pipeline::Context`] rather than as a generic parameter threaded through every handler.
pub trait BufferAllocator: Sealed {
    /// Acquires a buffer with `initial` bytes of starting capacity, growable up to `max_capacity`.
    fn acquire(&self, initial: usize, max_capacity: usize) -> Box<dyn ByteBuffer>;
}

impl<T: BufferPool> BufferAllocator for T {
    fn acquire(&self, initial: usize, max_capacity: usize) -> Box<dyn ByteBuffer> {
        Box::new(self.acquire_buf(initial, max_capacity))
    }
}
