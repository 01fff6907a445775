use core::cell::RefCell;

use crate::buffer::BufferAllocator;
use crate::error::{CoreError, Result};

use super::{Channel, WriteSignal};

/// What a handler sees of its surroundings: the channel it belongs to and the facilities needed
/// to act without reaching back into global state — the allocator to acquire buffers from, and
/// (on `std` builds) the executor/timer to schedule follow-up work on.
///
/// Unlike Netty's `ChannelHandlerContext`, this `Context` does not itself provide "forward this
/// event to the next handler" methods — [`super::Pipeline`] drives propagation directly by
/// iterating its handler list and using each handler's return value, since an arena-indexed
/// pipeline can't safely hand a handler a live `&mut` back into the very list it's a node of.
/// A handler that wants to act on the channel (write, flush, schedule a timeout) does so through
/// this `Context`, not by recursing back into the pipeline.
pub trait Context: Send + Sync {
    fn channel(&self) -> &dyn Channel;

    fn buffer_pool(&self) -> &dyn BufferAllocator;

    /// Enqueues a write that bypasses the remaining outbound handler chain and goes straight to
    /// the channel — used by a handler that has already produced its final wire representation.
    fn write_direct(&self, msg: crate::buffer::PipelineMessage) -> Result<WriteSignal>;

    fn flush(&self) -> Result<()>;

    fn close_graceful(&self, deadline: Option<core::time::Duration>);

    /// Reports `cause` to the pipeline's exception path. A handler called with this `Context`
    /// (e.g. a codec's [`crate::codec::ByteToMessageDecoder`]) uses this instead of returning a
    /// `Result` it has nowhere to unwind to — [`super::Pipeline`] picks up whatever was reported
    /// once the handler call that recorded it returns, and fires it from there.
    fn fire_exception_caught(&self, cause: CoreError);
}

/// The concrete [`Context`] handed to every handler call: a thin borrow over the owning channel
/// and its allocator. One is constructed per propagation call rather than cached per-handler,
/// since it borrows the channel for the call's duration only.
pub struct HandlerContext<'a> {
    channel: &'a dyn Channel,
    buffer_pool: &'a dyn BufferAllocator,
    exception_sink: &'a RefCell<Option<CoreError>>,
}

impl<'a> HandlerContext<'a> {
    pub fn new(
        channel: &'a dyn Channel,
        buffer_pool: &'a dyn BufferAllocator,
        exception_sink: &'a RefCell<Option<CoreError>>,
    ) -> Self {
        Self { channel, buffer_pool, exception_sink }
    }
}

impl<'a> Context for HandlerContext<'a> {
    fn channel(&self) -> &dyn Channel {
        self.channel
    }

    fn buffer_pool(&self) -> &dyn BufferAllocator {
        self.buffer_pool
    }

    fn write_direct(&self, msg: crate::buffer::PipelineMessage) -> Result<WriteSignal> {
        self.channel.write(msg)
    }

    fn flush(&self) -> Result<()> {
        self.channel.flush()
    }

    fn close_graceful(&self, deadline: Option<core::time::Duration>) {
        self.channel.close_graceful(deadline);
    }

    fn fire_exception_caught(&self, cause: CoreError) {
        *self.exception_sink.borrow_mut() = Some(cause);
    }
}
