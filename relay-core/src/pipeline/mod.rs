//! The handler chain: a doubly-linked list of [`Context`]s propagating inbound events tail-ward
//! and outbound operations head-ward.
//!
//! # Why
//! This is the framework's centerpiece. Every other component — the channel, the executor, the
//! buffer pool — exists to feed bytes into this chain and carry its output back out to a socket.
//!
//! # How
//! [`Pipeline`] owns an arena of context nodes (`Vec<PipelineNode>`) rather than a literal
//! pointer-linked list — intrusive cyclic references are awkward in safe Rust, and an index-based
//! arena gives the same O(1) insert/remove/traversal without `unsafe`. Two sentinel nodes, head and
//! tail, are always present: head turns outbound operations into real I/O by calling straight
//! through to the owning [`Channel`]; tail is the default inbound terminator (drops unconsumed
//! buffers, logs exceptions).
mod channel;
mod context;
mod extensions;
mod handler;

pub use channel::{Channel, ChannelState, WriteSignal};
pub use context::{Context, HandlerContext};
pub use extensions::ExtensionsMap;
pub use handler::{
    DuplexHandler, InboundHandler, MiddlewareDescriptor, OutboundHandler, SkipFlags, UserEvent,
    WriteOutcome,
};

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::time::Duration;

use crate::buffer::{BufferAllocator, PipelineMessage};
use crate::error::{CoreError, Result, codes};
use crate::transport::TransportSocketAddr;

struct PipelineNode {
    name: String,
    inbound: Option<Box<dyn InboundHandler>>,
    outbound: Option<Box<dyn OutboundHandler>>,
    skip: SkipFlags,
}

/// The handler chain attached to one [`Channel`].
///
/// Insertion order is head-to-tail; `fire_*` methods walk from head toward tail for inbound
/// events and the reverse for outbound operations, skipping any node whose [`SkipFlags`] say it
/// doesn't override the method being propagated.
pub struct Pipeline {
    nodes: Vec<PipelineNode>,
    channel: Arc<dyn Channel>,
    buffer_pool: Arc<dyn BufferAllocator>,
    // Written through `Context::fire_exception_caught` by a handler that has no other way to
    // unwind an error (e.g. a codec's `on_read`, which returns a `PipelineMessage`, not a
    // `Result`); drained and actually propagated once the borrow on `context()` that let the
    // handler reach it has ended.
    exception_sink: core::cell::RefCell<Option<CoreError>>,
}

impl Pipeline {
    /// Creates a pipeline for `channel` with just the head/tail sentinels installed.
    pub fn new(channel: Arc<dyn Channel>, buffer_pool: Arc<dyn BufferAllocator>) -> Self {
        Self { nodes: Vec::new(), channel, buffer_pool, exception_sink: core::cell::RefCell::new(None) }
    }

    fn context(&self) -> HandlerContext<'_> {
        HandlerContext::new(self.channel.as_ref(), self.buffer_pool.as_ref(), &self.exception_sink)
    }

    /// Fires whatever exception a handler reported through `Context::fire_exception_caught`
    /// during the call this `ctx` was used for, if any. Call after `ctx`'s borrow has ended.
    fn fire_pending_exception(&mut self) {
        let Some(cause) = self.exception_sink.get_mut().take() else { return };
        self.fire_exception_caught(None, cause);
    }

    /// The channel this pipeline belongs to.
    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    fn position_of(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.name == name)
    }

    /// Appends a handler at the tail end (closest to the socket for outbound, farthest for
    /// inbound — i.e. it sees inbound events last and outbound operations first).
    pub fn add_last(
        &mut self,
        name: impl Into<String>,
        inbound: Option<Box<dyn InboundHandler>>,
        outbound: Option<Box<dyn OutboundHandler>>,
    ) -> Result<()> {
        let name = name.into();
        if self.position_of(&name).is_some() {
            return Err(CoreError::new(
                codes::PIPELINE_DUPLICATE_HANDLER,
                alloc::format!("handler '{name}' already present"),
            ));
        }
        let skip = SkipFlags::compute(inbound.as_deref(), outbound.as_deref());
        if let Some(handler) = inbound.as_deref() {
            handler.on_handler_added();
        }
        if let Some(handler) = outbound.as_deref() {
            handler.on_handler_added();
        }
        self.nodes.push(PipelineNode { name, inbound, outbound, skip });
        Ok(())
    }

    /// Inserts a handler right before the first (i.e. closest to head) occurrence of `before`.
    pub fn add_before(
        &mut self,
        before: &str,
        name: impl Into<String>,
        inbound: Option<Box<dyn InboundHandler>>,
        outbound: Option<Box<dyn OutboundHandler>>,
    ) -> Result<()> {
        let name = name.into();
        if self.position_of(&name).is_some() {
            return Err(CoreError::new(
                codes::PIPELINE_DUPLICATE_HANDLER,
                alloc::format!("handler '{name}' already present"),
            ));
        }
        let index = self.position_of(before).ok_or_else(|| {
            CoreError::new(
                codes::PIPELINE_HANDLER_NOT_FOUND,
                alloc::format!("no handler named '{before}'"),
            )
        })?;
        let skip = SkipFlags::compute(inbound.as_deref(), outbound.as_deref());
        if let Some(handler) = inbound.as_deref() {
            handler.on_handler_added();
        }
        if let Some(handler) = outbound.as_deref() {
            handler.on_handler_added();
        }
        self.nodes.insert(index, PipelineNode { name, inbound, outbound, skip });
        Ok(())
    }

    /// Removes a handler by name, firing its `on_handler_removed` lifecycle hook.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let index = self.position_of(name).ok_or_else(|| {
            CoreError::new(
                codes::PIPELINE_HANDLER_NOT_FOUND,
                alloc::format!("no handler named '{name}'"),
            )
        })?;
        let node = self.nodes.remove(index);
        if let Some(handler) = node.inbound.as_deref() {
            handler.on_handler_removed();
        }
        if let Some(handler) = node.outbound.as_deref() {
            handler.on_handler_removed();
        }
        Ok(())
    }

    /// Whether a handler of this name is currently installed.
    pub fn contains(&self, name: &str) -> bool {
        self.position_of(name).is_some()
    }

    /// Propagates `channel_registered` starting at the head. Fired once a channel has joined its
    /// executor, ahead of `channel_active` — see the design notes for why the initializer itself
    /// runs before this rather than reacting to it.
    pub fn fire_channel_registered(&mut self) {
        let ctx = self.context();
        for index in 0..self.nodes.len() {
            if let Some(handler) = self.nodes[index].inbound.as_deref() {
                handler.on_channel_registered(&ctx);
            }
        }
    }

    /// Propagates `channel_unregistered` starting at the head. Fired once a channel has left its
    /// executor's I/O registration, typically right after `channel_inactive`.
    pub fn fire_channel_unregistered(&mut self) {
        let ctx = self.context();
        for index in 0..self.nodes.len() {
            if let Some(handler) = self.nodes[index].inbound.as_deref() {
                handler.on_channel_unregistered(&ctx);
            }
        }
    }

    /// Propagates `channel_active` starting at the head.
    pub fn fire_channel_active(&mut self) {
        let ctx = self.context();
        for index in 0..self.nodes.len() {
            if self.nodes[index].skip.inbound_active {
                continue;
            }
            if let Some(handler) = self.nodes[index].inbound.as_deref() {
                handler.on_channel_active(&ctx);
            }
        }
    }

    /// Propagates `channel_inactive` starting at the head.
    pub fn fire_channel_inactive(&mut self) {
        let ctx = self.context();
        for index in 0..self.nodes.len() {
            if self.nodes[index].skip.inbound_inactive {
                continue;
            }
            if let Some(handler) = self.nodes[index].inbound.as_deref() {
                handler.on_channel_inactive(&ctx);
            }
        }
    }

    /// Propagates an inbound message starting at the head.
    ///
    /// A handler that produces [`PipelineMessage::Batch`] (a frame decoder draining several
    /// complete frames out of one read) has each item re-queued to continue from the handler right
    /// after it, rather than every downstream handler needing to know batches exist — the same
    /// effect as Netty's decoders calling `ctx.fireChannelRead` once per decoded object.
    pub fn fire_channel_read(&mut self, msg: PipelineMessage) {
        let ctx = self.context();
        let mut queue: VecDeque<(usize, PipelineMessage)> = VecDeque::new();
        queue.push_back((0, msg));
        while let Some((mut index, mut msg)) = queue.pop_front() {
            loop {
                if self.nodes[index..].is_empty() {
                    // Tail default: an unconsumed `Buffer` is released; `User` is simply dropped.
                    if let PipelineMessage::Buffer(buf) = msg {
                        buf.release();
                    }
                    break;
                }
                if !self.nodes[index].skip.inbound_read {
                    if let Some(handler) = self.nodes[index].inbound.as_deref() {
                        msg = handler.on_read(&ctx, msg);
                    }
                }
                if let PipelineMessage::Batch(items) = msg {
                    for item in items {
                        queue.push_back((index + 1, item));
                    }
                    break;
                }
                index += 1;
            }
        }
        self.fire_pending_exception();
    }

    /// Propagates `channel_read_complete` starting at the head.
    pub fn fire_channel_read_complete(&mut self) {
        let ctx = self.context();
        for index in 0..self.nodes.len() {
            if self.nodes[index].skip.inbound_read_complete {
                continue;
            }
            if let Some(handler) = self.nodes[index].inbound.as_deref() {
                handler.on_read_complete(&ctx);
            }
        }
    }

    /// Propagates `channel_writability_changed` starting at the head.
    pub fn fire_writability_changed(&mut self, writable: bool) {
        let ctx = self.context();
        for index in 0..self.nodes.len() {
            if let Some(handler) = self.nodes[index].inbound.as_deref() {
                handler.on_writability_changed(&ctx, writable);
            }
        }
    }

    /// Propagates a user-defined event starting at the head.
    pub fn fire_user_event(&mut self, event: UserEvent) {
        let ctx = self.context();
        for index in 0..self.nodes.len() {
            if let Some(handler) = self.nodes[index].inbound.as_deref() {
                handler.on_user_event(&ctx, &event);
            }
        }
    }

    /// Fires `exception_caught` starting from `from_index + 1`, or from the head if `None`.
    pub fn fire_exception_caught(&mut self, from_index: Option<usize>, cause: CoreError) {
        let ctx = self.context();
        let start = from_index.map(|i| i + 1).unwrap_or(0);
        for index in start..self.nodes.len() {
            if let Some(handler) = self.nodes[index].inbound.as_deref() {
                handler.on_exception_caught(&ctx, &cause);
                return;
            }
        }
        tracing::warn!(target: "relay_core::pipeline", code = cause.code(), "unhandled exception reached pipeline tail");
    }

    /// Propagates an outbound `bind` tail-ward, letting each outbound handler rewrite the target
    /// address (or veto the call by returning an error) before it reaches the channel.
    pub fn fire_bind(&mut self, mut addr: TransportSocketAddr) -> Result<()> {
        let ctx = self.context();
        for index in (0..self.nodes.len()).rev() {
            if let Some(handler) = self.nodes[index].outbound.as_mut() {
                addr = handler.on_bind(&ctx, addr)?;
            }
        }
        self.channel.bind(addr)
    }

    /// Propagates an outbound `connect` tail-ward, letting each outbound handler rewrite the
    /// target address (or veto the call) before it reaches the channel.
    pub fn fire_connect(&mut self, mut addr: TransportSocketAddr) -> Result<()> {
        let ctx = self.context();
        for index in (0..self.nodes.len()).rev() {
            if let Some(handler) = self.nodes[index].outbound.as_mut() {
                addr = handler.on_connect(&ctx, addr)?;
            }
        }
        self.channel.connect(addr)
    }

    /// Propagates an outbound `disconnect` tail-ward.
    pub fn fire_disconnect(&mut self) -> Result<()> {
        let ctx = self.context();
        for index in (0..self.nodes.len()).rev() {
            if let Some(handler) = self.nodes[index].outbound.as_mut() {
                handler.on_disconnect(&ctx)?;
            }
        }
        self.channel.disconnect()
    }

    /// Propagates an outbound `deregister` tail-ward.
    pub fn fire_deregister(&mut self) -> Result<()> {
        let ctx = self.context();
        for index in (0..self.nodes.len()).rev() {
            if let Some(handler) = self.nodes[index].outbound.as_mut() {
                handler.on_deregister(&ctx)?;
            }
        }
        self.channel.deregister();
        Ok(())
    }

    /// Propagates an outbound read-readiness signal tail-ward (see `ChannelOptions::auto_read`).
    pub fn fire_read(&mut self) -> Result<()> {
        let ctx = self.context();
        for index in (0..self.nodes.len()).rev() {
            if let Some(handler) = self.nodes[index].outbound.as_mut() {
                handler.on_read_request(&ctx)?;
            }
        }
        self.channel.read();
        Ok(())
    }

    /// Propagates a write tail-ward (reverse order), stopping at the first handler overriding
    /// `on_write`. Returns that handler's [`WriteSignal`], or `Accepted` if none do (the head
    /// sentinel always accepts on behalf of the real socket write, modeled by the channel itself).
    pub fn fire_write(&mut self, mut msg: PipelineMessage) -> Result<WriteSignal> {
        let ctx = self.context();
        for index in (0..self.nodes.len()).rev() {
            if self.nodes[index].skip.outbound_write {
                continue;
            }
            if let Some(handler) = self.nodes[index].outbound.as_mut() {
                match handler.on_write(&ctx, msg)? {
                    WriteOutcome::Consumed(signal) => return Ok(signal),
                    WriteOutcome::Forward(forwarded) => msg = forwarded,
                }
            }
        }
        self.channel.write(msg)
    }

    /// Propagates a flush tail-ward.
    pub fn fire_flush(&mut self) -> Result<()> {
        let ctx = self.context();
        for index in (0..self.nodes.len()).rev() {
            if let Some(handler) = self.nodes[index].outbound.as_mut() {
                handler.on_flush(&ctx)?;
            }
        }
        self.channel.flush()
    }

    /// Propagates a graceful close tail-ward.
    pub fn fire_close_graceful(&mut self, deadline: Option<Duration>) -> Result<()> {
        let ctx = self.context();
        for index in (0..self.nodes.len()).rev() {
            if let Some(handler) = self.nodes[index].outbound.as_mut() {
                handler.on_close_graceful(&ctx, deadline)?;
            }
        }
        self.channel.close_graceful(deadline);
        Ok(())
    }
}
