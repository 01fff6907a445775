use alloc::boxed::Box;
use core::any::Any;

use crate::buffer::PipelineMessage;
use crate::error::{CoreError, Result};
use crate::transport::TransportSocketAddr;

use super::{Context, WriteSignal};

/// A free-text description a handler can return from [`InboundHandler::describe`] /
/// [`OutboundHandler::describe`] for diagnostics (pipeline dumps, tracing spans).
#[derive(Debug, Clone, Copy)]
pub struct MiddlewareDescriptor {
    pub name: &'static str,
}

/// An application-defined event injected into the inbound chain outside the normal I/O flow
/// (idle-state notifications, TLS handshake completion, and the like).
pub struct UserEvent(Box<dyn Any + Send>);

impl UserEvent {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

/// Handles events flowing from the channel toward the application (head to tail).
///
/// All methods are synchronous: a handler that needs to do asynchronous work submits it to the
/// channel's executor via [`super::Context`] and returns once it has done so, rather than
/// blocking the event-loop thread.
pub trait InboundHandler: Send {
    fn describe(&self) -> MiddlewareDescriptor {
        MiddlewareDescriptor { name: "inbound_handler" }
    }

    /// Called once, when the channel is registered with its executor — before `bind`/`connect`
    /// has necessarily completed. [`crate::bootstrap::ChannelInitializer`] runs ahead of this
    /// event rather than reacting to it (see the design notes), but the event still fires so a
    /// handler added by the initializer can observe "I am now on the pipeline" independently.
    fn on_channel_registered(&self, _ctx: &dyn Context) {}

    /// Called once, when the channel has become active (after `bind`/`connect`/accept).
    fn on_channel_active(&self, _ctx: &dyn Context) {}

    /// Called for every inbound message. Returning the message unchanged forwards it to the next
    /// handler; returning a different message (or consuming it and producing a placeholder via
    /// [`PipelineMessage::user`]) performs the decode/transform step.
    fn on_read(&self, _ctx: &dyn Context, msg: PipelineMessage) -> PipelineMessage {
        msg
    }

    /// Called after a burst of `on_read` calls completes (e.g. one socket readiness event).
    fn on_read_complete(&self, _ctx: &dyn Context) {}

    /// Called when the channel's outbound writability flips (see backpressure water marks).
    fn on_writability_changed(&self, _ctx: &dyn Context, _writable: bool) {}

    /// Called for an application-injected [`UserEvent`].
    fn on_user_event(&self, _ctx: &dyn Context, _event: &UserEvent) {}

    /// Called when a prior handler (or this one) reported an exception. The default simply
    /// forwards it by doing nothing here and letting [`super::Pipeline::fire_exception_caught`]
    /// move to the next context — override to actually handle/log it and stop propagation.
    fn on_exception_caught(&self, _ctx: &dyn Context, _cause: &CoreError) {}

    /// Called once, when the channel has become inactive (after close).
    fn on_channel_inactive(&self, _ctx: &dyn Context) {}

    /// Called once, when the channel is deregistered from its executor (after `deregister`, or
    /// as part of teardown following `channel_inactive`).
    fn on_channel_unregistered(&self, _ctx: &dyn Context) {}

    /// Called once, immediately after this handler is inserted into a pipeline.
    fn on_handler_added(&self) {}

    /// Called once, immediately after this handler is removed from a pipeline.
    fn on_handler_removed(&self) {}
}

/// What an [`OutboundHandler::on_write`] implementation decided to do with a message.
pub enum WriteOutcome {
    /// This handler is the terminal point for the write (e.g. an encoder that produced bytes and
    /// wrote them further down itself); carries the resulting backpressure signal.
    Consumed(WriteSignal),
    /// Forward `PipelineMessage` (possibly transformed) to the next handler toward the channel.
    Forward(PipelineMessage),
}

/// Handles operations flowing from the application toward the channel (tail to head).
pub trait OutboundHandler: Send {
    fn describe(&self) -> MiddlewareDescriptor {
        MiddlewareDescriptor { name: "outbound_handler" }
    }

    /// Called for an outbound `bind`. Returning a different address lets a handler rewrite it;
    /// returning `Err` vetoes the bind and stops propagation before it reaches the channel.
    fn on_bind(&mut self, _ctx: &dyn Context, addr: TransportSocketAddr) -> Result<TransportSocketAddr> {
        Ok(addr)
    }

    /// Called for an outbound `connect`. Returning a different address lets a handler redirect
    /// it (e.g. a proxy handler rewriting the target); returning `Err` vetoes the connect.
    fn on_connect(&mut self, _ctx: &dyn Context, addr: TransportSocketAddr) -> Result<TransportSocketAddr> {
        Ok(addr)
    }

    /// Called for an outbound `disconnect`. The default is a no-op pass-through.
    fn on_disconnect(&mut self, _ctx: &dyn Context) -> Result<()> {
        Ok(())
    }

    /// Called for an outbound `deregister`. The default is a no-op pass-through.
    fn on_deregister(&mut self, _ctx: &dyn Context) -> Result<()> {
        Ok(())
    }

    /// Called for an outbound read-readiness signal. The default is a no-op pass-through.
    fn on_read_request(&mut self, _ctx: &dyn Context) -> Result<()> {
        Ok(())
    }

    /// Called for every outbound write. The default forwards the message unchanged.
    fn on_write(&mut self, _ctx: &dyn Context, msg: PipelineMessage) -> Result<WriteOutcome> {
        Ok(WriteOutcome::Forward(msg))
    }

    /// Called on flush. The default is a no-op pass-through.
    fn on_flush(&mut self, _ctx: &dyn Context) -> Result<()> {
        Ok(())
    }

    /// Called on graceful close with the caller's deadline, if any.
    fn on_close_graceful(&mut self, _ctx: &dyn Context, _deadline: Option<core::time::Duration>) -> Result<()> {
        Ok(())
    }

    /// Called once, immediately after this handler is inserted into a pipeline.
    fn on_handler_added(&self) {}

    /// Called once, immediately after this handler is removed from a pipeline.
    fn on_handler_removed(&self) {}
}

/// A handler implementing both directions at once, for codecs and protocol state machines that
/// naturally need to see both inbound and outbound traffic (e.g. a framing layer).
pub trait DuplexHandler: InboundHandler + OutboundHandler {}

impl<T: InboundHandler + OutboundHandler> DuplexHandler for T {}

/// Precomputed bitmap of which inbound/outbound methods a context's handler actually overrides,
/// letting [`super::Pipeline`] skip calling through a handler that would just pass the event on.
///
/// This crate cannot detect Rust trait-method overrides at compile time the way a vtable-diffing
/// implementation in a language with runtime reflection could; instead a handler opts out of the
/// default (pass-through) behavior for a given method by returning `false` from the matching
/// `wants_*` override, computed once at `add_*` time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipFlags {
    pub inbound_active: bool,
    pub inbound_read: bool,
    pub inbound_read_complete: bool,
    pub inbound_inactive: bool,
    pub outbound_write: bool,
}

impl SkipFlags {
    pub(super) fn compute(
        inbound: Option<&dyn InboundHandler>,
        outbound: Option<&dyn OutboundHandler>,
    ) -> Self {
        Self {
            inbound_active: inbound.is_none(),
            inbound_read: inbound.is_none(),
            inbound_read_complete: inbound.is_none(),
            inbound_inactive: inbound.is_none(),
            outbound_write: outbound.is_none(),
        }
    }
}
