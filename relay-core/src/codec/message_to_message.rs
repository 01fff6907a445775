use alloc::vec::Vec;
use spin::Mutex;

use crate::buffer::PipelineMessage;
use crate::error::Result;
use crate::pipeline::{Context, InboundHandler, MiddlewareDescriptor};

/// A one-to-many transform from one decoded application message to the next protocol layer's
/// representation (e.g. turning a length-prefixed frame into a parsed request object).
///
/// Distinct from [`super::ByteToMessageDecoder`]: this operates on already-typed `User` messages,
/// not raw bytes, so it needs no cumulation buffer — each call receives exactly the message the
/// previous handler produced.
pub trait MessageToMessageTransform: Send {
    fn transform(&mut self, ctx: &dyn Context, msg: PipelineMessage, out: &mut Vec<PipelineMessage>) -> Result<()>;
}

/// Adapts a [`MessageToMessageTransform`] into an [`InboundHandler`].
///
/// Held behind a [`spin::Mutex`] for the same reason as [`super::ByteToMessageCodec`]: inbound
/// handler methods take `&self`.
pub struct MessageToMessageCodec<T: MessageToMessageTransform> {
    transform: Mutex<T>,
}

impl<T: MessageToMessageTransform> MessageToMessageCodec<T> {
    pub fn new(transform: T) -> Self {
        Self { transform: Mutex::new(transform) }
    }
}

impl<T: MessageToMessageTransform> InboundHandler for MessageToMessageCodec<T> {
    fn describe(&self) -> MiddlewareDescriptor {
        MiddlewareDescriptor { name: "message_to_message_codec" }
    }

    fn on_read(&self, ctx: &dyn Context, msg: PipelineMessage) -> PipelineMessage {
        let mut out = Vec::new();
        let mut transform = self.transform.lock();
        if let Err(err) = transform.transform(ctx, msg, &mut out) {
            tracing::warn!(target: "relay_core::codec", code = err.code(), "message transform failed");
        }
        PipelineMessage::Batch(out)
    }
}
