use crate::buffer::{ByteBuffer, PipelineMessage};
use crate::error::Result;
use crate::pipeline::{Context, MiddlewareDescriptor, OutboundHandler, WriteOutcome};

/// A protocol's frame-encoding step: serializes an application message directly into `out`.
pub trait MessageToByteEncoder: Send {
    fn encode(&mut self, ctx: &dyn Context, msg: PipelineMessage, out: &mut dyn ByteBuffer) -> Result<()>;
}

/// Adapts a [`MessageToByteEncoder`] into an [`OutboundHandler`] by acquiring a fresh buffer from
/// the channel's allocator for each outbound message and handing the channel the encoded bytes.
pub struct MessageToByteCodec<E: MessageToByteEncoder> {
    encoder: E,
}

impl<E: MessageToByteEncoder> MessageToByteCodec<E> {
    pub fn new(encoder: E) -> Self {
        Self { encoder }
    }
}

impl<E: MessageToByteEncoder> OutboundHandler for MessageToByteCodec<E> {
    fn describe(&self) -> MiddlewareDescriptor {
        MiddlewareDescriptor { name: "message_to_byte_codec" }
    }

    fn on_write(&mut self, ctx: &dyn Context, msg: PipelineMessage) -> Result<WriteOutcome> {
        if let PipelineMessage::Buffer(_) = &msg {
            // Already bytes — a prior encoder further toward the channel already ran.
            return Ok(WriteOutcome::Forward(msg));
        }
        let mut buf = ctx.buffer_pool().acquire(64, usize::MAX);
        self.encoder.encode(ctx, msg, &mut *buf)?;
        let signal = ctx.write_direct(PipelineMessage::Buffer(buf))?;
        Ok(WriteOutcome::Consumed(signal))
    }
}
