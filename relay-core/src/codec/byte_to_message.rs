use alloc::boxed::Box;
use alloc::vec::Vec;
use spin::Mutex;

use crate::buffer::{ByteBuffer, PipelineMessage, ReadableBuffer, WritableBuffer};
use crate::error::{CoreError, Result, codes};
use crate::pipeline::{Context, InboundHandler, MiddlewareDescriptor};

/// A protocol's frame-decoding step: given everything read so far that hasn't been consumed yet,
/// emit zero or more complete messages into `out` and advance `input`'s reader index past whatever
/// was consumed. Called repeatedly by [`ByteToMessageCodec`] until a call makes no progress.
pub trait ByteToMessageDecoder: Send {
    fn decode(
        &mut self,
        ctx: &dyn Context,
        input: &mut dyn ByteBuffer,
        out: &mut Vec<PipelineMessage>,
    ) -> Result<()>;

    /// Called once when the channel goes inactive with whatever bytes remain undecoded — a
    /// decoder for a protocol with implicit framing (e.g. length-delimited-by-EOF) can still
    /// produce a final message here. The default silently discards leftover bytes.
    fn decode_last(
        &mut self,
        _ctx: &dyn Context,
        _input: &mut dyn ByteBuffer,
        _out: &mut Vec<PipelineMessage>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Adapts a [`ByteToMessageDecoder`] into an [`InboundHandler`], owning the cumulation buffer the
/// decoder reads from.
///
/// Incoming `Buffer` messages are appended to an internally-held cumulation buffer rather than
/// decoded in place, because a frame boundary can fall anywhere relative to one socket read — the
/// classic case this exists for is a length-prefixed frame split across two reads. Whatever the
/// decoder doesn't consume is compacted (copied forward) after each call so the cumulation buffer
/// doesn't grow unboundedly across many small reads.
///
/// [`InboundHandler`] methods take `&self` — a node's inbound and outbound slots are both reached
/// through a shared reference during propagation — so this handler's mutable state (the decoder
/// and the cumulation buffer) lives behind a [`spin::Mutex`] rather than as a plain field.
pub struct ByteToMessageCodec<D: ByteToMessageDecoder> {
    decoder: Mutex<D>,
    cumulation: Mutex<Option<Box<dyn ByteBuffer>>>,
}

impl<D: ByteToMessageDecoder> ByteToMessageCodec<D> {
    pub fn new(decoder: D) -> Self {
        Self { decoder: Mutex::new(decoder), cumulation: Mutex::new(None) }
    }

    fn append(&self, ctx: &dyn Context, incoming: Box<dyn ReadableBuffer>) -> Result<()> {
        let mut incoming = incoming;
        let remaining = incoming.remaining();
        let bytes = incoming.read_slice(remaining)?;
        incoming.release();

        let mut slot = self.cumulation.lock();
        let mut cumulation = match slot.take() {
            Some(buf) => buf,
            None => ctx.buffer_pool().acquire(remaining.max(256), usize::MAX),
        };
        cumulation.put_slice(&bytes)?;
        *slot = Some(cumulation);
        Ok(())
    }

    /// Compacts the cumulation buffer by copying its unread tail into fresh storage, dropping the
    /// already-decoded prefix so repeated appends don't grow it forever.
    fn compact(&self, ctx: &dyn Context) -> Result<()> {
        let mut slot = self.cumulation.lock();
        let Some(mut cumulation) = slot.take() else { return Ok(()) };
        let remaining = cumulation.remaining();
        if remaining == 0 {
            return Ok(());
        }
        let leftover = cumulation.read_slice(remaining)?;
        let mut fresh = ctx.buffer_pool().acquire(leftover.len().max(256), usize::MAX);
        fresh.put_slice(&leftover)?;
        *slot = Some(fresh);
        Ok(())
    }

    fn run_decode(&self, ctx: &dyn Context, out: &mut Vec<PipelineMessage>) -> Result<()> {
        let mut slot = self.cumulation.lock();
        let Some(cumulation) = slot.as_mut() else { return Ok(()) };
        let mut decoder = self.decoder.lock();
        loop {
            let before = cumulation.remaining();
            if before == 0 {
                break;
            }
            let produced_before = out.len();
            decoder.decode(ctx, &mut **cumulation, out)?;
            let made_progress = cumulation.remaining() != before || out.len() != produced_before;
            if !made_progress {
                break;
            }
        }
        Ok(())
    }
}

impl<D: ByteToMessageDecoder> InboundHandler for ByteToMessageCodec<D> {
    fn describe(&self) -> MiddlewareDescriptor {
        MiddlewareDescriptor { name: "byte_to_message_codec" }
    }

    fn on_read(&self, ctx: &dyn Context, msg: PipelineMessage) -> PipelineMessage {
        let incoming = match msg {
            PipelineMessage::Buffer(buf) => buf,
            // A codec placed after another codec sees already-decoded `User`/`Batch` messages —
            // pass those through untouched rather than silently dropping them.
            other => return other,
        };
        if let Err(err) = self.append(ctx, incoming) {
            tracing::warn!(target: "relay_core::codec", code = err.code(), "failed to append to cumulation buffer");
            ctx.fire_exception_caught(
                CoreError::new(codes::CODEC_DECODER_EXCEPTION, "failed to append to cumulation buffer")
                    .with_cause(err),
            );
            return PipelineMessage::Batch(Vec::new());
        }
        let mut out = Vec::new();
        if let Err(err) = self.run_decode(ctx, &mut out) {
            tracing::warn!(target: "relay_core::codec", code = err.code(), "decoder failed, dropping cumulation");
            let _ = self.cumulation.lock().take();
            ctx.fire_exception_caught(
                CoreError::new(codes::CODEC_DECODER_EXCEPTION, "decoder failed").with_cause(err),
            );
            return PipelineMessage::Batch(out);
        }
        if let Err(err) = self.compact(ctx) {
            tracing::warn!(target: "relay_core::codec", code = err.code(), "cumulation compaction failed");
        }
        PipelineMessage::Batch(out)
    }

    fn on_channel_inactive(&self, ctx: &dyn Context) {
        let mut slot = self.cumulation.lock();
        if let Some(mut cumulation) = slot.take() {
            let mut out = Vec::new();
            let mut decoder = self.decoder.lock();
            let _ = decoder.decode_last(ctx, &mut *cumulation, &mut out);
            drop(decoder);
            // Final undecoded frames (if any) have nowhere left to propagate to through this
            // handler's `&self`-only API; a protocol that needs this should override
            // `decode_last` to hand them to the application through another channel (logging,
            // a shared queue) rather than relying on pipeline propagation at shutdown.
            for message in out {
                if let PipelineMessage::Buffer(buf) = message {
                    buf.release();
                }
            }
        }
    }
}
