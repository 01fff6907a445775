use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use super::readable::ReadableBuffer;

/// Owned byte vector, used where a copy out of a pooled buffer is the simplest correct choice
/// (e.g. [`ReadableBuffer::read_slice`]).
pub type Bytes = Vec<u8>;

/// The one payload type that travels through a pipeline.
///
/// A handler either works with raw bytes (`Buffer`) — the universal currency between the socket
/// and the first decoder — or with an already-decoded application object (`User`), once a codec
/// has turned bytes into something typed. `Any` erasure is unavoidable here: the pipeline has no
/// way to know the application's message types ahead of time.
pub enum PipelineMessage {
    Buffer(Box<dyn ReadableBuffer>),
    User(Box<dyn Any + Send>),
    /// Several messages produced from one inbound call (e.g. a frame decoder draining multiple
    /// complete frames out of one cumulation buffer). [`super::super::pipeline::Pipeline`] unpacks
    /// this and re-propagates each item through the handlers downstream of whoever produced it,
    /// rather than every handler needing to know batches exist.
    Batch(Vec<PipelineMessage>),
}

impl fmt::Debug for PipelineMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineMessage::Buffer(buf) => f
                .debug_struct("PipelineMessage::Buffer")
                .field("remaining", &buf.remaining())
                .finish(),
            PipelineMessage::User(_) => f.write_str("PipelineMessage::User(..)"),
            PipelineMessage::Batch(items) => {
                f.debug_tuple("PipelineMessage::Batch").field(&items.len()).finish()
            }
        }
    }
}

impl PipelineMessage {
    /// Convenience constructor for a typed application message.
    pub fn user<T: Any + Send>(value: T) -> Self {
        PipelineMessage::User(Box::new(value))
    }

    /// Downcasts a `User` message, returning `None` for a `Buffer` or a mismatched type.
    pub fn downcast<T: Any>(self) -> Result<Box<T>, PipelineMessage> {
        match self {
            PipelineMessage::User(boxed) => boxed.downcast::<T>().map_err(PipelineMessage::User),
            other => Err(other),
        }
    }
}
