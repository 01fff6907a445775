//! Byte-to-message and message-to-message codec adapters.
//!
//! Both wrap a small, focused trait (just the decode/encode step) into a full
//! [`InboundHandler`]/[`OutboundHandler`], the same split Netty makes between `ByteToMessageDecoder`
//! and the codecs that plug into it — so a protocol author writes one `decode`/`encode` function
//! and never touches cumulation-buffer bookkeeping or pipeline wiring directly.
mod byte_to_message;
mod message_to_byte;
mod message_to_message;

pub use byte_to_message::{ByteToMessageCodec, ByteToMessageDecoder};
pub use message_to_byte::{MessageToByteCodec, MessageToByteEncoder};
pub use message_to_message::{MessageToMessageCodec, MessageToMessageTransform};
