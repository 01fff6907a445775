#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![doc = "relay-core: pipeline, buffer pool, and single-threaded executor contracts shared by every relay transport."]
#![doc = ""]
#![doc = "== memory model =="]
#![doc = "relay-core targets `no_std + alloc`: pipeline dispatch, buffer pooling, and task scheduling all lean on"]
#![doc = "`Box`/`Arc`/`Vec` from [`alloc`] to keep the pipeline handler traits object-safe. A bare allocator-free"]
#![doc = "target is not supported; `std` only adds the executor's OS thread, sockets stay in the transport crates."]

extern crate alloc;

mod sealed;

pub mod buffer;
pub mod common;
pub mod error;
pub mod future;
pub mod pipeline;
pub mod runtime;
pub mod transport;

#[cfg(feature = "std")]
pub mod bootstrap;
#[cfg(feature = "std")]
pub mod codec;

pub use buffer::{BufferAllocator, BufferPool, Bytes, PipelineMessage, ReadableBuffer, WritableBuffer};
pub use common::{Completion, CompletionFuture, Empty, IntoEmpty};
pub use error::{CoreError, Result, codes};
pub use future::{BoxFuture, LocalBoxFuture};
pub use pipeline::{
    Channel, ChannelState, Context, DuplexHandler, ExtensionsMap, InboundHandler,
    MiddlewareDescriptor, OutboundHandler, Pipeline, UserEvent, WriteSignal,
};
pub use transport::{ChannelOptions, TransportSocketAddr};

#[cfg(feature = "std")]
pub use runtime::{EventExecutor, EventLoopGroup, ExecutorState, JoinHandle, TaskExecutor, TimeDriver};

#[cfg(feature = "std")]
pub use bootstrap::{Bootstrap, ChannelInitializer, ServerBootstrap};

#[cfg(feature = "std")]
pub use codec::{
    ByteToMessageCodec, ByteToMessageDecoder, MessageToByteCodec, MessageToByteEncoder,
    MessageToMessageCodec, MessageToMessageTransform,
};
