//! Fluent assembly entry points: [`client::Bootstrap`] wires one outbound channel, and
//! [`server::ServerBootstrap`] wires a listener plus a per-connection child pipeline.
//!
//! Neither type performs I/O itself — each transport crate (`relay-transport-tcp`,
//! `relay-transport-local`) supplies a [`Connector`]/[`Acceptor`] implementation that this module
//! calls into once the caller has finished configuring groups, options, and handlers: assembly
//! stays separate from registration, and only `build()`/`bind()`/`connect()` hands the result to
//! the runtime.
mod client;
mod initializer;
mod server;

pub use client::Bootstrap;
pub use initializer::{ChannelInitializer, FnInitializer, from_fn};
pub use server::{ServerBootstrap, ServerChannel};

use alloc::sync::Arc;
use alloc::boxed::Box;

use crate::error::Result;
use crate::pipeline::Channel;
use crate::runtime::EventLoopGroup;
use crate::transport::{ChannelOptions, TransportSocketAddr};

/// Establishes one outbound channel to `addr`, handing control to `initializer` before the
/// channel is returned active. Implemented per-transport (TCP connect, or local registry lookup).
pub trait Connector: crate::sealed::Sealed + Send + Sync {
    fn connect(
        &self,
        group: &Arc<EventLoopGroup>,
        addr: &TransportSocketAddr,
        options: &ChannelOptions,
        initializer: &dyn ChannelInitializer,
    ) -> Result<Arc<dyn Channel>>;
}

/// Binds a listening endpoint and accepts connections onto `workers`, running `child_initializer`
/// against each accepted channel's pipeline before it starts receiving reads.
///
/// Both groups are handed over as `Arc`s, not borrows: an acceptor that runs its own accept loop
/// (e.g. a TCP listener polling on the boss group) or hands `workers` to something longer-lived
/// than this call (e.g. [`crate::bootstrap::ServerChannel`]) needs to keep its own owning handle.
pub trait Acceptor: crate::sealed::Sealed + Send + Sync {
    fn bind(
        &self,
        boss: &Arc<EventLoopGroup>,
        workers: &Arc<EventLoopGroup>,
        addr: &TransportSocketAddr,
        options: &ChannelOptions,
        child_options: &ChannelOptions,
        child_initializer: Arc<dyn ChannelInitializer>,
    ) -> Result<Box<dyn ServerChannel>>;
}
