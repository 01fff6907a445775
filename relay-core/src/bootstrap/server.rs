use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt;

use crate::error::{CoreError, Result, codes};
use crate::runtime::EventLoopGroup;
use crate::sealed::Sealed;
use crate::transport::{ChannelOptions, TransportSocketAddr};

use super::{Acceptor, ChannelInitializer};

/// A bound listening endpoint, returned by [`ServerBootstrap::bind`].
///
/// Distinct from [`crate::pipeline::Channel`]: a listener doesn't read/write application bytes,
/// only accepts and hands off child channels, so it gets a smaller, closed trait rather than
/// reusing the channel abstraction with most of its methods unused.
pub trait ServerChannel: Sealed + Send + Sync {
    fn local_addr(&self) -> Option<TransportSocketAddr>;

    /// Stops accepting new connections; already-accepted child channels are unaffected.
    fn close(&self);
}

/// Assembles a listening endpoint: a boss group to run the accept loop, a worker group the
/// accepted channels are distributed onto round-robin, and separate option sets/initializers for
/// the listening socket versus each accepted child — the same two-group split as Netty's
/// `ServerBootstrap::group(boss, worker)`.
pub struct ServerBootstrap {
    boss_group: Option<Arc<EventLoopGroup>>,
    worker_group: Option<Arc<EventLoopGroup>>,
    acceptor: Option<Arc<dyn Acceptor>>,
    options: ChannelOptions,
    child_options: ChannelOptions,
    child_initializer: Option<Arc<dyn ChannelInitializer>>,
}

impl fmt::Debug for ServerBootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBootstrap")
            .field("has_boss_group", &self.boss_group.is_some())
            .field("has_worker_group", &self.worker_group.is_some())
            .field("has_acceptor", &self.acceptor.is_some())
            .field("has_child_initializer", &self.child_initializer.is_some())
            .finish()
    }
}

impl Default for ServerBootstrap {
    fn default() -> Self {
        Self {
            boss_group: None,
            worker_group: None,
            acceptor: None,
            options: ChannelOptions::default(),
            child_options: ChannelOptions::default(),
            child_initializer: None,
        }
    }
}

impl ServerBootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets both the boss (accept) and worker (child channel) groups in one call.
    pub fn groups(mut self, boss: Arc<EventLoopGroup>, worker: Arc<EventLoopGroup>) -> Self {
        self.boss_group = Some(boss);
        self.worker_group = Some(worker);
        self
    }

    pub fn acceptor(mut self, acceptor: Arc<dyn Acceptor>) -> Self {
        self.acceptor = Some(acceptor);
        self
    }

    /// Options applied to the listening socket itself (e.g. `SO_BACKLOG`, `SO_REUSEADDR`).
    pub fn options(mut self, options: ChannelOptions) -> Self {
        self.options = options;
        self
    }

    /// Options applied to each accepted child channel (e.g. `TCP_NODELAY`, water marks).
    pub fn child_options(mut self, options: ChannelOptions) -> Self {
        self.child_options = options;
        self
    }

    /// The pipeline initializer run against each accepted child channel.
    pub fn child_handler<I: ChannelInitializer + 'static>(mut self, initializer: I) -> Self {
        self.child_initializer = Some(Arc::new(initializer));
        self
    }

    /// Binds `addr`, returning once the listening socket is up and the boss group has started
    /// accepting. Accepted channels are handed to the worker group and initialized asynchronously
    /// as they arrive — this call does not wait for any of them.
    pub fn bind(&self, addr: impl Into<TransportSocketAddr>) -> Result<Box<dyn ServerChannel>> {
        let boss = self.boss_group.as_ref().ok_or_else(|| {
            CoreError::new(codes::BOOTSTRAP_INCOMPLETE, "ServerBootstrap::bind called without a boss group")
        })?;
        let worker = self.worker_group.as_ref().ok_or_else(|| {
            CoreError::new(codes::BOOTSTRAP_INCOMPLETE, "ServerBootstrap::bind called without a worker group")
        })?;
        let acceptor = self.acceptor.as_ref().ok_or_else(|| {
            CoreError::new(codes::BOOTSTRAP_INCOMPLETE, "ServerBootstrap::bind called without an acceptor")
        })?;
        let child_initializer = self.child_initializer.clone().ok_or_else(|| {
            CoreError::new(codes::BOOTSTRAP_INCOMPLETE, "ServerBootstrap::bind called without a child_handler")
        })?;
        acceptor.bind(boss, worker, &addr.into(), &self.options, &self.child_options, child_initializer)
    }
}
