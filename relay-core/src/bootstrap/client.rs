use alloc::sync::Arc;
use core::fmt;

use crate::error::{CoreError, Result, codes};
use crate::pipeline::Channel;
use crate::runtime::EventLoopGroup;
use crate::transport::{ChannelOptions, TransportSocketAddr};

use super::{ChannelInitializer, Connector};

/// Assembles one outbound channel: an [`EventLoopGroup`] to own it, a [`Connector`] that knows how
/// to actually reach `addr` for a given transport, channel options to apply once connected, and a
/// [`ChannelInitializer`] to build its pipeline.
///
/// Each setter returns `Self` by value so call sites read as one fluent expression, and nothing
/// happens until [`Bootstrap::connect`] is actually called.
pub struct Bootstrap {
    group: Option<Arc<EventLoopGroup>>,
    connector: Option<Arc<dyn Connector>>,
    options: ChannelOptions,
    initializer: Option<Arc<dyn ChannelInitializer>>,
}

impl fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrap")
            .field("has_group", &self.group.is_some())
            .field("has_connector", &self.connector.is_some())
            .field("has_initializer", &self.initializer.is_some())
            .finish()
    }
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self { group: None, connector: None, options: ChannelOptions::default(), initializer: None }
    }
}

impl Bootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The event-loop group the resulting channel will be registered onto.
    pub fn group(mut self, group: Arc<EventLoopGroup>) -> Self {
        self.group = Some(group);
        self
    }

    /// The transport-specific connect strategy (TCP dial, local registry lookup, ...).
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Replaces the channel options applied once the connection is established.
    pub fn options(mut self, options: ChannelOptions) -> Self {
        self.options = options;
        self
    }

    /// The pipeline initializer run against the channel before it starts receiving reads.
    pub fn handler<I: ChannelInitializer + 'static>(mut self, initializer: I) -> Self {
        self.initializer = Some(Arc::new(initializer));
        self
    }

    /// Connects to `addr`, blocking the calling thread until the connector either succeeds or
    /// fails. A bootstrap has no asynchronous return path of its own — the channel itself exposes
    /// `closed()` for callers that want to await disconnection afterward.
    pub fn connect(&self, addr: impl Into<TransportSocketAddr>) -> Result<Arc<dyn Channel>> {
        let group = self.group.as_ref().ok_or_else(|| {
            CoreError::new(codes::BOOTSTRAP_INCOMPLETE, "Bootstrap::connect called without a group")
        })?;
        let connector = self.connector.as_ref().ok_or_else(|| {
            CoreError::new(codes::BOOTSTRAP_INCOMPLETE, "Bootstrap::connect called without a connector")
        })?;
        let initializer = self.initializer.as_ref().ok_or_else(|| {
            CoreError::new(codes::BOOTSTRAP_INCOMPLETE, "Bootstrap::connect called without a handler")
        })?;
        connector.connect(group, &addr.into(), &self.options, initializer.as_ref())
    }
}
