use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use relay_core::bootstrap::{Acceptor, ChannelInitializer, Connector, ServerChannel};
use relay_core::buffer::FixedClassPool;
use relay_core::error::{CoreError, Result, codes};
use relay_core::runtime::EventLoopGroup;
use relay_core::transport::{ChannelOptions, TransportSocketAddr};
use relay_core::{BufferAllocator, Channel};

use crate::channel::{LocalChannel, LocalListener};
use crate::registry;

fn local_name(addr: &TransportSocketAddr) -> Result<&str> {
    match addr {
        TransportSocketAddr::Local(name) => Ok(name.as_str()),
        TransportSocketAddr::Socket(_) => Err(CoreError::new(
            codes::TRANSPORT_BIND_FAILED,
            "relay-transport-local only accepts Local addresses",
        )),
        TransportSocketAddr::Any => Err(CoreError::new(
            codes::TRANSPORT_BIND_FAILED,
            "TransportSocketAddr::Any only mints a name on bind, there is nothing to connect to",
        )),
    }
}

fn default_pool() -> Arc<dyn BufferAllocator> {
    FixedClassPool::new()
}

/// Binds a [`LocalListener`] under a process-wide name, per [`crate::registry`].
#[derive(Default)]
pub struct LocalAcceptor;

impl LocalAcceptor {
    pub fn new() -> Self {
        Self
    }
}

impl Acceptor for LocalAcceptor {
    fn bind(
        &self,
        _boss: &Arc<EventLoopGroup>,
        workers: &Arc<EventLoopGroup>,
        addr: &TransportSocketAddr,
        _options: &ChannelOptions,
        child_options: &ChannelOptions,
        child_initializer: Arc<dyn ChannelInitializer>,
    ) -> Result<Box<dyn ServerChannel>> {
        let name = match addr {
            TransportSocketAddr::Any => registry::mint_anonymous_name(),
            _ => local_name(addr)?.to_string(),
        };
        let listener = Arc::new(LocalListener {
            name: name.clone(),
            worker_group: Arc::clone(workers),
            child_options: child_options.clone(),
            child_initializer,
            buffer_pool: default_pool(),
            closed: AtomicBool::new(false),
        });
        registry::bind(name, Arc::clone(&listener))?;
        Ok(Box::new(listener) as Box<dyn ServerChannel>)
    }
}

/// Looks up a bound listener and performs an in-process handshake: both sides' channels are
/// constructed, linked to each other, initialized, and scheduled to fire `channel_active` on their
/// own executors before this call returns the client side.
#[derive(Default)]
pub struct LocalConnector;

impl LocalConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for LocalConnector {
    fn connect(
        &self,
        group: &Arc<EventLoopGroup>,
        addr: &TransportSocketAddr,
        options: &ChannelOptions,
        initializer: &dyn ChannelInitializer,
    ) -> Result<Arc<dyn Channel>> {
        let name = local_name(addr)?;
        let listener = registry::lookup(name).ok_or_else(|| {
            CoreError::new(codes::CHANNEL_CONNECT_REFUSED, format!("no listener bound at local:{name}"))
        })?;

        let client_executor = group.next();
        let server_executor = listener.worker_group.next();
        let pool = default_pool();

        let client_addr = TransportSocketAddr::Local(format!("{name}#client"));
        let server_addr = TransportSocketAddr::Local(name.to_string());

        let client = LocalChannel::new(
            format!("local-client-{name}"),
            client_addr.clone(),
            server_addr.clone(),
            client_executor,
            Arc::clone(&pool),
            options.clone(),
        );
        let server = LocalChannel::new(
            format!("local-server-{name}"),
            server_addr,
            client_addr,
            server_executor,
            Arc::clone(&listener.buffer_pool),
            listener.child_options.clone(),
        );

        client.link(&server, initializer)?;
        server.link(&client, listener.child_initializer.as_ref())?;

        server.activate();
        client.activate();

        Ok(client as Arc<dyn Channel>)
    }
}
