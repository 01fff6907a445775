use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::Duration;

use mio::Interest;
use mio::net::{TcpListener as MioTcpListener, TcpStream as MioTcpStream};
use socket2::{Domain, Socket, Type};

use relay_core::bootstrap::{Acceptor, ChannelInitializer, Connector, ServerChannel};
use relay_core::buffer::FixedClassPool;
use relay_core::error::{CoreError, Result, codes};
use relay_core::runtime::{EventExecutor, EventLoopGroup, TaskExecutor};
use relay_core::transport::{ChannelOptions, TransportSocketAddr};
use relay_core::{BufferAllocator, Channel};

use crate::channel::TcpChannel;
use crate::error::TcpError;
use crate::reactor::{self, ACCEPT_DRAIN_BUDGET, ReadyHandler};

fn parse_socket_addr(addr: &TransportSocketAddr) -> Result<SocketAddr> {
    match addr {
        TransportSocketAddr::Socket(repr) => repr
            .parse::<SocketAddr>()
            .map_err(|_| CoreError::from(TcpError::InvalidAddr(repr.clone()))),
        // `0.0.0.0:0`/`[::]:0` already mean "pick a free port" for TCP — that's what
        // `TransportSocketAddr::Any` maps onto here; `relay-transport-local`'s registry is the one
        // that needs its own minting logic, since a local address has no OS-assigned equivalent.
        TransportSocketAddr::Any => Ok(SocketAddr::from(([0, 0, 0, 0], 0))),
        TransportSocketAddr::Local(_) => Err(CoreError::new(
            codes::TRANSPORT_BIND_FAILED,
            "relay-transport-tcp only accepts Socket addresses",
        )),
    }
}

fn default_pool() -> Arc<dyn BufferAllocator> {
    FixedClassPool::new()
}

fn apply_child_options<S: std::os::fd::AsFd>(stream: &S, options: &ChannelOptions) -> std::io::Result<()> {
    let socket = socket2::SockRef::from(stream);
    if let Some(nodelay) = options.tcp_nodelay {
        socket.set_tcp_nodelay(nodelay)?;
    }
    if let Some(keepalive) = options.so_keepalive {
        socket.set_keepalive(keepalive)?;
    }
    if let Some(size) = options.so_rcvbuf {
        socket.set_recv_buffer_size(size)?;
    }
    if let Some(size) = options.so_sndbuf {
        socket.set_send_buffer_size(size)?;
    }
    Ok(())
}

/// A bound TCP listening socket. Its own accept loop runs on one executor drawn from the boss
/// group — chosen once at bind time — rather than the reactor thread itself, so accepting a
/// connection and running the child's [`ChannelInitializer`] never blocks socket polling for
/// every other registered channel.
pub struct TcpListenerChannel {
    local_addr: TransportSocketAddr,
    listener: Mutex<MioTcpListener>,
    token: Mutex<Option<mio::Token>>,
    boss_executor: Arc<EventExecutor>,
    worker_group: Arc<EventLoopGroup>,
    child_options: ChannelOptions,
    child_initializer: Arc<dyn ChannelInitializer>,
    buffer_pool: Arc<dyn BufferAllocator>,
    closed: AtomicBool,
}

impl TcpListenerChannel {
    fn accept_loop(self: &Arc<Self>) {
        for _ in 0..ACCEPT_DRAIN_BUDGET {
            if self.closed.load(Ordering::Acquire) {
                return;
            }
            let accepted = {
                let listener = self.listener.lock().unwrap();
                listener.accept()
            };
            match accepted {
                Ok((stream, peer)) => self.spawn_child(stream, peer),
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::warn!(target: "relay_transport_tcp", %err, "accept failed");
                    break;
                }
            }
        }
    }

    fn spawn_child(&self, stream: MioTcpStream, peer: SocketAddr) {
        if let Err(err) = apply_child_options(&stream, &self.child_options) {
            tracing::warn!(target: "relay_transport_tcp", %err, "failed to apply child socket options");
        }
        let local = stream.local_addr().map(|a| a.to_string()).unwrap_or_default();
        let executor = self.worker_group.next();
        let child = TcpChannel::new(
            alloc_id(&local, &peer),
            TransportSocketAddr::Socket(local),
            TransportSocketAddr::Socket(peer.to_string()),
            stream,
            executor,
            Arc::clone(&self.buffer_pool),
            self.child_options.clone(),
        );
        if let Err(err) = child.link(self.child_initializer.as_ref()) {
            tracing::warn!(target: "relay_transport_tcp", %err, "child pipeline initialization failed");
            return;
        }
        child.activate();
    }
}

fn alloc_id(local: &str, peer: &SocketAddr) -> String {
    format!("tcp-{local}-{peer}")
}

impl ServerChannel for TcpListenerChannel {
    fn local_addr(&self) -> Option<TransportSocketAddr> {
        Some(self.local_addr.clone())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(token) = self.token.lock().unwrap().take() {
            let mut listener = self.listener.lock().unwrap();
            let _ = reactor::deregister(&mut *listener, token);
        }
    }
}

// See the matching impl in `relay-transport-local`'s channel module: `ListenerReady` keeps its
// own `Weak<TcpListenerChannel>`, so the value returned from `bind` has to remain an `Arc`.
impl ServerChannel for Arc<TcpListenerChannel> {
    fn local_addr(&self) -> Option<TransportSocketAddr> {
        TcpListenerChannel::local_addr(self)
    }

    fn close(&self) {
        TcpListenerChannel::close(self)
    }
}

struct ListenerReady(Weak<TcpListenerChannel>);

impl ReadyHandler for ListenerReady {
    fn on_readable(&self) {
        if let Some(listener) = self.0.upgrade() {
            let _ = listener.boss_executor.execute(Box::new(move || listener.accept_loop()));
        }
    }

    fn on_writable(&self) {}
}

/// Binds a listening socket with [`socket2`] (to apply `SO_REUSEADDR`/backlog before `listen`),
/// then wraps it as a [`mio::net::TcpListener`] registered with the shared reactor.
#[derive(Default)]
pub struct TcpAcceptor;

impl TcpAcceptor {
    pub fn new() -> Self {
        Self
    }
}

impl Acceptor for TcpAcceptor {
    fn bind(
        &self,
        boss: &Arc<EventLoopGroup>,
        workers: &Arc<EventLoopGroup>,
        addr: &TransportSocketAddr,
        options: &ChannelOptions,
        child_options: &ChannelOptions,
        child_initializer: Arc<dyn ChannelInitializer>,
    ) -> Result<Box<dyn ServerChannel>> {
        let socket_addr = parse_socket_addr(addr)?;
        let domain = if socket_addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
        let socket = Socket::new(domain, Type::STREAM, None)
            .map_err(|err| CoreError::from(TcpError::Bind { addr: socket_addr.to_string(), source: err }))?;
        if options.so_reuseaddr.unwrap_or(true) {
            socket
                .set_reuse_address(true)
                .map_err(|err| CoreError::from(TcpError::Bind { addr: socket_addr.to_string(), source: err }))?;
        }
        socket
            .bind(&socket_addr.into())
            .map_err(|err| CoreError::from(TcpError::Bind { addr: socket_addr.to_string(), source: err }))?;
        let backlog = options.so_backlog.unwrap_or(1024);
        socket
            .listen(backlog)
            .map_err(|err| CoreError::from(TcpError::Bind { addr: socket_addr.to_string(), source: err }))?;
        socket
            .set_nonblocking(true)
            .map_err(|err| CoreError::from(TcpError::Bind { addr: socket_addr.to_string(), source: err }))?;

        let mut mio_listener = MioTcpListener::from_std(socket.into());
        let local_addr = mio_listener
            .local_addr()
            .map(|a| TransportSocketAddr::Socket(a.to_string()))
            .unwrap_or_else(|_| addr.clone());

        let listener = Arc::new(TcpListenerChannel {
            local_addr,
            listener: Mutex::new(mio_listener),
            token: Mutex::new(None),
            boss_executor: boss.next(),
            worker_group: Arc::clone(workers),
            child_options: child_options.clone(),
            child_initializer,
            buffer_pool: default_pool(),
            closed: AtomicBool::new(false),
        });

        let ready = Arc::new(ListenerReady(Arc::downgrade(&listener)));
        let token = {
            let mut guard = listener.listener.lock().unwrap();
            reactor::register(&mut *guard, Interest::READABLE, ready)
                .map_err(|err| CoreError::new(codes::TRANSPORT_BIND_FAILED, format!("registering listener failed: {err}")))?
        };
        *listener.token.lock().unwrap() = Some(token);

        Ok(Box::new(listener) as Box<dyn ServerChannel>)
    }
}

/// Signals the caller of [`TcpConnector::connect`] once the reactor reports the connecting socket
/// writable (mio's readiness contract for "the three-way handshake finished, one way or another").
struct ConnectSignal {
    ready: Mutex<bool>,
    cond: Condvar,
}

impl ConnectSignal {
    fn new() -> Arc<Self> {
        Arc::new(Self { ready: Mutex::new(false), cond: Condvar::new() })
    }

    fn notify(&self) {
        *self.ready.lock().unwrap() = true;
        self.cond.notify_all();
    }

    /// Blocks the calling thread until notified or `timeout` elapses. Returns `false` on timeout.
    fn wait(&self, timeout: Option<Duration>) -> bool {
        let guard = self.ready.lock().unwrap();
        match timeout {
            Some(timeout) => {
                let (guard, result) = self.cond.wait_timeout_while(guard, timeout, |ready| !*ready).unwrap();
                let _ = result;
                *guard
            }
            None => {
                let guard = self.cond.wait_while(guard, |ready| !*ready).unwrap();
                *guard
            }
        }
    }
}

struct ConnectReady(Arc<ConnectSignal>);

impl ReadyHandler for ConnectReady {
    fn on_readable(&self) {}

    fn on_writable(&self) {
        self.0.notify();
    }
}

/// Connects through the shared reactor: [`MioTcpStream::connect`] starts a non-blocking
/// three-way handshake, and this blocks the caller (per
/// [`relay_core::bootstrap::Bootstrap::connect`]'s documented contract) on the same reactor
/// readiness mechanism every other registered socket uses, rather than a dedicated blocking
/// syscall — the calling thread waits, but the reactor thread never does.
#[derive(Default)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for TcpConnector {
    fn connect(
        &self,
        group: &Arc<EventLoopGroup>,
        addr: &TransportSocketAddr,
        options: &ChannelOptions,
        initializer: &dyn ChannelInitializer,
    ) -> Result<Arc<dyn Channel>> {
        let socket_addr = parse_socket_addr(addr)?;
        let mut stream = MioTcpStream::connect(socket_addr)
            .map_err(|err| CoreError::from(TcpError::Connect { addr: socket_addr.to_string(), source: err }))?;

        let signal = ConnectSignal::new();
        let ready: Arc<dyn ReadyHandler> = Arc::new(ConnectReady(Arc::clone(&signal)));
        let token = reactor::register(&mut stream, Interest::WRITABLE, ready).map_err(|err| {
            CoreError::new(codes::TRANSPORT_IO, format!("registering connecting socket failed: {err}"))
        })?;

        let became_writable = signal.wait(options.connect_timeout);
        let _ = reactor::deregister(&mut stream, token);
        if !became_writable {
            return Err(CoreError::from(TcpError::Connect {
                addr: socket_addr.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::TimedOut),
            }));
        }

        if let Some(err) = socket2::SockRef::from(&stream)
            .take_error()
            .map_err(|err| CoreError::from(TcpError::Connect { addr: socket_addr.to_string(), source: err }))?
        {
            return Err(CoreError::from(TcpError::Connect { addr: socket_addr.to_string(), source: err }));
        }

        apply_child_options(&stream, options).map_err(TcpError::Io)?;

        let local = stream.local_addr().map(|a| a.to_string()).unwrap_or_default();
        let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_else(|_| socket_addr.to_string());

        let channel = TcpChannel::new(
            format!("tcp-client-{local}-{peer}"),
            TransportSocketAddr::Socket(local),
            TransportSocketAddr::Socket(peer),
            stream,
            group.next(),
            default_pool(),
            options.clone(),
        );
        channel.link(initializer)?;
        channel.activate();
        Ok(channel as Arc<dyn Channel>)
    }
}
