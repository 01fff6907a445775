//! The one thread in this crate that actually calls `poll()`. It never touches a pipeline: it
//! only notices when a registered socket becomes readable/writable and posts a task onto that
//! channel's own [`relay_core::runtime::EventExecutor`], the same handoff
//! `relay-transport-local` uses to get from "something happened" to "run on the owning thread".
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use mio::{Events, Interest, Poll, Token};

/// Callback pair a channel registers for its socket. Both sides run on the reactor thread and
/// must not block or touch pipeline state directly — they only hand off to the channel's
/// executor.
pub trait ReadyHandler: Send + Sync {
    fn on_readable(&self);
    fn on_writable(&self);
}

struct Reactor {
    registry: mio::Registry,
    handlers: DashMap<usize, Arc<dyn ReadyHandler>>,
    next_token: AtomicUsize,
}

fn reactor() -> &'static Reactor {
    static REACTOR: OnceLock<Reactor> = OnceLock::new();
    REACTOR.get_or_init(|| {
        let poll = Poll::new().expect("mio::Poll::new should not fail on a supported platform");
        let registry = poll.registry().try_clone().expect("Registry::try_clone");
        let reactor = Reactor { registry, handlers: DashMap::new(), next_token: AtomicUsize::new(0) };
        spawn_poll_thread(poll);
        reactor
    })
}

fn spawn_poll_thread(mut poll: Poll) {
    std::thread::Builder::new()
        .name("relay-tcp-reactor".into())
        .spawn(move || {
            let mut events = Events::with_capacity(1024);
            loop {
                if let Err(err) = poll.poll(&mut events, None) {
                    if err.kind() == std::io::ErrorKind::Interrupted {
                        continue;
                    }
                    tracing::error!(target: "relay_transport_tcp", %err, "reactor poll failed");
                    continue;
                }
                for event in events.iter() {
                    let token = event.token().0;
                    let Some(handler) = reactor().handlers.get(&token).map(|h| Arc::clone(h.value())) else {
                        continue;
                    };
                    if event.is_readable() {
                        handler.on_readable();
                    }
                    if event.is_writable() {
                        handler.on_writable();
                    }
                }
            }
        })
        .expect("failed to spawn the relay-tcp reactor thread");
}

/// Registers `source` for `interest`, returning the [`Token`] to later reregister/deregister it
/// with. `handler` is retained by the reactor until [`deregister`] is called.
pub fn register(
    source: &mut impl mio::event::Source,
    interest: Interest,
    handler: Arc<dyn ReadyHandler>,
) -> std::io::Result<Token> {
    let reactor = reactor();
    let token = Token(reactor.next_token.fetch_add(1, Ordering::Relaxed));
    reactor.registry.register(source, token, interest)?;
    reactor.handlers.insert(token.0, handler);
    Ok(token)
}

pub fn reregister(
    source: &mut impl mio::event::Source,
    token: Token,
    interest: Interest,
) -> std::io::Result<()> {
    reactor().registry.reregister(source, token, interest)
}

pub fn deregister(source: &mut impl mio::event::Source, token: Token) -> std::io::Result<()> {
    reactor().handlers.remove(&token.0);
    reactor().registry.deregister(source)
}

/// Caps how many pending connections a single readable event drains from the listening socket's
/// backlog before yielding back to the reactor loop, so one very busy listener can't starve
/// other registered sources.
pub const ACCEPT_DRAIN_BUDGET: usize = 64;
