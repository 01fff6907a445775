use crate::buffer::PipelineMessage;
use crate::error::Result;
use crate::future::BoxFuture;
use crate::sealed::Sealed;
use crate::transport::TransportSocketAddr;

use super::ExtensionsMap;

/// Lifecycle state of a [`Channel`]. One-way: `Open -> Registered -> Active -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChannelState {
    Open,
    Registered,
    Active,
    Closed,
}

/// What happened when a message was handed to [`Channel::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum WriteSignal {
    /// Queued for the next flush.
    Accepted,
    /// Queued and immediately flushed (the channel had no reason to defer).
    AcceptedAndFlushed,
    /// Queued, but this write pushed pending bytes at or above the high water mark —
    /// `on_writability_changed(false)` has already been fired.
    FlowControlApplied,
}

/// A bidirectional endpoint: one TCP stream, or a paired local (in-VM) channel.
///
/// # Contract
/// - Every method is safe to call from any thread; pending-write/writability state is reached
///   through `Mutex`/atomics so concurrent callers never race each other, but only [`Self::flush`]
///   actually reposts its work onto the channel's owning executor (via `TaskExecutor::execute`) —
///   the socket write only ever happens there. [`Self::write`] just enqueues onto that
///   Mutex-protected queue and returns synchronously, inline on whichever thread called it; it does
///   not itself trampoline, since enqueueing doesn't touch the socket.
/// - State transitions are one-way; `close`/`close_graceful` are idempotent past `Closed`.
pub trait Channel: Sealed + Send + Sync + 'static {
    /// A stable identity for logs/metrics — not necessarily the local address.
    fn id(&self) -> &str;

    fn state(&self) -> ChannelState;

    /// `false` once pending outbound bytes cross the high water mark; becomes `true` again once
    /// they drop below the low water mark. See the backpressure invariant in the design notes.
    fn is_writable(&self) -> bool;

    fn extensions(&self) -> &ExtensionsMap;

    fn local_addr(&self) -> Option<TransportSocketAddr>;

    fn peer_addr(&self) -> Option<TransportSocketAddr>;

    /// Binds to a local address. Transports in this crate only ever construct a channel that is
    /// already bound/connected, so the default call site here returns `CHANNEL_ALREADY_BOUND`;
    /// the method exists so an outbound handler (e.g. one rewriting the target) has something
    /// concrete to call through to at the end of [`super::Pipeline::fire_bind`].
    fn bind(&self, addr: TransportSocketAddr) -> Result<()>;

    /// Connects to a remote address. See [`Self::bind`] — same already-connected constraint.
    fn connect(&self, addr: TransportSocketAddr) -> Result<()>;

    /// Tears down the connection. Unlike [`Self::close`], a disconnected channel is not required
    /// to release its executor registration — most connection-oriented transports simply close,
    /// the way Netty's default channel `unsafe` does for transports with no distinct notion of
    /// "disconnected but still registered".
    fn disconnect(&self) -> Result<()>;

    /// Removes the channel from its executor's I/O readiness registration without closing the
    /// socket or running the inactive lifecycle.
    fn deregister(&self);

    /// Signals willingness to receive more inbound data. A no-op under `ChannelOptions::auto_read`
    /// (the default) — only meaningful once a handler has asked for backpressure some other way.
    fn read(&self);

    /// Enqueues `msg` for the socket; does not by itself reach the wire — see [`Self::flush`].
    fn write(&self, msg: PipelineMessage) -> Result<WriteSignal>;

    /// Drains whatever is queued by prior [`Self::write`] calls out to the socket.
    fn flush(&self) -> Result<()>;

    /// Closes without waiting for pending writes to drain.
    fn close(&self);

    /// Closes after draining pending writes, or after `deadline` elapses, whichever is first.
    fn close_graceful(&self, deadline: Option<core::time::Duration>);

    /// Resolves once the channel has fully closed (`state() == Closed`).
    fn closed(&self) -> BoxFuture<'static, ()>;
}
