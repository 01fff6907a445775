use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use relay_core::bootstrap::{ChannelInitializer, ServerChannel};
use relay_core::error::{CoreError, Result, codes};
use relay_core::future::BoxFuture;
use relay_core::runtime::{EventExecutor, EventLoopGroup, TaskExecutor};
use relay_core::transport::{ChannelOptions, TransportSocketAddr};
use relay_core::{
    BufferAllocator, Channel, ChannelState, Completion, ExtensionsMap, Pipeline, PipelineMessage,
    ReadableBuffer, WritableBuffer, WriteSignal,
};

/// One side of an in-VM channel pair. Reads arrive by the peer posting a task onto this channel's
/// own executor, matching the single-thread-per-channel invariant every transport in this crate
/// honors — nothing ever calls into a channel's pipeline from outside that channel's executor
/// thread.
pub struct LocalChannel {
    id: String,
    local_addr: TransportSocketAddr,
    peer_addr: TransportSocketAddr,
    executor: Arc<EventExecutor>,
    buffer_pool: Arc<dyn BufferAllocator>,
    // `None` only between `new` and `link` — every other method runs after `link` has completed,
    // since `Connector::connect`/`Acceptor::bind` call `link` before handing the channel to
    // anything that could observe it.
    pipeline: Mutex<Option<Pipeline>>,
    peer: Mutex<Weak<LocalChannel>>,
    state: AtomicBool, // true once Active; Closed is tracked separately
    closed: AtomicBool,
    pending: Mutex<VecDeque<PipelineMessage>>,
    pending_bytes: AtomicUsize,
    writable: AtomicBool,
    options: ChannelOptions,
    extensions: ExtensionsMap,
    completion: Completion,
}

impl LocalChannel {
    pub(crate) fn new(
        id: String,
        local_addr: TransportSocketAddr,
        peer_addr: TransportSocketAddr,
        executor: Arc<EventExecutor>,
        buffer_pool: Arc<dyn BufferAllocator>,
        options: ChannelOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            pipeline: Mutex::new(None),
            id,
            local_addr,
            peer_addr,
            executor,
            buffer_pool,
            peer: Mutex::new(Weak::new()),
            state: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            pending: Mutex::new(VecDeque::new()),
            pending_bytes: AtomicUsize::new(0),
            writable: AtomicBool::new(true),
            options,
            extensions: ExtensionsMap::new(),
            completion: Completion::new(),
        })
    }

    /// Finishes wiring a constructed channel: rebuilds its pipeline against its own real `Arc`
    /// (the constructor above couldn't reference it yet), records the peer, and runs `init`.
    pub(crate) fn link(
        self: &Arc<Self>,
        peer: &Arc<LocalChannel>,
        init: &dyn ChannelInitializer,
    ) -> Result<()> {
        *self.peer.lock().unwrap() = Arc::downgrade(peer);
        let mut pipeline = Pipeline::new(self.clone() as Arc<dyn Channel>, Arc::clone(&self.buffer_pool));
        init.init_channel(&mut pipeline)?;
        *self.pipeline.lock().unwrap() = Some(pipeline);
        self.with_pipeline(|pipeline| pipeline.fire_channel_registered());
        Ok(())
    }

    /// Schedules `channel_active` on this channel's own executor.
    pub(crate) fn activate(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let _ = self.executor.execute(Box::new(move || {
            this.state.store(true, Ordering::Release);
            this.with_pipeline(|pipeline| pipeline.fire_channel_active());
        }));
    }

    fn with_pipeline<R>(&self, f: impl FnOnce(&mut Pipeline) -> R) -> R {
        let mut guard = self.pipeline.lock().unwrap();
        let pipeline = guard.as_mut().expect("LocalChannel::link runs before the channel is exposed");
        f(pipeline)
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CoreError::new(codes::CHANNEL_CLOSED, "channel is closed").with_channel_id(self.id.clone()))
        } else {
            Ok(())
        }
    }

    /// Delivers a message to the peer's pipeline on the peer's own executor. `Buffer` payloads are
    /// copied into storage drawn from the peer's allocator, emulating a real wire hop rather than
    /// sharing the sender's buffer across threads.
    fn deliver_to_peer(&self, msg: PipelineMessage) -> Result<()> {
        let Some(peer) = self.peer.lock().unwrap().upgrade() else {
            return Err(CoreError::new(codes::CHANNEL_CLOSED, "peer channel has been dropped"));
        };
        let msg = match msg {
            PipelineMessage::Buffer(mut buf) => {
                let remaining = buf.remaining();
                let bytes = buf.read_slice(remaining)?;
                buf.release();
                let mut fresh = peer.buffer_pool.acquire(bytes.len().max(1), usize::MAX);
                fresh.put_slice(&bytes)?;
                PipelineMessage::Buffer(fresh)
            }
            other => other,
        };
        peer.executor.execute(Box::new(move || {
            peer.with_pipeline(|pipeline| {
                pipeline.fire_channel_read(msg);
                pipeline.fire_channel_read_complete();
            });
        }))?;
        Ok(())
    }

    fn recompute_writability(&self) {
        let pending = self.pending_bytes.load(Ordering::Acquire);
        let was_writable = self.writable.load(Ordering::Acquire);
        let now_writable = if was_writable {
            pending < self.options.write_buffer_high_water_mark
        } else {
            pending <= self.options.write_buffer_low_water_mark
        };
        if now_writable != was_writable {
            self.writable.store(now_writable, Ordering::Release);
            let this_id = self.id.clone();
            tracing::debug!(target: "relay_transport_local", channel = %this_id, writable = now_writable, "writability changed");
            self.with_pipeline(|pipeline| pipeline.fire_writability_changed(now_writable));
        }
    }
}

impl Channel for LocalChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> ChannelState {
        if self.closed.load(Ordering::Acquire) {
            ChannelState::Closed
        } else if self.state.load(Ordering::Acquire) {
            ChannelState::Active
        } else {
            ChannelState::Registered
        }
    }

    fn is_writable(&self) -> bool {
        self.writable.load(Ordering::Acquire)
    }

    fn extensions(&self) -> &ExtensionsMap {
        &self.extensions
    }

    fn local_addr(&self) -> Option<TransportSocketAddr> {
        Some(self.local_addr.clone())
    }

    fn peer_addr(&self) -> Option<TransportSocketAddr> {
        Some(self.peer_addr.clone())
    }

    fn bind(&self, _addr: TransportSocketAddr) -> Result<()> {
        Err(CoreError::new(codes::CHANNEL_ALREADY_BOUND, "LocalChannel is already bound when constructed")
            .with_channel_id(self.id.clone()))
    }

    fn connect(&self, _addr: TransportSocketAddr) -> Result<()> {
        Err(CoreError::new(codes::CHANNEL_ALREADY_BOUND, "LocalChannel is already connected when constructed")
            .with_channel_id(self.id.clone()))
    }

    fn disconnect(&self) -> Result<()> {
        self.close();
        Ok(())
    }

    fn deregister(&self) {
        *self.peer.lock().unwrap() = Weak::new();
        self.with_pipeline(|pipeline| pipeline.fire_channel_unregistered());
    }

    fn read(&self) {
        // Local delivery has no reactor-driven read suspension to resume; nothing to do.
    }

    fn write(&self, msg: PipelineMessage) -> Result<WriteSignal> {
        self.check_open()?;
        let size = match &msg {
            PipelineMessage::Buffer(buf) => buf.remaining(),
            _ => 0,
        };
        let pending_bytes = self.pending_bytes.load(Ordering::Acquire);
        if pending_bytes >= self.options.write_buffer_hard_limit {
            return Err(CoreError::new(
                codes::CHANNEL_WRITE_REJECTED,
                format!(
                    "write rejected: {pending_bytes} bytes already pending, hard limit is {}",
                    self.options.write_buffer_hard_limit
                ),
            )
            .with_channel_id(self.id.clone()));
        }
        self.pending.lock().unwrap().push_back(msg);
        let was_writable = self.writable.load(Ordering::Acquire);
        self.pending_bytes.fetch_add(size, Ordering::AcqRel);
        self.recompute_writability();
        let now_writable = self.writable.load(Ordering::Acquire);
        Ok(if was_writable && !now_writable {
            WriteSignal::FlowControlApplied
        } else {
            WriteSignal::Accepted
        })
    }

    fn flush(&self) -> Result<()> {
        self.check_open()?;
        let queued: VecDeque<PipelineMessage> = core::mem::take(&mut *self.pending.lock().unwrap());
        let mut delivered_bytes = 0usize;
        for msg in queued {
            let size = match &msg {
                PipelineMessage::Buffer(buf) => buf.remaining(),
                _ => 0,
            };
            self.deliver_to_peer(msg)?;
            delivered_bytes += size;
        }
        self.pending_bytes.fetch_sub(delivered_bytes, Ordering::AcqRel);
        self.recompute_writability();
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.pending.lock().unwrap().clear();
        self.pending_bytes.store(0, Ordering::Release);
        self.with_pipeline(|pipeline| {
            pipeline.fire_channel_inactive();
            pipeline.fire_channel_unregistered();
        });
        self.completion.complete();
        if let Some(peer) = self.peer.lock().unwrap().upgrade() {
            *peer.peer.lock().unwrap() = Weak::new();
        }
    }

    fn close_graceful(&self, _deadline: Option<core::time::Duration>) {
        let _ = self.flush();
        self.close();
    }

    fn closed(&self) -> BoxFuture<'static, ()> {
        Box::pin(self.completion.future())
    }
}

/// The listening endpoint returned from [`crate::connector::LocalAcceptor::bind`].
pub struct LocalListener {
    pub(crate) name: String,
    pub(crate) worker_group: Arc<EventLoopGroup>,
    pub(crate) child_options: ChannelOptions,
    pub(crate) child_initializer: Arc<dyn ChannelInitializer>,
    pub(crate) buffer_pool: Arc<dyn BufferAllocator>,
    pub(crate) closed: AtomicBool,
}

impl ServerChannel for LocalListener {
    fn local_addr(&self) -> Option<TransportSocketAddr> {
        Some(TransportSocketAddr::Local(self.name.clone()))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            crate::registry::unbind(&self.name);
        }
    }
}

// `registry` and `LocalConnector::connect` both need their own `Arc<LocalListener>`, so the
// value handed back from `Acceptor::bind` has to stay an `Arc`, not move into the `Box` outright.
// Implementing `ServerChannel` again for the `Arc` itself lets it stand in for `Box<dyn
// ServerChannel>` without cloning the listener out of its shared home.
impl ServerChannel for Arc<LocalListener> {
    fn local_addr(&self) -> Option<TransportSocketAddr> {
        LocalListener::local_addr(self)
    }

    fn close(&self) {
        LocalListener::close(self)
    }
}
