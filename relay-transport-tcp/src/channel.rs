use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use mio::Interest;
use mio::net::TcpStream;

use relay_core::bootstrap::ChannelInitializer;
use relay_core::buffer::Buf;
use relay_core::error::{CoreError, Result, codes};
use relay_core::future::BoxFuture;
use relay_core::runtime::{EventExecutor, TaskExecutor};
use relay_core::transport::{ChannelOptions, TransportSocketAddr};
use relay_core::{
    BufferAllocator, Channel, ChannelState, Completion, ExtensionsMap, Pipeline, PipelineMessage,
    ReadableBuffer, WritableBuffer, WriteSignal,
};

use crate::reactor::{self, ReadyHandler};

/// One end of a TCP connection, pinned to the [`EventExecutor`] it was registered onto. The
/// reactor thread only ever calls [`ChannelReady::on_readable`]/`on_writable`, which hand off to
/// this channel's own executor before touching the socket or the pipeline — nothing runs the
/// pipeline from the reactor thread itself.
pub struct TcpChannel {
    id: String,
    local_addr: TransportSocketAddr,
    peer_addr: TransportSocketAddr,
    executor: Arc<EventExecutor>,
    buffer_pool: Arc<dyn BufferAllocator>,
    pipeline: Mutex<Option<Pipeline>>,
    stream: Mutex<TcpStream>,
    token: Mutex<Option<mio::Token>>,
    interest: Mutex<Interest>,
    state: AtomicBool,
    closed: AtomicBool,
    pending: Mutex<VecDeque<Vec<u8>>>,
    pending_bytes: AtomicUsize,
    writable: AtomicBool,
    options: ChannelOptions,
    extensions: ExtensionsMap,
    completion: Completion,
    // Set once in `link`, once this channel's own `Arc` exists; lets `&self`-only trait methods
    // (`flush`) hand work off to the executor the same way `do_read`/`do_write` do.
    weak_self: OnceLock<Weak<TcpChannel>>,
}

impl TcpChannel {
    pub(crate) fn new(
        id: String,
        local_addr: TransportSocketAddr,
        peer_addr: TransportSocketAddr,
        stream: TcpStream,
        executor: Arc<EventExecutor>,
        buffer_pool: Arc<dyn BufferAllocator>,
        options: ChannelOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            local_addr,
            peer_addr,
            executor,
            buffer_pool,
            pipeline: Mutex::new(None),
            stream: Mutex::new(stream),
            token: Mutex::new(None),
            interest: Mutex::new(Interest::READABLE),
            state: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            pending: Mutex::new(VecDeque::new()),
            pending_bytes: AtomicUsize::new(0),
            writable: AtomicBool::new(true),
            options,
            extensions: ExtensionsMap::new(),
            completion: Completion::new(),
            weak_self: OnceLock::new(),
        })
    }

    /// Builds the pipeline against this channel's own `Arc` and registers the socket with the
    /// shared reactor for readability. Mirrors `LocalChannel::link` — a channel can't reference
    /// its own `Arc` until after `Arc::new` returns, so pipeline construction is deferred here.
    pub(crate) fn link(self: &Arc<Self>, init: &dyn ChannelInitializer) -> Result<()> {
        let _ = self.weak_self.set(Arc::downgrade(self));
        let mut pipeline = Pipeline::new(self.clone() as Arc<dyn Channel>, Arc::clone(&self.buffer_pool));
        init.init_channel(&mut pipeline)?;
        *self.pipeline.lock().unwrap() = Some(pipeline);

        let ready = Arc::new(ChannelReady(Arc::downgrade(self)));
        let token = {
            let mut stream = self.stream.lock().unwrap();
            reactor::register(&mut *stream, Interest::READABLE, ready)
                .map_err(|err| CoreError::new(codes::TRANSPORT_IO, format!("registering socket failed: {err}")))?
        };
        *self.token.lock().unwrap() = Some(token);
        self.with_pipeline(|pipeline| pipeline.fire_channel_registered());
        Ok(())
    }

    pub(crate) fn activate(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let _ = self.executor.execute(Box::new(move || {
            this.state.store(true, Ordering::Release);
            this.with_pipeline(|pipeline| pipeline.fire_channel_active());
        }));
    }

    fn with_pipeline<R>(&self, f: impl FnOnce(&mut Pipeline) -> R) -> R {
        let mut guard = self.pipeline.lock().unwrap();
        let pipeline = guard.as_mut().expect("TcpChannel::link runs before the channel is exposed");
        f(pipeline)
    }

    fn arc_self(&self) -> Option<Arc<TcpChannel>> {
        self.weak_self.get()?.upgrade()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CoreError::new(codes::CHANNEL_CLOSED, "channel is closed").with_channel_id(self.id.clone()))
        } else {
            Ok(())
        }
    }

    fn set_interest(&self, wanted: Interest) {
        let mut current = self.interest.lock().unwrap();
        if *current == wanted {
            return;
        }
        let Some(token) = *self.token.lock().unwrap() else { return };
        let mut stream = self.stream.lock().unwrap();
        if reactor::reregister(&mut *stream, token, wanted).is_ok() {
            *current = wanted;
        }
    }

    /// Runs on this channel's executor after the reactor observed readability: drains the socket
    /// up to `max_messages_per_read` reads, firing `channel_read` for each non-empty chunk.
    fn do_read(self: &Arc<Self>) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let budget = self.options.max_messages_per_read.max(1);
        let mut scratch = vec![0u8; 16 * 1024];
        let mut read_any = false;
        for _ in 0..budget {
            let read_result = {
                let mut stream = self.stream.lock().unwrap();
                stream.read(&mut scratch)
            };
            match read_result {
                Ok(0) => {
                    self.close();
                    return;
                }
                Ok(n) => {
                    read_any = true;
                    let mut buf = Buf::new(n, usize::MAX);
                    let _ = buf.put_slice(&scratch[..n]);
                    self.with_pipeline(|pipeline| pipeline.fire_channel_read(PipelineMessage::Buffer(Box::new(buf))));
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    let cause = CoreError::new(codes::TRANSPORT_IO, format!("read failed: {err}"));
                    self.with_pipeline(|pipeline| pipeline.fire_exception_caught(None, cause));
                    self.close();
                    return;
                }
            }
        }
        if read_any {
            self.with_pipeline(|pipeline| pipeline.fire_channel_read_complete());
        }
    }

    /// Runs on this channel's executor, either right after `flush()` queues bytes or after the
    /// reactor reports writability again following a partial write.
    fn do_write(self: &Arc<Self>) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut drained = 0usize;
        loop {
            let front = {
                let pending = self.pending.lock().unwrap();
                pending.front().cloned()
            };
            let Some(chunk) = front else { break };
            let write_result = {
                let mut stream = self.stream.lock().unwrap();
                stream.write(&chunk)
            };
            match write_result {
                Ok(written) if written == chunk.len() => {
                    self.pending.lock().unwrap().pop_front();
                    drained += written;
                }
                Ok(written) => {
                    drained += written;
                    let mut pending = self.pending.lock().unwrap();
                    if let Some(front) = pending.front_mut() {
                        front.drain(..written);
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    self.set_interest(Interest::READABLE | Interest::WRITABLE);
                    break;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    let cause = CoreError::new(codes::TRANSPORT_IO, format!("write failed: {err}"));
                    self.with_pipeline(|pipeline| pipeline.fire_exception_caught(None, cause));
                    self.close();
                    return;
                }
            }
        }
        if self.pending.lock().unwrap().is_empty() {
            self.set_interest(Interest::READABLE);
        }
        self.pending_bytes.fetch_sub(drained, Ordering::AcqRel);
        self.recompute_writability();
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
            if let Some(this) = self.arc_self() {
                let _ = self.executor.execute(Box::new(move || {
                    this.with_pipeline(|pipeline| pipeline.fire_writability_changed(now_writable));
                }));
            }
        }
    }
}

impl Channel for TcpChannel {
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
        Err(CoreError::new(codes::CHANNEL_ALREADY_BOUND, "TcpChannel is already bound when constructed")
            .with_channel_id(self.id.clone()))
    }

    fn connect(&self, _addr: TransportSocketAddr) -> Result<()> {
        Err(CoreError::new(codes::CHANNEL_ALREADY_BOUND, "TcpChannel is already connected when constructed")
            .with_channel_id(self.id.clone()))
    }

    fn disconnect(&self) -> Result<()> {
        self.close();
        Ok(())
    }

    fn deregister(&self) {
        if let Some(token) = self.token.lock().unwrap().take() {
            let mut stream = self.stream.lock().unwrap();
            let _ = reactor::deregister(&mut *stream, token);
        }
        self.with_pipeline(|pipeline| pipeline.fire_channel_unregistered());
    }

    fn read(&self) {
        if let Some(this) = self.arc_self() {
            let _ = self.executor.execute(Box::new(move || this.do_read()));
        }
    }

    fn write(&self, msg: PipelineMessage) -> Result<WriteSignal> {
        self.check_open()?;
        let PipelineMessage::Buffer(mut buf) = msg else {
            return Err(CoreError::new(
                codes::CODEC_ENCODER_EXCEPTION,
                "TcpChannel::write received a message that was never encoded to bytes",
            ));
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
        let remaining = buf.remaining();
        let bytes = buf.read_slice(remaining)?;
        buf.release();
        let was_writable = self.writable.load(Ordering::Acquire);
        self.pending_bytes.fetch_add(bytes.len(), Ordering::AcqRel);
        self.pending.lock().unwrap().push_back(bytes);
        self.recompute_writability();
        let now_writable = self.writable.load(Ordering::Acquire);
        Ok(if was_writable && !now_writable { WriteSignal::FlowControlApplied } else { WriteSignal::Accepted })
    }

    fn flush(&self) -> Result<()> {
        self.check_open()?;
        if let Some(this) = self.arc_self() {
            let _ = self.executor.execute(Box::new(move || this.do_write()));
        }
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(token) = self.token.lock().unwrap().take() {
            let mut stream = self.stream.lock().unwrap();
            let _ = reactor::deregister(&mut *stream, token);
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        let dropped = self.pending.lock().unwrap().drain(..).count();
        self.pending_bytes.store(0, Ordering::Release);
        if dropped > 0 {
            tracing::debug!(
                target: "relay_transport_tcp",
                channel = %self.id,
                dropped,
                "dropped pending writes on close"
            );
        }
        self.with_pipeline(|pipeline| {
            pipeline.fire_channel_inactive();
            pipeline.fire_channel_unregistered();
        });
        self.completion.complete();
    }

    fn close_graceful(&self, _deadline: Option<core::time::Duration>) {
        self.close();
    }

    fn closed(&self) -> BoxFuture<'static, ()> {
        Box::pin(self.completion.future())
    }
}

/// Weak handle the reactor holds so it never keeps a closed channel's socket alive by itself.
struct ChannelReady(Weak<TcpChannel>);

impl ReadyHandler for ChannelReady {
    fn on_readable(&self) {
        if let Some(channel) = self.0.upgrade() {
            let _ = channel.executor.execute(Box::new(move || channel.do_read()));
        }
    }

    fn on_writable(&self) {
        if let Some(channel) = self.0.upgrade() {
            let _ = channel.executor.execute(Box::new(move || channel.do_write()));
        }
    }
}
