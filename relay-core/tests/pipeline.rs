use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use relay_core::buffer::{BufferAllocator, FixedClassPool, PipelineMessage};
use relay_core::error::{codes, CoreError};
use relay_core::future::BoxFuture;
use relay_core::pipeline::{
    Context, ExtensionsMap, InboundHandler, MiddlewareDescriptor, Pipeline,
};
use relay_core::transport::TransportSocketAddr;
use relay_core::{Channel, ChannelState, ReadableBuffer, WriteSignal};

/// A channel double that just records what was written to it, with no real socket behind it.
struct FakeChannel {
    extensions: ExtensionsMap,
    written: Mutex<Vec<Vec<u8>>>,
    bound: Mutex<Vec<TransportSocketAddr>>,
    connected: Mutex<Vec<TransportSocketAddr>>,
    disconnected: AtomicUsize,
    deregistered: AtomicUsize,
    read_requested: AtomicUsize,
    closed_gracefully: AtomicUsize,
}

impl FakeChannel {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            extensions: ExtensionsMap::new(),
            written: Mutex::new(Vec::new()),
            bound: Mutex::new(Vec::new()),
            connected: Mutex::new(Vec::new()),
            disconnected: AtomicUsize::new(0),
            deregistered: AtomicUsize::new(0),
            read_requested: AtomicUsize::new(0),
            closed_gracefully: AtomicUsize::new(0),
        })
    }
}

impl Channel for FakeChannel {
    fn id(&self) -> &str {
        "fake"
    }

    fn state(&self) -> ChannelState {
        ChannelState::Active
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn extensions(&self) -> &ExtensionsMap {
        &self.extensions
    }

    fn local_addr(&self) -> Option<TransportSocketAddr> {
        None
    }

    fn peer_addr(&self) -> Option<TransportSocketAddr> {
        None
    }

    fn bind(&self, addr: TransportSocketAddr) -> relay_core::error::Result<()> {
        self.bound.lock().unwrap().push(addr);
        Ok(())
    }

    fn connect(&self, addr: TransportSocketAddr) -> relay_core::error::Result<()> {
        self.connected.lock().unwrap().push(addr);
        Ok(())
    }

    fn disconnect(&self) -> relay_core::error::Result<()> {
        self.disconnected.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn deregister(&self) {
        self.deregistered.fetch_add(1, Ordering::SeqCst);
    }

    fn read(&self) {
        self.read_requested.fetch_add(1, Ordering::SeqCst);
    }

    fn write(&self, msg: PipelineMessage) -> relay_core::error::Result<WriteSignal> {
        if let PipelineMessage::Buffer(mut buf) = msg {
            let remaining = buf.remaining();
            let bytes = buf.read_slice(remaining).unwrap();
            buf.release();
            self.written.lock().unwrap().push(bytes);
        }
        Ok(WriteSignal::Accepted)
    }

    fn flush(&self) -> relay_core::error::Result<()> {
        Ok(())
    }

    fn close(&self) {}

    fn close_graceful(&self, _deadline: Option<core::time::Duration>) {
        self.closed_gracefully.fetch_add(1, Ordering::SeqCst);
    }

    fn closed(&self) -> BoxFuture<'static, ()> {
        Box::pin(async {})
    }
}

struct CountingHandler {
    reads: Arc<AtomicUsize>,
}

impl InboundHandler for CountingHandler {
    fn describe(&self) -> MiddlewareDescriptor {
        MiddlewareDescriptor { name: "counting" }
    }

    fn on_read(&self, _ctx: &dyn Context, msg: PipelineMessage) -> PipelineMessage {
        self.reads.fetch_add(1, Ordering::SeqCst);
        msg
    }
}

struct ExceptionRecorder {
    seen: Arc<Mutex<Vec<&'static str>>>,
}

impl InboundHandler for ExceptionRecorder {
    fn describe(&self) -> MiddlewareDescriptor {
        MiddlewareDescriptor { name: "exception_recorder" }
    }

    fn on_exception_caught(&self, _ctx: &dyn Context, cause: &CoreError) {
        self.seen.lock().unwrap().push(cause.code());
    }
}

fn new_pipeline() -> (Pipeline, Arc<FakeChannel>) {
    let channel = FakeChannel::new();
    let pipeline = Pipeline::new(channel.clone() as Arc<dyn Channel>, FixedClassPool::new());
    (pipeline, channel)
}

#[test]
fn add_last_rejects_a_duplicate_name() {
    let (mut pipeline, _channel) = new_pipeline();
    pipeline.add_last("h", Some(Box::new(CountingHandler { reads: Arc::new(AtomicUsize::new(0)) })), None).unwrap();
    let err = pipeline
        .add_last("h", Some(Box::new(CountingHandler { reads: Arc::new(AtomicUsize::new(0)) })), None)
        .unwrap_err();
    assert_eq!(err.code(), codes::PIPELINE_DUPLICATE_HANDLER);
}

#[test]
fn add_before_inserts_ahead_of_the_named_handler() {
    let (mut pipeline, _channel) = new_pipeline();
    let order = Arc::new(Mutex::new(Vec::<&'static str>::new()));

    struct Tagging {
        tag: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
    }
    impl InboundHandler for Tagging {
        fn on_read(&self, _ctx: &dyn Context, msg: PipelineMessage) -> PipelineMessage {
            self.order.lock().unwrap().push(self.tag);
            msg
        }
    }

    pipeline.add_last("second", Some(Box::new(Tagging { tag: "second", order: order.clone() })), None).unwrap();
    pipeline.add_before("second", "first", Some(Box::new(Tagging { tag: "first", order: order.clone() })), None).unwrap();

    pipeline.fire_channel_read(PipelineMessage::User(Box::new(())));
    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
}

#[test]
fn remove_runs_the_removed_handler_out_of_the_chain() {
    let (mut pipeline, _channel) = new_pipeline();
    let reads = Arc::new(AtomicUsize::new(0));
    pipeline.add_last("h", Some(Box::new(CountingHandler { reads: reads.clone() })), None).unwrap();
    pipeline.remove("h").unwrap();
    pipeline.fire_channel_read(PipelineMessage::User(Box::new(())));
    assert_eq!(reads.load(Ordering::SeqCst), 0);
    assert!(!pipeline.contains("h"));
}

#[test]
fn remove_unknown_handler_is_a_handler_not_found_error() {
    let (mut pipeline, _channel) = new_pipeline();
    let err = pipeline.remove("missing").unwrap_err();
    assert_eq!(err.code(), codes::PIPELINE_HANDLER_NOT_FOUND);
}

#[test]
fn an_unconsumed_buffer_reaching_the_tail_is_released_not_leaked() {
    let (mut pipeline, _channel) = new_pipeline();
    let pool = FixedClassPool::new();
    let mut buf = pool.acquire(4, usize::MAX);
    buf.put_slice(&[1, 2, 3]).unwrap();
    let shared = buf.retain();
    pipeline.fire_channel_read(PipelineMessage::Buffer(buf));
    assert!(shared.release(), "the pipeline's drop of the unconsumed buffer should have released it");
}

#[test]
fn exception_caught_reaches_the_first_handler_after_from_index() {
    let (mut pipeline, _channel) = new_pipeline();
    let seen = Arc::new(Mutex::new(Vec::new()));
    pipeline.add_last("before", Some(Box::new(ExceptionRecorder { seen: seen.clone() })), None).unwrap();
    pipeline.add_last("after", Some(Box::new(ExceptionRecorder { seen: seen.clone() })), None).unwrap();

    pipeline.fire_exception_caught(Some(0), CoreError::new(codes::TRANSPORT_IO, "boom"));
    assert_eq!(*seen.lock().unwrap(), vec![codes::TRANSPORT_IO]);
}

#[test]
fn fire_write_reaches_the_channel_when_no_outbound_handler_intercepts() {
    let (mut pipeline, channel) = new_pipeline();
    let pool = FixedClassPool::new();
    let mut buf = pool.acquire(4, usize::MAX);
    buf.put_slice(b"ok").unwrap();
    pipeline.fire_write(PipelineMessage::Buffer(buf)).unwrap();
    assert_eq!(channel.written.lock().unwrap().as_slice(), &[b"ok".to_vec()]);
}

#[test]
fn batch_messages_each_continue_from_right_after_the_decoder() {
    struct Splitter;
    impl InboundHandler for Splitter {
        fn on_read(&self, _ctx: &dyn Context, _msg: PipelineMessage) -> PipelineMessage {
            PipelineMessage::Batch(vec![PipelineMessage::User(Box::new(1u8)), PipelineMessage::User(Box::new(2u8))])
        }
    }
    let seen = Arc::new(AtomicUsize::new(0));
    let (mut pipeline, _channel) = new_pipeline();
    pipeline.add_last("splitter", Some(Box::new(Splitter)), None).unwrap();
    pipeline.add_last("counter", Some(Box::new(CountingHandler { reads: seen.clone() })), None).unwrap();
    pipeline.fire_channel_read(PipelineMessage::User(Box::new(())));
    assert_eq!(seen.load(Ordering::SeqCst), 2, "both batch items should reach the downstream handler");
}

#[test]
fn a_handler_with_only_outbound_is_skipped_on_inbound_propagation() {
    struct WriteOnly(AtomicBool);
    impl relay_core::pipeline::OutboundHandler for WriteOnly {
        fn on_write(
            &mut self,
            _ctx: &dyn Context,
            msg: PipelineMessage,
        ) -> relay_core::error::Result<relay_core::pipeline::WriteOutcome> {
            self.0.store(true, Ordering::SeqCst);
            Ok(relay_core::pipeline::WriteOutcome::Forward(msg))
        }
    }
    let (mut pipeline, _channel) = new_pipeline();
    pipeline.add_last("write_only", None, Some(Box::new(WriteOnly(AtomicBool::new(false))))).unwrap();
    // Should not panic despite the node having no inbound handler.
    pipeline.fire_channel_read(PipelineMessage::User(Box::new(())));
    pipeline.fire_channel_active();
    pipeline.fire_channel_inactive();
}

#[test]
fn fire_channel_registered_and_unregistered_reach_inbound_handlers() {
    struct LifecycleRecorder {
        events: Arc<Mutex<Vec<&'static str>>>,
    }
    impl InboundHandler for LifecycleRecorder {
        fn on_channel_registered(&self, _ctx: &dyn Context) {
            self.events.lock().unwrap().push("registered");
        }
        fn on_channel_unregistered(&self, _ctx: &dyn Context) {
            self.events.lock().unwrap().push("unregistered");
        }
    }
    let events = Arc::new(Mutex::new(Vec::new()));
    let (mut pipeline, _channel) = new_pipeline();
    pipeline.add_last("lifecycle", Some(Box::new(LifecycleRecorder { events: events.clone() })), None).unwrap();
    pipeline.fire_channel_registered();
    pipeline.fire_channel_unregistered();
    assert_eq!(*events.lock().unwrap(), vec!["registered", "unregistered"]);
}

#[test]
fn outbound_lifecycle_ops_propagate_through_handlers_and_terminate_at_the_channel() {
    struct Rewriter;
    impl relay_core::pipeline::OutboundHandler for Rewriter {
        fn on_bind(
            &mut self,
            _ctx: &dyn Context,
            _addr: TransportSocketAddr,
        ) -> relay_core::error::Result<TransportSocketAddr> {
            Ok(TransportSocketAddr::Local("rewritten".into()))
        }
    }
    let (mut pipeline, channel) = new_pipeline();
    pipeline.add_last("rewriter", None, Some(Box::new(Rewriter))).unwrap();

    pipeline.fire_bind(TransportSocketAddr::Local("original".into())).unwrap();
    assert_eq!(channel.bound.lock().unwrap().as_slice(), &[TransportSocketAddr::Local("rewritten".into())]);

    pipeline.fire_connect(TransportSocketAddr::Local("peer".into())).unwrap();
    assert_eq!(channel.connected.lock().unwrap().as_slice(), &[TransportSocketAddr::Local("peer".into())]);

    pipeline.fire_disconnect().unwrap();
    assert_eq!(channel.disconnected.load(Ordering::SeqCst), 1);

    pipeline.fire_deregister().unwrap();
    assert_eq!(channel.deregistered.load(Ordering::SeqCst), 1);

    pipeline.fire_read().unwrap();
    assert_eq!(channel.read_requested.load(Ordering::SeqCst), 1);
}

#[test]
fn fire_close_graceful_reaches_the_channel() {
    let (mut pipeline, channel) = new_pipeline();
    pipeline.fire_close_graceful(None).unwrap();
    assert_eq!(channel.closed_gracefully.load(Ordering::SeqCst), 1);
}

#[test]
fn context_reported_exception_surfaces_after_channel_read_returns() {
    struct FailingDecoder;
    impl InboundHandler for FailingDecoder {
        fn on_read(&self, ctx: &dyn Context, _msg: PipelineMessage) -> PipelineMessage {
            ctx.fire_exception_caught(CoreError::new(codes::CODEC_DECODER_EXCEPTION, "bad frame"));
            PipelineMessage::Batch(Vec::new())
        }
    }
    // `recorder` must sit ahead of `failing` in the chain: `fire_exception_caught` (like
    // `fire_exception_caught(Some(i), ..)` elsewhere) delivers to the first inbound handler at or
    // after its starting index, so the recorder needs to be that first handler to observe it.
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (mut pipeline, _channel) = new_pipeline();
    pipeline.add_last("recorder", Some(Box::new(ExceptionRecorder { seen: seen.clone() })), None).unwrap();
    pipeline.add_last("failing", Some(Box::new(FailingDecoder)), None).unwrap();
    pipeline.fire_channel_read(PipelineMessage::User(Box::new(())));
    assert_eq!(*seen.lock().unwrap(), vec![codes::CODEC_DECODER_EXCEPTION]);
}
