use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use relay_core::bootstrap::{Bootstrap, FnInitializer, ServerBootstrap};
use relay_core::buffer::{Buf, PipelineMessage};
use relay_core::pipeline::{Context, InboundHandler, MiddlewareDescriptor, Pipeline};
use relay_core::runtime::EventLoopGroup;
use relay_core::{ReadableBuffer, WritableBuffer};
use relay_transport_tcp::{TcpAcceptor, TcpConnector};

/// Writes back whatever it reads, the way a minimal echo server would.
struct Echo;

impl InboundHandler for Echo {
    fn describe(&self) -> MiddlewareDescriptor {
        MiddlewareDescriptor { name: "echo" }
    }

    fn on_read(&self, ctx: &dyn Context, msg: PipelineMessage) -> PipelineMessage {
        if let PipelineMessage::Buffer(mut buf) = msg {
            let remaining = buf.remaining();
            let bytes = buf.read_slice(remaining).expect("read_slice within bounds");
            buf.release();
            let mut echoed = Buf::new(bytes.len(), usize::MAX);
            echoed.put_slice(&bytes).unwrap();
            let _ = ctx.channel().write(PipelineMessage::Buffer(Box::new(echoed)));
            let _ = ctx.channel().flush();
            PipelineMessage::User(Box::new(()))
        } else {
            msg
        }
    }
}

/// Records every buffer it sees on the client side and releases it.
struct Capture {
    seen: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl InboundHandler for Capture {
    fn describe(&self) -> MiddlewareDescriptor {
        MiddlewareDescriptor { name: "capture" }
    }

    fn on_read(&self, _ctx: &dyn Context, msg: PipelineMessage) -> PipelineMessage {
        if let PipelineMessage::Buffer(mut buf) = msg {
            let remaining = buf.remaining();
            let bytes = buf.read_slice(remaining).expect("read_slice within bounds");
            self.seen.lock().unwrap().push(bytes);
            buf.release();
            PipelineMessage::User(Box::new(()))
        } else {
            msg
        }
    }
}

fn wait_for(cond: impl Fn() -> bool, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn client_write_is_echoed_back_over_real_sockets() {
    let boss = EventLoopGroup::new("tcp-boss", 1);
    let worker = EventLoopGroup::new("tcp-worker", 1);
    let client_group = EventLoopGroup::new("tcp-client", 1);

    let server = ServerBootstrap::new()
        .groups(boss, worker)
        .acceptor(Arc::new(TcpAcceptor::new()))
        .child_handler(FnInitializer::new(|pipeline: &mut Pipeline| {
            pipeline.add_last("echo", Some(Box::new(Echo)), None)
        }))
        .bind("127.0.0.1:0")
        .expect("bind should succeed on an ephemeral port");

    let addr = server.local_addr().expect("bound listener reports its local address");

    let client_seen: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
    let client_seen_for_init = Arc::clone(&client_seen);

    let client = Bootstrap::new()
        .group(client_group)
        .connector(Arc::new(TcpConnector::new()))
        .handler(FnInitializer::new(move |pipeline: &mut Pipeline| {
            pipeline.add_last("capture", Some(Box::new(Capture { seen: Arc::clone(&client_seen_for_init) })), None)
        }))
        .connect(addr)
        .expect("connect should reach the freshly bound listener");

    let mut payload = Buf::new(5, usize::MAX);
    payload.put_slice(b"hello").unwrap();
    client.write(PipelineMessage::Buffer(Box::new(payload))).expect("write accepted");
    client.flush().expect("flush sends over the socket");

    assert!(
        wait_for(|| !client_seen.lock().unwrap().is_empty(), Duration::from_secs(2)),
        "client never observed the echoed bytes"
    );
    assert_eq!(client_seen.lock().unwrap()[0], b"hello".to_vec());

    client.close();
    server.close();
}
