use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use relay_core::bootstrap::{Bootstrap, FnInitializer, ServerBootstrap};
use relay_core::buffer::{Buf, PipelineMessage};
use relay_core::pipeline::{Context, InboundHandler, MiddlewareDescriptor};
use relay_core::runtime::EventLoopGroup;
use relay_core::transport::TransportSocketAddr;
use relay_core::{ReadableBuffer, WritableBuffer};
use relay_transport_local::{LocalAcceptor, LocalConnector};

/// Records every buffer it sees and releases it, the way a real application handler would once
/// it has consumed the payload.
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
fn client_write_arrives_at_server_channel_read() {
    let boss = EventLoopGroup::new("local-boss", 1);
    let worker = EventLoopGroup::new("local-worker", 1);
    let client_group = EventLoopGroup::new("local-client", 1);

    let server_seen: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
    let server_seen_for_init = Arc::clone(&server_seen);

    let server = ServerBootstrap::new()
        .groups(boss, worker)
        .acceptor(Arc::new(LocalAcceptor::new()))
        .child_handler(FnInitializer::new(move |pipeline: &mut relay_core::pipeline::Pipeline| {
            pipeline.add_last(
                "capture",
                Some(Box::new(Capture { seen: Arc::clone(&server_seen_for_init) })),
                None,
            )
        }))
        .bind(TransportSocketAddr::Local("echo-test".to_string()))
        .expect("bind should succeed against a fresh local address");

    let client = Bootstrap::new()
        .group(client_group)
        .connector(Arc::new(LocalConnector::new()))
        .handler(FnInitializer::new(|_pipeline: &mut relay_core::pipeline::Pipeline| Ok(())))
        .connect(TransportSocketAddr::Local("echo-test".to_string()))
        .expect("connect should find the bound listener");

    let mut payload = Buf::new(2, usize::MAX);
    payload.put_slice(&[0x01, 0x02]).unwrap();
    client.write(PipelineMessage::Buffer(Box::new(payload))).expect("write accepted");
    client.flush().expect("flush delivers to the peer");

    assert!(
        wait_for(|| !server_seen.lock().unwrap().is_empty(), Duration::from_secs(1)),
        "server never observed a channel_read"
    );
    assert_eq!(server_seen.lock().unwrap()[0], vec![0x01, 0x02]);

    server.close();
}
