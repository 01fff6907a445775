//! Runnable echo server: binds a TCP listener, writes back whatever each connection sends, and
//! shuts both event-loop groups down gracefully on `quit`.
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll, RawWaker, RawWakerVTable, Waker};

use relay_core::bootstrap::{FnInitializer, ServerBootstrap};
use relay_core::buffer::{Buf, PipelineMessage};
use relay_core::pipeline::{Context, InboundHandler, MiddlewareDescriptor, Pipeline};
use relay_core::runtime::EventLoopGroup;
use relay_core::{ReadableBuffer, WritableBuffer};
use relay_transport_tcp::TcpAcceptor;

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
            echoed.put_slice(&bytes).expect("fresh buffer has room for its own bytes");
            if let Err(err) = ctx.channel().write(PipelineMessage::Buffer(Box::new(echoed))) {
                tracing::warn!(target: "relay_echo_demo", %err, "write failed");
            }
            let _ = ctx.channel().flush();
            PipelineMessage::User(Box::new(()))
        } else {
            msg
        }
    }
}

/// Blocks the calling thread on a future by parking it between wakeups, the way a minimal
/// single-future executor would. Fine for the one or two futures this binary ever awaits.
fn block_on<F: std::future::Future<Output = ()>>(mut future: F) {
    fn clone(ptr: *const ()) -> RawWaker {
        RawWaker::new(ptr, &VTABLE)
    }
    fn wake(ptr: *const ()) {
        unsafe { (ptr as *const std::thread::Thread).as_ref().unwrap().unpark() }
    }
    fn wake_by_ref(ptr: *const ()) {
        wake(ptr)
    }
    fn drop_waker(_ptr: *const ()) {}
    static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, wake, wake_by_ref, drop_waker);

    let thread = std::thread::current();
    let raw = RawWaker::new(&thread as *const _ as *const (), &VTABLE);
    let waker = unsafe { Waker::from_raw(raw) };
    let mut cx = TaskContext::from_waker(&waker);
    // SAFETY: `future` is a local that is never moved again after this point.
    let mut future = unsafe { std::pin::Pin::new_unchecked(&mut future) };
    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(()) => return,
            Poll::Pending => std::thread::park(),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let bind_addr = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:7878".to_string());

    let boss = EventLoopGroup::new("echo-boss", 1);
    let worker = EventLoopGroup::new("echo-worker", num_cpus());

    let server = ServerBootstrap::new()
        .groups(Arc::clone(&boss), Arc::clone(&worker))
        .acceptor(Arc::new(TcpAcceptor::new()))
        .child_handler(FnInitializer::new(|pipeline: &mut Pipeline| {
            pipeline.add_last("echo", Some(Box::new(Echo)), None)
        }))
        .bind(bind_addr.as_str())
        .unwrap_or_else(|err| panic!("failed to bind {bind_addr}: {err}"));

    let local_addr = server.local_addr().expect("a bound listener always reports its local address");
    tracing::info!(target: "relay_echo_demo", %local_addr, "echo server listening; type 'quit' to stop");

    let mut line = String::new();
    loop {
        line.clear();
        if std::io::stdin().read_line(&mut line).unwrap_or(0) == 0 || line.trim() == "quit" {
            break;
        }
    }

    tracing::info!(target: "relay_echo_demo", "shutting down");
    server.close();
    block_on(boss.shutdown_gracefully(std::time::Duration::from_millis(100), std::time::Duration::from_secs(5)));
    block_on(worker.shutdown_gracefully(std::time::Duration::from_millis(100), std::time::Duration::from_secs(5)));
}

fn num_cpus() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}
