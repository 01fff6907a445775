use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use relay_core::runtime::{EventExecutor, EventLoopGroup, ExecutorState, TaskExecutor, TimeDriver};

fn wait_for(cond: impl Fn() -> bool, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn tasks_run_in_fifo_order() {
    let executor = EventExecutor::spawn("fifo-order");
    let order: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
    for i in 0..10 {
        let order = Arc::clone(&order);
        executor.execute(Box::new(move || order.lock().unwrap().push(i))).unwrap();
    }
    assert!(wait_for(|| order.lock().unwrap().len() == 10, Duration::from_secs(1)));
    assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
}

#[test]
fn scheduled_tasks_fire_in_deadline_order_regardless_of_submission_order() {
    let executor = EventExecutor::spawn("timer-order");
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let late = Arc::clone(&order);
    executor.schedule(Box::new(move || late.lock().unwrap().push("late")), Duration::from_millis(60)).unwrap();
    let early = Arc::clone(&order);
    executor.schedule(Box::new(move || early.lock().unwrap().push("early")), Duration::from_millis(10)).unwrap();

    assert!(wait_for(|| order.lock().unwrap().len() == 2, Duration::from_secs(1)));
    assert_eq!(*order.lock().unwrap(), vec!["early", "late"]);
}

#[test]
fn cancelling_a_scheduled_task_stops_it_from_firing() {
    let executor = EventExecutor::spawn("cancel");
    let fired = Arc::new(AtomicUsize::new(0));
    let fired_for_task = Arc::clone(&fired);
    let id = executor
        .schedule(Box::new(move || fired_for_task.fetch_add(1, Ordering::SeqCst)), Duration::from_millis(40))
        .unwrap();
    assert!(executor.cancel_scheduled(id));
    std::thread::sleep(Duration::from_millis(80));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn in_event_loop_is_true_only_on_the_executors_own_thread() {
    let executor = EventExecutor::spawn("self-check");
    assert!(!executor.in_event_loop());
    let seen = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let seen_for_task = Arc::clone(&seen);
    let executor_for_task = Arc::clone(&executor);
    executor
        .execute(Box::new(move || seen_for_task.store(executor_for_task.in_event_loop(), Ordering::SeqCst)))
        .unwrap();
    assert!(wait_for(|| seen.load(Ordering::SeqCst), Duration::from_secs(1)));
}

#[test]
fn shutdown_gracefully_drains_queued_work_then_rejects_new_tasks() {
    let executor = EventExecutor::spawn("shutdown");
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_for_task = Arc::clone(&ran);
    executor.execute(Box::new(move || ran_for_task.fetch_add(1, Ordering::SeqCst))).unwrap();

    futures_block_on(executor.shutdown_gracefully(Duration::from_millis(10), Duration::from_secs(2)));

    assert_eq!(executor.state(), ExecutorState::Shutdown);
    assert_eq!(ran.load(Ordering::SeqCst), 1, "work queued before shutdown should still have run");
    assert!(executor.execute(Box::new(|| {})).is_err(), "a shut-down executor must reject new tasks");
}

#[test]
fn event_loop_group_hands_out_executors_round_robin() {
    let group = EventLoopGroup::new("rr", 3);
    assert_eq!(group.len(), 3);
    let names: Vec<String> = (0..6).map(|_| group.next().name().to_string()).collect();
    assert_eq!(names[0], names[3]);
    assert_eq!(names[1], names[4]);
    assert_eq!(names[2], names[5]);
    assert_ne!(names[0], names[1]);
}

/// Minimal spin-park executor for the one future this test file awaits, mirroring how the
/// runnable echo demo blocks on `EventLoopGroup::shutdown_gracefully`.
fn futures_block_on<F: std::future::Future<Output = ()>>(mut future: F) {
    use std::task::{Context as TaskContext, Poll, RawWaker, RawWakerVTable, Waker};

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
    let mut future = unsafe { std::pin::Pin::new_unchecked(&mut future) };
    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(()) => return,
            Poll::Pending => std::thread::park(),
        }
    }
}
