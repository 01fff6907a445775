//! The concrete single-threaded executor: one OS thread, a FIFO task queue, a delay-ordered timer
//! heap, and a graceful-shutdown state machine.
//!
//! # Why
//! Grounded in the same shape `aalykiot-dune`'s hand-rolled event loop uses for its task/timer
//! split (a `mio`-driven loop there; here the loop has no socket of its own — sockets are
//! registered into it by `relay-transport-tcp`'s reactor, which shares this executor's thread via
//! [`EventExecutor::execute`] rather than owning a second one).
//!
//! # How
//! `std::sync::mpsc` is the task queue (multi-producer, single-consumer — exactly the shape the
//! executor needs: many callers, one draining thread) and `BinaryHeap` is the timer queue,
//! reversed so the earliest deadline sorts first.
use std::collections::{BinaryHeap, HashSet};
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::{CoreError, Result, codes};
use crate::future::BoxFuture;
use crate::runtime::task::{JoinHandle, TaskError};
use crate::runtime::timer::{ScheduledTask, TimerId};
use crate::runtime::{TaskExecutor, TimeDriver};
use crate::sealed::Sealed;

/// Lifecycle of an [`EventExecutor`]. One-way: `NotStarted -> Started -> ShuttingDown -> Shutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExecutorState {
    NotStarted,
    Started,
    ShuttingDown,
    Shutdown,
}

enum Command {
    Task(Box<dyn FnOnce() + Send>),
    Schedule(ScheduledTask),
    Cancel(TimerId),
    Shutdown {
        quiet_period: Duration,
        timeout: Duration,
        done: SyncSender<()>,
    },
}

/// A single dedicated-thread task runner.
pub struct EventExecutor {
    sender: Sender<Command>,
    state: Arc<AtomicU8>,
    next_timer_id: AtomicU64,
    thread: std::sync::Mutex<Option<thread::JoinHandle<()>>>,
    worker_thread_id: thread::ThreadId,
    name: alloc::string::String,
}

const STATE_NOT_STARTED: u8 = 0;
const STATE_STARTED: u8 = 1;
const STATE_SHUTTING_DOWN: u8 = 2;
const STATE_SHUTDOWN: u8 = 3;

fn state_from_u8(value: u8) -> ExecutorState {
    match value {
        STATE_NOT_STARTED => ExecutorState::NotStarted,
        STATE_STARTED => ExecutorState::Started,
        STATE_SHUTTING_DOWN => ExecutorState::ShuttingDown,
        _ => ExecutorState::Shutdown,
    }
}

impl EventExecutor {
    /// Spawns the dedicated thread and returns a handle to it.
    pub fn spawn(name: impl Into<alloc::string::String>) -> Arc<Self> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Command>();
        let state = Arc::new(AtomicU8::new(STATE_STARTED));
        let loop_state = Arc::clone(&state);
        let loop_name = name.clone();

        let thread_id_slot = Arc::new(std::sync::Mutex::new(None::<thread::ThreadId>));
        let thread_id_slot_for_thread = Arc::clone(&thread_id_slot);

        let join = thread::Builder::new()
            .name(format!("relay-executor-{loop_name}"))
            .spawn(move || {
                *thread_id_slot_for_thread.lock().unwrap() = Some(thread::current().id());
                run_loop(receiver, loop_state, &loop_name);
            })
            .expect("failed to spawn executor thread");

        // The worker records its own ThreadId as the first thing it does; block briefly until
        // it's visible so `in_event_loop` is correct even if called immediately after spawn.
        let worker_thread_id = loop {
            if let Some(id) = *thread_id_slot.lock().unwrap() {
                break id;
            }
            thread::yield_now();
        };

        Arc::new(Self {
            sender,
            state,
            next_timer_id: AtomicU64::new(1),
            thread: std::sync::Mutex::new(Some(join)),
            worker_thread_id,
            name,
        })
    }

    /// This executor's diagnostic name, as given to [`Self::spawn`].
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawns a task and returns a handle to its typed result, erasing `T` across the channel
    /// boundary the way the executor's own task queue erases every task to `FnOnce()`.
    pub fn spawn_task<T, F>(&self, f: F) -> JoinHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let boxed: Box<dyn FnOnce() + Send> = Box::new(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f))
                .map_err(|_| TaskError::Panicked);
            let _ = tx.send(result);
        });
        if self.execute(boxed).is_err() {
            // Channel rejected after shutdown: the sender above is dropped here, so `rx.recv()`
            // sees a disconnected channel and `JoinHandle::join` correctly reports `Cancelled`.
        }
        JoinHandle::new(rx)
    }
}

impl Sealed for EventExecutor {}

impl TaskExecutor for EventExecutor {
    fn execute(&self, task: Box<dyn FnOnce() + Send>) -> Result<()> {
        if self.state.load(Ordering::Acquire) >= STATE_SHUTTING_DOWN {
            return Err(CoreError::new(codes::EXECUTOR_REJECTED, "executor is shutting down"));
        }
        self.sender
            .send(Command::Task(task))
            .map_err(|_| CoreError::new(codes::EXECUTOR_REJECTED, "executor thread is gone"))
    }

    fn schedule(&self, task: Box<dyn FnOnce() + Send>, delay: Duration) -> Result<TimerId> {
        if self.state.load(Ordering::Acquire) >= STATE_SHUTTING_DOWN {
            return Err(CoreError::new(codes::EXECUTOR_REJECTED, "executor is shutting down"));
        }
        let id = TimerId(self.next_timer_id.fetch_add(1, Ordering::Relaxed));
        let deadline = Instant::now().duration_since(process_epoch()) + delay;
        self.sender
            .send(Command::Schedule(ScheduledTask {
                deadline,
                id,
                task,
            }))
            .map_err(|_| CoreError::new(codes::EXECUTOR_REJECTED, "executor thread is gone"))?;
        Ok(id)
    }

    fn in_event_loop(&self) -> bool {
        thread::current().id() == self.worker_thread_id
    }

    fn state(&self) -> ExecutorState {
        state_from_u8(self.state.load(Ordering::Acquire))
    }

    fn shutdown_gracefully(&self, quiet_period: Duration, timeout: Duration) -> BoxFuture<'static, ()> {
        self.state.store(STATE_SHUTTING_DOWN, Ordering::Release);
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        let sent = self.sender.send(Command::Shutdown {
            quiet_period,
            timeout,
            done: done_tx,
        });
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            if sent.is_ok() {
                let _ = done_rx.recv();
            }
            state.store(STATE_SHUTDOWN, Ordering::Release);
        })
    }
}

impl TimeDriver for EventExecutor {
    fn cancel_scheduled(&self, id: TimerId) -> bool {
        self.sender.send(Command::Cancel(id)).is_ok()
    }
}

impl Drop for EventExecutor {
    fn drop(&mut self) {
        if let Some(join) = self.thread.lock().unwrap().take() {
            drop(join); // detach: the worker exits on its own once the sender side is dropped too.
        }
    }
}

// The timer heap is keyed by `Duration` (not `Instant`) so it stays comparable across the
// `no_std`-safe parts of this module; both the executor handle and its worker thread measure
// deadlines against this single lazily-chosen, process-wide reference point.
static PROCESS_EPOCH: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

fn process_epoch() -> Instant {
    *PROCESS_EPOCH.get_or_init(Instant::now)
}

fn run_loop(receiver: Receiver<Command>, state: Arc<AtomicU8>, name: &str) {
    let mut timers: BinaryHeap<ScheduledTask> = BinaryHeap::new();
    let mut cancelled: HashSet<u64> = HashSet::new();
    let epoch = process_epoch();

    debug!(target: "relay_core::runtime", executor = name, "executor thread started");

    'outer: loop {
        let now = Instant::now().duration_since(epoch);
        let wait = timers
            .peek()
            .map(|t| t.deadline.saturating_sub(now))
            .unwrap_or(Duration::from_secs(3600));

        match receiver.recv_timeout(wait) {
            Ok(Command::Task(task)) => task(),
            Ok(Command::Schedule(scheduled)) => timers.push(scheduled),
            Ok(Command::Cancel(id)) => {
                cancelled.insert(id.0);
            }
            Ok(Command::Shutdown { quiet_period, timeout, done }) => {
                drain_until_quiet(&receiver, &mut timers, &mut cancelled, quiet_period, timeout);
                let _ = done.send(());
                break 'outer;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                fire_due_timers(&mut timers, &mut cancelled, epoch);
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break 'outer,
        }
    }

    state.store(STATE_SHUTDOWN, Ordering::Release);
    debug!(target: "relay_core::runtime", executor = name, "executor thread terminated");
}

fn fire_due_timers(timers: &mut BinaryHeap<ScheduledTask>, cancelled: &mut HashSet<u64>, epoch: Instant) {
    let now = Instant::now().duration_since(epoch);
    while let Some(top) = timers.peek() {
        if top.deadline > now {
            break;
        }
        let due = timers.pop().expect("peeked Some above");
        if cancelled.remove(&due.id.0) {
            trace!(target: "relay_core::runtime", timer = due.id.0, "scheduled task cancelled before firing");
            continue;
        }
        (due.task)();
    }
}

fn drain_until_quiet(
    receiver: &Receiver<Command>,
    timers: &mut BinaryHeap<ScheduledTask>,
    cancelled: &mut HashSet<u64>,
    quiet_period: Duration,
    timeout: Duration,
) {
    let shutdown_start = Instant::now();
    let mut last_activity = Instant::now();
    loop {
        if shutdown_start.elapsed() >= timeout {
            warn!(target: "relay_core::runtime", "graceful shutdown hit its timeout with work still queued");
            break;
        }
        if last_activity.elapsed() >= quiet_period && timers.is_empty() {
            break;
        }
        let slice = quiet_period.min(Duration::from_millis(25));
        match receiver.recv_timeout(slice) {
            Ok(Command::Task(task)) => {
                task();
                last_activity = Instant::now();
            }
            Ok(Command::Schedule(scheduled)) => {
                timers.push(scheduled);
                last_activity = Instant::now();
            }
            Ok(Command::Cancel(id)) => {
                cancelled.insert(id.0);
            }
            Ok(Command::Shutdown { done, .. }) => {
                // A second shutdown request while one is in flight: just ack it too.
                let _ = done.send(());
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let epoch = process_epoch();
                if !timers.is_empty() {
                    fire_due_timers(timers, cancelled, epoch);
                    last_activity = Instant::now();
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}
