//! Timer plumbing for the typing engine.
//!
//! Engines never touch a clock directly; they ask a [`Scheduler`] to run a task
//! after a delay and keep the returned [`TimerHandle`] so it can be cancelled.
//! [`ManualClock`] advances virtual time on demand (tests, offline planning);
//! [`RealtimeLoop`] sleeps on the wall clock and can be interrupted.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

pub type Task = Box<dyn FnOnce() + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

pub trait Scheduler {
    /// Run `task` once, `delay_ms` from now.
    fn schedule(&self, delay_ms: u64, task: Task) -> TimerHandle;

    /// Drop a scheduled task. Unknown or already-fired handles are ignored.
    fn cancel(&self, handle: TimerHandle);
}

/// Tasks ordered by due time, then by scheduling order.
#[derive(Default)]
struct TimerQueue {
    next_id: u64,
    tasks: BTreeMap<(u64, u64), Task>,
    due_by_id: HashMap<u64, u64>,
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("next_id", &self.next_id)
            .field("pending", &self.tasks.len())
            .finish()
    }
}

impl TimerQueue {
    fn push(&mut self, due_ms: u64, task: Task) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.insert((due_ms, id), task);
        self.due_by_id.insert(id, due_ms);
        TimerHandle(id)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(due_ms) = self.due_by_id.remove(&handle.0) {
            self.tasks.remove(&(due_ms, handle.0));
        }
    }

    fn next_due(&self) -> Option<u64> {
        self.tasks.keys().next().map(|(due_ms, _)| *due_ms)
    }

    fn pop_due(&mut self, now_ms: u64) -> Option<Task> {
        let (&(due_ms, id), _) = self.tasks.iter().next()?;
        if due_ms > now_ms {
            return None;
        }
        self.due_by_id.remove(&id);
        self.tasks.remove(&(due_ms, id))
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }
}

/// Deterministic virtual clock. Time only moves when the owner advances it.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: Cell<u64>,
    queue: RefCell<TimerQueue>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Move time forward by `ms`, firing every task that falls due on the way.
    /// Each task observes `now_ms()` equal to its own due time.
    pub fn advance(&self, ms: u64) -> usize {
        let target = self.now_ms.get().saturating_add(ms);
        let mut fired = 0;

        loop {
            let due = self.queue.borrow().next_due();
            match due {
                Some(due_ms) if due_ms <= target => {
                    self.now_ms.set(self.now_ms.get().max(due_ms));
                    if self.fire_due() {
                        fired += 1;
                    }
                }
                _ => break,
            }
        }

        self.now_ms.set(target);
        fired
    }

    /// Jump to the earliest pending task and run it. Returns `false` when idle.
    pub fn run_next(&self) -> bool {
        let due = self.queue.borrow().next_due();
        let Some(due_ms) = due else {
            return false;
        };
        self.now_ms.set(self.now_ms.get().max(due_ms));
        self.fire_due()
    }

    /// Run tasks until none are pending. Returns how many fired.
    pub fn run_until_idle(&self) -> usize {
        let mut fired = 0;
        while self.run_next() {
            fired += 1;
        }
        fired
    }

    fn fire_due(&self) -> bool {
        // The queue borrow must end before the task runs: tasks reschedule.
        let task = self.queue.borrow_mut().pop_due(self.now_ms.get());
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }
}

impl Scheduler for ManualClock {
    fn schedule(&self, delay_ms: u64, task: Task) -> TimerHandle {
        let due_ms = self.now_ms.get().saturating_add(delay_ms);
        self.queue.borrow_mut().push(due_ms, task)
    }

    fn cancel(&self, handle: TimerHandle) {
        self.queue.borrow_mut().cancel(handle);
    }
}

/// Single-threaded wall-clock event loop.
#[derive(Debug)]
pub struct RealtimeLoop {
    started: Instant,
    queue: RefCell<TimerQueue>,
    stop: Arc<AtomicBool>,
}

impl Default for RealtimeLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeLoop {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            queue: RefCell::new(TimerQueue::default()),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between sleeps; setting it makes [`RealtimeLoop::run`] bail out.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis().try_into().unwrap_or(u64::MAX)
    }

    /// Run until no task is pending, or fail with `aborted` once the stop flag is set.
    pub fn run(&self) -> Result<()> {
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return Err(anyhow!("aborted"));
            }

            let due = self.queue.borrow().next_due();
            let Some(due_ms) = due else {
                return Ok(());
            };

            let now = self.elapsed_ms();
            if due_ms > now {
                sleep_interruptible(&self.stop, due_ms - now);
                continue;
            }

            let task = self.queue.borrow_mut().pop_due(now);
            if let Some(task) = task {
                task();
            }
        }
    }
}

impl Scheduler for RealtimeLoop {
    fn schedule(&self, delay_ms: u64, task: Task) -> TimerHandle {
        let due_ms = self.elapsed_ms().saturating_add(delay_ms);
        self.queue.borrow_mut().push(due_ms, task)
    }

    fn cancel(&self, handle: TimerHandle) {
        self.queue.borrow_mut().cancel(handle);
    }
}

fn sleep_interruptible(stop: &AtomicBool, ms: u64) {
    let mut remaining = ms;
    while remaining > 0 {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let step = remaining.min(50);
        std::thread::sleep(Duration::from_millis(step));
        remaining -= step;
    }
}
