//! Task scheduling capability and the shipped manual turn scheduler.
//!
//! The core depends only on the [`Scheduler`] capability: `enqueue(task)`
//! queues a task to run in FIFO order after the current synchronous scope
//! unwinds. Any host facility with those two properties can back it: a
//! microtask queue, a deferred work list, or the test-controllable
//! [`TurnScheduler`] shipped here.
//!
//! Key properties of [`TurnScheduler`]:
//! - strict FIFO dispatch; tasks enqueued while draining run in the same
//!   drain,
//! - re-entrant `run_to_idle` calls are no-ops (a task cannot re-drain the
//!   queue it is running on),
//! - a drain safety cap bounds runaway task chains,
//! - every enqueue/run is recorded in a serializable trace log, so
//!   identical inputs produce identical logs across runs.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskKind};

// ---------------------------------------------------------------------------
// Scheduler — the capability the core consumes
// ---------------------------------------------------------------------------

/// Task-queue capability.
///
/// Implementations must run enqueued tasks in FIFO order, outside the
/// enqueuer's stack. The core never assumes anything else about the host.
pub trait Scheduler {
    fn enqueue(&self, task: Task);
}

/// Shared handle to a scheduler capability.
pub type SchedulerRef = Rc<dyn Scheduler>;

// ---------------------------------------------------------------------------
// TraceEvent — scheduler observability
// ---------------------------------------------------------------------------

/// Record of scheduler activity, kept for replay-style assertions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceEvent {
    /// A task entered the queue.
    TaskEnqueued { seq: u64, kind: TaskKind },
    /// A task was dequeued and run.
    TaskRan { seq: u64, kind: TaskKind },
}

// ---------------------------------------------------------------------------
// TurnScheduler — manual FIFO queue
// ---------------------------------------------------------------------------

/// Manual FIFO scheduler.
///
/// Nothing runs until the driver calls [`TurnScheduler::run_to_idle`],
/// which drains the queue (including tasks enqueued mid-drain) and then
/// returns. This is the test-controllable backing for the scheduler
/// capability; hosts with a real microtask source supply their own
/// [`Scheduler`] instead.
pub struct TurnScheduler {
    queue: RefCell<VecDeque<Task>>,
    draining: Cell<bool>,
    enqueue_seq: Cell<u64>,
    run_seq: Cell<u64>,
    drain_cap: u64,
    trace: RefCell<Vec<TraceEvent>>,
}

impl TurnScheduler {
    /// Safety limit on tasks run per drain.
    pub const DEFAULT_DRAIN_CAP: u64 = 100_000;

    pub fn new() -> Rc<Self> {
        Self::with_drain_cap(Self::DEFAULT_DRAIN_CAP)
    }

    pub fn with_drain_cap(drain_cap: u64) -> Rc<Self> {
        Rc::new(Self {
            queue: RefCell::new(VecDeque::new()),
            draining: Cell::new(false),
            enqueue_seq: Cell::new(0),
            run_seq: Cell::new(0),
            drain_cap,
            trace: RefCell::new(Vec::new()),
        })
    }

    /// Run queued tasks in FIFO order until the queue is empty or the drain
    /// cap is reached. Returns the number of tasks run. Re-entrant calls
    /// (from inside a running task) return 0 without touching the queue.
    pub fn run_to_idle(&self) -> u64 {
        if self.draining.replace(true) {
            return 0;
        }
        let mut ran = 0u64;
        while ran < self.drain_cap {
            let next = self.queue.borrow_mut().pop_front();
            let Some(task) = next else {
                break;
            };
            let seq = self.run_seq.get();
            self.run_seq.set(seq + 1);
            self.trace.borrow_mut().push(TraceEvent::TaskRan {
                seq,
                kind: task.kind(),
            });
            task.run();
            ran += 1;
        }
        self.draining.set(false);
        ran
    }

    /// Number of queued, not-yet-run tasks.
    pub fn pending_count(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Total number of tasks ever enqueued.
    pub fn total_enqueued(&self) -> u64 {
        self.enqueue_seq.get()
    }

    /// Ordered copy of the trace log.
    pub fn trace(&self) -> Vec<TraceEvent> {
        self.trace.borrow().clone()
    }
}

impl Scheduler for TurnScheduler {
    fn enqueue(&self, task: Task) {
        let seq = self.enqueue_seq.get();
        self.enqueue_seq.set(seq + 1);
        self.trace.borrow_mut().push(TraceEvent::TaskEnqueued {
            seq,
            kind: task.kind(),
        });
        self.queue.borrow_mut().push_back(task);
    }
}
