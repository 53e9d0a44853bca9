//! Handler variants and the deferred state machine.
//!
//! A [`Handler`] is the shared, state-bearing half of a promise. Five kinds
//! exist behind one tagged enum:
//! - `Fulfilled` / `Rejected`: terminal, immutable.
//! - `Empty`: permanently pending; ignores everything.
//! - `Deferred`: pending with a consumer queue; the only kind on which
//!   `resolve` / `reject` / `notify` act. Settlement is one-shot and
//!   idempotent: the first transition wins, later attempts are silent
//!   no-ops.
//! - `Following`: forwards to another handler, optionally rebinding the
//!   receiver passed to reaction callbacks.
//!
//! Reactions never run inside `when`, `resolve`, or `reject`: every
//! dispatch goes through a scheduled task, so callers never observe a
//! half-resolved chain.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::resolution::classify;
use crate::scheduler::SchedulerRef;
use crate::snapshot::StateSnapshot;
use crate::task::Task;
use crate::value::{ForeignThenable, Value};

// ---------------------------------------------------------------------------
// Callback and Continuation — reified reaction registration
// ---------------------------------------------------------------------------

/// Reaction callback: receives the settled value (or progress payload) and
/// the bound receiver; returns the transformed value, or the raised error
/// through `Err`.
pub type Callback = Rc<dyn Fn(Value, Option<&Value>) -> Result<Value, Value>>;

/// The argument bundle of a `when` registration: the downstream deferred
/// that receives the outcome, the receiver to bind, and the optional
/// reaction callbacks.
#[derive(Clone)]
pub struct Continuation {
    pub target: Handler,
    pub receiver: Option<Value>,
    pub on_fulfilled: Option<Callback>,
    pub on_rejected: Option<Callback>,
    pub on_progress: Option<Callback>,
}

impl Continuation {
    /// A continuation with no callbacks: the target simply mirrors the
    /// source's outcome.
    pub fn mirror(target: Handler) -> Self {
        Self {
            target,
            receiver: None,
            on_fulfilled: None,
            on_rejected: None,
            on_progress: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Settlers — one-shot settle callbacks bound to a deferred
// ---------------------------------------------------------------------------

/// The resolve/reject/notify capability handed to resolvers and foreign
/// thenables. All three route into one deferred handler; once it settles,
/// every further call is a silent no-op, so misbehaving callers (double
/// resolution, late rejection) are absorbed rather than propagated.
#[derive(Clone)]
pub struct Settlers {
    target: Handler,
}

impl Settlers {
    pub(crate) fn new(target: Handler) -> Self {
        Self { target }
    }

    pub fn resolve(&self, value: Value) {
        self.target.resolve(value);
    }

    pub fn reject(&self, reason: Value) {
        self.target.reject(reason);
    }

    pub fn notify(&self, payload: Value) {
        self.target.notify(payload);
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Shared reference to a handler. Cloning shares the underlying state;
/// identity (`is`) is reference identity.
#[derive(Clone)]
pub struct Handler {
    cell: Rc<HandlerCell>,
}

struct HandlerCell {
    kind: RefCell<HandlerKind>,
    scheduler: SchedulerRef,
}

enum HandlerKind {
    Fulfilled { value: Value },
    Rejected { reason: Value },
    Empty,
    Deferred(DeferredCore),
    Following { inner: Handler, receiver: Option<Value> },
}

struct DeferredCore {
    /// The traversed handler adopted at settlement; `None` while pending.
    settled: Option<Handler>,
    /// Registered continuations, drained once in attachment order.
    consumers: Vec<Continuation>,
    /// Receiver inherited by chained children.
    receiver: Option<Value>,
}

/// Outcome of inspecting a handler under its borrow; acted on after the
/// borrow is released so no user code runs while the cell is held.
enum Registered {
    Task(Task),
    Delegate(Handler, Continuation),
    Done,
}

impl Handler {
    // ----- constructors -----

    pub fn fulfilled(value: Value, scheduler: SchedulerRef) -> Handler {
        Self::with_kind(HandlerKind::Fulfilled { value }, scheduler)
    }

    pub fn rejected(reason: Value, scheduler: SchedulerRef) -> Handler {
        Self::with_kind(HandlerKind::Rejected { reason }, scheduler)
    }

    pub fn empty(scheduler: SchedulerRef) -> Handler {
        Self::with_kind(HandlerKind::Empty, scheduler)
    }

    pub fn deferred(scheduler: SchedulerRef) -> Handler {
        Self::deferred_bound(None, scheduler)
    }

    /// A pending deferred carrying a bound receiver for its chain.
    pub fn deferred_bound(receiver: Option<Value>, scheduler: SchedulerRef) -> Handler {
        Self::with_kind(
            HandlerKind::Deferred(DeferredCore {
                settled: None,
                consumers: Vec::new(),
                receiver,
            }),
            scheduler,
        )
    }

    /// A handler that forwards to `inner`, substituting `receiver` on every
    /// registration that passes through it.
    pub fn following(inner: Handler, receiver: Option<Value>) -> Handler {
        let scheduler = inner.cell.scheduler.clone();
        Self::with_kind(HandlerKind::Following { inner, receiver }, scheduler)
    }

    /// A deferred that adopts a foreign thenable: structurally a pending
    /// deferred with an assimilation task already enqueued.
    pub fn assimilating(foreign: Rc<dyn ForeignThenable>, scheduler: SchedulerRef) -> Handler {
        let handler = Self::deferred(scheduler.clone());
        scheduler.enqueue(Task::Assimilate {
            target: handler.clone(),
            foreign,
        });
        handler
    }

    fn with_kind(kind: HandlerKind, scheduler: SchedulerRef) -> Handler {
        Handler {
            cell: Rc::new(HandlerCell {
                kind: RefCell::new(kind),
                scheduler,
            }),
        }
    }

    // ----- identity and capabilities -----

    /// Reference identity.
    pub fn is(&self, other: &Handler) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn scheduler(&self) -> SchedulerRef {
        self.cell.scheduler.clone()
    }

    /// Receiver bound to this handler, as passed to reaction callbacks.
    /// Only a deferred carries one directly; `Following` rebinds on the
    /// forwarding path instead.
    pub(crate) fn bound_receiver(&self) -> Option<Value> {
        match &*self.cell.kind.borrow() {
            HandlerKind::Deferred(core) => core.receiver.clone(),
            _ => None,
        }
    }

    /// Receiver a chained child deferred inherits, so receiver binding
    /// survives across `then` links.
    pub(crate) fn child_receiver(&self) -> Option<Value> {
        match &*self.cell.kind.borrow() {
            HandlerKind::Deferred(core) => core.receiver.clone(),
            HandlerKind::Following { receiver, .. } => receiver.clone(),
            _ => None,
        }
    }

    // ----- when: schedule a reaction against the eventual state -----

    /// Register a reaction. Settled handlers enqueue the matching task;
    /// a pending deferred queues the continuation; `Empty` drops it.
    /// No callback ever runs inside this call.
    pub fn when(&self, mut continuation: Continuation) {
        let registered = {
            let mut kind = self.cell.kind.borrow_mut();
            match &mut *kind {
                HandlerKind::Fulfilled { value } => Registered::Task(Task::Fulfill {
                    target: continuation.target,
                    on_fulfilled: continuation.on_fulfilled,
                    receiver: continuation.receiver,
                    value: value.clone(),
                }),
                HandlerKind::Rejected { reason } => Registered::Task(Task::Reject {
                    target: continuation.target,
                    on_rejected: continuation.on_rejected,
                    receiver: continuation.receiver,
                    reason: reason.clone(),
                }),
                HandlerKind::Empty => Registered::Done,
                HandlerKind::Following { inner, receiver } => {
                    if receiver.is_some() {
                        continuation.receiver = receiver.clone();
                    }
                    Registered::Delegate(inner.clone(), continuation)
                }
                HandlerKind::Deferred(core) => match &core.settled {
                    Some(settled) => Registered::Delegate(settled.clone(), continuation),
                    None => {
                        core.consumers.push(continuation);
                        Registered::Done
                    }
                },
            }
        };
        match registered {
            Registered::Task(task) => self.cell.scheduler.enqueue(task),
            Registered::Delegate(next, continuation) => next.traverse().when(continuation),
            Registered::Done => {}
        }
    }

    // ----- traverse: collapse forwarding chains -----

    /// Collapse `Following` links and settled deferred links to the current
    /// tail: a terminal handler or a still-pending deferred. Traversed
    /// links are path-compressed so later walks are O(1).
    pub fn traverse(&self) -> Handler {
        let next = {
            let kind = self.cell.kind.borrow();
            match &*kind {
                HandlerKind::Following { inner, .. } => Some(inner.clone()),
                HandlerKind::Deferred(core) => core.settled.clone(),
                _ => None,
            }
        };
        let Some(next) = next else {
            return self.clone();
        };
        let tail = next.traverse();
        if !tail.is(&next) {
            let mut kind = self.cell.kind.borrow_mut();
            match &mut *kind {
                HandlerKind::Following { inner, .. } => *inner = tail.clone(),
                HandlerKind::Deferred(core) => core.settled = Some(tail.clone()),
                _ => {}
            }
        }
        tail
    }

    // ----- inspect -----

    /// Synchronous view of the current state.
    pub fn inspect(&self) -> StateSnapshot {
        let tail = self.traverse();
        let kind = tail.cell.kind.borrow();
        match &*kind {
            HandlerKind::Fulfilled { value } => StateSnapshot::Fulfilled {
                value: value.clone(),
            },
            HandlerKind::Rejected { reason } => StateSnapshot::Rejected {
                reason: reason.clone(),
            },
            _ => StateSnapshot::Pending,
        }
    }

    // ----- resolve / reject / notify: deferred-only transitions -----

    /// Resolve with an arbitrary value: classify it and adopt the resulting
    /// handler. No-op outside a pending deferred.
    pub fn resolve(&self, value: Value) {
        if !self.is_pending_deferred() {
            return;
        }
        let adopted = classify(value, Some(self), &self.cell.scheduler);
        self.join(adopted);
    }

    /// Reject with a reason. No-op outside a pending deferred.
    pub fn reject(&self, reason: Value) {
        if !self.is_pending_deferred() {
            return;
        }
        let rejected = Handler::rejected(reason, self.cell.scheduler.clone());
        self.join(rejected);
    }

    /// Send a progress notification to the consumers registered right now.
    /// Dropped after settlement and outside deferreds.
    pub fn notify(&self, payload: Value) {
        let consumers = {
            let kind = self.cell.kind.borrow();
            match &*kind {
                HandlerKind::Deferred(core) if core.settled.is_none() => core.consumers.clone(),
                _ => return,
            }
        };
        self.cell.scheduler.enqueue(Task::Progress { consumers, payload });
    }

    /// Adopt `handler` as this deferred's settlement. First join wins;
    /// the consumer queue is drained exactly once, in attachment order,
    /// and then released.
    pub(crate) fn join(&self, handler: Handler) {
        let tail = handler.traverse();
        let drained = {
            let mut kind = self.cell.kind.borrow_mut();
            let HandlerKind::Deferred(core) = &mut *kind else {
                return;
            };
            if core.settled.is_some() {
                return;
            }
            core.settled = Some(tail.clone());
            std::mem::take(&mut core.consumers)
        };
        for continuation in drained {
            self.cell.scheduler.enqueue(Task::Forward {
                continuation,
                settled: tail.clone(),
            });
        }
    }

    fn is_pending_deferred(&self) -> bool {
        matches!(
            &*self.cell.kind.borrow(),
            HandlerKind::Deferred(core) if core.settled.is_none()
        )
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &*self.cell.kind.borrow() {
            HandlerKind::Fulfilled { .. } => "fulfilled",
            HandlerKind::Rejected { .. } => "rejected",
            HandlerKind::Empty => "empty",
            HandlerKind::Deferred(core) => {
                if core.settled.is_some() {
                    "deferred(settled)"
                } else {
                    "deferred(pending)"
                }
            }
            HandlerKind::Following { .. } => "following",
        };
        write!(f, "Handler({name})")
    }
}
