//! Scheduler work units.
//!
//! Every piece of user-visible work the core performs (running a reaction
//! callback, assimilating a foreign thenable, fanning out a progress
//! notification, replaying a queued continuation, surfacing a fatal error)
//! is packaged as a [`Task`] and handed to the scheduler. A task carries
//! its arguments precomputed at enqueue time; `run` consumes it in a later
//! turn, outside the enqueuer's stack.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::handler::{Callback, Continuation, Handler, Settlers};
use crate::value::{ForeignThenable, Value};

// ---------------------------------------------------------------------------
// TaskKind — trace label
// ---------------------------------------------------------------------------

/// Classification of a task, used by scheduler trace logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    Fulfill,
    Reject,
    Assimilate,
    Progress,
    Forward,
    Fatal,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fulfill => f.write_str("fulfill"),
            Self::Reject => f.write_str("reject"),
            Self::Assimilate => f.write_str("assimilate"),
            Self::Progress => f.write_str("progress"),
            Self::Forward => f.write_str("forward"),
            Self::Fatal => f.write_str("fatal"),
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A unit of deferred work.
pub enum Task {
    /// Apply `on_fulfilled` (or the identity) to a fulfillment value and
    /// settle the downstream deferred with the outcome.
    Fulfill {
        target: Handler,
        on_fulfilled: Option<Callback>,
        receiver: Option<Value>,
        value: Value,
    },
    /// Apply `on_rejected` to a rejection reason. A callback that returns
    /// normally recovers the chain (downstream resolve); an absent callback
    /// propagates the rejection.
    Reject {
        target: Handler,
        on_rejected: Option<Callback>,
        receiver: Option<Value>,
        reason: Value,
    },
    /// Invoke a foreign `then` with settlers routed into the adopting
    /// deferred; an erring `then` rejects it.
    Assimilate {
        target: Handler,
        foreign: Rc<dyn ForeignThenable>,
    },
    /// Replay a progress payload through the consumers captured when
    /// `notify` was called.
    Progress {
        consumers: Vec<Continuation>,
        payload: Value,
    },
    /// Replay one queued continuation against a newly settled handler.
    Forward {
        continuation: Continuation,
        settled: Handler,
    },
    /// Surface an unrecoverable error at the top of a fresh turn.
    Fatal { reason: Value },
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Fulfill { .. } => TaskKind::Fulfill,
            Self::Reject { .. } => TaskKind::Reject,
            Self::Assimilate { .. } => TaskKind::Assimilate,
            Self::Progress { .. } => TaskKind::Progress,
            Self::Forward { .. } => TaskKind::Forward,
            Self::Fatal { .. } => TaskKind::Fatal,
        }
    }

    /// Execute the task. Invoked by the scheduler, never by the enqueuer.
    pub fn run(self) {
        match self {
            Self::Fulfill {
                target,
                on_fulfilled,
                receiver,
                value,
            } => match on_fulfilled {
                Some(callback) => match callback(value, receiver.as_ref()) {
                    Ok(next) => target.resolve(next),
                    Err(error) => target.reject(error),
                },
                None => target.resolve(value),
            },
            Self::Reject {
                target,
                on_rejected,
                receiver,
                reason,
            } => match on_rejected {
                Some(callback) => match callback(reason, receiver.as_ref()) {
                    Ok(next) => target.resolve(next),
                    Err(error) => target.reject(error),
                },
                None => target.reject(reason),
            },
            Self::Assimilate { target, foreign } => {
                let settlers = Settlers::new(target.clone());
                if let Err(error) = foreign.call_then(settlers) {
                    target.reject(error);
                }
            }
            Self::Progress { consumers, payload } => {
                for consumer in consumers {
                    let forwarded = match consumer.on_progress.as_ref() {
                        // A progress callback's error becomes the forwarded
                        // payload, never a rejection.
                        Some(callback) => {
                            match callback(payload.clone(), consumer.receiver.as_ref()) {
                                Ok(next) => next,
                                Err(error) => error,
                            }
                        }
                        None => payload.clone(),
                    };
                    consumer.target.notify(forwarded);
                }
            }
            Self::Forward {
                continuation,
                settled,
            } => settled.when(continuation),
            Self::Fatal { reason } => panic!("fatal promise error: {reason}"),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task::{:?}", self.kind())
    }
}
