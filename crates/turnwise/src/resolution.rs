//! Classification of arbitrary values into handlers.
//!
//! `classify` is the resolution algorithm: given any [`Value`], produce the
//! [`Handler`] that represents its promise state. Rules, in order:
//! 1. plain data fulfills directly;
//! 2. a trusted promise shares its (traversed) handler, unless that
//!    handler is the very deferred doing the resolving, which is a cycle
//!    and rejects with a type fault;
//! 3. a foreign value is probed for a `then` capability: a faulty probe
//!    rejects, an absent `then` fulfills with the value itself, a callable
//!    `then` produces an assimilating deferred.

use std::rc::Rc;

use crate::handler::Handler;
use crate::scheduler::SchedulerRef;
use crate::value::{Fault, ForeignThenable, ThenAccess, Value};

pub(crate) const CYCLE_MESSAGE: &str = "promise cannot be resolved with a promise that follows it";

/// Classify `value` into a handler. `origin` is the deferred performing the
/// resolution, when there is one; it anchors cycle detection.
pub(crate) fn classify(value: Value, origin: Option<&Handler>, scheduler: &SchedulerRef) -> Handler {
    match value {
        Value::Promise(promise) => {
            let handler = promise.handler().traverse();
            if origin.is_some_and(|own| handler.is(own)) {
                Handler::rejected(
                    Value::Fault(Fault::type_error(CYCLE_MESSAGE)),
                    scheduler.clone(),
                )
            } else {
                handler
            }
        }
        Value::Foreign(foreign) => classify_foreign(foreign, scheduler),
        data => Handler::fulfilled(data, scheduler.clone()),
    }
}

fn classify_foreign(foreign: Rc<dyn ForeignThenable>, scheduler: &SchedulerRef) -> Handler {
    match foreign.then_access() {
        ThenAccess::Faulty(error) => Handler::rejected(error, scheduler.clone()),
        ThenAccess::Absent => Handler::fulfilled(Value::Foreign(foreign), scheduler.clone()),
        ThenAccess::Callable => Handler::assimilating(foreign, scheduler.clone()),
    }
}
