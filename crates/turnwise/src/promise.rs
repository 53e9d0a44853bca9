//! Public promise facade.
//!
//! A [`Promise`] owns exactly one handler reference. User-constructed and
//! internally constructed promises are indistinguishable: both expose the
//! same chaining surface. Equality is handler identity, so resolving an
//! existing promise hands back an equal promise.

use std::fmt;
use std::rc::Rc;

use crate::handler::{Callback, Continuation, Handler};
use crate::snapshot::StateSnapshot;
use crate::value::Value;

/// Opaque handle to a future value, settled exactly once.
#[derive(Clone)]
pub struct Promise {
    handler: Handler,
}

impl Promise {
    pub(crate) fn from_handler(handler: Handler) -> Promise {
        Promise { handler }
    }

    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Chain a reaction. The returned promise settles from the outcome of
    /// the matching callback once this promise settles: a callback's
    /// `Ok` resolves it (including adoption when the value is itself a
    /// promise), an `Err` rejects it, and an absent callback passes the
    /// settlement through unchanged. Callbacks never run inside this call.
    pub fn then(
        &self,
        on_fulfilled: Option<Callback>,
        on_rejected: Option<Callback>,
        on_progress: Option<Callback>,
    ) -> Promise {
        let from = &self.handler;
        let to = Handler::deferred_bound(from.child_receiver(), from.scheduler());
        from.when(Continuation {
            target: to.clone(),
            receiver: from.bound_receiver(),
            on_fulfilled,
            on_rejected,
            on_progress,
        });
        Promise::from_handler(to)
    }

    /// Shorthand for `then(None, Some(on_rejected), None)`.
    pub fn catch(&self, on_rejected: Callback) -> Promise {
        self.then(None, Some(on_rejected), None)
    }

    /// Alias of [`Promise::catch`].
    pub fn otherwise(&self, on_rejected: Callback) -> Promise {
        self.catch(on_rejected)
    }

    /// A chainable promise whose subsequent reactions run with `receiver`
    /// bound. Receiver binding is an ergonomic extension and deliberately
    /// departs from A+ semantics.
    pub fn with_this(&self, receiver: Value) -> Promise {
        Promise::from_handler(Handler::following(self.handler.clone(), Some(receiver)))
    }

    /// Alias of [`Promise::with_this`].
    pub fn with(&self, receiver: Value) -> Promise {
        self.with_this(receiver)
    }

    /// Synchronous view of the current state.
    pub fn inspect(&self) -> StateSnapshot {
        self.handler.inspect()
    }
}

impl PartialEq for Promise {
    fn eq(&self, other: &Self) -> bool {
        self.handler.is(&other.handler)
    }
}

impl Eq for Promise {}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Promise({})", self.inspect())
    }
}

/// Build a reaction [`Callback`] without spelling out the `Rc` type.
pub fn reaction<F>(f: F) -> Callback
where
    F: Fn(Value, Option<&Value>) -> Result<Value, Value> + 'static,
{
    Rc::new(f)
}
