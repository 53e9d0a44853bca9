//! Environment factory and combinators.
//!
//! A [`Realm`] is one instance of the promise core, produced by [`make`]
//! from a [`RealmConfig`]. The realm owns the scheduler capability, the
//! never-settling singleton, the promise constructors, and the combinator
//! surface. Nothing in the core is process-global: two realms over two
//! schedulers are fully independent.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::handler::{Continuation, Handler, Settlers};
use crate::promise::{reaction, Promise};
use crate::resolution::classify;
use crate::scheduler::SchedulerRef;
use crate::task::Task;
use crate::value::Value;

// ---------------------------------------------------------------------------
// RealmConfig and make
// ---------------------------------------------------------------------------

/// Environment configuration consumed by [`make`].
pub struct RealmConfig {
    /// Required task-queue capability.
    pub scheduler: SchedulerRef,
    /// Optional decoration hook: runs on the constructed realm and its
    /// return value replaces it.
    pub decorate: Option<Box<dyn FnOnce(Realm) -> Realm>>,
}

impl RealmConfig {
    pub fn new(scheduler: SchedulerRef) -> Self {
        Self {
            scheduler,
            decorate: None,
        }
    }

    pub fn decorate(mut self, decorate: impl FnOnce(Realm) -> Realm + 'static) -> Self {
        self.decorate = Some(Box::new(decorate));
        self
    }
}

/// Construct a realm. The never-settling singleton is built eagerly here,
/// before any decoration hook runs, so its construction order is explicit.
pub fn make(config: RealmConfig) -> Realm {
    let never = Promise::from_handler(Handler::empty(config.scheduler.clone()));
    let realm = Realm {
        scheduler: config.scheduler,
        never,
    };
    match config.decorate {
        Some(decorate) => decorate(realm),
        None => realm,
    }
}

// ---------------------------------------------------------------------------
// Realm
// ---------------------------------------------------------------------------

/// One instance of the promise core.
#[derive(Clone)]
pub struct Realm {
    scheduler: SchedulerRef,
    never: Promise,
}

impl Realm {
    // ----- constructors -----

    /// Construct a promise from a resolver. The resolver runs synchronously
    /// with one-shot [`Settlers`]; returning `Err` rejects the promise.
    pub fn promise<F>(&self, resolver: F) -> Promise
    where
        F: FnOnce(Settlers) -> Result<(), Value>,
    {
        let (promise, settlers) = self.deferred();
        if let Err(error) = resolver(settlers.clone()) {
            settlers.reject(error);
        }
        promise
    }

    /// A pending promise plus the settlers that control it, for callers
    /// that settle from outside a resolver body.
    pub fn deferred(&self) -> (Promise, Settlers) {
        let handler = Handler::deferred(self.scheduler.clone());
        let settlers = Settlers::new(handler.clone());
        (Promise::from_handler(handler), settlers)
    }

    /// Wrap `value` in a promise. A trusted promise is handed back as-is
    /// (same handler, equal promise); anything else is classified.
    pub fn resolve(&self, value: Value) -> Promise {
        if let Value::Promise(promise) = value {
            return promise;
        }
        Promise::from_handler(classify(value, None, &self.scheduler))
    }

    /// A promise rejected with `reason`.
    pub fn reject(&self, reason: Value) -> Promise {
        Promise::from_handler(Handler::rejected(reason, self.scheduler.clone()))
    }

    /// The never-settling singleton. Every call returns the same promise.
    pub fn empty(&self) -> Promise {
        self.never.clone()
    }

    // ----- combinators -----

    /// Fulfills with the list of all input outcomes in input order once
    /// every input fulfills; rejects with the first rejection. An empty
    /// input fulfills immediately with an empty list.
    pub fn all(&self, inputs: Vec<Value>) -> Promise {
        let (promise, settlers) = self.deferred();
        let total = inputs.len();
        if total == 0 {
            settlers.resolve(Value::List(Vec::new()));
            return promise;
        }

        let results = Rc::new(RefCell::new(vec![Value::Undefined; total]));
        let remaining = Rc::new(Cell::new(total));
        let sink = Handler::empty(self.scheduler.clone());

        for (index, input) in inputs.into_iter().enumerate() {
            let source = classify(input, None, &self.scheduler);

            let results = results.clone();
            let remaining = remaining.clone();
            let on_settled = settlers.clone();
            let on_fulfilled = reaction(move |value, _| {
                results.borrow_mut()[index] = value;
                remaining.set(remaining.get() - 1);
                if remaining.get() == 0 {
                    let collected: Vec<Value> = results.borrow_mut().drain(..).collect();
                    on_settled.resolve(Value::List(collected));
                }
                Ok(Value::Undefined)
            });

            let on_failed = settlers.clone();
            let on_rejected = reaction(move |cause, _| {
                // First rejection wins; later settlements are absorbed.
                on_failed.reject(cause);
                Ok(Value::Undefined)
            });

            source.when(Continuation {
                target: sink.clone(),
                receiver: None,
                on_fulfilled: Some(on_fulfilled),
                on_rejected: Some(on_rejected),
                on_progress: None,
            });
        }
        promise
    }

    /// Settles with the first input to settle; later settlements are
    /// absorbed. An empty input returns the never-settling singleton
    /// itself (documented identity).
    pub fn race(&self, inputs: Vec<Value>) -> Promise {
        if inputs.is_empty() {
            return self.empty();
        }
        let scheduler = self.scheduler.clone();
        self.promise(move |settlers| {
            let sink = Handler::empty(scheduler.clone());
            for input in inputs {
                let source = classify(input, None, &scheduler);

                let winner = settlers.clone();
                let on_fulfilled = reaction(move |value, _| {
                    winner.resolve(value);
                    Ok(Value::Undefined)
                });

                let loser = settlers.clone();
                let on_rejected = reaction(move |cause, _| {
                    loser.reject(cause);
                    Ok(Value::Undefined)
                });

                source.when(Continuation {
                    target: sink.clone(),
                    receiver: None,
                    on_fulfilled: Some(on_fulfilled),
                    on_rejected: Some(on_rejected),
                    on_progress: None,
                });
            }
            Ok(())
        })
    }

    /// Fulfills with the outcome pair `[status, payload]` of every input in
    /// input order once all inputs have settled; never rejects. An empty
    /// input fulfills immediately with an empty list.
    pub fn settle(&self, inputs: Vec<Value>) -> Promise {
        let (promise, settlers) = self.deferred();
        let total = inputs.len();
        if total == 0 {
            settlers.resolve(Value::List(Vec::new()));
            return promise;
        }

        let outcomes = Rc::new(RefCell::new(vec![Value::Undefined; total]));
        let remaining = Rc::new(Cell::new(total));
        let sink = Handler::empty(self.scheduler.clone());

        for (index, input) in inputs.into_iter().enumerate() {
            let source = classify(input, None, &self.scheduler);

            let record = {
                let outcomes = outcomes.clone();
                let remaining = remaining.clone();
                let settlers = settlers.clone();
                move |status: &str, payload: Value| {
                    outcomes.borrow_mut()[index] =
                        Value::List(vec![Value::str(status), payload]);
                    remaining.set(remaining.get() - 1);
                    if remaining.get() == 0 {
                        let collected: Vec<Value> = outcomes.borrow_mut().drain(..).collect();
                        settlers.resolve(Value::List(collected));
                    }
                }
            };

            let record_fulfilled = record.clone();
            let on_fulfilled = reaction(move |value, _| {
                record_fulfilled("fulfilled", value);
                Ok(Value::Undefined)
            });
            let on_rejected = reaction(move |cause, _| {
                record("rejected", cause);
                Ok(Value::Undefined)
            });

            source.when(Continuation {
                target: sink.clone(),
                receiver: None,
                on_fulfilled: Some(on_fulfilled),
                on_rejected: Some(on_rejected),
                on_progress: None,
            });
        }
        promise
    }

    // ----- fatal surface -----

    /// Surface an unrecoverable error in a fresh turn. Never used by the
    /// library for ordinary rejections.
    pub fn fatal(&self, reason: Value) {
        self.scheduler.enqueue(Task::Fatal { reason });
    }
}
