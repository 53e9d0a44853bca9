#![forbid(unsafe_code)]

//! Integration tests for promise construction and chaining.
//!
//! Exercises the public API from outside the crate, covering:
//! - Resolver construction (synchronous invocation, error routing)
//! - Always-async reaction dispatch and attachment ordering
//! - Value pass-through, recovery, and rejection propagation
//! - Adoption of promises returned from reaction callbacks
//! - Cycle detection
//! - Progress notification semantics
//! - Determinism: same inputs produce identical trace logs

use std::cell::RefCell;
use std::rc::Rc;

use turnwise::promise::{reaction, Promise};
use turnwise::realm::{make, Realm, RealmConfig};
use turnwise::scheduler::{TraceEvent, TurnScheduler};
use turnwise::snapshot::StateSnapshot;
use turnwise::value::{Fault, FaultKind, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn realm() -> (Rc<TurnScheduler>, Realm) {
    let sched = TurnScheduler::new();
    let realm = make(RealmConfig::new(sched.clone()));
    (sched, realm)
}

fn fulfilled(promise: &Promise, value: Value) -> bool {
    promise.inspect() == StateSnapshot::Fulfilled { value }
}

fn rejected(promise: &Promise, reason: Value) -> bool {
    promise.inspect() == StateSnapshot::Rejected { reason }
}

// ---------------------------------------------------------------------------
// Resolver construction
// ---------------------------------------------------------------------------

#[test]
fn basic_fulfillment_chains_through_then() {
    let (sched, realm) = realm();
    let promise = realm.promise(|settlers| {
        settlers.resolve(Value::Int(42));
        Ok(())
    });

    // The source settles synchronously; the chained promise does not.
    assert!(fulfilled(&promise, Value::Int(42)));
    let chained = promise.then(
        Some(reaction(|value, _| match value {
            Value::Int(n) => Ok(Value::Int(n + 1)),
            other => Ok(other),
        })),
        None,
        None,
    );
    assert!(chained.inspect().is_pending());

    sched.run_to_idle();
    assert!(fulfilled(&chained, Value::Int(43)));
}

#[test]
fn erring_resolver_becomes_a_rejection() {
    let (_sched, realm) = realm();
    let promise = realm.promise(|_| Err(Value::str("E")));
    assert!(rejected(&promise, Value::str("E")));
}

// ---------------------------------------------------------------------------
// Always-async dispatch
// ---------------------------------------------------------------------------

#[test]
fn reactions_on_settled_promises_never_run_inside_then() {
    let (sched, realm) = realm();
    let promise = realm.resolve(Value::Int(1));
    let ran = Rc::new(RefCell::new(false));
    let ran_in = ran.clone();

    let _chained = promise.then(
        Some(reaction(move |value, _| {
            *ran_in.borrow_mut() = true;
            Ok(value)
        })),
        None,
        None,
    );
    assert!(!*ran.borrow());

    sched.run_to_idle();
    assert!(*ran.borrow());
}

#[test]
fn multiple_reactions_dispatch_once_each_in_attachment_order() {
    let (sched, realm) = realm();
    let (promise, settlers) = realm.deferred();
    let order = Rc::new(RefCell::new(Vec::new()));

    for tag in 1..=4 {
        let order = order.clone();
        promise.then(
            Some(reaction(move |value, _| {
                order.borrow_mut().push(tag);
                Ok(value)
            })),
            None,
            None,
        );
    }
    settlers.resolve(Value::Int(0));
    sched.run_to_idle();

    assert_eq!(*order.borrow(), vec![1, 2, 3, 4]);
}

// ---------------------------------------------------------------------------
// Propagation and recovery
// ---------------------------------------------------------------------------

#[test]
fn rejection_propagates_through_handlerless_links() {
    let (sched, realm) = realm();
    let promise = realm.reject(Value::str("down"));
    let chained = promise
        .then(Some(reaction(|value, _| Ok(value))), None, None)
        .then(None, None, None);
    sched.run_to_idle();
    assert!(rejected(&chained, Value::str("down")));
}

#[test]
fn catch_recovers_and_the_chain_continues_fulfilled() {
    let (sched, realm) = realm();
    let chained = realm
        .reject(Value::str("boom"))
        .catch(reaction(|_, _| Ok(Value::Int(0))))
        .then(
            Some(reaction(|value, _| match value {
                Value::Int(n) => Ok(Value::Int(n + 10)),
                other => Ok(other),
            })),
            None,
            None,
        );
    sched.run_to_idle();
    assert!(fulfilled(&chained, Value::Int(10)));
}

#[test]
fn erring_reaction_rejects_downstream() {
    let (sched, realm) = realm();
    let chained = realm.resolve(Value::Int(1)).then(
        Some(reaction(|_, _| {
            Err(Value::Fault(Fault::range_error("out of range")))
        })),
        None,
        None,
    );
    sched.run_to_idle();
    match chained.inspect().reason() {
        Some(Value::Fault(fault)) => assert_eq!(fault.kind, FaultKind::Range),
        other => panic!("expected fault, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Adoption of returned promises
// ---------------------------------------------------------------------------

#[test]
fn promise_returned_from_a_reaction_is_adopted_not_nested() {
    let (sched, realm) = realm();
    let inner = realm.resolve(Value::str("inner"));
    let chained = realm.resolve(Value::Int(0)).then(
        Some(reaction(move |_, _| Ok(Value::Promise(inner.clone())))),
        None,
        None,
    );
    sched.run_to_idle();
    assert!(fulfilled(&chained, Value::str("inner")));
}

#[test]
fn resolving_with_a_pending_promise_adopts_its_later_settlement() {
    let (sched, realm) = realm();
    let (inner, inner_settlers) = realm.deferred();
    let (outer, outer_settlers) = realm.deferred();

    outer_settlers.resolve(Value::Promise(inner));
    assert!(outer.inspect().is_pending());

    inner_settlers.resolve(Value::Int(9));
    sched.run_to_idle();
    assert!(fulfilled(&outer, Value::Int(9)));
}

// ---------------------------------------------------------------------------
// Cycle detection
// ---------------------------------------------------------------------------

#[test]
fn resolving_a_promise_with_itself_rejects_with_a_type_fault() {
    let (sched, realm) = realm();
    let (promise, settlers) = realm.deferred();

    settlers.resolve(Value::Promise(promise.clone()));
    sched.run_to_idle();

    match promise.inspect().reason() {
        Some(Value::Fault(fault)) => assert_eq!(fault.kind, FaultKind::Type),
        other => panic!("expected type fault, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Progress channel
// ---------------------------------------------------------------------------

#[test]
fn notifications_reach_consumers_without_settling_anything() {
    let (sched, realm) = realm();
    let (promise, settlers) = realm.deferred();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_in = seen.clone();

    let chained = promise.then(
        None,
        None,
        Some(reaction(move |payload, _| {
            seen_in.borrow_mut().push(payload.clone());
            Ok(payload)
        })),
    );

    settlers.notify(Value::Int(30));
    settlers.notify(Value::Int(60));
    sched.run_to_idle();

    assert_eq!(*seen.borrow(), vec![Value::Int(30), Value::Int(60)]);
    assert!(promise.inspect().is_pending());
    assert!(chained.inspect().is_pending());
}

#[test]
fn erring_progress_callback_forwards_its_error_as_the_payload() {
    let (sched, realm) = realm();
    let (promise, settlers) = realm.deferred();
    let downstream_seen = Rc::new(RefCell::new(Vec::new()));
    let downstream_in = downstream_seen.clone();

    let _chained = promise
        .then(
            None,
            None,
            Some(reaction(|_, _| Err(Value::str("progress failed")))),
        )
        .then(
            None,
            None,
            Some(reaction(move |payload, _| {
                downstream_in.borrow_mut().push(payload.clone());
                Ok(payload)
            })),
        );

    settlers.notify(Value::Int(1));
    sched.run_to_idle();

    assert_eq!(*downstream_seen.borrow(), vec![Value::str("progress failed")]);
}

// ---------------------------------------------------------------------------
// Determinism
// ---------------------------------------------------------------------------

#[test]
fn identical_scenarios_produce_identical_trace_logs() {
    let run = || -> Vec<TraceEvent> {
        let (sched, realm) = realm();
        let (promise, settlers) = realm.deferred();
        promise.then(Some(reaction(|value, _| Ok(value))), None, None);
        promise.then(None, Some(reaction(|reason, _| Err(reason))), None);
        settlers.resolve(Value::Int(1));
        sched.run_to_idle();
        sched.trace()
    };

    let first = run();
    for _ in 0..9 {
        assert_eq!(run(), first);
    }
    assert!(!first.is_empty());
}
