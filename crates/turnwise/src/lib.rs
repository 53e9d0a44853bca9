#![forbid(unsafe_code)]

//! Promise core with turn-based settlement.
//!
//! The crate provides the handler machinery of an asynchronous-value
//! library: a closed promise state machine with one-shot settlement,
//! assimilation of untrusted foreign thenables, chaining that derives a new
//! promise from a user transformation, and a scheduling discipline that
//! runs every reaction in a later turn, never inside `then`, `resolve`,
//! or a resolver call.
//!
//! Entry point: build a [`realm::Realm`] with [`realm::make`] over a
//! [`scheduler::Scheduler`] capability (the shipped
//! [`scheduler::TurnScheduler`] is a manual, test-controllable queue), then
//! construct and chain promises through the realm.

pub mod handler;
pub mod promise;
pub mod realm;
mod resolution;
pub mod scheduler;
pub mod snapshot;
pub mod task;
pub mod value;
