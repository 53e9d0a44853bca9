//! Dynamic value universe for the promise core.
//!
//! Promises range over [`Value`]: plain data (undefined, null, booleans,
//! integers, strings, lists), structured [`Fault`] values, trusted promises
//! of this library, and foreign thenables behind [`ForeignThenable`].
//!
//! Classification (see `resolution`) branches on value nature:
//! - plain data fulfills directly,
//! - a trusted promise is followed (its handler is shared),
//! - a foreign value is probed for a `then` capability and assimilated.

use std::fmt;
use std::rc::Rc;

use serde::ser::{Serialize, SerializeStructVariant, Serializer};
use serde::Deserialize;

use crate::handler::Settlers;
use crate::promise::Promise;

// ---------------------------------------------------------------------------
// Fault — structured error values
// ---------------------------------------------------------------------------

/// Category of a fault value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
pub enum FaultKind {
    /// Misuse of the promise protocol (e.g. a resolution cycle).
    Type,
    /// A value outside its permitted domain.
    Range,
    /// A defect inside the library or a collaborator.
    Internal,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type => f.write_str("TypeError"),
            Self::Range => f.write_str("RangeError"),
            Self::Internal => f.write_str("InternalError"),
        }
    }
}

/// An error value: a category plus a human-readable message.
///
/// Faults are ordinary values: they travel through the rejection channel
/// like any other reason and never abort the scheduler turn.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Type,
            message: message.into(),
        }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Range,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Internal,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ForeignThenable — untrusted asynchronous collaborators
// ---------------------------------------------------------------------------

/// Result of probing a foreign value for its `then` capability.
#[derive(Debug, Clone, PartialEq)]
pub enum ThenAccess {
    /// The value exposes a callable `then`; assimilation may proceed.
    Callable,
    /// No `then` capability; the value fulfills as-is.
    Absent,
    /// The probe itself erred; the carried value becomes the rejection
    /// reason.
    Faulty(Value),
}

/// A foreign object-natured value: anything exposing (or claiming to
/// expose) a `then`-style subscription protocol the library does not trust.
///
/// Foreign implementations may misbehave arbitrarily: settle more than
/// once, settle synchronously, or err at any point. The core absorbs all of
/// that through deferred idempotence and the assimilation task's guard.
pub trait ForeignThenable {
    /// Probe the `then` capability. The default claims a callable `then`;
    /// implementations model absent or faulty accessors by overriding.
    fn then_access(&self) -> ThenAccess {
        ThenAccess::Callable
    }

    /// Invoke the foreign `then` with one-shot settle callbacks routed into
    /// the adopting deferred. Returning `Err` models a throwing `then`.
    fn call_then(&self, settlers: Settlers) -> Result<(), Value>;
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A dynamically-typed value.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
    Fault(Fault),
    /// A trusted promise of this library.
    Promise(Promise),
    /// A foreign thenable candidate.
    Foreign(Rc<dyn ForeignThenable>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    /// Object-natured values participate in thenable classification;
    /// everything else fulfills directly.
    pub fn is_object_natured(&self) -> bool {
        matches!(self, Self::Promise(_) | Self::Foreign(_))
    }

    pub fn is_primitive(&self) -> bool {
        !self.is_object_natured()
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Fault(_) => "fault",
            Self::Promise(_) => "promise",
            Self::Foreign(_) => "thenable",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Fault(a), Self::Fault(b)) => a == b,
            // Reference identity for shared-ownership variants.
            (Self::Promise(a), Self::Promise(b)) => a == b,
            (Self::Foreign(a), Self::Foreign(b)) => {
                Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Fault(fault) => f.debug_tuple("Fault").field(fault).finish(),
            Self::Promise(_) => f.write_str("Promise(..)"),
            Self::Foreign(_) => f.write_str("Foreign(..)"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Fault(fault) => write!(f, "{fault}"),
            Self::Promise(_) => f.write_str("[promise]"),
            Self::Foreign(_) => f.write_str("[thenable]"),
        }
    }
}

/// Promises and foreign thenables serialize as opaque unit markers; the
/// data subset serializes structurally. Used by snapshots and trace logs.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Undefined => serializer.serialize_unit_variant("Value", 0, "Undefined"),
            Self::Null => serializer.serialize_unit_variant("Value", 1, "Null"),
            Self::Bool(b) => serializer.serialize_newtype_variant("Value", 2, "Bool", b),
            Self::Int(n) => serializer.serialize_newtype_variant("Value", 3, "Int", n),
            Self::Str(s) => serializer.serialize_newtype_variant("Value", 4, "Str", s),
            Self::List(items) => serializer.serialize_newtype_variant("Value", 5, "List", items),
            Self::Fault(fault) => {
                let mut sv = serializer.serialize_struct_variant("Value", 6, "Fault", 2)?;
                sv.serialize_field("kind", &fault.kind)?;
                sv.serialize_field("message", &fault.message)?;
                sv.end()
            }
            Self::Promise(_) => serializer.serialize_unit_variant("Value", 7, "Promise"),
            Self::Foreign(_) => serializer.serialize_unit_variant("Value", 8, "Foreign"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ----- Fault -----

    #[test]
    fn fault_display_includes_kind_and_message() {
        let fault = Fault::type_error("boom");
        assert_eq!(fault.to_string(), "TypeError: boom");
        assert_eq!(Fault::range_error("r").to_string(), "RangeError: r");
        assert_eq!(Fault::internal("i").to_string(), "InternalError: i");
    }

    #[test]
    fn fault_serde_roundtrip() {
        let fault = Fault::type_error("cycle");
        let json = serde_json::to_string(&fault).unwrap();
        let back: Fault = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fault);
    }

    #[test]
    fn fault_is_an_error() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&Fault::internal("x"));
    }

    // ----- Value predicates -----

    #[test]
    fn primitives_are_not_object_natured() {
        for value in [
            Value::Undefined,
            Value::Null,
            Value::Bool(true),
            Value::Int(7),
            Value::str("s"),
            Value::List(vec![Value::Int(1)]),
            Value::Fault(Fault::internal("f")),
        ] {
            assert!(value.is_primitive(), "{}", value.type_name());
            assert!(!value.is_object_natured());
        }
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::Undefined.type_name(), "undefined");
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Bool(false).type_name(), "boolean");
        assert_eq!(Value::Int(0).type_name(), "integer");
        assert_eq!(Value::str("").type_name(), "string");
        assert_eq!(Value::List(vec![]).type_name(), "list");
        assert_eq!(Value::Fault(Fault::internal("")).type_name(), "fault");
    }

    // ----- Equality -----

    #[test]
    fn structural_equality_for_data() {
        assert_eq!(Value::Int(3), Value::Int(3));
        assert_ne!(Value::Int(3), Value::Int(4));
        assert_ne!(Value::Int(3), Value::str("3"));
        assert_eq!(
            Value::List(vec![Value::Null, Value::Bool(true)]),
            Value::List(vec![Value::Null, Value::Bool(true)])
        );
    }

    // ----- Display -----

    #[test]
    fn display_forms() {
        assert_eq!(Value::Undefined.to_string(), "undefined");
        assert_eq!(Value::Int(-5).to_string(), "-5");
        assert_eq!(Value::str("hi").to_string(), "hi");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Int(2)]).to_string(),
            "[1, 2]"
        );
        assert_eq!(
            Value::Fault(Fault::type_error("t")).to_string(),
            "TypeError: t"
        );
    }

    // ----- Serialization -----

    #[test]
    fn data_values_serialize_structurally() {
        assert_eq!(
            serde_json::to_string(&Value::Undefined).unwrap(),
            "\"Undefined\""
        );
        assert_eq!(serde_json::to_string(&Value::Int(42)).unwrap(), "{\"Int\":42}");
        assert_eq!(
            serde_json::to_string(&Value::List(vec![Value::Bool(true)])).unwrap(),
            "{\"List\":[{\"Bool\":true}]}"
        );
    }

    #[test]
    fn fault_value_serializes_with_kind_and_message() {
        let json = serde_json::to_string(&Value::Fault(Fault::type_error("t"))).unwrap();
        assert_eq!(json, "{\"Fault\":{\"kind\":\"Type\",\"message\":\"t\"}}");
    }
}
