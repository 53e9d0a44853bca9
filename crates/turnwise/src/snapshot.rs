//! Settlement snapshots.
//!
//! A [`StateSnapshot`] is the immutable, synchronous view of a handler's
//! current state: pending, fulfilled with a value, or rejected with a
//! reason. Snapshots serialize to the wire shape
//! `{"state":"pending"}` / `{"state":"fulfilled","value":v}` /
//! `{"state":"rejected","reason":r}`.

use std::fmt;

use serde::Serialize;

use crate::value::Value;

/// Synchronous descriptor of a promise's observable state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum StateSnapshot {
    /// Not yet settled.
    Pending,
    /// Settled with a value.
    Fulfilled { value: Value },
    /// Settled with a reason.
    Rejected { reason: Value },
}

impl StateSnapshot {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// The fulfillment value, if fulfilled.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Fulfilled { value } => Some(value),
            _ => None,
        }
    }

    /// The rejection reason, if rejected.
    pub fn reason(&self) -> Option<&Value> {
        match self {
            Self::Rejected { reason } => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for StateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Fulfilled { .. } => f.write_str("fulfilled"),
            Self::Rejected { .. } => f.write_str("rejected"),
        }
    }
}
