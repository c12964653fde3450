//! Notifications: the state-transition messages delivered to the store.
//!
//! A notification is the intent's opaque payload re-keyed under one of the
//! triple's event names, optionally carrying the operation's resolved value
//! or its normalized error.

use crate::error::NormalizedError;
use serde::Serialize;
use serde_json::{Map, Value};

/// A message delivered to the store representing a state transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// The notification kind (one of the intent's triple names, or the
    /// intent's own kind for plain pass-through delivery).
    pub kind: String,

    /// The intent's opaque payload, forwarded unchanged.
    #[serde(flatten)]
    pub payload: Map<String, Value>,

    /// The raw resolved result. Present only on success notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// The normalized error. Present only on failure notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<NormalizedError>,
}

impl Notification {
    /// A plain notification: a non-operation intent delivered as-is.
    #[must_use]
    pub fn plain(kind: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            payload,
            value: None,
            error: None,
        }
    }

    /// The in-flight marker, dispatched before the operation starts.
    #[must_use]
    pub fn pending(kind: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self::plain(kind, payload)
    }

    /// The success notification carrying the operation's resolved value.
    #[must_use]
    pub fn success(kind: impl Into<String>, payload: Map<String, Value>, value: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            value: Some(value),
            error: None,
        }
    }

    /// The failure notification carrying the normalized error.
    #[must_use]
    pub fn failure(
        kind: impl Into<String>,
        payload: Map<String, Value>,
        error: NormalizedError,
    ) -> Self {
        Self {
            kind: kind.into(),
            payload,
            value: None,
            error: Some(error),
        }
    }
}
