//! Error types for the dispatch pipeline.
//!
//! Two disjoint classes exist and never mix:
//!
//! - [`IntentShapeError`]: a malformed intent (missing or invalid event
//!   names). This is a programmer error, returned synchronously from
//!   `intercept` before any notification is dispatched. It is never
//!   converted into a failure notification.
//! - [`OperationError`]: an asynchronous operation rejected. This is always
//!   funneled through the failure notification (in normalized form) and
//!   propagated to the dispatcher's caller (in raw form).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// A malformed intent shape.
///
/// Raised synchronously when an intent declares an operation but its event
/// names cannot be resolved into a valid triple. These are caller bugs and
/// must be fixed at the call site, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentShapeError {
    /// The intent declares an operation but carries neither `events` nor a
    /// base `event` name.
    #[error("intent declares an operation but neither `events` nor `event` is set")]
    MissingEvents,

    /// An explicit event list did not contain exactly three names.
    #[error("expected exactly 3 event names (pending, success, failure), found {found}")]
    WrongTripleLength {
        /// Number of names actually provided.
        found: usize,
    },

    /// An event name (base or triple member) was empty.
    #[error("event names must be non-empty strings")]
    EmptyEventName,
}

/// The raw error an asynchronous operation rejected with.
///
/// Mirrors what an HTTP-backed operation typically produces: an optional
/// status code, a human-readable message, and an optional response body
/// payload under `data`. The interceptor never inspects `data` beyond
/// normalization.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct OperationError {
    /// Transport-level status code, if any.
    pub status: Option<u16>,

    /// Human-readable failure message.
    pub message: String,

    /// Opaque response payload attached by the operation.
    pub data: Option<Value>,
}

impl OperationError {
    /// Create an error carrying only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            data: None,
        }
    }

    /// Attach a status code.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach a response payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The normalized form of an [`OperationError`].
///
/// A plain mapping with at least `status` and `message`, never stack traces
/// or exception metadata. This is what reaches the failure notification; the
/// dispatcher's caller receives the raw error instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedError {
    /// Status code, taken from the error's `data` payload when present there,
    /// else from the raw error itself.
    pub status: Option<u16>,

    /// Message, with the same precedence as `status`.
    pub message: String,

    /// Remaining fields of the `data` payload, passed through unchanged.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// An injectable error-normalization function.
pub type Normalizer = Arc<dyn Fn(&OperationError) -> NormalizedError + Send + Sync>;

/// Normalize a raw operation error into the shape carried by failure
/// notifications.
///
/// When the raw error's `data` payload is a JSON object, its `status` and
/// `message` entries win and the remaining entries pass through as
/// `details`; missing entries default from the raw error's own fields.
/// Any other `data` shape (or none) yields just the raw `status`/`message`.
#[must_use]
pub fn normalize_error(error: &OperationError) -> NormalizedError {
    match &error.data {
        Some(Value::Object(data)) => {
            let mut details = data.clone();
            let status = details
                .remove("status")
                .and_then(|v| v.as_u64())
                .and_then(|s| u16::try_from(s).ok())
                .or(error.status);
            let message = details
                .remove("message")
                .and_then(|v| v.as_str().map(str::to_owned))
                .unwrap_or_else(|| error.message.clone());
            NormalizedError {
                status,
                message,
                details,
            }
        }
        _ => NormalizedError {
            status: error.status,
            message: error.message.clone(),
            details: Map::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn normalizes_from_data_payload() {
        let error = OperationError::new("Not Found").with_data(json!({ "status": 404 }));
        let normalized = normalize_error(&error);

        assert_eq!(normalized.status, Some(404));
        assert_eq!(normalized.message, "Not Found");
        assert!(normalized.details.is_empty());
    }

    #[test]
    fn data_message_wins_over_raw_message() {
        let error = OperationError::new("request failed")
            .with_status(500)
            .with_data(json!({ "message": "upstream exploded", "trace_id": "abc" }));
        let normalized = normalize_error(&error);

        assert_eq!(normalized.status, Some(500));
        assert_eq!(normalized.message, "upstream exploded");
        assert_eq!(normalized.details.get("trace_id"), Some(&json!("abc")));
    }

    #[test]
    fn defaults_without_data() {
        let error = OperationError::new("connection reset").with_status(502);
        let normalized = normalize_error(&error);

        assert_eq!(normalized.status, Some(502));
        assert_eq!(normalized.message, "connection reset");
        assert!(normalized.details.is_empty());
    }

    #[test]
    fn non_object_data_is_ignored() {
        let error = OperationError::new("bad gateway")
            .with_status(502)
            .with_data(json!("<html>nope</html>"));
        let normalized = normalize_error(&error);

        assert_eq!(normalized.status, Some(502));
        assert_eq!(normalized.message, "bad gateway");
        assert!(normalized.details.is_empty());
    }

    #[test]
    fn non_numeric_data_status_falls_back_to_raw() {
        let error = OperationError::new("oops")
            .with_status(418)
            .with_data(json!({ "status": "teapot" }));
        let normalized = normalize_error(&error);

        assert_eq!(normalized.status, Some(418));
    }

    proptest! {
        /// Whatever the payload, normalization never loses the message and
        /// non-reserved `data` keys always survive into `details`.
        #[test]
        fn data_fields_pass_through(
            status in proptest::option::of(100u16..600),
            message in "[a-zA-Z ]{1,20}",
            mut extra in proptest::collection::hash_map("[a-z]{1,8}", 0u32..1000, 0..4),
        ) {
            // Reserved keys have their own precedence rules, tested above.
            extra.remove("status");
            extra.remove("message");

            let mut data = Map::new();
            for (k, v) in &extra {
                data.insert(k.clone(), json!(v));
            }
            let mut error = OperationError::new(message.clone());
            if let Some(s) = status {
                error = error.with_status(s);
            }
            let normalized = normalize_error(&error.with_data(Value::Object(data)));

            prop_assert_eq!(normalized.status, status);
            prop_assert_eq!(normalized.message, message);
            for (k, v) in &extra {
                prop_assert_eq!(normalized.details.get(k), Some(&json!(v)));
            }
        }
    }
}
