//! Intents: the messages handed to the dispatch pipeline.
//!
//! An intent is an open mapping with a small set of reserved fields. The
//! presence of an [`Operation`] is the sole trigger for interception; all
//! non-reserved fields live in `payload` and pass through unchanged into
//! every notification the interceptor emits for this intent.

use crate::dispatch::{NotificationSink, StateReader};
use crate::error::{IntentShapeError, OperationError};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;

/// The ordered `[pending, success, failure]` event-name triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTriple {
    /// Kind of the notification dispatched before the operation starts.
    pub pending: String,
    /// Kind of the notification carrying the resolved value.
    pub success: String,
    /// Kind of the notification carrying the normalized error.
    pub failure: String,
}

impl EventTriple {
    /// Build a triple from three event names.
    #[must_use]
    pub fn new(
        pending: impl Into<String>,
        success: impl Into<String>,
        failure: impl Into<String>,
    ) -> Self {
        Self {
            pending: pending.into(),
            success: success.into(),
            failure: failure.into(),
        }
    }

    /// Whether every member is a non-empty name.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.pending.is_empty() && !self.success.is_empty() && !self.failure.is_empty()
    }
}

impl TryFrom<Vec<String>> for EventTriple {
    type Error = IntentShapeError;

    /// Validate an ordered event-name list into a triple.
    ///
    /// # Errors
    ///
    /// [`IntentShapeError::WrongTripleLength`] unless exactly three names are
    /// given; [`IntentShapeError::EmptyEventName`] if any name is empty.
    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        let mut names = names;
        if names.len() != 3 {
            return Err(IntentShapeError::WrongTripleLength { found: names.len() });
        }
        let failure = names.pop().unwrap_or_default();
        let success = names.pop().unwrap_or_default();
        let pending = names.pop().unwrap_or_default();
        let triple = Self {
            pending,
            success,
            failure,
        };
        if !triple.is_valid() {
            return Err(IntentShapeError::EmptyEventName);
        }
        Ok(triple)
    }
}

/// Context handed to an operation when it starts.
///
/// Exposes the opaque HTTP client handle plus dispatch and state access,
/// mirroring what the store itself offers.
pub struct OperationContext<C, S> {
    /// The HTTP client handle. Forwarded verbatim; the pipeline never
    /// inspects it.
    pub http: C,

    /// Deliver a notification into the store.
    pub dispatch: NotificationSink,

    /// Snapshot of the store's current state.
    pub state: StateReader<S>,
}

impl<C: Clone, S> Clone for OperationContext<C, S> {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            dispatch: Arc::clone(&self.dispatch),
            state: Arc::clone(&self.state),
        }
    }
}

/// The asynchronous operation attached to an intent.
///
/// Invoked exactly once, synchronously, after the pending notification has
/// been dispatched.
pub type Operation<C, S> = Box<dyn FnOnce(OperationContext<C, S>) -> OperationHandle + Send>;

/// Best-effort cancel callback for an in-flight operation.
///
/// Invoking it does not guarantee the operation stops; it only asks.
#[derive(Clone)]
pub struct Canceller {
    inner: Arc<dyn Fn() + Send + Sync>,
}

impl Canceller {
    /// Wrap a cancel callback.
    pub fn new(cancel: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(cancel),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        (self.inner)();
    }
}

impl std::fmt::Debug for Canceller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Canceller")
    }
}

/// Handle returned by an operation: its settlement future plus an optional
/// cancel capability.
///
/// Awaitability is enforced by construction, so the "operation returned a
/// non-awaitable value" failure class cannot occur here.
pub struct OperationHandle {
    future: BoxFuture<'static, Result<Value, OperationError>>,
    canceller: Option<Canceller>,
}

impl OperationHandle {
    /// Wrap a settlement future. The resulting handle is not cancellable.
    pub fn new(
        future: impl Future<Output = Result<Value, OperationError>> + Send + 'static,
    ) -> Self {
        Self {
            future: Box::pin(future),
            canceller: None,
        }
    }

    /// Attach a cancel capability to this handle.
    #[must_use]
    pub fn with_canceller(mut self, canceller: Canceller) -> Self {
        self.canceller = Some(canceller);
        self
    }

    /// The cancel capability, if the operation supports one.
    #[must_use]
    pub const fn canceller(&self) -> Option<&Canceller> {
        self.canceller.as_ref()
    }

    /// Split the handle into its settlement future and cancel capability.
    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        BoxFuture<'static, Result<Value, OperationError>>,
        Option<Canceller>,
    ) {
        (self.future, self.canceller)
    }
}

impl std::fmt::Debug for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationHandle")
            .field("cancellable", &self.canceller.is_some())
            .finish_non_exhaustive()
    }
}

/// A dispatched message, possibly carrying an asynchronous operation.
///
/// # Type Parameters
///
/// - `C`: the opaque HTTP client handle forwarded into operations
/// - `S`: the store's state type
///
/// # Example
///
/// ```ignore
/// let intent = Intent::new("load_user")
///     .with_event("fetch_user")
///     .with_field("user_id", json!(42))
///     .with_operation(|ctx: OperationContext<Api, AppState>| {
///         OperationHandle::new(async move { ctx.http.get_user(42).await })
///     });
/// ```
pub struct Intent<C, S> {
    /// The intent's own action kind.
    pub kind: String,

    /// The asynchronous operation. Presence triggers interception.
    pub operation: Option<Operation<C, S>>,

    /// Base event name the namer expands into a triple.
    pub event: Option<String>,

    /// Explicit event triple; takes precedence over `event`.
    pub events: Option<EventTriple>,

    /// Cancel a same-pending-name in-flight operation before starting.
    pub cancel_previous: bool,

    /// This intent originated from a server-side preload pass; suppresses
    /// duplicate error reporting on the client.
    pub preloading: bool,

    /// All non-reserved fields, forwarded unchanged into every emitted
    /// notification.
    pub payload: Map<String, Value>,
}

impl<C, S> Intent<C, S> {
    /// Create a bare intent with the given kind.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            operation: None,
            event: None,
            events: None,
            cancel_previous: false,
            preloading: false,
            payload: Map::new(),
        }
    }

    /// Attach the asynchronous operation.
    #[must_use]
    pub fn with_operation(
        mut self,
        operation: impl FnOnce(OperationContext<C, S>) -> OperationHandle + Send + 'static,
    ) -> Self {
        self.operation = Some(Box::new(operation));
        self
    }

    /// Set the base event name.
    #[must_use]
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Set the explicit event triple.
    #[must_use]
    pub fn with_events(mut self, events: EventTriple) -> Self {
        self.events = Some(events);
        self
    }

    /// Request cancellation of a superseded same-name operation.
    #[must_use]
    pub const fn with_cancel_previous(mut self, cancel_previous: bool) -> Self {
        self.cancel_previous = cancel_previous;
        self
    }

    /// Mark this intent as originating from a server-side preload pass.
    #[must_use]
    pub const fn with_preloading(mut self, preloading: bool) -> Self {
        self.preloading = preloading;
        self
    }

    /// Add an opaque payload field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Replace the whole opaque payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }
}

// Manual Debug since Operation is an opaque callable.
impl<C, S> std::fmt::Debug for Intent<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Intent")
            .field("kind", &self.kind)
            .field("operation", &self.operation.is_some())
            .field("event", &self.event)
            .field("events", &self.events)
            .field("cancel_previous", &self.cancel_previous)
            .field("preloading", &self.preloading)
            .field("payload", &self.payload)
            .finish()
    }
}
