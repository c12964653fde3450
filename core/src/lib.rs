//! # Flowstate Core
//!
//! Core types and collaborator traits for the Flowstate async dispatch
//! interceptor.
//!
//! Flowstate lets a unidirectional state-management store handle
//! asynchronous operations (typically network calls) by translating one
//! dispatched **intent** into a sequence of up to three **notifications**:
//! pending, then success or failure.
//!
//! ## Core Concepts
//!
//! - **Intent**: a dispatched message, an open mapping with a few reserved
//!   fields; attaching an [`Operation`](intent::Operation) is what triggers
//!   interception
//! - **Notification**: a state-transition message delivered to the store
//! - **Event triple**: the `[pending, success, failure]` names, given
//!   explicitly or derived from a base name by an
//!   [`EventNamer`](environment::EventNamer)
//! - **Collaborators**: store handle, location provider, error reporter, and
//!   clock, all injected behind traits
//!
//! The interceptor itself lives in `flowstate-runtime`; mocks for every
//! collaborator live in `flowstate-testing`.
//!
//! ## Example
//!
//! ```ignore
//! use flowstate_core::{Intent, OperationContext, OperationHandle};
//! use serde_json::json;
//!
//! let intent = Intent::new("load_user")
//!     .with_event("fetch_user")
//!     .with_field("user_id", json!(42))
//!     .with_operation(|ctx: OperationContext<Api, AppState>| {
//!         OperationHandle::new(async move { ctx.http.get_user(42).await })
//!     });
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

/// The dispatch-chain seams: store access and the `next` continuation.
pub mod dispatch;

/// Injected collaborators: naming, location, reporting, and time.
pub mod environment;

/// Error types: intent-shape errors, operation errors, and normalization.
pub mod error;

/// Intents and the operations they carry.
pub mod intent;

/// Notifications delivered to the store.
pub mod notification;

pub use dispatch::{DispatchOutcome, NextStage, NotificationSink, StateReader, StoreHandle};
pub use environment::{
    Clock, ErrorReporter, EventNamer, LocationProvider, ReportContext, SuffixNamer, SystemClock,
};
pub use error::{IntentShapeError, NormalizedError, Normalizer, OperationError, normalize_error};
pub use intent::{Canceller, EventTriple, Intent, Operation, OperationContext, OperationHandle};
pub use notification::Notification;
