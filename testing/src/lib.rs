//! # Flowstate Testing
//!
//! Testing utilities and mock collaborators for Flowstate.
//!
//! This crate provides:
//! - A recording store that captures every dispatched notification
//! - Capturing and redirecting error reporters
//! - A static location provider and a fixed clock
//! - Small helpers for cancellation tracking and chain tails
//!
//! ## Example
//!
//! ```ignore
//! use flowstate_testing::mocks::RecordingStore;
//! use flowstate_runtime::AsyncInterceptor;
//!
//! #[tokio::test]
//! async fn pending_then_success() {
//!     let store = Arc::new(RecordingStore::new(AppState::default()));
//!     let interceptor = AsyncInterceptor::builder((), Arc::clone(&store)).build();
//!
//!     let outcome = interceptor.intercept(&helpers::refusing_tail(), intent)?.await;
//!
//!     assert_eq!(store.kinds(), vec!["FETCH_USER_PENDING", "FETCH_USER_SUCCESS"]);
//! }
//! ```

use chrono::{DateTime, Utc};
use flowstate_core::environment::Clock;

/// Mock implementations of the collaborator traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use flowstate_core::dispatch::StoreHandle;
    use flowstate_core::environment::{ErrorReporter, LocationProvider, ReportContext};
    use flowstate_core::error::OperationError;
    use flowstate_core::notification::Notification;
    use std::sync::{Arc, Mutex, PoisonError};

    /// A store handle that records every notification it receives.
    ///
    /// State is a fixed value handed out on every snapshot, which is all the
    /// interceptor ever asks of a store.
    #[derive(Debug)]
    pub struct RecordingStore<S> {
        state: S,
        notifications: Arc<Mutex<Vec<Notification>>>,
    }

    impl<S> RecordingStore<S> {
        /// Create a recording store with the given state snapshot.
        pub fn new(state: S) -> Self {
            Self {
                state,
                notifications: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Everything dispatched so far, in order.
        #[must_use]
        pub fn notifications(&self) -> Vec<Notification> {
            self.notifications
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Just the notification kinds, in dispatch order.
        #[must_use]
        pub fn kinds(&self) -> Vec<String> {
            self.notifications().into_iter().map(|n| n.kind).collect()
        }

        /// Number of notifications dispatched so far.
        #[must_use]
        pub fn len(&self) -> usize {
            self.notifications
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }

        /// Whether nothing has been dispatched yet.
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    impl<S: Clone + Send + Sync> StoreHandle for RecordingStore<S> {
        type State = S;

        fn dispatch(&self, notification: Notification) {
            self.notifications
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(notification);
        }

        fn state(&self) -> S {
            self.state.clone()
        }
    }

    /// Location provider returning fixed values.
    #[derive(Debug, Clone)]
    pub struct StaticLocation {
        path: String,
        url: String,
    }

    impl StaticLocation {
        /// Create a provider with the given path and URL.
        pub fn new(path: impl Into<String>, url: impl Into<String>) -> Self {
            Self {
                path: path.into(),
                url: url.into(),
            }
        }
    }

    impl Default for StaticLocation {
        fn default() -> Self {
            Self::new("/inbox", "https://example.test/inbox")
        }
    }

    impl LocationProvider for StaticLocation {
        fn path(&self) -> String {
            self.path.clone()
        }

        fn url(&self) -> String {
            self.url.clone()
        }
    }

    /// A flattened record of one reported failure.
    #[derive(Debug, Clone)]
    pub struct CapturedReport {
        /// The raw error's message.
        pub message: String,
        /// The raw error's status, if any.
        pub status: Option<u16>,
        /// Location path from the report context.
        pub path: String,
        /// Location URL from the report context.
        pub url: String,
        /// Server flag from the report context.
        pub server: bool,
        /// Timestamp from the report context.
        pub occurred_at: DateTime<Utc>,
    }

    /// An error reporter that captures every report it receives.
    ///
    /// Clones share the same report log, so a handle kept by the test still
    /// observes reports after the reporter moved into the interceptor.
    #[derive(Debug, Clone, Default)]
    pub struct CapturingReporter {
        reports: Arc<Mutex<Vec<CapturedReport>>>,
    }

    impl CapturingReporter {
        /// Create an empty capturing reporter.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Everything reported so far, in order.
        #[must_use]
        pub fn reports(&self) -> Vec<CapturedReport> {
            self.reports
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Number of reports received.
        #[must_use]
        pub fn len(&self) -> usize {
            self.reports
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }

        /// Whether no report has been received.
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    impl<S> ErrorReporter<S> for CapturingReporter {
        fn report(&self, error: &OperationError, context: ReportContext<S>) {
            self.reports
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(CapturedReport {
                    message: error.message.clone(),
                    status: error.status,
                    path: context.path.clone(),
                    url: context.url.clone(),
                    server: context.server,
                    occurred_at: context.occurred_at,
                });
        }
    }

    /// An error reporter that immediately redirects to a fixed target.
    ///
    /// Exercises the `redirect_to` path of the report context.
    #[derive(Debug, Clone)]
    pub struct RedirectingReporter {
        target: String,
    }

    impl RedirectingReporter {
        /// Create a reporter that redirects every failure to `target`.
        pub fn new(target: impl Into<String>) -> Self {
            Self {
                target: target.into(),
            }
        }
    }

    impl<S> ErrorReporter<S> for RedirectingReporter {
        fn report(&self, _error: &OperationError, context: ReportContext<S>) {
            context.redirect_to(&self.target);
        }
    }

    /// Fixed clock for deterministic tests.
    ///
    /// Always returns the same time, making report timestamps reproducible.
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a fixed clock pinned to the given time.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// A default fixed clock for tests (2026-01-01 00:00:00 UTC).
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which cannot happen
    /// in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Helpers for cancellation tracking and chain tails in tests.
pub mod helpers {
    use flowstate_core::dispatch::{DispatchOutcome, NextStage};
    use flowstate_core::error::OperationError;
    use flowstate_core::intent::{Canceller, Intent};
    use futures::future::BoxFuture;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A canceller whose invocation count can be observed.
    ///
    /// Returns the canceller and a shared counter incremented on every
    /// cancel request.
    #[must_use]
    pub fn tracked_canceller() -> (Canceller, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let canceller = {
            let count = Arc::clone(&count);
            Canceller::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        (canceller, count)
    }

    /// A chain tail that must never be reached.
    ///
    /// Use as `next` in tests where the intent is expected to be
    /// intercepted; reaching it surfaces as a failed outcome.
    #[must_use]
    pub fn refusing_tail<C, S>() -> impl NextStage<C, S> {
        |intent: Intent<C, S>| -> BoxFuture<'static, DispatchOutcome> {
            let kind = intent.kind;
            Box::pin(async move {
                Err(OperationError::new(format!(
                    "intent `{kind}` unexpectedly reached the chain tail"
                )))
            })
        }
    }
}

// Re-export commonly used items
pub use mocks::{
    CapturedReport, CapturingReporter, FixedClock, RecordingStore, RedirectingReporter,
    StaticLocation, test_clock,
};

#[cfg(test)]
mod tests {
    use super::*;
    use flowstate_core::dispatch::StoreHandle;
    use flowstate_core::notification::Notification;
    use serde_json::Map;

    #[test]
    fn recording_store_keeps_dispatch_order() {
        let store = RecordingStore::new(0u32);
        store.dispatch(Notification::plain("FIRST", Map::new()));
        store.dispatch(Notification::plain("SECOND", Map::new()));

        assert_eq!(store.kinds(), vec!["FIRST", "SECOND"]);
        assert_eq!(store.state(), 0);
    }

    #[test]
    fn fixed_clock_is_deterministic() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }
}
