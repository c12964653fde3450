//! Injected collaborators.
//!
//! Everything the interceptor needs from the outside world is abstracted
//! behind a trait here: event naming, location access, error reporting, and
//! time. Production wiring injects real implementations; tests inject the
//! mocks from `flowstate-testing`.

use crate::dispatch::{NotificationSink, StateReader};
use crate::intent::EventTriple;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Derives the `[pending, success, failure]` triple from one base name.
pub trait EventNamer: Send + Sync {
    /// Expand a base event name into its triple.
    fn derive(&self, base: &str) -> EventTriple;
}

/// The default namer: uppercases the base name and appends a suffix per
/// lifecycle stage.
///
/// `fetch_user` becomes `FETCH_USER_PENDING`, `FETCH_USER_SUCCESS`,
/// `FETCH_USER_FAILURE`.
#[derive(Debug, Clone)]
pub struct SuffixNamer {
    pending_suffix: String,
    success_suffix: String,
    failure_suffix: String,
}

impl SuffixNamer {
    /// Create a namer with custom suffixes.
    #[must_use]
    pub fn new(
        pending_suffix: impl Into<String>,
        success_suffix: impl Into<String>,
        failure_suffix: impl Into<String>,
    ) -> Self {
        Self {
            pending_suffix: pending_suffix.into(),
            success_suffix: success_suffix.into(),
            failure_suffix: failure_suffix.into(),
        }
    }
}

impl Default for SuffixNamer {
    fn default() -> Self {
        Self::new("_PENDING", "_SUCCESS", "_FAILURE")
    }
}

impl EventNamer for SuffixNamer {
    fn derive(&self, base: &str) -> EventTriple {
        let base = base.to_uppercase();
        EventTriple::new(
            format!("{base}{}", self.pending_suffix),
            format!("{base}{}", self.success_suffix),
            format!("{base}{}", self.failure_suffix),
        )
    }
}

/// Access to the current routing location.
///
/// The interceptor only reads these when building an error report; routing
/// mechanics stay outside this crate.
pub trait LocationProvider: Send + Sync {
    /// Current location path (e.g. `/inbox/42`).
    fn path(&self) -> String;

    /// Current full location URL.
    fn url(&self) -> String;
}

/// Clock trait - abstracts time for testability.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Context handed to an [`ErrorReporter`] alongside the raw error.
pub struct ReportContext<S> {
    /// Location path at the time of failure.
    pub path: String,

    /// Full location URL at the time of failure.
    pub url: String,

    /// Whether the interceptor runs in a server context.
    pub server: bool,

    /// When the failure was observed.
    pub occurred_at: DateTime<Utc>,

    /// Deliver follow-up notifications into the store.
    pub dispatch: NotificationSink,

    /// Snapshot of the store's current state.
    pub state: StateReader<S>,

    redirect: Arc<dyn Fn(&str) + Send + Sync>,
}

impl<S> ReportContext<S> {
    /// Assemble a report context.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        url: impl Into<String>,
        server: bool,
        occurred_at: DateTime<Utc>,
        dispatch: NotificationSink,
        state: StateReader<S>,
        redirect: Arc<dyn Fn(&str) + Send + Sync>,
    ) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
            server,
            occurred_at,
            dispatch,
            state,
            redirect,
        }
    }

    /// Navigate the application to `target` by dispatching the configured
    /// navigation notification.
    pub fn redirect_to(&self, target: &str) {
        (self.redirect)(target);
    }
}

impl<S> std::fmt::Debug for ReportContext<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportContext")
            .field("path", &self.path)
            .field("url", &self.url)
            .field("server", &self.server)
            .field("occurred_at", &self.occurred_at)
            .finish_non_exhaustive()
    }
}

/// Receives operation failures that were not suppressed.
///
/// Invoked only in a client context, only when the intent was not a preload,
/// and always after the failure notification has been dispatched.
pub trait ErrorReporter<S>: Send + Sync {
    /// Report a raw (unnormalized) operation error.
    fn report(&self, error: &crate::error::OperationError, context: ReportContext<S>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn suffix_namer_derives_screaming_triple() {
        let namer = SuffixNamer::default();
        let triple = namer.derive("fetch_user");

        assert_eq!(
            triple,
            EventTriple::new(
                "FETCH_USER_PENDING",
                "FETCH_USER_SUCCESS",
                "FETCH_USER_FAILURE"
            )
        );
    }

    #[test]
    fn suffix_namer_honors_custom_suffixes() {
        let namer = SuffixNamer::new("_REQUEST", "_OK", "_FAIL");
        let triple = namer.derive("save");

        assert_eq!(triple, EventTriple::new("SAVE_REQUEST", "SAVE_OK", "SAVE_FAIL"));
    }

    proptest! {
        /// Every derived name starts with the uppercased base.
        #[test]
        fn derived_names_share_the_base(base in "[a-z_]{1,16}") {
            let triple = SuffixNamer::default().derive(&base);
            let upper = base.to_uppercase();

            prop_assert!(triple.pending.starts_with(&upper));
            prop_assert!(triple.success.starts_with(&upper));
            prop_assert!(triple.failure.starts_with(&upper));
            prop_assert!(triple.is_valid());
        }
    }
}
