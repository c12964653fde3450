//! The asynchronous dispatch interceptor.
//!
//! Sits in a chain of dispatch stages. Intents without an operation pass
//! through to the rest of the chain untouched. Intents carrying an operation
//! are translated into a pending notification, the operation itself, and a
//! terminal success or failure notification.

use crate::inflight::InflightTable;
use flowstate_core::dispatch::{
    DispatchOutcome, NextStage, NotificationSink, StateReader, StoreHandle,
};
use flowstate_core::environment::{
    Clock, ErrorReporter, EventNamer, LocationProvider, ReportContext, SuffixNamer, SystemClock,
};
use flowstate_core::error::{IntentShapeError, Normalizer, OperationError, normalize_error};
use flowstate_core::intent::{EventTriple, Intent, OperationContext};
use flowstate_core::notification::Notification;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Builds the notification dispatched by [`ReportContext::redirect_to`].
type RedirectIntentFactory = Arc<dyn Fn(&str) -> Notification + Send + Sync>;

/// Location provider used until routing is wired in: root path, no URL.
#[derive(Debug, Clone, Copy, Default)]
struct UnroutedLocation;

impl LocationProvider for UnroutedLocation {
    fn path(&self) -> String {
        "/".to_owned()
    }

    fn url(&self) -> String {
        String::new()
    }
}

/// Default navigation notification: kind `NAVIGATE`, target in the payload.
fn navigation_notification(target: &str) -> Notification {
    let mut payload = Map::new();
    payload.insert("target".to_owned(), Value::String(target.to_owned()));
    Notification::plain("NAVIGATE", payload)
}

/// The interceptor: translates one intent into its pending/success/failure
/// notification sequence.
///
/// One instance per store. The in-flight cancellation table is the only
/// state surviving across intents; everything else is fixed at construction.
///
/// # Type Parameters
///
/// - `C`: the opaque HTTP client handle forwarded into operations
/// - `St`: the store handle implementation
///
/// # Example
///
/// ```ignore
/// let interceptor = AsyncInterceptor::builder(api_client, Arc::clone(&store))
///     .with_reporter(SentryReporter::new(dsn))
///     .with_location(BrowserHistory::new())
///     .build();
///
/// let outcome = interceptor.intercept(&tail, intent)?.await?;
/// ```
pub struct AsyncInterceptor<C, St: StoreHandle> {
    http: C,
    store: Arc<St>,
    namer: Arc<dyn EventNamer>,
    location: Arc<dyn LocationProvider>,
    clock: Arc<dyn Clock>,
    reporter: Option<Arc<dyn ErrorReporter<St::State>>>,
    normalizer: Normalizer,
    redirect_intent: RedirectIntentFactory,
    server: bool,
    inflight: InflightTable,
}

impl<C, St> AsyncInterceptor<C, St>
where
    C: Clone,
    St: StoreHandle + 'static,
    St::State: 'static,
{
    /// Start building an interceptor around an HTTP client handle and a
    /// store.
    #[must_use]
    pub fn builder(http: C, store: Arc<St>) -> AsyncInterceptorBuilder<C, St> {
        AsyncInterceptorBuilder::new(http, store)
    }

    /// The store this interceptor dispatches into.
    #[must_use]
    pub fn store(&self) -> Arc<St> {
        Arc::clone(&self.store)
    }

    /// Number of cancellable operations currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    /// Process one dispatched intent.
    ///
    /// Intents without an operation are delegated unchanged to `next` and
    /// its result is returned verbatim. Intents with an operation are
    /// intercepted: the pending notification is dispatched synchronously
    /// (before this method returns), the operation is started, and the
    /// returned future settles with the operation's raw outcome once the
    /// success or failure notification has been dispatched.
    ///
    /// Settlement runs on a spawned task, so the terminal notification is
    /// delivered even if the caller drops the returned future.
    ///
    /// # Errors
    ///
    /// Returns an [`IntentShapeError`] synchronously, before any
    /// notification is dispatched, when the intent declares an operation but
    /// its event names cannot be resolved into a valid triple. Operation
    /// failures are never surfaced here; they settle the returned future.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime (the settlement task is
    /// spawned on the ambient runtime).
    #[tracing::instrument(skip_all, fields(kind = %intent.kind))]
    pub fn intercept<N>(
        &self,
        next: &N,
        mut intent: Intent<C, St::State>,
    ) -> Result<BoxFuture<'static, DispatchOutcome>, IntentShapeError>
    where
        N: NextStage<C, St::State> + ?Sized,
    {
        let Some(operation) = intent.operation.take() else {
            tracing::trace!("no operation attached, passing through");
            metrics::counter!("flowstate.intents.pass_through").increment(1);
            return Ok(next.call(intent));
        };

        // Shape validation happens before anything observable.
        let triple = self.resolve_triple(&intent)?;
        metrics::counter!("flowstate.intents.intercepted").increment(1);
        tracing::debug!(pending = %triple.pending, "intercepting async intent");

        // Observers must see the in-flight state before the operation's
        // future is ever polled.
        let payload = intent.payload;
        self.store
            .dispatch(Notification::pending(triple.pending.clone(), payload.clone()));

        let dispatch = self.notification_sink();
        let state = self.state_reader();
        let handle = operation(OperationContext {
            http: self.http.clone(),
            dispatch: Arc::clone(&dispatch),
            state: Arc::clone(&state),
        });
        let (future, canceller) = handle.into_parts();

        // Cancellation is opt-in, client-only, and requires the operation to
        // actually expose a cancel capability.
        let cancellable = !self.server && intent.cancel_previous && canceller.is_some();
        let lease = if cancellable {
            canceller.map(|canceller| self.inflight.begin(triple.pending.clone(), canceller))
        } else {
            None
        };

        let inflight = self.inflight.clone();
        let store = Arc::clone(&self.store);
        let reporter = self.reporter.clone();
        let normalizer = Arc::clone(&self.normalizer);
        let location = Arc::clone(&self.location);
        let clock = Arc::clone(&self.clock);
        let redirect_intent = Arc::clone(&self.redirect_intent);
        let server = self.server;
        let preloading = intent.preloading;

        let (tx, rx) = oneshot::channel::<DispatchOutcome>();

        tokio::spawn(async move {
            let started = std::time::Instant::now();
            let settled = future.await;
            metrics::histogram!("flowstate.operation.duration_seconds")
                .record(started.elapsed().as_secs_f64());

            if let Some(lease) = &lease {
                inflight.settle(lease);
            }

            let outcome = match settled {
                Ok(value) => {
                    metrics::counter!("flowstate.operations.succeeded").increment(1);
                    tracing::debug!(kind = %triple.success, "operation resolved");
                    store.dispatch(Notification::success(
                        triple.success,
                        payload,
                        value.clone(),
                    ));
                    Ok(value)
                }
                Err(error) => {
                    metrics::counter!("flowstate.operations.failed").increment(1);
                    tracing::warn!(kind = %triple.failure, error = %error, "operation rejected");
                    store.dispatch(Notification::failure(
                        triple.failure,
                        payload,
                        (*normalizer)(&error),
                    ));

                    if !server && !preloading {
                        if let Some(reporter) = &reporter {
                            metrics::counter!("flowstate.operations.reported").increment(1);
                            let redirect: Arc<dyn Fn(&str) + Send + Sync> = {
                                let dispatch = Arc::clone(&dispatch);
                                let make = Arc::clone(&redirect_intent);
                                Arc::new(move |target: &str| (*dispatch)((*make)(target)))
                            };
                            let context = ReportContext::new(
                                location.path(),
                                location.url(),
                                server,
                                clock.now(),
                                Arc::clone(&dispatch),
                                Arc::clone(&state),
                                redirect,
                            );
                            reporter.report(&error, context);
                        }
                    }
                    Err(error)
                }
            };

            // The dispatcher's caller may have dropped its end; settlement
            // above already happened, so a lost receiver is fine.
            let _ = tx.send(outcome);
        });

        Ok(Box::pin(async move {
            rx.await.unwrap_or_else(|_| {
                Err(OperationError::new("operation settlement task was aborted"))
            })
        }))
    }

    /// Resolve the event triple for an intercepted intent.
    fn resolve_triple(
        &self,
        intent: &Intent<C, St::State>,
    ) -> Result<EventTriple, IntentShapeError> {
        let triple = if let Some(events) = &intent.events {
            events.clone()
        } else if let Some(base) = &intent.event {
            if base.is_empty() {
                return Err(IntentShapeError::EmptyEventName);
            }
            self.namer.derive(base)
        } else {
            return Err(IntentShapeError::MissingEvents);
        };

        if !triple.is_valid() {
            return Err(IntentShapeError::EmptyEventName);
        }
        Ok(triple)
    }

    fn notification_sink(&self) -> NotificationSink {
        let store = Arc::clone(&self.store);
        Arc::new(move |notification| store.dispatch(notification))
    }

    fn state_reader(&self) -> StateReader<St::State> {
        let store = Arc::clone(&self.store);
        Arc::new(move || store.state())
    }
}

/// Builder for [`AsyncInterceptor`].
///
/// Defaults: suffix-based event namer, built-in error normalizer, system
/// clock, no error reporter, client context, root location, and a plain
/// `NAVIGATE` notification for redirects.
pub struct AsyncInterceptorBuilder<C, St: StoreHandle> {
    http: C,
    store: Arc<St>,
    namer: Arc<dyn EventNamer>,
    location: Arc<dyn LocationProvider>,
    clock: Arc<dyn Clock>,
    reporter: Option<Arc<dyn ErrorReporter<St::State>>>,
    normalizer: Normalizer,
    redirect_intent: RedirectIntentFactory,
    server: bool,
}

impl<C, St> AsyncInterceptorBuilder<C, St>
where
    St: StoreHandle,
{
    fn new(http: C, store: Arc<St>) -> Self {
        Self {
            http,
            store,
            namer: Arc::new(SuffixNamer::default()),
            location: Arc::new(UnroutedLocation),
            clock: Arc::new(SystemClock),
            reporter: None,
            normalizer: Arc::new(normalize_error),
            redirect_intent: Arc::new(navigation_notification),
            server: false,
        }
    }

    /// Set the event-naming function deriving triples from base names.
    #[must_use]
    pub fn with_namer(mut self, namer: impl EventNamer + 'static) -> Self {
        self.namer = Arc::new(namer);
        self
    }

    /// Set the location accessor used when building error reports.
    #[must_use]
    pub fn with_location(mut self, location: impl LocationProvider + 'static) -> Self {
        self.location = Arc::new(location);
        self
    }

    /// Set the clock stamping error reports.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Set the error-report callback. Without one, failures are still
    /// notified but never reported.
    #[must_use]
    pub fn with_reporter(mut self, reporter: impl ErrorReporter<St::State> + 'static) -> Self {
        self.reporter = Some(Arc::new(reporter));
        self
    }

    /// Replace the built-in error normalizer.
    #[must_use]
    pub fn with_normalizer(
        mut self,
        normalizer: impl Fn(&OperationError) -> flowstate_core::error::NormalizedError
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.normalizer = Arc::new(normalizer);
        self
    }

    /// Set the notification dispatched when a reporter redirects.
    #[must_use]
    pub fn with_redirect_intent(
        mut self,
        redirect_intent: impl Fn(&str) -> Notification + Send + Sync + 'static,
    ) -> Self {
        self.redirect_intent = Arc::new(redirect_intent);
        self
    }

    /// Mark this interceptor as running in a server context.
    ///
    /// Server context disables both cancellation and error reporting.
    #[must_use]
    pub const fn server(mut self, server: bool) -> Self {
        self.server = server;
        self
    }

    /// Finish building the interceptor.
    #[must_use]
    pub fn build(self) -> AsyncInterceptor<C, St> {
        AsyncInterceptor {
            http: self.http,
            store: self.store,
            namer: self.namer,
            location: self.location,
            clock: self.clock,
            reporter: self.reporter,
            normalizer: self.normalizer,
            redirect_intent: self.redirect_intent,
            server: self.server,
            inflight: InflightTable::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Test code can use unwrap

    use super::*;
    use flowstate_core::intent::OperationHandle;
    use flowstate_testing::helpers::refusing_tail;
    use flowstate_testing::mocks::RecordingStore;
    use serde_json::json;

    fn interceptor() -> AsyncInterceptor<(), RecordingStore<u32>> {
        AsyncInterceptor::builder((), Arc::new(RecordingStore::new(7))).build()
    }

    // Shape errors are synchronous, so no runtime is needed here.
    #[test]
    fn missing_events_is_a_synchronous_error() {
        let interceptor = interceptor();
        let intent = Intent::new("load")
            .with_operation(|_ctx| OperationHandle::new(async { Ok(json!(1)) }));

        let result = interceptor.intercept(&refusing_tail(), intent);

        assert!(matches!(result, Err(IntentShapeError::MissingEvents)));
        assert!(interceptor.store().is_empty());
    }

    #[test]
    fn empty_base_event_is_a_synchronous_error() {
        let interceptor = interceptor();
        let intent = Intent::new("load")
            .with_event("")
            .with_operation(|_ctx| OperationHandle::new(async { Ok(json!(1)) }));

        let result = interceptor.intercept(&refusing_tail(), intent);

        assert!(matches!(result, Err(IntentShapeError::EmptyEventName)));
        assert!(interceptor.store().is_empty());
    }

    #[test]
    fn default_redirect_intent_carries_the_target() {
        let notification = navigation_notification("/login");

        assert_eq!(notification.kind, "NAVIGATE");
        assert_eq!(notification.payload.get("target"), Some(&json!("/login")));
    }

    #[test]
    fn explicit_events_win_over_base_name() {
        let interceptor = interceptor();
        let intent: Intent<(), u32> = Intent::new("load")
            .with_event("fetch_user")
            .with_events(EventTriple::new("P", "S", "F"));

        let triple = interceptor.resolve_triple(&intent).unwrap();
        assert_eq!(triple, EventTriple::new("P", "S", "F"));
    }
}
