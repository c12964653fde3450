//! The dispatch-chain seams: store access and the `next` continuation.
//!
//! The interceptor sits in a chain of dispatch stages. It talks to the store
//! through [`StoreHandle`] and forwards unintercepted intents to the rest of
//! the chain through [`NextStage`].

use crate::error::OperationError;
use crate::intent::Intent;
use crate::notification::Notification;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

/// Outcome of dispatching an intent: the operation's resolved value, or the
/// original (unnormalized) error it rejected with.
pub type DispatchOutcome = Result<Value, OperationError>;

/// Shared callback delivering a notification into the store.
pub type NotificationSink = Arc<dyn Fn(Notification) + Send + Sync>;

/// Shared accessor producing a snapshot of the store's current state.
pub type StateReader<S> = Arc<dyn Fn() -> S + Send + Sync>;

/// The store as seen from the dispatch pipeline.
///
/// Delivery is synchronous: by the time `dispatch` returns, the notification
/// has entered the store's reducer pipeline. This is what guarantees that
/// observers see the pending notification before any await point.
pub trait StoreHandle: Send + Sync {
    /// The store's state type.
    type State;

    /// Deliver a notification to the store.
    fn dispatch(&self, notification: Notification);

    /// Snapshot of the current state.
    fn state(&self) -> Self::State;
}

impl<St: StoreHandle> StoreHandle for Arc<St> {
    type State = St::State;

    fn dispatch(&self, notification: Notification) {
        (**self).dispatch(notification);
    }

    fn state(&self) -> Self::State {
        (**self).state()
    }
}

/// The rest of the dispatch chain.
///
/// Intents without an operation are handed here unchanged and the stage's
/// result is returned to the dispatcher verbatim.
pub trait NextStage<C, S>: Send + Sync {
    /// Forward an intent to this stage.
    fn call(&self, intent: Intent<C, S>) -> BoxFuture<'static, DispatchOutcome>;
}

impl<F, C, S> NextStage<C, S> for F
where
    F: Fn(Intent<C, S>) -> BoxFuture<'static, DispatchOutcome> + Send + Sync,
{
    fn call(&self, intent: Intent<C, S>) -> BoxFuture<'static, DispatchOutcome> {
        self(intent)
    }
}
