//! Chain composition: the terminal store stage and a ready-made two-stage
//! pipeline.
//!
//! The interceptor is one stage in a dispatch chain. [`StoreStage`] is the
//! chain's tail: it delivers whatever reaches it to the store as a plain
//! notification. [`DispatchPipeline`] wires the two together for callers
//! that don't compose their own chain.

use crate::interceptor::AsyncInterceptor;
use flowstate_core::dispatch::{DispatchOutcome, NextStage, StoreHandle};
use flowstate_core::error::IntentShapeError;
use flowstate_core::intent::Intent;
use flowstate_core::notification::Notification;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

/// Terminal dispatch stage: delivers intents to the store verbatim.
///
/// Only the interceptor consumes operations; an intent reaching this stage
/// is delivered as a plain notification of its own kind and resolves with
/// `Value::Null`.
pub struct StoreStage<St> {
    store: Arc<St>,
}

impl<St: StoreHandle> StoreStage<St> {
    /// Create the terminal stage for a store.
    #[must_use]
    pub fn new(store: Arc<St>) -> Self {
        Self { store }
    }
}

impl<C, St> NextStage<C, St::State> for StoreStage<St>
where
    St: StoreHandle,
{
    fn call(&self, intent: Intent<C, St::State>) -> BoxFuture<'static, DispatchOutcome> {
        tracing::trace!(kind = %intent.kind, "delivering intent to the store");
        self.store
            .dispatch(Notification::plain(intent.kind, intent.payload));
        Box::pin(std::future::ready(Ok(Value::Null)))
    }
}

/// A two-stage dispatch pipeline: the interceptor in front of the store.
///
/// # Example
///
/// ```ignore
/// let pipeline = DispatchPipeline::new(
///     AsyncInterceptor::builder(api_client, store).build(),
/// );
///
/// let user = pipeline.dispatch(load_user_intent)?.await?;
/// ```
pub struct DispatchPipeline<C, St: StoreHandle> {
    interceptor: AsyncInterceptor<C, St>,
    tail: StoreStage<St>,
}

impl<C, St> DispatchPipeline<C, St>
where
    C: Clone,
    St: StoreHandle + 'static,
    St::State: 'static,
{
    /// Wrap an interceptor together with the terminal stage for its store.
    #[must_use]
    pub fn new(interceptor: AsyncInterceptor<C, St>) -> Self {
        let tail = StoreStage::new(interceptor.store());
        Self { interceptor, tail }
    }

    /// Dispatch an intent through the pipeline.
    ///
    /// # Errors
    ///
    /// Propagates the interceptor's synchronous [`IntentShapeError`] for
    /// malformed async intents.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime (see
    /// [`AsyncInterceptor::intercept`]).
    pub fn dispatch(
        &self,
        intent: Intent<C, St::State>,
    ) -> Result<BoxFuture<'static, DispatchOutcome>, IntentShapeError> {
        self.interceptor.intercept(&self.tail, intent)
    }

    /// The interceptor stage.
    #[must_use]
    pub const fn interceptor(&self) -> &AsyncInterceptor<C, St> {
        &self.interceptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowstate_testing::mocks::RecordingStore;
    use serde_json::json;

    #[test]
    fn store_stage_delivers_plain_notifications() {
        let store = Arc::new(RecordingStore::new(0u8));
        let stage = StoreStage::new(Arc::clone(&store));

        let intent: Intent<(), u8> = Intent::new("toggle_sidebar").with_field("open", json!(true));
        let outcome = tokio_test::block_on(stage.call(intent));

        assert_eq!(outcome, Ok(Value::Null));
        let delivered = store.notifications();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].kind, "toggle_sidebar");
        assert_eq!(delivered[0].payload.get("open"), Some(&json!(true)));
        assert!(delivered[0].value.is_none());
    }
}
