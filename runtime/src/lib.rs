//! # Flowstate Runtime
//!
//! Runtime implementation of the Flowstate async dispatch interceptor.
//!
//! This crate provides the interceptor stage that translates dispatched
//! intents carrying asynchronous operations into their
//! pending/success/failure notification sequence, plus the chain plumbing
//! around it.
//!
//! ## Core Components
//!
//! - **`AsyncInterceptor`**: the interceptor itself, one per store
//! - **In-flight table**: the cancellation slot map for superseded requests
//! - **`StoreStage` / `DispatchPipeline`**: the chain tail and a ready-made
//!   two-stage pipeline
//!
//! ## Example
//!
//! ```ignore
//! use flowstate_runtime::{AsyncInterceptor, DispatchPipeline};
//!
//! let pipeline = DispatchPipeline::new(
//!     AsyncInterceptor::builder(api_client, store)
//!         .with_reporter(crash_reporter)
//!         .build(),
//! );
//!
//! // Plain intents reach the store untouched; async intents are
//! // intercepted and settle the returned future.
//! let user = pipeline.dispatch(load_user_intent)?.await?;
//! ```

/// The in-flight cancellation table.
mod inflight;

/// The asynchronous dispatch interceptor and its builder.
pub mod interceptor;

/// Chain composition: terminal store stage and two-stage pipeline.
pub mod pipeline;

pub use interceptor::{AsyncInterceptor, AsyncInterceptorBuilder};
pub use pipeline::{DispatchPipeline, StoreStage};
