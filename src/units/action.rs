//! # Executable action of a worker and its closure-backed implementation.
//!
//! An [`Action`] produces a fresh future per call; the future receives a
//! [`CancellationToken`] that the supervisor cancels on timeout or shutdown.
//! Its successful output is a [`serde_json::Value`] recorded as the worker result
//! and fed to dependency conditions.
//!
//! ## Example
//! ```rust
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//! use flowvisor::{ActionFn, ActionRef, TaskError};
//!
//! let probe: ActionRef = ActionFn::arc(|ctx: CancellationToken| async move {
//!     if ctx.is_cancelled() {
//!         return Err(TaskError::Canceled);
//!     }
//!     Ok::<_, TaskError>(json!({ "duration": 125 }))
//! });
//! # let _ = probe;
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Boxed future returned by [`Action::call`].
pub type ActionFuture = BoxFuture<'static, Result<Value, TaskError>>;

/// Shared handle to an action.
pub type ActionRef = Arc<dyn Action>;

/// One executable unit of work.
///
/// Implementations should watch `ctx` and return promptly once it is cancelled:
/// the supervisor drops a timed-out future, but anything the action spawned on its
/// own keeps running until it observes the token.
pub trait Action: Send + Sync + 'static {
    /// Starts one attempt.
    fn call(&self, ctx: CancellationToken) -> ActionFuture;
}

/// Function-backed action.
///
/// Wraps a closure that *creates* a new future per call, so attempts never share
/// hidden mutable state; share state explicitly through `Arc` captured by the closure.
pub struct ActionFn<F> {
    f: F,
}

impl<F, Fut> ActionFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
{
    /// Creates a new function-backed action.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the action and returns it as an [`ActionRef`].
    pub fn arc(f: F) -> ActionRef {
        Arc::new(Self::new(f))
    }
}

impl<F, Fut> Action for ActionFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, TaskError>> + Send + 'static,
{
    fn call(&self, ctx: CancellationToken) -> ActionFuture {
        Box::pin((self.f)(ctx))
    }
}
