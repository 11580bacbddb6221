//! Activity port: named request/response handlers the engine invokes.
//!
//! `Activity` uses RPITIT async methods; because RPITIT traits are not
//! object-safe, `BoxActivity` provides dynamic dispatch via the usual
//! object-safe shadow trait with boxed futures and a blanket impl.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use traverse_types::error::ErrorKind;
use traverse_types::workflow::VarMap;
use uuid::Uuid;

use crate::expression::ExpressionEngine;
use crate::logger::ActivityLogger;
use crate::state::{Patch, PathState};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// A tagged activity failure. The kind drives retry/catch matching.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ActivityError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ActivityError {
    /// Generic activity failure (`ErrorKind::Activity`).
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Activity,
            message: message.into(),
        }
    }

    /// Deadline exceeded (`ErrorKind::Timeout`).
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            message: message.into(),
        }
    }

    /// Cooperative cancellation (`ErrorKind::Canceled`).
    pub fn canceled(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Canceled,
            message: message.into(),
        }
    }

    /// Bad parameters or misuse (`ErrorKind::Validation`).
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: message.into(),
        }
    }

    /// Embedded script/expression failure (`ErrorKind::Expression`).
    pub fn expression(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Expression,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// What an activity hands back: a result value, and optionally a batch of
/// state patches (script activities). Patches and the store write are
/// applied by the step evaluator only after the activity succeeds.
#[derive(Debug, Clone, Default)]
pub struct ActivityOutput {
    pub value: Value,
    pub patches: Vec<Patch>,
}

impl ActivityOutput {
    /// A plain result value with no patches.
    pub fn value(value: Value) -> Self {
        Self {
            value,
            patches: Vec::new(),
        }
    }

    /// A result value plus a patch batch.
    pub fn with_patches(value: Value, patches: Vec<Patch>) -> Self {
        Self { value, patches }
    }
}

impl From<Value> for ActivityOutput {
    fn from(value: Value) -> Self {
        Self::value(value)
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Per-invocation context handed to every activity.
///
/// Carries cancellation, read access to the invoking path's state, the
/// expression engine handle, the activity logger, and identifying names.
#[derive(Clone, Copy)]
pub struct ActivityContext<'a> {
    pub execution_id: Uuid,
    pub path_id: &'a str,
    pub step: &'a str,
    pub cancel: &'a CancellationToken,
    pub state: &'a PathState,
    pub engine: &'a dyn ExpressionEngine,
    pub logger: &'a dyn ActivityLogger,
}

// ---------------------------------------------------------------------------
// Activity trait and type erasure
// ---------------------------------------------------------------------------

/// A named callable the engine invokes to perform one step's work.
///
/// Implementations must be cancellation-aware when they block: long-running
/// work should select against `ctx.cancel`.
pub trait Activity: Send + Sync {
    /// Registry key for this activity.
    fn name(&self) -> &str;

    /// Execute with resolved parameters.
    fn execute(
        &self,
        ctx: ActivityContext<'_>,
        params: VarMap,
    ) -> impl Future<Output = Result<ActivityOutput, ActivityError>> + Send;
}

/// Boxed activity future, borrowed from the invocation context.
pub type ActivityFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ActivityOutput, ActivityError>> + Send + 'a>>;

/// Object-safe version of [`Activity`] with boxed futures.
///
/// This trait exists solely to enable dynamic dispatch; a blanket
/// implementation covers every `Activity`.
pub trait ActivityDyn: Send + Sync {
    fn name(&self) -> &str;

    fn execute_boxed<'a>(&'a self, ctx: ActivityContext<'a>, params: VarMap)
    -> ActivityFuture<'a>;
}

/// Blanket implementation: any `Activity` automatically implements
/// `ActivityDyn`.
impl<T: Activity> ActivityDyn for T {
    fn name(&self) -> &str {
        Activity::name(self)
    }

    fn execute_boxed<'a>(
        &'a self,
        ctx: ActivityContext<'a>,
        params: VarMap,
    ) -> ActivityFuture<'a> {
        Box::pin(self.execute(ctx, params))
    }
}

/// Type-erased activity handler stored in the registry.
pub struct BoxActivity {
    inner: Box<dyn ActivityDyn>,
}

impl BoxActivity {
    /// Wrap a concrete `Activity` in a type-erased box.
    pub fn new<T: Activity + 'static>(activity: T) -> Self {
        Self {
            inner: Box::new(activity),
        }
    }

    /// Registry key for this activity.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Execute with resolved parameters.
    pub async fn execute(
        &self,
        ctx: ActivityContext<'_>,
        params: VarMap,
    ) -> Result<ActivityOutput, ActivityError> {
        self.inner.execute_boxed(ctx, params).await
    }
}

// ---------------------------------------------------------------------------
// Closure adapter
// ---------------------------------------------------------------------------

/// Owned future returned by closure handlers. Handlers read what they need
/// from the context synchronously and move owned data into the future.
pub type OwnedActivityFuture =
    Pin<Box<dyn Future<Output = Result<ActivityOutput, ActivityError>> + Send + 'static>>;

/// Boxed handler function used by [`FnActivity`].
pub type ActivityHandler =
    Box<dyn Fn(ActivityContext<'_>, VarMap) -> OwnedActivityFuture + Send + Sync>;

/// Adapter turning a closure into an [`Activity`].
pub struct FnActivity {
    name: String,
    handler: ActivityHandler,
}

impl FnActivity {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActivityContext<'_>, VarMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ActivityOutput, ActivityError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            handler: Box::new(move |ctx, params| Box::pin(handler(ctx, params))),
        }
    }
}

impl Activity for FnActivity {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        ctx: ActivityContext<'_>,
        params: VarMap,
    ) -> Result<ActivityOutput, ActivityError> {
        (self.handler)(ctx, params).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
