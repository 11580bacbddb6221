//! Synchronous callback chain for execution lifecycle events.
//!
//! Handlers run in registration order and the engine blocks until each one
//! returns. Events for a single path arrive in order; events from sibling
//! paths interleave arbitrarily.

use std::sync::Arc;

use traverse_types::event::ExecutionEvent;

/// A lifecycle event handler.
pub trait ExecutionCallback: Send + Sync {
    fn handle(&self, event: &ExecutionEvent);
}

/// Closures are callbacks.
impl<F> ExecutionCallback for F
where
    F: Fn(&ExecutionEvent) + Send + Sync,
{
    fn handle(&self, event: &ExecutionEvent) {
        self(event)
    }
}

/// An ordered chain of callbacks. Cloning shares the registered handlers.
#[derive(Clone, Default)]
pub struct CallbackChain {
    handlers: Vec<Arc<dyn ExecutionCallback>>,
}

impl CallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; handlers run in registration order.
    pub fn push(&mut self, handler: Arc<dyn ExecutionCallback>) {
        self.handlers.push(handler);
    }

    /// Builder-style append.
    pub fn with(mut self, handler: Arc<dyn ExecutionCallback>) -> Self {
        self.push(handler);
        self
    }

    /// Deliver an event to every handler, in order, synchronously.
    pub fn emit(&self, event: &ExecutionEvent) {
        for handler in &self.handlers {
            handler.handle(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for CallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackChain")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
