//! Lifecycle event dispatch.
//!
//! The [`EventDispatcher`] collects completion and error handlers for a run
//! and invokes them, in registration order, each under its own
//! [`HandlerScope`]. A failing handler (an `Err` return or a panic) never stops
//! the remaining handlers; failures are logged as they happen and returned
//! together once every handler for the event has run.
//!
//! Firing is synchronous and happens on the thread that drives the run. The
//! dispatcher does not guard against firing an event twice; that discipline
//! belongs to the caller.

use std::{
    any::Any,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use anyhow::Result;
use flowrun_types::RunError;
use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    collaborators::RunNamespace,
    descriptor::{DescriptorError, RunDescriptor},
    scope::{ERROR_BINDING, HandlerScope, HelperFn},
};

type HandlerFn = Box<dyn FnMut(&HandlerScope<'_>) -> Result<()> + Send>;

/// Lifecycle events a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    Complete,
    Error,
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::Complete => f.write_str("completion"),
            RunEvent::Error => f.write_str("error"),
        }
    }
}

/// A user-supplied callback plus the helpers visible to it by name.
pub struct EventHandler {
    label: Option<String>,
    body: HandlerFn,
    helpers: IndexMap<String, HelperFn>,
}

impl EventHandler {
    pub fn new<F>(body: F) -> Self
    where
        F: FnMut(&HandlerScope<'_>) -> Result<()> + Send + 'static,
    {
        Self {
            label: None,
            body: Box::new(body),
            helpers: IndexMap::new(),
        }
    }

    /// Names the handler in logs and failure reports.
    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Registers a helper the handler can reach by name through its scope.
    pub fn with_helper<F>(mut self, name: impl Into<String>, helper: F) -> Self
    where
        F: Fn() -> Value + Send + 'static,
    {
        self.helpers.insert(name.into(), Box::new(helper));
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("label", &self.label)
            .field("helpers", &self.helpers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// One handler that failed while an event was being fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    /// Position of the handler in registration order.
    pub index: usize,
    pub label: Option<String>,
    pub message: String,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "handler #{} ({label}): {}", self.index, self.message),
            None => write!(f, "handler #{}: {}", self.index, self.message),
        }
    }
}

/// Every handler failure collected while firing one event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct HandlerFailureReport {
    pub event: RunEvent,
    pub failures: Vec<HandlerFailure>,
}

impl fmt::Display for HandlerFailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.failures.iter().map(ToString::to_string).collect();
        write!(f, "{} {} handler(s) failed: {}", self.failures.len(), self.event, rendered.join("; "))
    }
}

/// Errors surfaced by the fire operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// `fire_complete` was called before `RunDescriptor::mark_complete`.
    #[error("cannot fire completion handlers: run is not marked complete")]
    NotCompleted,
    /// The descriptor rejected the transition requested by the event.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    /// One or more handlers failed; all handlers still ran.
    #[error(transparent)]
    HandlersFailed(#[from] HandlerFailureReport),
}

/// Registers lifecycle handlers for one run and fires them.
pub struct EventDispatcher {
    namespace: Arc<dyn RunNamespace>,
    complete_handlers: Vec<EventHandler>,
    error_handlers: Vec<EventHandler>,
}

impl EventDispatcher {
    pub fn new(namespace: Arc<dyn RunNamespace>) -> Self {
        Self {
            namespace,
            complete_handlers: Vec::new(),
            error_handlers: Vec::new(),
        }
    }

    pub fn on_complete(&mut self, handler: EventHandler) {
        debug!(event = %RunEvent::Complete, label = handler.label().unwrap_or("-"), "handler registered");
        self.complete_handlers.push(handler);
    }

    pub fn on_error(&mut self, handler: EventHandler) {
        debug!(event = %RunEvent::Error, label = handler.label().unwrap_or("-"), "handler registered");
        self.error_handlers.push(handler);
    }

    pub fn complete_handler_count(&self) -> usize {
        self.complete_handlers.len()
    }

    pub fn error_handler_count(&self) -> usize {
        self.error_handlers.len()
    }

    /// Invokes every completion handler in registration order.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotCompleted`] if the descriptor is not complete; no handler runs.
    /// - [`DispatchError::HandlersFailed`] after all handlers ran, if any of them failed.
    pub fn fire_complete(&mut self, descriptor: &RunDescriptor) -> Result<(), DispatchError> {
        if !descriptor.is_complete() {
            return Err(DispatchError::NotCompleted);
        }
        let bindings = JsonMap::new();
        let failures = invoke_handlers(
            RunEvent::Complete,
            &mut self.complete_handlers,
            descriptor,
            self.namespace.as_ref(),
            &bindings,
        );
        into_result(RunEvent::Complete, failures)
    }

    /// Records `error` on the descriptor, then invokes every error handler in
    /// registration order with `error` bound under [`ERROR_BINDING`].
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Descriptor`] if the run already completed; no handler runs.
    /// - [`DispatchError::HandlersFailed`] after all handlers ran, if any of them failed.
    pub fn fire_error(&mut self, descriptor: &mut RunDescriptor, error: RunError) -> Result<(), DispatchError> {
        descriptor.record_error(&error)?;

        let mut bindings = JsonMap::new();
        bindings.insert(ERROR_BINDING.to_string(), error_payload(&error));
        let failures = invoke_handlers(RunEvent::Error, &mut self.error_handlers, descriptor, self.namespace.as_ref(), &bindings);
        into_result(RunEvent::Error, failures)
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("complete_handlers", &self.complete_handlers)
            .field("error_handlers", &self.error_handlers)
            .finish_non_exhaustive()
    }
}

fn invoke_handlers(
    event: RunEvent,
    handlers: &mut [EventHandler],
    descriptor: &RunDescriptor,
    namespace: &dyn RunNamespace,
    bindings: &JsonMap<String, Value>,
) -> Vec<HandlerFailure> {
    if handlers.is_empty() {
        debug!(%event, "no handlers registered");
        return Vec::new();
    }

    let mut failures = Vec::new();
    for (index, handler) in handlers.iter_mut().enumerate() {
        let EventHandler { label, body, helpers } = handler;
        let scope = HandlerScope::new(descriptor, namespace)
            .with_bindings(bindings)
            .with_helpers(helpers);

        debug!(%event, index, label = label.as_deref().unwrap_or("-"), "invoking handler");
        let message = match catch_unwind(AssertUnwindSafe(|| body(&scope))) {
            Ok(Ok(())) => continue,
            Ok(Err(error)) => format!("{error:#}"),
            Err(panic_payload) => format!("handler panicked: {}", panic_payload_to_string(&panic_payload)),
        };

        warn!(%event, index, label = label.as_deref().unwrap_or("-"), error = %message, "handler failed");
        failures.push(HandlerFailure {
            index,
            label: label.clone(),
            message,
        });
    }

    info!(%event, handlers = handlers.len(), failed = failures.len(), "event handlers finished");
    failures
}

fn into_result(event: RunEvent, failures: Vec<HandlerFailure>) -> Result<(), DispatchError> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(HandlerFailureReport { event, failures }.into())
    }
}

/// Handler-facing view of an error record.
fn error_payload(error: &RunError) -> Value {
    json!({
        "message": error.message,
        "report": error.report,
        "exitStatus": error.exit_status,
    })
}

fn panic_payload_to_string(payload: &Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
