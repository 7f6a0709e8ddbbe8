//! Error types for worklet creation, invocation and context scheduling.

use std::io;

use crate::worklet::PROP_INIT_DATA_CODE;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum WorkletError {
    #[error("Worklets must be initialized from a valid function.")]
    NotAFunction,

    #[error("value is not decorated as a worklet")]
    NotAWorklet,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to materialize worklet '{name}' at {location}: {reason}")]
    Materialization {
        name: String,
        location: String,
        reason: String,
    },

    #[error("worklet '{name}' at {location} raised: {reason}")]
    Invocation {
        name: String,
        location: String,
        reason: String,
    },

    #[error("worklet invoker has been disposed")]
    Disposed,

    #[error("script engine error: {0}")]
    Engine(String),

    #[error("execution context error: {0}")]
    Context(#[from] ContextError),
}

/// Raised when a captured function carries no usable source text.
///
/// This is fatal to worklet creation: retrying without fixing the source (or
/// the build setup that produced it) cannot succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
    location: String,
}

impl ValidationError {
    pub(crate) fn empty_source(location: impl Into<String>) -> Self {
        let message = format!(
            "Failed to create Worklet, the provided code is empty. Tips:\n\
             * Is the worklet compiler plugin installed and enabled?\n\
             * If another plugin also transforms worklets, make sure it does not override the worklets plugin.\n\
             * Make sure the captured function carries a \"{}\" property with the function's code.",
            PROP_INIT_DATA_CODE
        );
        Self {
            message,
            location: location.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Origin of the rejected worklet.
    pub fn location(&self) -> &str {
        &self.location
    }
}

/// Scheduling failures on an execution context.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("execution context '{name}' is closed")]
    Closed { name: String },

    #[error("execution context '{name}' cannot wait on its own thread")]
    WouldDeadlock { name: String },

    #[error("task on execution context '{name}' panicked")]
    TaskPanicked { name: String },

    #[error("failed to spawn thread for execution context '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("execution context '{name}' failed to start: {reason}")]
    Startup { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, WorkletError>;
