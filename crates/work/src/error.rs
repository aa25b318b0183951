//! Work-level error type.

use std::any::Any;

use thiserror::Error;

/// Errors a unit of work settles with.
///
/// The engine does not interpret the variant; every failure is reported
/// through the graph-level `error` signal with [`WorkError::message`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkError {
    /// The work itself reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The completion callback was dropped without ever being called.
    #[error("completion callback dropped without settling")]
    Abandoned,

    /// The work panicked while running.
    #[error("work panicked: {0}")]
    Panicked(String),
}

impl WorkError {
    /// Shorthand for [`WorkError::Failed`].
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Map a caught panic payload to [`WorkError::Panicked`].
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&str>() {
            (*msg).to_owned()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic payload".to_owned()
        };
        Self::Panicked(message)
    }

    /// Human-readable message carried by the `error` signal.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<anyhow::Error> for WorkError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(format!("{err:#}"))
    }
}

impl From<String> for WorkError {
    fn from(message: String) -> Self {
        Self::Failed(message)
    }
}

impl From<&str> for WorkError {
    fn from(message: &str) -> Self {
        Self::Failed(message.to_owned())
    }
}
