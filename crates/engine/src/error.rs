//! Engine-level error types.

use thiserror::Error;

/// Errors produced by the engine (registration + lifecycle).
///
/// Node failures during a run are never returned from `start`; they are
/// published as `error` signals. Only [`InitGraph::run`](crate::InitGraph::run)
/// turns the first one into [`EngineError::NodeFailed`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    // ------ Registration errors ------

    /// Node names must be non-empty.
    #[error("node name must not be empty")]
    EmptyName,

    /// The name collides with a graph-level signal.
    #[error("node name '{0}' is reserved")]
    ReservedName(String),

    /// A node with this name is already registered.
    #[error("duplicate node name: '{0}'")]
    DuplicateName(String),

    /// The graph cannot change shape while a run is in progress.
    #[error("cannot register '{0}' while a run is in progress")]
    RegisterWhileRunning(String),

    // ------ Lifecycle errors ------

    /// `start` was called while a run is in progress.
    #[error("a run is already in progress")]
    AlreadyRunning,

    /// `start` needs a tokio runtime to spawn the dispatcher on.
    #[error("start must be called from within a tokio runtime")]
    NoRuntime,

    /// A node failed during [`InitGraph::run`](crate::InitGraph::run).
    #[error("node '{node_name}' failed: {message}")]
    NodeFailed { node_name: String, message: String },

    /// The signal channel closed before the run finished.
    #[error("signal channel closed before the run finished")]
    SignalsClosed,
}

/// Errors from publishing a signal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// An `error` signal was published with nobody listening for it.
    #[error("unhandled error signal from node '{node_name}': {message}")]
    UnhandledError { node_name: String, message: String },
}
