//! `engine` crate — node registry, dependency resolution, and the execution
//! engine for dependency-ordered initialization graphs.

pub mod models;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod signal;
pub mod validate;
pub mod executor;

pub use models::NodeDefinition;
pub use error::{EngineError, SignalError};
pub use signal::{NodeFailure, Signal, SignalBus};
pub use executor::{EngineConfig, InitGraph, UnhandledErrorPolicy};
