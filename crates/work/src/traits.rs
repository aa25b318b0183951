//! The `Task` trait — future-style work as a named type.

use async_trait::async_trait;

use crate::{Binding, WorkResult};

/// Work implemented as a type rather than a closure.
///
/// Wrap an implementation with [`Work::task`](crate::Work::task) to register
/// it; it is driven like any other future-style work.
#[async_trait]
pub trait Task: Send + Sync {
    /// Perform the work. `ctx` is the binding the node was registered with.
    async fn run(&self, ctx: Binding) -> WorkResult;
}
