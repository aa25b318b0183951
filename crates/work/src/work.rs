//! `Work` — one unit of work, tagged with the completion style it uses.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;

use crate::{Binding, Task, WorkError};

/// Outcome of a unit of work.
pub type WorkResult = Result<(), WorkError>;

/// Work that completes by calling its [`Done`] callback.
pub type CallbackFn = dyn Fn(Binding, Done) + Send + Sync;

/// Work that completes by resolving the returned future.
pub type FutureFn = dyn Fn(Binding) -> BoxFuture<'static, WorkResult> + Send + Sync;

// ---------------------------------------------------------------------------
// Done
// ---------------------------------------------------------------------------

/// Completion callback handed to callback-style work.
///
/// Calling it consumes it, so a unit of work can settle at most once. It may
/// be called before the work function returns or moved into a task and
/// called later. Dropping it without a call settles the work as
/// [`WorkError::Abandoned`].
#[derive(Debug)]
pub struct Done {
    tx: oneshot::Sender<WorkResult>,
}

impl Done {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<WorkResult>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn complete(self, result: WorkResult) {
        // The receiver is only gone if the run itself was torn down.
        let _ = self.tx.send(result);
    }

    pub fn ok(self) {
        self.complete(Ok(()));
    }

    pub fn fail(self, err: impl Into<WorkError>) {
        self.complete(Err(err.into()));
    }
}

// ---------------------------------------------------------------------------
// Work
// ---------------------------------------------------------------------------

/// Which adapter strategy a [`Work`] is driven by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStyle {
    Callback,
    Future,
    Adapted,
}

/// A unit of work in one of the three completion styles.
///
/// The style is fixed when the value is built; the adapter dispatches on the
/// variant and never inspects the work again.
#[derive(Clone)]
pub enum Work {
    /// Receives a [`Done`] and calls it, synchronously or later.
    Callback(Arc<CallbackFn>),
    /// Returns a future that settles the work.
    Future(Arc<FutureFn>),
    /// Future-based work exposed through a callback-shaped wrapper: the
    /// future's settlement is forwarded into a [`Done`].
    Adapted(Arc<FutureFn>),
}

impl Work {
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Binding, Done) + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(f))
    }

    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(Binding) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WorkResult> + Send + 'static,
    {
        Self::Future(Arc::new(move |ctx| f(ctx).boxed()))
    }

    pub fn adapted<F, Fut>(f: F) -> Self
    where
        F: Fn(Binding) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WorkResult> + Send + 'static,
    {
        Self::Adapted(Arc::new(move |ctx| f(ctx).boxed()))
    }

    /// Future-style work driven by a [`Task`] implementation.
    pub fn task(task: Arc<dyn Task>) -> Self {
        Self::future(move |ctx| {
            let task = Arc::clone(&task);
            async move { task.run(ctx).await }
        })
    }

    pub fn style(&self) -> WorkStyle {
        match self {
            Self::Callback(_) => WorkStyle::Callback,
            Self::Future(_) => WorkStyle::Future,
            Self::Adapted(_) => WorkStyle::Adapted,
        }
    }
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Work").field(&self.style()).finish()
    }
}
