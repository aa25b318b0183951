//! Completion adapter — drives any [`Work`] to a single settlement.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::oneshot;
use tracing::{trace, Instrument};

use crate::{Binding, Done, Work, WorkError, WorkResult};

/// Invoke `work` bound to `ctx` and wait for its one settlement.
///
/// Callback-style work is given a fresh [`Done`] and may call it inline or
/// from another task. Future-style work is awaited directly. Adapted work
/// runs its future on a spawned task that forwards the result into a
/// [`Done`], exactly as a hand-written callback wrapper would. A panic in
/// that future is forwarded as [`WorkError::Panicked`].
pub async fn settle(work: &Work, ctx: Binding) -> WorkResult {
    match work {
        Work::Callback(f) => {
            let (done, rx) = Done::channel();
            f(ctx, done);
            await_done(rx).await
        }
        Work::Future(f) => f(ctx).await,
        Work::Adapted(f) => {
            let (done, rx) = Done::channel();
            let fut = f(ctx);
            tokio::spawn(
                async move {
                    let result = AssertUnwindSafe(fut)
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| Err(WorkError::from_panic(panic.as_ref())));
                    done.complete(result);
                }
                .in_current_span(),
            );
            await_done(rx).await
        }
    }
}

async fn await_done(rx: oneshot::Receiver<WorkResult>) -> WorkResult {
    match rx.await {
        Ok(result) => result,
        Err(_) => {
            trace!("completion callback dropped");
            Err(WorkError::Abandoned)
        }
    }
}
