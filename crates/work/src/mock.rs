//! `MockWork` — scripted work for tests and dry runs.
//!
//! A mock succeeds or fails after an optional delay and records every
//! invocation. It can be turned into a [`Work`] of any completion style, so
//! the same script exercises all three adapter strategies.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::{Binding, Done, Task, Work, WorkError, WorkResult, WorkStyle};

/// What a `MockWork` does once invoked.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    Succeed,
    Fail(String),
}

/// Shared, ordered log of `start:<name>` / `end:<name>` entries.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Position of `entry`, if it was recorded.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

/// A mock unit of work that records every call it receives.
#[derive(Debug)]
pub struct MockWork {
    /// Label written to the journal.
    pub name: String,
    pub behaviour: MockBehaviour,
    /// Simulated duration; zero completes without yielding.
    pub delay: Duration,
    journal: Journal,
    calls: Mutex<usize>,
}

impl MockWork {
    /// Create a mock that always succeeds.
    pub fn succeeding(name: impl Into<String>) -> Self {
        Self::new(name, MockBehaviour::Succeed)
    }

    /// Create a mock that always fails with `msg`.
    pub fn failing(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(name, MockBehaviour::Fail(msg.into()))
    }

    fn new(name: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            name: name.into(),
            behaviour,
            delay: Duration::ZERO,
            journal: Journal::new(),
            calls: Mutex::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Record into a journal shared with other mocks.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    /// Number of times this mock has been invoked.
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build a [`Work`] of the requested style around this mock.
    ///
    /// Callback style completes inline when there is no delay and from a
    /// spawned task otherwise, covering both immediate and deferred callers.
    pub fn work(self: &Arc<Self>, style: WorkStyle) -> Work {
        let mock = Arc::clone(self);
        match style {
            WorkStyle::Callback => Work::callback(move |_, done| mock.run_callback(done)),
            WorkStyle::Future => Work::task(mock),
            WorkStyle::Adapted => Work::adapted(move |_| {
                let mock = Arc::clone(&mock);
                async move { mock.run_async().await }
            }),
        }
    }

    fn begin(&self) {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        self.journal.record(format!("start:{}", self.name));
        debug!(work = %self.name, "mock work invoked");
    }

    fn finish(&self) -> WorkResult {
        self.journal.record(format!("end:{}", self.name));
        match &self.behaviour {
            MockBehaviour::Succeed => Ok(()),
            MockBehaviour::Fail(msg) => Err(WorkError::msg(msg.clone())),
        }
    }

    fn run_callback(self: &Arc<Self>, done: Done) {
        self.begin();
        if self.delay.is_zero() {
            done.complete(self.finish());
            return;
        }
        let mock = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(mock.delay).await;
            done.complete(mock.finish());
        });
    }

    async fn run_async(&self) -> WorkResult {
        self.begin();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.finish()
    }
}

#[async_trait]
impl Task for MockWork {
    async fn run(&self, _ctx: Binding) -> WorkResult {
        self.run_async().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settle;

    #[tokio::test(start_paused = true)]
    async fn every_style_records_one_call() {
        for style in [WorkStyle::Callback, WorkStyle::Future, WorkStyle::Adapted] {
            let mock = Arc::new(MockWork::succeeding("a").with_delay(Duration::from_millis(3)));
            let work = mock.work(style);

            assert_eq!(settle(&work, Binding::new(())).await, Ok(()));
            assert_eq!(mock.call_count(), 1, "style {style:?}");
        }
    }

    #[tokio::test]
    async fn failing_mock_reports_message_and_journals() {
        let journal = Journal::new();
        let mock = Arc::new(MockWork::failing("db", "boom").with_journal(journal.clone()));

        let result = settle(&mock.work(WorkStyle::Callback), Binding::new(())).await;

        assert_eq!(result, Err(WorkError::msg("boom")));
        assert_eq!(journal.entries(), vec!["start:db", "end:db"]);
    }
}
