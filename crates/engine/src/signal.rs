//! Public signal bus.
//!
//! Every signal the engine publishes goes through here: the synthetic
//! `_start`, one per successful node, `done`, and `error`. Consumers either
//! register named listeners, called synchronously at publish time, or hold
//! a broadcast receiver that sees every signal.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::validate::{DONE_SIGNAL, ERROR_SIGNAL, START_SIGNAL};
use crate::SignalError;

/// Payload of the `error` signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFailure {
    pub message: String,
    pub node_name: String,
}

/// A signal published by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    /// The synthetic start signal.
    Start,
    /// A node completed successfully.
    Node { name: String },
    /// Every node completed.
    Done,
    /// A node failed.
    Error(NodeFailure),
}

impl Signal {
    /// The name listeners subscribe to.
    pub fn name(&self) -> &str {
        match self {
            Self::Start => START_SIGNAL,
            Self::Node { name } => name,
            Self::Done => DONE_SIGNAL,
            Self::Error(_) => ERROR_SIGNAL,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(failure) => {
                write!(f, "error ({}: {})", failure.node_name, failure.message)
            }
            other => f.write_str(other.name()),
        }
    }
}

type Listener = Arc<dyn Fn(&Signal) + Send + Sync>;

struct Entry {
    once: bool,
    listener: Listener,
}

/// Publish/subscribe hub for engine signals.
pub struct SignalBus {
    listeners: Mutex<HashMap<String, Vec<Entry>>>,
    channel: broadcast::Sender<Signal>,
}

impl SignalBus {
    /// `capacity` bounds how far a broadcast receiver may lag.
    pub fn new(capacity: usize) -> Self {
        let (channel, _) = broadcast::channel(capacity.max(1));
        Self {
            listeners: Mutex::new(HashMap::new()),
            channel,
        }
    }

    /// Call `listener` every time the signal called `name` is published.
    pub fn on<F>(&self, name: impl Into<String>, listener: F)
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.add(name.into(), false, Arc::new(listener));
    }

    /// Call `listener` the next time `name` is published, then forget it.
    pub fn once<F>(&self, name: impl Into<String>, listener: F)
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.add(name.into(), true, Arc::new(listener));
    }

    fn add(&self, name: String, once: bool, listener: Listener) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name)
            .or_default()
            .push(Entry { once, listener });
    }

    /// Receive every signal published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.channel.subscribe()
    }

    /// Named listeners currently registered for `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map_or(0, Vec::len)
    }

    /// Deliver `signal` to its named listeners and to every receiver.
    ///
    /// Listeners run on the caller's task, outside the bus lock, so they may
    /// call back into the engine.
    ///
    /// # Errors
    /// [`SignalError::UnhandledError`] if an `error` signal has no named
    /// listener and no receiver. The signal is dropped.
    pub fn publish(&self, signal: Signal) -> Result<(), SignalError> {
        let listeners: Vec<Listener> = {
            let mut map = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            match map.get_mut(signal.name()) {
                Some(entries) => {
                    let listeners = entries.iter().map(|e| Arc::clone(&e.listener)).collect();
                    entries.retain(|e| !e.once);
                    listeners
                }
                None => Vec::new(),
            }
        };

        if let Signal::Error(failure) = &signal {
            if listeners.is_empty() && self.channel.receiver_count() == 0 {
                return Err(SignalError::UnhandledError {
                    node_name: failure.node_name.clone(),
                    message: failure.message.clone(),
                });
            }
        }

        for listener in &listeners {
            listener(&signal);
        }
        // No receivers is fine for every signal that reached this point.
        let _ = self.channel.send(signal);
        Ok(())
    }
}

impl fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBus")
            .field("receivers", &self.channel.receiver_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn failure() -> Signal {
        Signal::Error(NodeFailure {
            message: "boom".into(),
            node_name: "a".into(),
        })
    }

    #[test]
    fn listeners_only_see_their_signal() {
        let bus = SignalBus::new(8);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bus.on("storage", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(Signal::Node { name: "storage".into() }).unwrap();
        bus.publish(Signal::Node { name: "cache".into() }).unwrap();
        bus.publish(Signal::Done).unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn once_listener_fires_a_single_time() {
        let bus = SignalBus::new(8);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bus.once("done", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(Signal::Done).unwrap();
        bus.publish(Signal::Done).unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count("done"), 0);
    }

    #[test]
    fn unhandled_error_is_reported() {
        let bus = SignalBus::new(8);
        assert_eq!(
            bus.publish(failure()),
            Err(SignalError::UnhandledError {
                node_name: "a".into(),
                message: "boom".into(),
            })
        );
    }

    #[test]
    fn error_with_a_receiver_is_handled() {
        let bus = SignalBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(failure()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), failure());
    }

    #[test]
    fn error_payload_serializes_with_node_name_key() {
        let json = serde_json::to_value(failure()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "signal": "error", "message": "boom", "nodeName": "a" })
        );
    }
}
