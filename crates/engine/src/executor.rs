//! Execution engine.
//!
//! `InitGraph` is the central orchestrator:
//! 1. Keeps the ordered registry of nodes, the `running` flag, and whether a
//!    dispatcher still has work in flight.
//! 2. On `start`, resolves conditional dependencies and arms every node's
//!    wait-set in a per-run dispatcher task.
//! 3. The dispatcher handles the synthetic start signal on a later turn,
//!    then invokes each node's work through the completion adapter as soon
//!    as its wait-set is satisfied.
//! 4. Successful nodes leave the registry and publish their own signal;
//!    the last one publishes `done`. A failure publishes `error` and leaves
//!    the node (and everything behind it) in place.

use std::collections::HashSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use work::{settle, Binding, Work, WorkError, WorkResult};

use crate::registry::Registry;
use crate::resolver::resolve;
use crate::signal::{NodeFailure, Signal, SignalBus};
use crate::validate::{self, START_SIGNAL};
use crate::{EngineError, NodeDefinition};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when an `error` signal is published with no subscriber.
///
/// `Abort` is the only policy that ends the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnhandledErrorPolicy {
    /// Log the failure and abort the process.
    #[default]
    Abort,
    /// Log the failure and carry on.
    Ignore,
}

/// Tuning knobs for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How many signals a broadcast receiver may fall behind before lagging.
    pub signal_capacity: usize,
    pub unhandled_error: UnhandledErrorPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            signal_capacity: 256,
            unhandled_error: UnhandledErrorPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// InitGraph
// ---------------------------------------------------------------------------

struct State {
    registry: Registry,
    /// True from `start` on a non-empty registry until `done` or `error`.
    running: bool,
    /// True while a dispatcher is alive. Outlives `running` after an
    /// `error`, until independent in-flight work has settled.
    draining: bool,
}

struct Shared {
    state: Mutex<State>,
    signals: SignalBus,
    config: EngineConfig,
}

/// Dependency-ordered executor for one-shot initialization graphs.
///
/// Cloning is cheap and every clone drives the same graph. Work registered
/// without its own binding receives a clone of the engine as its context.
#[derive(Clone)]
pub struct InitGraph {
    shared: Arc<Shared>,
}

impl Default for InitGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl InitGraph {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    registry: Registry::default(),
                    running: false,
                    draining: false,
                }),
                signals: SignalBus::new(config.signal_capacity),
                config,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Registry operations
    // -----------------------------------------------------------------------

    /// Register a node bound to the engine itself.
    ///
    /// # Errors
    /// See [`validate::check_registration`].
    pub fn register(&self, node: NodeDefinition) -> Result<(), EngineError> {
        self.insert(node, None)
    }

    /// Register a node whose work receives `binding` as its context.
    ///
    /// # Errors
    /// See [`validate::check_registration`].
    pub fn register_bound(&self, node: NodeDefinition, binding: Binding) -> Result<(), EngineError> {
        self.insert(node, Some(binding))
    }

    fn insert(&self, node: NodeDefinition, binding: Option<Binding>) -> Result<(), EngineError> {
        let mut state = self.state();
        let busy = state.running || state.draining;
        validate::check_registration(&state.registry, busy, &node.name)?;
        debug!(node = %node.name, depends = ?node.depends, "registered node");
        state.registry.push(node, binding);
        Ok(())
    }

    /// Remove every node named in `names`. Does nothing while running.
    ///
    /// Returns how many nodes were removed.
    pub fn deregister<S: AsRef<str>>(&self, names: &[S]) -> usize {
        let mut state = self.state();
        if state.running {
            debug!("ignoring deregister during a run");
            return 0;
        }
        let removed = state.registry.remove_all(names);
        info!(removed, "deregistered nodes");
        removed
    }

    /// [`deregister`](Self::deregister) for untyped input.
    ///
    /// Ignored while running, or unless `names` is an array of strings.
    pub fn deregister_value(&self, names: &Value) -> usize {
        if self.is_running() {
            debug!("ignoring deregister during a run");
            return 0;
        }
        match validate::removal_names(names) {
            Some(names) => self.deregister(&names),
            None => {
                debug!(input = %names, "ignoring malformed deregister input");
                0
            }
        }
    }

    /// Registered names in registration order.
    pub fn list_names(&self) -> Vec<String> {
        self.state().registry.names()
    }

    pub fn is_running(&self) -> bool {
        self.state().running
    }

    /// Whether the previous run's dispatcher still has work in flight.
    /// `start` and registration are rejected until it has finished.
    pub fn is_draining(&self) -> bool {
        self.state().draining
    }

    // -----------------------------------------------------------------------
    // Signals
    // -----------------------------------------------------------------------

    pub fn signals(&self) -> &SignalBus {
        &self.shared.signals
    }

    /// See [`SignalBus::on`].
    pub fn on<F>(&self, name: impl Into<String>, listener: F)
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.shared.signals.on(name, listener);
    }

    /// See [`SignalBus::once`].
    pub fn once<F>(&self, name: impl Into<String>, listener: F)
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.shared.signals.once(name, listener);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.shared.signals.subscribe()
    }

    fn publish(&self, signal: Signal) {
        let Err(err) = self.shared.signals.publish(signal) else {
            return;
        };
        match self.shared.config.unhandled_error {
            UnhandledErrorPolicy::Abort => {
                error!(error = %err, "no subscriber for error signal; aborting");
                std::process::abort();
            }
            UnhandledErrorPolicy::Ignore => warn!(error = %err, "no subscriber for error signal"),
        }
    }

    // -----------------------------------------------------------------------
    // Running
    // -----------------------------------------------------------------------

    /// Begin a run. Returns before any work is invoked.
    ///
    /// An empty registry publishes `done` before returning and never sets the
    /// running flag. Otherwise progress is only observable through signals.
    ///
    /// # Errors
    /// [`EngineError::AlreadyRunning`] during a run or while a failed run is
    /// still draining, and [`EngineError::NoRuntime`] outside a tokio runtime.
    #[instrument(skip(self))]
    pub fn start(&self) -> Result<(), EngineError> {
        let mut state = self.state();
        if state.running || state.draining {
            return Err(EngineError::AlreadyRunning);
        }
        if state.registry.is_empty() {
            drop(state);
            info!("registry is empty; nothing to run");
            self.publish(Signal::Done);
            return Ok(());
        }
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        state.running = true;
        state.draining = true;
        let pending: Vec<Pending> = resolve(&mut state.registry)
            .into_iter()
            .filter_map(|wait| {
                let node = state.registry.get(&wait.name)?;
                Some(Pending {
                    work: node.work.clone(),
                    binding: state.registry.binding(&wait.name),
                    name: wait.name,
                    waiting: wait.signals,
                })
            })
            .collect();
        drop(state);

        let run_id = Uuid::new_v4();
        info!(%run_id, nodes = pending.len(), "starting run");

        let (tx, rx) = mpsc::unbounded_channel();
        // Queued behind the armed wait-sets; handled on the dispatcher's
        // first turn, never inline.
        let _ = tx.send(Event::Start);

        let dispatcher = Dispatcher {
            engine: self.clone(),
            pending,
            in_flight: 0,
            tx,
        };
        runtime.spawn(dispatcher.drive(rx).instrument(info_span!("run", %run_id)));
        Ok(())
    }

    /// Start a run and wait for its outcome.
    ///
    /// Resolves on `done`, or with the first node failure. A run blocked on a
    /// dependency that never succeeds never resolves; wrap the call in
    /// `tokio::time::timeout` when that can happen.
    ///
    /// # Errors
    /// Anything [`start`](Self::start) returns, or
    /// [`EngineError::NodeFailed`] for the first `error` signal.
    pub async fn run(&self) -> Result<(), EngineError> {
        let mut signals = self.subscribe();
        self.start()?;
        loop {
            match signals.recv().await {
                Ok(Signal::Done) => return Ok(()),
                Ok(Signal::Error(failure)) => {
                    return Err(EngineError::NodeFailed {
                        node_name: failure.node_name,
                        message: failure.message,
                    })
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "signal receiver lagged"),
                Err(RecvError::Closed) => return Err(EngineError::SignalsClosed),
            }
        }
    }

    fn node_succeeded(&self, name: &str) {
        let removed = self.state().registry.remove(name).is_some();
        info!(node = %name, "node succeeded");
        self.publish(Signal::Node {
            name: name.to_owned(),
        });

        let drained = {
            let mut state = self.state();
            if removed && state.registry.is_empty() {
                state.running = false;
                true
            } else {
                false
            }
        };
        if drained {
            info!("all nodes completed");
            self.publish(Signal::Done);
        }
    }

    fn node_failed(&self, name: &str, err: &WorkError) {
        self.state().running = false;
        error!(node = %name, error = %err, "node failed");
        self.publish(Signal::Error(NodeFailure {
            message: err.message(),
            node_name: name.to_owned(),
        }));
    }
}

impl fmt::Debug for InitGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("InitGraph")
            .field("nodes", &state.registry.names())
            .field("running", &state.running)
            .field("draining", &state.draining)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

enum Event {
    Start,
    Settled { name: String, result: WorkResult },
}

/// A node whose wait-set is not yet satisfied.
struct Pending {
    name: String,
    work: Work,
    binding: Option<Binding>,
    waiting: HashSet<String>,
}

/// Owns one run's wait-sets. Every scheduling decision for the run is made
/// here, one event at a time.
struct Dispatcher {
    engine: InitGraph,
    pending: Vec<Pending>,
    in_flight: usize,
    tx: mpsc::UnboundedSender<Event>,
}

impl Dispatcher {
    async fn drive(mut self, mut rx: mpsc::UnboundedReceiver<Event>) {
        while let Some(event) = rx.recv().await {
            match event {
                Event::Start => {
                    self.engine.publish(Signal::Start);
                    self.release(START_SIGNAL);
                }
                Event::Settled { name, result } => {
                    self.in_flight -= 1;
                    match result {
                        Ok(()) => {
                            self.engine.node_succeeded(&name);
                            self.release(&name);
                        }
                        Err(err) => self.engine.node_failed(&name, &err),
                    }
                }
            }
            // Only in-flight work can produce further events.
            if self.in_flight == 0 {
                break;
            }
        }

        self.engine.state().draining = false;

        if self.pending.is_empty() {
            debug!("dispatcher finished");
        } else {
            let blocked: Vec<&str> = self.pending.iter().map(|p| p.name.as_str()).collect();
            warn!(?blocked, "run ended with nodes that will never run");
        }
    }

    /// Mark `signal` as observed and launch every node it completes.
    fn release(&mut self, signal: &str) {
        let (ready, waiting): (Vec<Pending>, Vec<Pending>) = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|mut node| {
                node.waiting.remove(signal);
                node
            })
            .partition(|node| node.waiting.is_empty());
        self.pending = waiting;

        for node in ready {
            self.launch(node);
        }
    }

    fn launch(&mut self, node: Pending) {
        let Pending {
            name,
            work: unit,
            binding,
            ..
        } = node;
        self.in_flight += 1;
        debug!(node = %name, style = ?unit.style(), "wait-set satisfied; invoking work");

        let binding = binding.unwrap_or_else(|| Binding::new(self.engine.clone()));
        let tx = self.tx.clone();

        tokio::spawn(
            async move {
                let result = AssertUnwindSafe(settle(&unit, binding))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(WorkError::from_panic(panic.as_ref())));
                let _ = tx.send(Event::Settled { name, result });
            }
            .in_current_span(),
        );
    }
}
