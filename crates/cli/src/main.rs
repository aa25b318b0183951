//! `initgraph` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate` — register a manifest's nodes and print them in order.
//! - `list`     — print the names left after the manifest's skip list.
//! - `run`      — dry-run a manifest with simulated work, printing signals.

mod manifest;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use engine::{EngineConfig, InitGraph, Signal, UnhandledErrorPolicy};
use manifest::Manifest;

#[derive(Parser)]
#[command(
    name = "initgraph",
    about = "Dependency-ordered initialization graph runner",
    version
)]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, env = "INITGRAPH_LOG", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register every node of a manifest and print the registration order.
    Validate {
        /// Path to the manifest JSON file.
        path: PathBuf,
    },
    /// Print node names after the manifest's skip list is applied.
    List {
        path: PathBuf,
    },
    /// Dry-run a manifest with simulated work.
    Run {
        path: PathBuf,
        /// Give up if the graph has not finished after this long.
        #[arg(long, env = "INITGRAPH_TIMEOUT_MS", default_value_t = 30_000)]
        timeout_ms: u64,
        /// Print each signal as a JSON line.
        #[arg(long)]
        json: bool,
        /// Extra node names to deregister before starting.
        #[arg(long = "skip")]
        skip: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Validate { path } => {
            let engine = load(&path, false)?;
            println!("✅ Graph is valid. Registration order: {:?}", engine.list_names());
        }
        Command::List { path } => {
            let engine = load(&path, true)?;
            for name in engine.list_names() {
                println!("{name}");
            }
        }
        Command::Run {
            path,
            timeout_ms,
            json,
            skip,
        } => {
            let engine = load(&path, true)?;
            engine.deregister(&skip);
            run(&engine, Duration::from_millis(timeout_ms), json).await?;
        }
    }

    Ok(())
}

fn load(path: &Path, apply_skip: bool) -> anyhow::Result<InitGraph> {
    let mut manifest = Manifest::load(path)?;
    if !apply_skip {
        manifest.skip = serde_json::Value::Null;
    }
    // `run` reports the first failure and exits; later ones are only logged.
    let engine = InitGraph::with_config(EngineConfig {
        unhandled_error: UnhandledErrorPolicy::Ignore,
        ..EngineConfig::default()
    });
    manifest.register(&engine)?;
    Ok(engine)
}

async fn run(engine: &InitGraph, limit: Duration, json: bool) -> anyhow::Result<()> {
    let signals = engine.subscribe();
    engine.start().context("cannot start run")?;
    info!(nodes = ?engine.list_names(), "run started");

    match tokio::time::timeout(limit, watch(signals, json)).await {
        Ok(outcome) => outcome,
        Err(_) => bail!("timed out after {limit:?}; still waiting on {:?}", engine.list_names()),
    }
}

/// Print signals until `done`; the first `error` ends the run.
async fn watch(mut signals: broadcast::Receiver<Signal>, json: bool) -> anyhow::Result<()> {
    loop {
        match signals.recv().await {
            Ok(signal) => {
                print_signal(&signal, json)?;
                match signal {
                    Signal::Done => return Ok(()),
                    Signal::Error(failure) => {
                        bail!("node '{}' failed: {}", failure.node_name, failure.message)
                    }
                    _ => {}
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed signals"),
            Err(RecvError::Closed) => bail!("signal channel closed"),
        }
    }
}

fn print_signal(signal: &Signal, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(signal)?);
    } else {
        println!("{signal}");
    }
    Ok(())
}
