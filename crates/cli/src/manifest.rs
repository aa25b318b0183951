//! JSON graph manifests for dry runs.
//!
//! A manifest lists nodes with their dependencies and a simulated behaviour
//! (completion style, duration, optional failure). Loading one registers a
//! `MockWork` per node on a fresh engine.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

use engine::{InitGraph, NodeDefinition};
use work::mock::MockWork;
use work::WorkStyle;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub nodes: Vec<NodeManifest>,
    /// Handed to `deregister_value` untouched, so malformed input is
    /// ignored the same way the engine ignores it.
    #[serde(default)]
    pub skip: Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeManifest {
    pub name: String,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub conditional_depends: Vec<String>,
    #[serde(default)]
    pub style: Style,
    #[serde(default)]
    pub delay_ms: u64,
    /// Fail with this message instead of succeeding.
    #[serde(default)]
    pub fail: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    Callback,
    #[default]
    Future,
    Adapted,
}

impl From<Style> for WorkStyle {
    fn from(style: Style) -> Self {
        match style {
            Style::Callback => WorkStyle::Callback,
            Style::Future => WorkStyle::Future,
            Style::Adapted => WorkStyle::Adapted,
        }
    }
}

impl Manifest {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read manifest {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid manifest {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Register every node on `engine`, then apply `skip`.
    pub fn register(&self, engine: &InitGraph) -> anyhow::Result<()> {
        for node in &self.nodes {
            let mock = match &node.fail {
                Some(msg) => MockWork::failing(&node.name, msg),
                None => MockWork::succeeding(&node.name),
            };
            let mock = Arc::new(mock.with_delay(Duration::from_millis(node.delay_ms)));

            let definition = NodeDefinition::new(&node.name, mock.work(node.style.into()))
                .depends_on(node.depends.iter().cloned())
                .conditionally_depends_on(node.conditional_depends.iter().cloned());
            engine
                .register(definition)
                .with_context(|| format!("cannot register node '{}'", node.name))?;
        }
        engine.deregister_value(&self.skip);
        Ok(())
    }
}
