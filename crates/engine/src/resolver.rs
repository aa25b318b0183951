//! Dependency resolution — run once, synchronously, at the start of a run.
//!
//! Steps:
//! 1. Snapshot the registered names.
//! 2. Promote each conditional dependency that names a registered node into
//!    a hard dependency; drop the rest silently.
//! 3. Give every node a wait-set of its hard dependencies plus the synthetic
//!    start signal.

use std::collections::HashSet;

use tracing::warn;

use crate::registry::Registry;
use crate::validate::START_SIGNAL;

/// The signals one node waits for before its work may run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSet {
    pub name: String,
    pub signals: HashSet<String>,
}

/// Rewrite conditional dependencies in place and compute every wait-set.
///
/// Wait-sets come back in registration order.
pub fn resolve(registry: &mut Registry) -> Vec<WaitSet> {
    let snapshot: HashSet<String> = registry.names().into_iter().collect();

    for node in registry.iter_mut() {
        for name in &node.conditional_depends {
            if snapshot.contains(name) && !node.depends.contains(name) {
                node.depends.push(name.clone());
            }
        }
    }

    registry
        .iter()
        .map(|node| {
            for dep in node.depends.iter().filter(|d| !snapshot.contains(*d)) {
                warn!(node = %node.name, dependency = %dep, "depends on a node that is not registered; it will not run");
            }

            let mut signals: HashSet<String> = node.depends.iter().cloned().collect();
            signals.insert(START_SIGNAL.to_owned());
            WaitSet {
                name: node.name.clone(),
                signals,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeDefinition;
    use work::Work;

    fn node(name: &str) -> NodeDefinition {
        NodeDefinition::new(name, Work::callback(|_, done| done.ok()))
    }

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn zero_dependency_nodes_wait_only_for_start() {
        let mut registry = Registry::default();
        registry.push(node("storage"), None);

        let plan = resolve(&mut registry);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].signals, set(&["_start"]));
    }

    #[test]
    fn present_conditional_dependency_is_promoted() {
        let mut registry = Registry::default();
        registry.push(node("metrics"), None);
        registry.push(
            node("service")
                .depends_on(["metrics"])
                .conditionally_depends_on(["metrics", "tracing"]),
            None,
        );
        registry.push(node("api").conditionally_depends_on(["metrics"]), None);

        let plan = resolve(&mut registry);

        assert_eq!(plan[1].signals, set(&["_start", "metrics"]));
        assert_eq!(plan[2].signals, set(&["_start", "metrics"]));
        // The rewrite sticks to the definition and never duplicates a name.
        assert_eq!(registry.get("service").unwrap().depends, vec!["metrics"]);
        assert_eq!(registry.get("api").unwrap().depends, vec!["metrics"]);
    }

    #[test]
    fn absent_conditional_dependency_is_dropped() {
        let mut registry = Registry::default();
        registry.push(node("service").conditionally_depends_on(["metrics"]), None);

        let plan = resolve(&mut registry);

        assert_eq!(plan[0].signals, set(&["_start"]));
        assert!(registry.get("service").unwrap().depends.is_empty());
    }

    #[test]
    fn hard_dependency_on_missing_node_is_kept() {
        let mut registry = Registry::default();
        registry.push(node("service").depends_on(["ghost"]), None);

        let plan = resolve(&mut registry);
        assert_eq!(plan[0].signals, set(&["_start", "ghost"]));
    }
}
