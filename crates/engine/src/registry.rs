//! Ordered node registry.
//!
//! Registration order is kept for listing only; it has no bearing on the
//! order nodes execute in.

use std::collections::{HashMap, HashSet};

use work::Binding;

use crate::NodeDefinition;

/// Registered nodes plus the context each name is bound to.
#[derive(Debug, Default)]
pub struct Registry {
    nodes: Vec<NodeDefinition>,
    /// Keyed by name. Absent means "bind to the engine".
    bindings: HashMap<String, Binding>,
}

impl Registry {
    pub fn push(&mut self, node: NodeDefinition, binding: Option<Binding>) {
        if let Some(binding) = binding {
            self.bindings.insert(node.name.clone(), binding);
        }
        self.nodes.push(node);
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.iter().any(|n| n.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn binding(&self, name: &str) -> Option<Binding> {
        self.bindings.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeDefinition> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut NodeDefinition> {
        self.nodes.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove the node called `name` after it completed.
    pub fn remove(&mut self, name: &str) -> Option<NodeDefinition> {
        let idx = self.nodes.iter().position(|n| n.name == name)?;
        self.bindings.remove(name);
        Some(self.nodes.remove(idx))
    }

    /// Remove every node whose name is in `names`; returns how many went.
    pub fn remove_all<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        let doomed: HashSet<&str> = names.iter().map(AsRef::as_ref).collect();
        let before = self.nodes.len();
        self.nodes.retain(|n| !doomed.contains(n.name.as_str()));
        self.bindings.retain(|name, _| !doomed.contains(name.as_str()));
        before - self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use work::Work;

    fn node(name: &str) -> NodeDefinition {
        NodeDefinition::new(name, Work::callback(|_, done| done.ok()))
    }

    fn registry(names: &[&str]) -> Registry {
        let mut registry = Registry::default();
        for name in names {
            registry.push(node(name), None);
        }
        registry
    }

    #[test]
    fn names_are_listed_in_registration_order() {
        let registry = registry(&["c", "a", "b"]);
        assert_eq!(registry.names(), vec!["c", "a", "b"]);
    }

    #[test]
    fn remove_all_preserves_remaining_order() {
        let mut registry = registry(&["a", "b", "c", "d"]);
        assert_eq!(registry.remove_all(&["b", "d", "ghost"]), 2);
        assert_eq!(registry.names(), vec!["a", "c"]);
    }

    #[test]
    fn remove_drops_the_binding_too() {
        let mut registry = Registry::default();
        registry.push(node("cache"), Some(Binding::new(42u8)));
        assert!(registry.binding("cache").is_some());

        let removed = registry.remove("cache").expect("registered");
        assert_eq!(removed.name, "cache");
        assert!(registry.binding("cache").is_none());
        assert!(registry.is_empty());
    }
}
