//! Node definitions as registered by callers.

use std::fmt;

use work::Work;

/// A named unit of work and the names it waits on.
///
/// `depends` and `conditional_depends` behave as ordered sets: the builder
/// methods skip names that are already present.
#[derive(Clone)]
pub struct NodeDefinition {
    /// Unique within the registry; doubles as the node's completion signal.
    pub name: String,
    pub work: Work,
    /// Nodes that must succeed before `work` runs.
    pub depends: Vec<String>,
    /// Promoted into `depends` at run start, but only for names that are
    /// registered at that moment.
    pub conditional_depends: Vec<String>,
}

impl NodeDefinition {
    pub fn new(name: impl Into<String>, work: Work) -> Self {
        Self {
            name: name.into(),
            work,
            depends: Vec::new(),
            conditional_depends: Vec::new(),
        }
    }

    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        extend_unique(&mut self.depends, names);
        self
    }

    pub fn conditionally_depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        extend_unique(&mut self.conditional_depends, names);
        self
    }
}

impl fmt::Debug for NodeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDefinition")
            .field("name", &self.name)
            .field("style", &self.work.style())
            .field("depends", &self.depends)
            .field("conditional_depends", &self.conditional_depends)
            .finish()
    }
}

fn extend_unique<I, S>(target: &mut Vec<String>, names: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for name in names {
        let name = name.into();
        if !target.contains(&name) {
            target.push(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_order_and_drops_repeats() {
        let node = NodeDefinition::new("service", Work::callback(|_, done| done.ok()))
            .depends_on(["storage", "cache", "storage"])
            .conditionally_depends_on(["metrics"]);

        assert_eq!(node.depends, vec!["storage", "cache"]);
        assert_eq!(node.conditional_depends, vec!["metrics"]);
    }
}
