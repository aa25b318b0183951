//! Validation policy for registry mutations.
//!
//! Every acceptance rule for registration and removal input lives here so
//! the scheduler never has to know about it.

use serde_json::Value;

use crate::registry::Registry;
use crate::EngineError;

/// Synthetic signal fired once per run to release nodes.
pub const START_SIGNAL: &str = "_start";
/// Graph-level completion signal.
pub const DONE_SIGNAL: &str = "done";
/// Graph-level failure signal.
pub const ERROR_SIGNAL: &str = "error";

/// Names that collide with graph-level signals.
pub const RESERVED_NAMES: [&str; 3] = [START_SIGNAL, DONE_SIGNAL, ERROR_SIGNAL];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

/// Decide whether a node called `name` may be registered now.
///
/// # Errors
/// - [`EngineError::RegisterWhileRunning`] while a run is in progress.
/// - [`EngineError::EmptyName`] for an empty name.
/// - [`EngineError::ReservedName`] for `_start`, `done` or `error`.
/// - [`EngineError::DuplicateName`] if the name is already registered.
pub fn check_registration(
    registry: &Registry,
    running: bool,
    name: &str,
) -> Result<(), EngineError> {
    if running {
        return Err(EngineError::RegisterWhileRunning(name.to_owned()));
    }
    if name.is_empty() {
        return Err(EngineError::EmptyName);
    }
    if is_reserved(name) {
        return Err(EngineError::ReservedName(name.to_owned()));
    }
    if registry.contains(name) {
        return Err(EngineError::DuplicateName(name.to_owned()));
    }
    Ok(())
}

/// Extract removal names from untyped input.
///
/// Returns `None` (meaning: ignore the whole request) unless `value` is an
/// array whose every element is a string.
pub fn removal_names(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_owned))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeDefinition;
    use serde_json::json;
    use work::Work;

    fn registry_with(names: &[&str]) -> Registry {
        let mut registry = Registry::default();
        for name in names {
            registry.push(NodeDefinition::new(*name, Work::callback(|_, d| d.ok())), None);
        }
        registry
    }

    #[test]
    fn reserved_names_are_rejected() {
        let registry = Registry::default();
        for name in RESERVED_NAMES {
            assert_eq!(
                check_registration(&registry, false, name),
                Err(EngineError::ReservedName(name.to_owned()))
            );
        }
    }

    #[test]
    fn duplicate_and_empty_names_are_rejected() {
        let registry = registry_with(&["storage"]);
        assert_eq!(
            check_registration(&registry, false, "storage"),
            Err(EngineError::DuplicateName("storage".into()))
        );
        assert_eq!(check_registration(&registry, false, ""), Err(EngineError::EmptyName));
        assert_eq!(check_registration(&registry, false, "cache"), Ok(()));
    }

    #[test]
    fn running_blocks_registration_first() {
        let registry = registry_with(&["storage"]);
        assert_eq!(
            check_registration(&registry, true, "storage"),
            Err(EngineError::RegisterWhileRunning("storage".into()))
        );
    }

    #[test]
    fn removal_names_accepts_only_string_arrays() {
        assert_eq!(removal_names(&json!(["a", "b"])), Some(vec!["a".into(), "b".into()]));
        assert_eq!(removal_names(&json!([])), Some(vec![]));
        assert_eq!(removal_names(&json!("a")), None);
        assert_eq!(removal_names(&json!({ "a": 1 })), None);
        assert_eq!(removal_names(&json!(["a", 1])), None);
        assert_eq!(removal_names(&Value::Null), None);
    }
}
