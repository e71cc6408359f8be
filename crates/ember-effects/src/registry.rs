//! Explicit effect registry, constructed by the host and handed to the engine

use crate::definition::EffectDefinition;
use std::collections::HashMap;

/// Maps effect names to their definitions.
///
/// The host builds one registry at startup (from parsed config tables or
/// programmatically) and passes it to the lifecycle engine. Lookup is
/// synchronous by name; unknown names are simply absent.
pub struct EffectRegistry {
    definitions: HashMap<String, EffectDefinition>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self {
            definitions: HashMap::new(),
        }
    }

    /// Register a definition under a name, replacing any existing entry
    pub fn register(&mut self, name: &str, definition: EffectDefinition) {
        self.definitions.insert(name.to_string(), definition);
    }

    /// Register a definition parsed from a TOML table
    pub fn register_toml(&mut self, name: &str, table: &toml::value::Table) {
        self.register(name, EffectDefinition::from_toml(table));
    }

    /// Resolve a definition by name
    pub fn resolve(&self, name: &str) -> Option<&EffectDefinition> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Names of all registered effects
    pub fn names(&self) -> Vec<&str> {
        self.definitions.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}
