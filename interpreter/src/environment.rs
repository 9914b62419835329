use std::collections::BTreeMap;

use crate::runtime_value::RuntimeValue;

/// The mutable scratchpad shared by every block of one run.
///
/// There is exactly one per run and no scoping: two unrelated blocks that
/// pick the same key see each other's writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    variables: BTreeMap<String, RuntimeValue>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    pub fn get(&self, name: &str) -> Option<&RuntimeValue> {
        self.variables.get(name)
    }

    pub fn set(&mut self, name: &str, value: RuntimeValue) {
        self.variables.insert(name.to_string(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<RuntimeValue> {
        self.variables.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuntimeValue)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
