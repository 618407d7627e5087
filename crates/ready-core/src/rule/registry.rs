//! Registry of inbuilt rules.
//!
//! Rules are registered at construction and looked up by the name that
//! appears in `<rule type="inbuilt" name="...">`. Lookup is case-sensitive.

use std::collections::HashMap;

use super::{GrayScott, InbuiltRule};

/// Registry of all available inbuilt rules.
pub struct InbuiltRegistry {
    rules: Vec<Box<dyn InbuiltRule>>,
    by_name: HashMap<String, usize>,
}

impl InbuiltRegistry {
    /// Create a new registry with all built-in rules registered.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtins();
        registry
    }

    /// Create an empty registry (for testing)
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    fn register_builtins(&mut self) {
        self.register(Box::new(GrayScott::new()));
    }

    /// Register a rule, replacing any rule with the same name.
    pub fn register(&mut self, rule: Box<dyn InbuiltRule>) {
        let name = rule.name().to_string();
        match self.by_name.get(&name) {
            Some(&index) => self.rules[index] = rule,
            None => {
                self.by_name.insert(name, self.rules.len());
                self.rules.push(rule);
            }
        }
    }

    /// Get a rule by name.
    pub fn get(&self, name: &str) -> Option<&dyn InbuiltRule> {
        self.by_name
            .get(name)
            .map(|&index| self.rules[index].as_ref())
    }

    /// A fresh instance of the named rule
    pub fn create(&self, name: &str) -> Option<Box<dyn InbuiltRule>> {
        self.get(name).map(|rule| rule.box_clone())
    }

    /// Names of all registered rules.
    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for InbuiltRegistry {
    fn default() -> Self {
        Self::new()
    }
}
