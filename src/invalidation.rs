//! Invalidation Module
//!
//! Declarative write-through invalidation: a table mapping a mutating cache
//! name to the set of dependent cache names that must be cleared wholesale
//! when it changes. Rules are registered during startup and read-only
//! afterwards; the manager consults the table after every put and evict-all.

use std::collections::{BTreeSet, HashMap};

use crate::error::{CacheError, Result};

// == Invalidation Table ==
/// Trigger cache name → dependent cache names to clear.
///
/// Purely synchronous; the manager wraps the table in its own lock so the
/// write path only ever takes a read.
#[derive(Debug, Default)]
pub struct InvalidationTable {
    rules: HashMap<String, BTreeSet<String>>,
}

impl InvalidationTable {
    // == Constructor ==
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    // == Register ==
    /// Registers dependents for a trigger. Additive: repeated registrations
    /// extend the existing set, and registering an already-present pair is a
    /// no-op.
    ///
    /// # Returns
    /// `CacheError::Configuration` when any new edge would close a dependency
    /// cycle (including a cache depending on itself). On rejection the table
    /// is left unchanged.
    pub fn register<I, S>(&mut self, trigger: &str, dependents: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dependents: Vec<String> = dependents.into_iter().map(Into::into).collect();

        // Validate every edge before committing any of them.
        for dependent in &dependents {
            if dependent == trigger || self.reaches(dependent, trigger) {
                return Err(CacheError::Configuration(format!(
                    "invalidation cycle: '{trigger}' -> '{dependent}' closes a loop back to '{trigger}'"
                )));
            }
        }

        self.rules
            .entry(trigger.to_string())
            .or_default()
            .extend(dependents);
        Ok(())
    }

    // == Dependents Of ==
    /// The cache names to clear when `trigger` mutates, in deterministic
    /// order. Empty for unknown triggers.
    pub fn dependents_of(&self, trigger: &str) -> impl Iterator<Item = &str> {
        self.rules
            .get(trigger)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Number of triggers with registered dependents.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules are registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Depth-first reachability over the rules graph: can `from` reach `to`
    /// by following dependency edges?
    fn reaches(&self, from: &str, to: &str) -> bool {
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut stack: Vec<&str> = vec![from];

        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(next) = self.rules.get(current) {
                stack.extend(next.iter().map(String::as_str));
            }
        }
        false
    }
}
