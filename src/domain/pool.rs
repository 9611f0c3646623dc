//! Output pool
//!
//! Run-scoped map from output name to value. Filled while collecting outputs
//! from existing stacks and read when inputs are propagated. Keys are global
//! to the run; a later write replaces an earlier one.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone)]
struct PoolEntry {
    value: serde_json::Value,
    producer: String,
}

/// A value replaced by a write from a different stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overwrite {
    pub output: String,
    pub previous: String,
    pub current: String,
}

/// Shared outputs for one run
#[derive(Debug, Clone, Default)]
pub struct OutputPool {
    entries: BTreeMap<String, PoolEntry>,
    overwrites: Vec<Overwrite>,
}

impl OutputPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value published by `producer`
    pub fn insert(&mut self, output: String, value: serde_json::Value, producer: &str) {
        let entry = PoolEntry {
            value,
            producer: producer.to_string(),
        };

        if let Some(previous) = self.entries.insert(output.clone(), entry) {
            if previous.producer != producer {
                self.overwrites.push(Overwrite {
                    output,
                    previous: previous.producer,
                    current: producer.to_string(),
                });
            }
        }
    }

    pub fn get(&self, output: &str) -> Option<&serde_json::Value> {
        self.entries.get(output).map(|e| &e.value)
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes that replaced another stack's value, in write order
    pub fn overwrites(&self) -> &[Overwrite] {
        &self.overwrites
    }

    /// Plain name -> value view
    pub fn values(&self) -> BTreeMap<String, serde_json::Value> {
        self.entries
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }
}
