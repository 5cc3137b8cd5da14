//! Append-only implementation registries.
//!
//! Concrete implementations (statistical tests, adapters) can be looked up
//! by name through an explicit [`Registry`] object: constructed empty,
//! append-only for its lifetime, with duplicate names rejected at
//! registration time.

use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("`{name}` is already registered")]
    Duplicate { name: String },
}

/// Name-keyed registry of implementations.
#[derive(Debug, Default)]
pub struct Registry<T> {
    entries: Mutex<HashMap<String, T>>,
}

impl<T: Clone> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register an implementation under `name`. Names are never
    /// re-assigned: a duplicate is an error, not an overwrite.
    pub fn register(&self, name: impl Into<String>, value: T) -> Result<(), RegistryError> {
        let name = name.into();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.contains_key(&name) {
            return Err(RegistryError::Duplicate { name });
        }
        entries.insert(name, value);
        Ok(())
    }

    /// Look up an implementation by name.
    pub fn get(&self, name: &str) -> Option<T> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Registered names, unordered.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
