//! Interned measurable phenomena.
//!
//! A [`Phenomenon`] names one measurable quantity (cell density, synapse
//! density, connection probability, ...). Phenomena are content-addressed:
//! constructing twice with the same name and a semantically equivalent
//! description yields the *same* allocation, so identity comparison is
//! meaningful wherever a phenomenon is used as a key.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One measurable quantity of interest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phenomenon {
    /// Human-readable name, e.g. "Cell Density".
    pub name: String,
    /// Dataframe-column label derived from the name, e.g. "cell_density".
    pub label: String,
    /// What the quantity means and how it is measured.
    pub description: String,
}

impl Phenomenon {
    /// Derive the column label: lower-cased words joined with underscores.
    pub fn label_from_name(name: &str) -> String {
        name.split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Normalize a description for content addressing: lower-case, strip
    /// punctuation, collapse whitespace.
    fn normalized_description(description: &str) -> String {
        description
            .chars()
            .filter(|c| !c.is_ascii_punctuation())
            .collect::<String>()
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for Phenomenon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Interning registry for phenomena.
///
/// Keyed by `(label, normalized description)`. Append-only: entries are
/// never evicted for the life of the registry.
#[derive(Debug, Default)]
pub struct PhenomenonRegistry {
    interned: Mutex<HashMap<(String, String), Arc<Phenomenon>>>,
}

impl PhenomenonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a phenomenon. Equal-keyed calls return the same allocation;
    /// a materially different description for the same name yields a
    /// distinct instance.
    pub fn intern(&self, name: &str, description: &str) -> Arc<Phenomenon> {
        let label = Phenomenon::label_from_name(name);
        let key = (
            label.clone(),
            Phenomenon::normalized_description(description),
        );
        let mut interned = self.interned.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(interned.entry(key).or_insert_with(|| {
            Arc::new(Phenomenon {
                name: name.to_string(),
                label,
                description: description.to_string(),
            })
        }))
    }

    /// Number of distinct interned phenomena.
    pub fn len(&self) -> usize {
        self.interned.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The process-wide registry: empty at process start, append-only, never
/// torn down.
static GLOBAL: Lazy<PhenomenonRegistry> = Lazy::new(PhenomenonRegistry::new);

/// Intern against the process-wide registry.
pub fn phenomenon(name: &str, description: &str) -> Arc<Phenomenon> {
    GLOBAL.intern(name, description)
}
