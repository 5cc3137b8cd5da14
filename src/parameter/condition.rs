//! Concrete measurement points.

use crate::value::HashKey;
use indexmap::IndexMap;
use serde_json::Value;
use std::hash::{Hash, Hasher};

/// One concrete assignment of values to a set of parameters: a single
/// measurement point in the cross-product of their domains.
///
/// Equality and hashing are canonical over the *content* of the
/// `(label, value)` pairs: two conditions built from the same pairs in
/// different order compare equal and hash identically, so they collapse to
/// one entry when used as map keys.
#[derive(Debug, Clone)]
pub struct Condition {
    values: IndexMap<String, Value>,
}

impl Condition {
    /// Build from ordered `(label, value)` pairs. A repeated label keeps
    /// the last value.
    pub fn new(pairs: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            values: pairs.into_iter().collect(),
        }
    }

    /// Empty condition: the unconditioned measurement point.
    pub fn empty() -> Self {
        Self {
            values: IndexMap::new(),
        }
    }

    /// Value assigned to a parameter label, `None` if the label is absent.
    pub fn get_value(&self, label: &str) -> Option<&Value> {
        self.values.get(label)
    }

    /// The condition content as a plain mapping, in construction order.
    pub fn as_map(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    /// Parameter labels in construction order.
    pub fn labels(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    /// Whether this condition assigns no parameters.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Canonical content key: pairs sorted by label, values in hashable
    /// form. This is what equality and hashing are defined over.
    pub fn hash_id(&self) -> Vec<(String, HashKey)> {
        let mut entries: Vec<(String, HashKey)> = self
            .values
            .iter()
            .map(|(label, value)| (label.clone(), HashKey::from(value)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.hash_id() == other.hash_id()
    }
}

impl Eq for Condition {}

impl Hash for Condition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_id().hash(state);
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|(label, value)| format!("{label}={}", crate::value::display(value)))
            .collect();
        write!(f, "({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_construction_order_does_not_affect_equality() {
        let a = Condition::new([
            ("layer".to_string(), json!("L4")),
            ("region".to_string(), json!("SSp")),
        ]);
        let b = Condition::new([
            ("region".to_string(), json!("SSp")),
            ("layer".to_string(), json!("L4")),
        ]);
        assert_eq!(a, b);

        let mut cache: HashMap<Condition, u32> = HashMap::new();
        cache.insert(a, 1);
        cache.insert(b, 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_value_absent_label() {
        let condition = Condition::new([("layer".to_string(), json!("L4"))]);
        assert_eq!(condition.get_value("layer"), Some(&json!("L4")));
        assert_eq!(condition.get_value("region"), None);
    }

    #[test]
    fn test_as_map_preserves_construction_order() {
        let condition = Condition::new([
            ("region".to_string(), json!("SSp")),
            ("layer".to_string(), json!("L4")),
        ]);
        let labels: Vec<&String> = condition.as_map().keys().collect();
        assert_eq!(labels, ["region", "layer"]);
    }

    #[test]
    fn test_differing_values_are_unequal() {
        let a = Condition::new([("layer".to_string(), json!("L4"))]);
        let b = Condition::new([("layer".to_string(), json!("L5"))]);
        assert_ne!(a, b);
    }
}
