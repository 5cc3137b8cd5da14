//! Canonical hashable values.
//!
//! Measurement samples, condition values, and table cells are dynamic
//! [`serde_json::Value`]s, which are not hashable. [`HashKey`] is their
//! canonical hashable form: mappings are frozen in key-sorted order so that
//! two semantically equal mappings hash identically regardless of insertion
//! order, sequences become tuples, and floats canonicalize through their bit
//! pattern with `-0.0` folded onto `0.0`.

use serde_json::Value;

/// A hashable, order-canonical rendering of a JSON value.
///
/// `HashKey::from` is total over `serde_json::Value`: every JSON value is a
/// scalar, a sequence, or a mapping, so conversion cannot fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashKey {
    Null,
    Bool(bool),
    Int(i64),
    /// Non-integral numbers, keyed by canonical bit pattern.
    FloatBits(u64),
    Str(String),
    Seq(Vec<HashKey>),
    /// Entries sorted by key before freezing.
    Map(Vec<(String, HashKey)>),
}

impl From<&Value> for HashKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => HashKey::Null,
            Value::Bool(b) => HashKey::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    HashKey::Int(i)
                } else {
                    HashKey::FloatBits(canonical_bits(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            Value::String(s) => HashKey::Str(s.clone()),
            Value::Array(items) => HashKey::Seq(items.iter().map(HashKey::from).collect()),
            Value::Object(map) => {
                let mut entries: Vec<(String, HashKey)> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), HashKey::from(v)))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                HashKey::Map(entries)
            }
        }
    }
}

impl From<Value> for HashKey {
    fn from(value: Value) -> Self {
        HashKey::from(&value)
    }
}

/// Fold `-0.0` onto `0.0` and all NaNs onto one payload so equal numbers
/// share one bit pattern.
fn canonical_bits(x: f64) -> u64 {
    if x == 0.0 {
        0.0f64.to_bits()
    } else if x.is_nan() {
        f64::NAN.to_bits()
    } else {
        x.to_bits()
    }
}

/// True when a value is a scalar leaf (not a sequence or mapping).
pub fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Render a value for use in messages and CSV cells: bare strings without
/// quotes, everything else in its JSON form.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
