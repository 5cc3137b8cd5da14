//! Measurement parameters: the axes along which a phenomenon is measured.
//!
//! A parameter is either *finite-valued* (a closed enumeration, e.g. the
//! cortical layers) or *binned* (a continuous range partitioned into
//! equal-width half-open intervals, e.g. soma distance). The cross-product
//! of several parameters' domains enumerates the [`Condition`]s to sample.
//!
//! The two binners deliberately disagree on out-of-range input: the scalar
//! [`BinnedParameter::get_bin`] fails with [`OutOfRangeError`], while the
//! vectorized [`DistanceBinner::bin_indexes`] clamps to the nearest edge
//! bin. Both call sites in the original pipeline rely on their respective
//! behavior, so the asymmetry is part of the contract.

mod condition;

pub use condition::Condition;

use serde_json::{json, Value};
use thiserror::Error;

/// A queried value fell outside a binned parameter's declared range.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("value {value} outside the declared range [{lower}, {upper})")]
pub struct OutOfRangeError {
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

/// A parameter with a closed, enumerated domain.
#[derive(Debug, Clone, PartialEq)]
pub struct FiniteParameter {
    label: String,
    values: Vec<Value>,
}

impl FiniteParameter {
    pub fn new(label: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            label: label.into(),
            values: values.into_iter().collect(),
        }
    }

    /// Convenience constructor for string-valued domains (layers, regions,
    /// mtypes).
    pub fn of_strings(
        label: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::new(label, values.into_iter().map(|v| Value::String(v.into())))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The enumerated domain, in declaration order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Membership test against the enumerated domain.
    pub fn contains(&self, value: &Value) -> bool {
        self.values.contains(value)
    }
}

/// A parameter over a continuous range, partitioned into `number_bins`
/// equal-width half-open intervals `[lower + i*w, lower + (i+1)*w)`.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedParameter {
    label: String,
    lower_bound: f64,
    upper_bound: f64,
    number_bins: usize,
}

impl BinnedParameter {
    pub fn new(
        label: impl Into<String>,
        lower_bound: f64,
        upper_bound: f64,
        number_bins: usize,
    ) -> Self {
        Self {
            label: label.into(),
            lower_bound,
            upper_bound,
            number_bins,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bin_width(&self) -> f64 {
        (self.upper_bound - self.lower_bound) / self.number_bins as f64
    }

    /// The materialized `(lower, upper)` interval tuples, contiguous and
    /// non-overlapping.
    pub fn bins(&self) -> Vec<(f64, f64)> {
        let w = self.bin_width();
        (0..self.number_bins)
            .map(|i| {
                (
                    self.lower_bound + i as f64 * w,
                    self.lower_bound + (i + 1) as f64 * w,
                )
            })
            .collect()
    }

    /// Index of the bin containing `x`. Out-of-range input is an error,
    /// never clamped.
    pub fn get_bin(&self, x: f64) -> Result<usize, OutOfRangeError> {
        if !(self.lower_bound..self.upper_bound).contains(&x) {
            return Err(OutOfRangeError {
                value: x,
                lower: self.lower_bound,
                upper: self.upper_bound,
            });
        }
        let index = ((x - self.lower_bound) / self.bin_width()).floor() as usize;
        // floating point can land exactly on upper_bound's bin edge
        Ok(index.min(self.number_bins - 1))
    }
}

/// Vectorized binner for distance-valued measurements.
///
/// Unlike [`BinnedParameter::get_bin`], out-of-range values are clamped to
/// the nearest edge bin instead of raising.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceBinner {
    lower_bound: f64,
    upper_bound: f64,
    number_bins: usize,
}

impl DistanceBinner {
    pub fn new(lower_bound: f64, upper_bound: f64, number_bins: usize) -> Self {
        Self {
            lower_bound,
            upper_bound,
            number_bins,
        }
    }

    pub fn bin_width(&self) -> f64 {
        (self.upper_bound - self.lower_bound) / self.number_bins as f64
    }

    /// The materialized `(lower, upper)` interval tuples.
    pub fn bins(&self) -> Vec<(f64, f64)> {
        let w = self.bin_width();
        (0..self.number_bins)
            .map(|i| {
                (
                    self.lower_bound + i as f64 * w,
                    self.lower_bound + (i + 1) as f64 * w,
                )
            })
            .collect()
    }

    /// Bin index per value; values below the range map to bin 0, values at
    /// or above the upper bound map to the last bin.
    pub fn bin_indexes(&self, values: &[f64]) -> Vec<usize> {
        let w = self.bin_width();
        values
            .iter()
            .map(|&x| {
                if x < self.lower_bound {
                    0
                } else if x >= self.upper_bound {
                    self.number_bins - 1
                } else {
                    (((x - self.lower_bound) / w).floor() as usize).min(self.number_bins - 1)
                }
            })
            .collect()
    }
}

/// A measurement axis: one of the two parameter variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Finite(FiniteParameter),
    Binned(BinnedParameter),
}

impl Parameter {
    pub fn label(&self) -> &str {
        match self {
            Parameter::Finite(p) => p.label(),
            Parameter::Binned(p) => p.label(),
        }
    }

    /// The parameter's value domain as dynamic values. Binned parameters
    /// contribute their interval tuples as two-element arrays.
    pub fn domain(&self) -> Vec<Value> {
        match self {
            Parameter::Finite(p) => p.values().to_vec(),
            Parameter::Binned(p) => p
                .bins()
                .into_iter()
                .map(|(lo, hi)| json!([lo, hi]))
                .collect(),
        }
    }
}

impl From<FiniteParameter> for Parameter {
    fn from(p: FiniteParameter) -> Self {
        Parameter::Finite(p)
    }
}

impl From<BinnedParameter> for Parameter {
    fn from(p: BinnedParameter) -> Self {
        Parameter::Binned(p)
    }
}

/// Enumerate the cross-product of the parameters' domains as conditions,
/// varying the last parameter fastest (declaration order outermost).
pub fn conditions(parameters: &[Parameter]) -> Vec<Condition> {
    let mut result = vec![Condition::empty()];
    for parameter in parameters {
        let mut extended = Vec::with_capacity(result.len() * parameter.domain().len());
        for condition in &result {
            for value in parameter.domain() {
                let mut pairs: Vec<(String, Value)> = condition
                    .as_map()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                pairs.push((parameter.label().to_string(), value));
                extended.push(Condition::new(pairs));
            }
        }
        result = extended;
    }
    result
}
