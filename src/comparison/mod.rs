//! The validation engine: aligning a model measurement with reference data
//! and rendering a verdict.
//!
//! Both sides of a comparison are summary measurements sharing the same
//! parameters. Only jointly-observed conditions are compared: conditions
//! present on one side only are dropped, never imputed.

mod report;

pub use report::{Illustration, Pronouncement, Section, SectionRecord};
pub use stat_test::{AlignedCondition, MannWhitneyU, SideData, StatTest, WelchTTest};

use crate::measurement::StatisticalMeasurement;
use crate::parameter::Condition;
use crate::phenomenon::Phenomenon;
use crate::registry::Registry;
use crate::table::Table;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// The process-wide registry of named tests, seeded with the built-ins.
/// Callers may register further implementations; names are append-only.
pub fn stat_tests() -> &'static Registry<fn() -> Box<dyn StatTest>> {
    fn make_welch() -> Box<dyn StatTest> {
        Box::new(WelchTTest)
    }
    fn make_mann_whitney() -> Box<dyn StatTest> {
        Box::new(MannWhitneyU)
    }
    static TESTS: Lazy<Registry<fn() -> Box<dyn StatTest>>> = Lazy::new(|| {
        let registry = Registry::new();
        let _ = registry.register("welch-t-test", make_welch as fn() -> Box<dyn StatTest>);
        let _ = registry.register("mann-whitney-u", make_mann_whitney as fn() -> Box<dyn StatTest>);
        registry
    });
    &TESTS
}

/// Categorical outcome of a validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Fail,
    Undecided,
    Pass,
}

impl Verdict {
    /// Numeric encoding: FAIL = -1, UNDECIDED = 0, PASS = 1.
    pub fn value(&self) -> i8 {
        match self {
            Verdict::Fail => -1,
            Verdict::Undecided => 0,
            Verdict::Pass => 1,
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Verdict::Fail)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Fail => write!(f, "FAIL"),
            Verdict::Undecided => write!(f, "UNDECIDED"),
            Verdict::Pass => write!(f, "PASS"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComparisonError {
    #[error("no conditions are observed by both the reference and the alternative")]
    NoCommonConditions,
}

/// A validation: reference data versus a model measurement of the same
/// phenomenon, decided by a statistical test.
pub struct Comparison {
    pub phenomenon: Arc<Phenomenon>,
    pub reference: StatisticalMeasurement,
    pub alternative: StatisticalMeasurement,
    test: Box<dyn StatTest>,
    p_value_threshold: f64,
}

impl Comparison {
    /// Welch's t-test at the 0.05 threshold unless configured otherwise.
    pub fn new(
        phenomenon: Arc<Phenomenon>,
        reference: StatisticalMeasurement,
        alternative: StatisticalMeasurement,
    ) -> Self {
        Self {
            phenomenon,
            reference,
            alternative,
            test: Box::new(WelchTTest),
            p_value_threshold: 0.05,
        }
    }

    pub fn with_test(mut self, test: Box<dyn StatTest>) -> Self {
        self.test = test;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.p_value_threshold = threshold;
        self
    }

    /// The conditions observed by both sides, in reference order.
    /// Conditions on one side only are dropped from the comparison.
    pub fn common_conditions(&self) -> Vec<Condition> {
        let alternative: Vec<Condition> = self.alternative.index_conditions();
        self.reference
            .index_conditions()
            .into_iter()
            .filter(|c| alternative.contains(c))
            .collect()
    }

    /// Per-condition alignment of both sides' summary statistics.
    pub fn aligned(&self) -> Result<Vec<AlignedCondition>, ComparisonError> {
        let common = self.common_conditions();
        if common.is_empty() {
            return Err(ComparisonError::NoCommonConditions);
        }
        let reference_rows = condition_rows(&self.reference.data, &self.reference.parameter_labels());
        let alternative_rows =
            condition_rows(&self.alternative.data, &self.alternative.parameter_labels());
        Ok(common
            .into_iter()
            .filter_map(|condition| {
                let r = reference_rows.get(&condition)?;
                let a = alternative_rows.get(&condition)?;
                Some(AlignedCondition {
                    reference: side_data(&self.reference.data, *r),
                    alternative: side_data(&self.alternative.data, *a),
                    condition,
                })
            })
            .collect())
    }

    /// The scalar p-value of this validation.
    pub fn p_value(&self) -> Result<f64, ComparisonError> {
        Ok(self.test.p_value(&self.aligned()?))
    }

    /// Run the test and render the verdict as an immutable pronouncement.
    pub fn evaluate(
        &self,
        reference_label: impl Into<String>,
        alternative_label: impl Into<String>,
    ) -> Result<Pronouncement, ComparisonError> {
        let aligned = self.aligned()?;
        let p_value = self.test.p_value(&aligned);
        let verdict = self.test.verdict(p_value, self.p_value_threshold);
        info!(
            phenomenon = %self.phenomenon.label,
            test = self.test.name(),
            p_value,
            %verdict,
            conditions = aligned.len(),
            "validation evaluated"
        );
        Ok(Pronouncement::new(
            Arc::clone(&self.phenomenon),
            reference_label,
            alternative_label,
            self.test.name(),
            p_value,
            verdict,
        ))
    }
}

/// First row index per condition in a summary table.
fn condition_rows(data: &Table, labels: &[String]) -> IndexMap<Condition, usize> {
    let mut rows = IndexMap::new();
    for i in 0..data.n_rows() {
        let condition = Condition::new(labels.iter().filter_map(|label| {
            data.column_by_name(label)
                .map(|cells| (label.clone(), cells[i].clone()))
        }));
        rows.entry(condition).or_insert(i);
    }
    rows
}

/// Summary statistics of one row: `mean`, `std` (falling back to `error`),
/// `sample_size`. Absent columns yield `NaN`, which the tests treat as not
/// computable.
fn side_data(data: &Table, row: usize) -> SideData {
    let cell = |name: &str| {
        data.column_by_name(name)
            .and_then(|cells| cells[row].as_f64())
    };
    SideData::summary(
        cell("mean").unwrap_or(f64::NAN),
        cell("std").or_else(|| cell("error")).unwrap_or(f64::NAN),
        cell("sample_size").unwrap_or(f64::NAN),
    )
}
