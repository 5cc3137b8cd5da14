//! The sampling pipeline: adapter calls, per-condition aggregation, and the
//! single/named measurement polymorphism of [`Data`].
//!
//! One collection run walks UNMEASURED → SAMPLING → AGGREGATING → VALIDATED
//! and terminates in a summary table or a typed error; nothing is retried
//! and nothing is swallowed.

use super::{check_records_validity, ValidityError};
use crate::parameter::{conditions, Condition, Parameter};
use crate::phenomenon::Phenomenon;
use crate::table::{normalize, ColumnPath, Table};
use indexmap::IndexMap;
use serde_json::{json, Value};
use std::io;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// The adapter contract: one documented method answering a measurement
/// query against a model, one sample per call.
///
/// A sample may be a plain number or a dict-shaped record spanning several
/// measured variables at once; dict-shaped samples are resolved by the
/// normalizer downstream.
pub trait Adapter<M> {
    fn sample(
        &self,
        model: &M,
        phenomenon: &Phenomenon,
        condition: &Condition,
    ) -> Result<Value, AdapterError>;
}

/// An adapter call failed under a given condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("adapter failed under {condition}: {reason}")]
pub struct AdapterError {
    pub condition: String,
    pub reason: String,
}

impl AdapterError {
    pub fn new(condition: &Condition, reason: impl Into<String>) -> Self {
        Self {
            condition: condition.to_string(),
            reason: reason.into(),
        }
    }
}

/// A collection run failed; terminal for the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Validity(#[from] ValidityError),
}

/// Enumerates conditions, samples the adapter, and aggregates per-condition
/// samples into a mean/std/sample-size summary.
#[derive(Debug, Clone)]
pub struct Collector {
    parameters: Vec<Parameter>,
    sample_size: usize,
    fill_missing: bool,
}

impl Collector {
    pub fn new(parameters: Vec<Parameter>) -> Self {
        Self {
            parameters,
            sample_size: 20,
            fill_missing: false,
        }
    }

    /// Number of independent samples drawn per condition (default 20).
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Emit null rows for conditions that produced no sample, instead of
    /// omitting them.
    pub fn fill_missing(mut self) -> Self {
        self.fill_missing = true;
        self
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Run the pipeline for one phenomenon.
    ///
    /// Samples are grouped strictly by condition, so aggregation is
    /// deterministic regardless of how the adapter behaves across calls.
    pub fn collect<A, M>(
        &self,
        adapter: &A,
        model: &M,
        phenomenon: &Phenomenon,
    ) -> Result<Table, CollectError>
    where
        A: Adapter<M>,
    {
        let all_conditions = conditions(&self.parameters);
        info!(
            phenomenon = %phenomenon.label,
            conditions = all_conditions.len(),
            sample_size = self.sample_size,
            "sampling"
        );

        let mut records: Vec<IndexMap<String, Value>> = Vec::new();
        for condition in &all_conditions {
            debug!(condition = %condition, "sampling condition");
            for _ in 0..self.sample_size {
                let sample = adapter.sample(model, phenomenon, condition)?;
                let mut record: IndexMap<String, Value> = condition
                    .as_map()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                record.insert(phenomenon.label.clone(), sample);
                records.push(record);
            }
        }

        check_records_validity(phenomenon, &self.parameters, &records)?;
        let summary = self.aggregate(phenomenon, &all_conditions, &records);
        info!(rows = summary.n_rows(), "summary assembled");
        Ok(summary)
    }

    /// Group per-sample records by condition and compute mean, std, and
    /// sample size per measured leaf.
    fn aggregate(
        &self,
        phenomenon: &Phenomenon,
        all_conditions: &[Condition],
        records: &[IndexMap<String, Value>],
    ) -> Table {
        let labels: Vec<String> = self
            .parameters
            .iter()
            .map(|p| p.label().to_string())
            .collect();

        // flatten only the measured column; parameter values (e.g. bin
        // tuples) stay intact as condition cells
        let measured: Vec<Value> = records
            .iter()
            .map(|r| r.get(&phenomenon.label).cloned().unwrap_or(Value::Null))
            .collect();
        let mut measured_table = Table::new();
        let _ = measured_table.push_column(ColumnPath::name(phenomenon.label.clone()), measured);
        let flat = normalize(measured_table);
        let leaves: Vec<ColumnPath> = flat.column_paths().cloned().collect();

        // group row indices by condition, preserving enumeration order
        let mut groups: IndexMap<Condition, Vec<usize>> = IndexMap::new();
        for condition in all_conditions {
            groups.entry(condition.clone()).or_default();
        }
        for (i, record) in records.iter().enumerate() {
            let condition = Condition::new(labels.iter().filter_map(|label| {
                record.get(label).map(|v| (label.clone(), v.clone()))
            }));
            groups.entry(condition).or_default().push(i);
        }

        // a condition counts as observed when any leaf produced a numeric
        // sample for it; unobserved conditions are omitted unless filling
        let kept: Vec<(&Condition, &Vec<usize>)> = groups
            .iter()
            .filter(|(_, rows)| {
                self.fill_missing
                    || rows.iter().any(|&i| {
                        leaves.iter().any(|leaf| {
                            flat.column(leaf)
                                .is_some_and(|cells| cells[i].as_f64().is_some())
                        })
                    })
            })
            .collect();

        let mut summary = Table::new();
        for label in &labels {
            let cells: Vec<Value> = kept
                .iter()
                .map(|(condition, _)| {
                    condition.get_value(label).cloned().unwrap_or(Value::Null)
                })
                .collect();
            let _ = summary.push_column(ColumnPath::name(label.clone()), cells);
        }
        for leaf in &leaves {
            let suffix: Vec<String> = leaf.segments()[1..].to_vec();
            for statistic in ["mean", "std", "sample_size"] {
                let mut segments = suffix.clone();
                segments.push(statistic.to_string());
                let path = ColumnPath::from_segments(if suffix.is_empty() {
                    vec![statistic.to_string()]
                } else {
                    segments
                });
                let cells: Vec<Value> = kept
                    .iter()
                    .map(|(_, rows)| {
                        let samples: Vec<f64> = rows
                            .iter()
                            .filter_map(|&i| flat.column(leaf).and_then(|c| c[i].as_f64()))
                            .collect();
                        statistic_of(statistic, &samples)
                    })
                    .collect();
                let _ = summary.push_column(path, cells);
            }
        }
        summary
    }
}

fn statistic_of(statistic: &str, samples: &[f64]) -> Value {
    match statistic {
        "sample_size" => json!(samples.len()),
        _ if samples.is_empty() => Value::Null,
        "mean" => json!(mean(samples)),
        "std" => match std_dev(samples) {
            Some(s) => json!(s),
            None => Value::Null,
        },
        _ => Value::Null,
    }
}

fn mean(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Sample standard deviation (ddof = 1); undefined below two samples.
fn std_dev(samples: &[f64]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let m = mean(samples);
    let variance =
        samples.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (samples.len() - 1) as f64;
    Some(variance.sqrt())
}

/// One named measurement source: a ready table, or a collector to run.
#[derive(Debug, Clone)]
pub enum MeasurementSource {
    Ready(Table),
    Collect {
        phenomenon: Arc<Phenomenon>,
        collector: Collector,
    },
}

impl MeasurementSource {
    fn resolve<A, M>(&self, adapter: &A, model: &M) -> Result<Table, CollectError>
    where
        A: Adapter<M>,
    {
        match self {
            MeasurementSource::Ready(table) => Ok(table.clone()),
            MeasurementSource::Collect {
                phenomenon,
                collector,
            } => collector.collect(adapter, model, phenomenon),
        }
    }
}

/// A measured value: one table, or a mapping of named tables. Callers
/// branch on the shape.
#[derive(Debug, Clone)]
pub enum DataValue {
    Single(Table),
    Named(IndexMap<String, Table>),
}

/// The data capability of a report section: absent, a single measurement,
/// or several named sub-measurements.
#[derive(Debug, Clone, Default)]
pub struct Data {
    source: Option<DataShape>,
}

#[derive(Debug, Clone)]
enum DataShape {
    Single(MeasurementSource),
    Named(IndexMap<String, MeasurementSource>),
}

impl Data {
    /// No data capability at all.
    pub fn none() -> Self {
        Self { source: None }
    }

    pub fn single(source: MeasurementSource) -> Self {
        Self {
            source: Some(DataShape::Single(source)),
        }
    }

    pub fn named(entries: IndexMap<String, MeasurementSource>) -> Self {
        Self {
            source: Some(DataShape::Named(entries)),
        }
    }

    /// Resolve the measurement against an adapter and model. `None` when no
    /// data capability was declared.
    pub fn collect<A, M>(&self, adapter: &A, model: &M) -> Result<Option<DataValue>, CollectError>
    where
        A: Adapter<M>,
    {
        match &self.source {
            None => Ok(None),
            Some(DataShape::Single(source)) => {
                Ok(Some(DataValue::Single(source.resolve(adapter, model)?)))
            }
            Some(DataShape::Named(entries)) => {
                let mut resolved = IndexMap::new();
                for (name, source) in entries {
                    resolved.insert(name.clone(), source.resolve(adapter, model)?);
                }
                Ok(Some(DataValue::Named(resolved)))
            }
        }
    }

    /// Persist a measured value under `path`: a single table becomes
    /// `data.csv`, named tables become `data/<name>.csv` each. An absent or
    /// empty value writes nothing at all — no file, no directory.
    pub fn save(value: Option<&DataValue>, path: &Path) -> io::Result<()> {
        match value {
            None => Ok(()),
            Some(DataValue::Single(table)) => {
                std::fs::create_dir_all(path)?;
                let mut file = std::fs::File::create(path.join("data.csv"))?;
                table.to_csv(&mut file)
            }
            Some(DataValue::Named(tables)) if tables.is_empty() => Ok(()),
            Some(DataValue::Named(tables)) => {
                let directory = path.join("data");
                std::fs::create_dir_all(&directory)?;
                for (name, table) in tables {
                    let mut file = std::fs::File::create(directory.join(format!("{name}.csv")))?;
                    table.to_csv(&mut file)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::FiniteParameter;
    use crate::phenomenon::PhenomenonRegistry;
    use serde_json::json;

    struct MockModel {
        densities: IndexMap<String, f64>,
    }

    struct MockAdapter;

    impl Adapter<MockModel> for MockAdapter {
        fn sample(
            &self,
            model: &MockModel,
            _phenomenon: &Phenomenon,
            condition: &Condition,
        ) -> Result<Value, AdapterError> {
            let layer = condition
                .get_value("layer")
                .and_then(Value::as_str)
                .ok_or_else(|| AdapterError::new(condition, "no layer in condition"))?;
            model
                .densities
                .get(layer)
                .map(|&d| json!(d))
                .ok_or_else(|| AdapterError::new(condition, format!("unknown layer {layer}")))
        }
    }

    fn mock_model() -> MockModel {
        MockModel {
            densities: [("L1".to_string(), 10.0), ("L2".to_string(), 20.0)]
                .into_iter()
                .collect(),
        }
    }

    fn cell_density() -> Arc<Phenomenon> {
        PhenomenonRegistry::new().intern("Cell Density", "Number of cells per unit volume.")
    }

    #[test]
    fn test_collect_produces_per_condition_summary() {
        let collector =
            Collector::new(vec![FiniteParameter::of_strings("layer", ["L1", "L2"]).into()])
                .with_sample_size(5);
        let summary = collector
            .collect(&MockAdapter, &mock_model(), &cell_density())
            .unwrap();
        assert_eq!(summary.n_rows(), 2);
        assert_eq!(
            summary.column_by_name("layer").unwrap(),
            &[json!("L1"), json!("L2")]
        );
        assert_eq!(
            summary.column_by_name("mean").unwrap(),
            &[json!(10.0), json!(20.0)]
        );
        assert_eq!(
            summary.column_by_name("sample_size").unwrap(),
            &[json!(5), json!(5)]
        );
        // constant samples have zero spread
        assert_eq!(
            summary.column_by_name("std").unwrap(),
            &[json!(0.0), json!(0.0)]
        );
    }

    #[test]
    fn test_adapter_failure_is_terminal() {
        let collector =
            Collector::new(vec![FiniteParameter::of_strings("layer", ["L6"]).into()]);
        let err = collector
            .collect(&MockAdapter, &mock_model(), &cell_density())
            .unwrap_err();
        assert!(matches!(err, CollectError::Adapter(_)));
    }

    #[test]
    fn test_dict_shaped_samples_expand_into_named_leaves() {
        struct CompositeAdapter;
        impl Adapter<()> for CompositeAdapter {
            fn sample(
                &self,
                _model: &(),
                _phenomenon: &Phenomenon,
                _condition: &Condition,
            ) -> Result<Value, AdapterError> {
                Ok(json!({"cell_density": 10.0, "inhibitory_fraction": 0.25}))
            }
        }
        let collector =
            Collector::new(vec![FiniteParameter::of_strings("layer", ["L1"]).into()])
                .with_sample_size(3);
        let summary = collector
            .collect(&CompositeAdapter, &(), &cell_density())
            .unwrap();
        assert_eq!(
            summary
                .column(&ColumnPath::from(["cell_density", "mean"]))
                .unwrap(),
            &[json!(10.0)]
        );
        assert_eq!(
            summary
                .column(&ColumnPath::from(["inhibitory_fraction", "mean"]))
                .unwrap(),
            &[json!(0.25)]
        );
    }

    #[test]
    fn test_fill_missing_emits_null_rows() {
        struct PartialAdapter;
        impl Adapter<()> for PartialAdapter {
            fn sample(
                &self,
                _model: &(),
                _phenomenon: &Phenomenon,
                condition: &Condition,
            ) -> Result<Value, AdapterError> {
                match condition.get_value("layer").and_then(Value::as_str) {
                    Some("L1") => Ok(json!(10.0)),
                    _ => Ok(Value::Null),
                }
            }
        }
        // without filling, the unobserved condition is omitted
        let collector =
            Collector::new(vec![FiniteParameter::of_strings("layer", ["L1", "L2"]).into()])
                .with_sample_size(3);
        let summary = collector
            .collect(&PartialAdapter, &(), &cell_density())
            .unwrap();
        assert_eq!(summary.n_rows(), 1);
        assert_eq!(summary.column_by_name("layer").unwrap(), &[json!("L1")]);

        // with filling, it appears as a null row
        let filled = Collector::new(vec![
            FiniteParameter::of_strings("layer", ["L1", "L2"]).into()
        ])
        .with_sample_size(3)
        .fill_missing();
        let summary = filled
            .collect(&PartialAdapter, &(), &cell_density())
            .unwrap();
        assert_eq!(summary.n_rows(), 2);
        assert_eq!(
            summary.column_by_name("mean").unwrap(),
            &[json!(10.0), Value::Null]
        );
    }

    #[test]
    fn test_save_single_writes_data_csv() {
        let dir = tempfile::tempdir().unwrap();
        let table = Table::from_mapping(
            [("layer".to_string(), json!(["L1"])), ("mean".to_string(), json!([10.0]))]
                .into_iter()
                .collect(),
        )
        .unwrap();
        Data::save(Some(&DataValue::Single(table)), dir.path()).unwrap();
        assert!(dir.path().join("data.csv").exists());
    }

    #[test]
    fn test_save_named_writes_per_name_csv() {
        let dir = tempfile::tempdir().unwrap();
        let table = Table::from_mapping(
            [("mean".to_string(), json!([1.0]))].into_iter().collect(),
        )
        .unwrap();
        let named: IndexMap<String, Table> = [
            ("cell_density".to_string(), table.clone()),
            ("inhibitory_fraction".to_string(), table),
        ]
        .into_iter()
        .collect();
        Data::save(Some(&DataValue::Named(named)), dir.path()).unwrap();
        assert!(dir.path().join("data/cell_density.csv").exists());
        assert!(dir.path().join("data/inhibitory_fraction.csv").exists());
        assert!(!dir.path().join("data.csv").exists());
    }

    #[test]
    fn test_save_nothing_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("section");
        Data::save(None, &target).unwrap();
        assert!(!target.exists());

        Data::save(Some(&DataValue::Named(IndexMap::new())), &target).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn test_data_none_collects_to_none() {
        let result = Data::none().collect(&MockAdapter, &mock_model()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_data_named_collects_each_entry() {
        let ready = Table::from_mapping(
            [("mean".to_string(), json!([1.0]))].into_iter().collect(),
        )
        .unwrap();
        let data = Data::named(
            [(
                "cell_density".to_string(),
                MeasurementSource::Ready(ready),
            )]
            .into_iter()
            .collect(),
        );
        match data.collect(&MockAdapter, &mock_model()).unwrap() {
            Some(DataValue::Named(tables)) => {
                assert!(tables.contains_key("cell_density"));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }
}
