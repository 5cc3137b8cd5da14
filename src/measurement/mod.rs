//! Observations and their validity contracts.
//!
//! An [`Observation`] wraps a raw measurement result — per-sample records or
//! a table — together with the phenomenon measured and the parameters it was
//! conditioned on. Validity means every parameter label and the phenomenon
//! label appear in every record (or as table columns); a
//! [`StatisticalMeasurement`] relaxes this for pre-aggregated input, where
//! `mean` plus `std` (or `error`) columns stand in for the phenomenon
//! column.

mod collect;

pub use collect::{Adapter, AdapterError, CollectError, Collector, Data, DataValue, MeasurementSource};

use crate::parameter::{Condition, Parameter};
use crate::phenomenon::Phenomenon;
use crate::table::Table;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// A measured value is missing a required parameter or phenomenon key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidityError {
    #[error("record {record} is missing key `{key}`")]
    MissingKeyInRecord { key: String, record: usize },

    #[error("measurement table has no column `{key}`")]
    MissingColumn { key: String },
}

/// A raw measurement of one phenomenon under a set of parameters.
#[derive(Debug, Clone)]
pub struct Observation {
    pub phenomenon: Arc<Phenomenon>,
    pub parameters: Vec<Parameter>,
    pub data: Table,
}

impl Observation {
    /// Wrap a measurement table, validating that every parameter label and
    /// the phenomenon label appear as columns.
    pub fn new(
        phenomenon: Arc<Phenomenon>,
        parameters: Vec<Parameter>,
        data: Table,
    ) -> Result<Self, ValidityError> {
        check_table_validity(&phenomenon, &parameters, &data, false)?;
        Ok(Self {
            phenomenon,
            parameters,
            data,
        })
    }

    /// Wrap per-sample records, validating each record before tabulating.
    pub fn from_records(
        phenomenon: Arc<Phenomenon>,
        parameters: Vec<Parameter>,
        records: &[IndexMap<String, Value>],
    ) -> Result<Self, ValidityError> {
        check_records_validity(&phenomenon, &parameters, records)?;
        let data = Table::from_records(records);
        Ok(Self {
            phenomenon,
            parameters,
            data,
        })
    }

    /// Parameter labels, in declaration order.
    pub fn parameter_labels(&self) -> Vec<String> {
        self.parameters
            .iter()
            .map(|p| p.label().to_string())
            .collect()
    }

    /// The conditions actually present in the data, one per row, in row
    /// order with duplicates collapsed.
    pub fn index_conditions(&self) -> Vec<Condition> {
        index_conditions(&self.data, &self.parameter_labels())
    }
}

/// A pre-aggregated measurement: per-condition `mean`, `std` (or `error`),
/// and optionally `sample_size`, instead of raw samples.
#[derive(Debug, Clone)]
pub struct StatisticalMeasurement {
    pub phenomenon: Arc<Phenomenon>,
    pub parameters: Vec<Parameter>,
    pub data: Table,
}

impl StatisticalMeasurement {
    /// Wrap a summary table. The phenomenon column may be absent when
    /// `mean` and `std`/`error` columns are present.
    pub fn new(
        phenomenon: Arc<Phenomenon>,
        parameters: Vec<Parameter>,
        data: Table,
    ) -> Result<Self, ValidityError> {
        check_table_validity(&phenomenon, &parameters, &data, true)?;
        Ok(Self {
            phenomenon,
            parameters,
            data,
        })
    }

    pub fn parameter_labels(&self) -> Vec<String> {
        self.parameters
            .iter()
            .map(|p| p.label().to_string())
            .collect()
    }

    /// The conditions present in the summary's index, in row order.
    pub fn index_conditions(&self) -> Vec<Condition> {
        index_conditions(&self.data, &self.parameter_labels())
    }
}

/// Every parameter label and the phenomenon label must be a column.
/// With `statistical`, a missing phenomenon column is acceptable when
/// `mean` and `std` (or `error`) columns are present instead.
fn check_table_validity(
    phenomenon: &Phenomenon,
    parameters: &[Parameter],
    data: &Table,
    statistical: bool,
) -> Result<(), ValidityError> {
    for parameter in parameters {
        if !data.has_top_level(parameter.label()) {
            return Err(ValidityError::MissingColumn {
                key: parameter.label().to_string(),
            });
        }
    }
    if data.has_top_level(&phenomenon.label) {
        return Ok(());
    }
    if statistical
        && data.has_top_level("mean")
        && (data.has_top_level("std") || data.has_top_level("error"))
    {
        return Ok(());
    }
    Err(ValidityError::MissingColumn {
        key: phenomenon.label.clone(),
    })
}

/// Every record must carry every parameter label and the phenomenon label;
/// the first offender is reported with its record index.
pub(crate) fn check_records_validity(
    phenomenon: &Phenomenon,
    parameters: &[Parameter],
    records: &[IndexMap<String, Value>],
) -> Result<(), ValidityError> {
    let mut required: Vec<&str> = parameters.iter().map(Parameter::label).collect();
    required.push(&phenomenon.label);
    for (i, record) in records.iter().enumerate() {
        for key in &required {
            if !record.contains_key(*key) {
                return Err(ValidityError::MissingKeyInRecord {
                    key: (*key).to_string(),
                    record: i,
                });
            }
        }
    }
    Ok(())
}

/// Conditions present in a table's parameter columns, row order, duplicates
/// collapsed.
pub fn index_conditions(data: &Table, labels: &[String]) -> Vec<Condition> {
    let mut seen = Vec::new();
    for i in 0..data.n_rows() {
        let condition = Condition::new(labels.iter().filter_map(|label| {
            data.column_by_name(label)
                .map(|cells| (label.clone(), cells[i].clone()))
        }));
        if !seen.contains(&condition) {
            seen.push(condition);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::FiniteParameter;
    use crate::phenomenon::PhenomenonRegistry;
    use serde_json::json;

    fn cell_density() -> Arc<Phenomenon> {
        PhenomenonRegistry::new().intern("Cell Density", "Number of cells per unit volume.")
    }

    fn layer_parameter() -> Parameter {
        FiniteParameter::of_strings("layer", ["L1", "L2"]).into()
    }

    fn table(entries: &[(&str, Value)]) -> Table {
        Table::from_mapping(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_observation_accepts_complete_table() {
        let observation = Observation::new(
            cell_density(),
            vec![layer_parameter()],
            table(&[
                ("layer", json!(["L1", "L2"])),
                ("cell_density", json!([10.0, 20.0])),
            ]),
        );
        assert!(observation.is_ok());
    }

    #[test]
    fn test_observation_rejects_missing_parameter_column() {
        let err = Observation::new(
            cell_density(),
            vec![layer_parameter()],
            table(&[("cell_density", json!([10.0, 20.0]))]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidityError::MissingColumn {
                key: "layer".into()
            }
        );
    }

    #[test]
    fn test_observation_rejects_missing_phenomenon_column() {
        let err = Observation::new(
            cell_density(),
            vec![layer_parameter()],
            table(&[("layer", json!(["L1", "L2"]))]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidityError::MissingColumn {
                key: "cell_density".into()
            }
        );
    }

    #[test]
    fn test_record_validity_names_first_offending_record() {
        let records: Vec<IndexMap<String, Value>> = vec![
            [
                ("layer".to_string(), json!("L1")),
                ("cell_density".to_string(), json!(10.0)),
            ]
            .into_iter()
            .collect(),
            [("layer".to_string(), json!("L2"))].into_iter().collect(),
        ];
        let err = Observation::from_records(cell_density(), vec![layer_parameter()], &records)
            .unwrap_err();
        assert_eq!(
            err,
            ValidityError::MissingKeyInRecord {
                key: "cell_density".into(),
                record: 1
            }
        );
    }

    #[test]
    fn test_statistical_measurement_accepts_mean_std_instead_of_phenomenon() {
        let measurement = StatisticalMeasurement::new(
            cell_density(),
            vec![layer_parameter()],
            table(&[
                ("layer", json!(["L1", "L2"])),
                ("mean", json!([10.0, 20.0])),
                ("std", json!([1.0, 2.0])),
            ]),
        );
        assert!(measurement.is_ok());
    }

    #[test]
    fn test_statistical_measurement_accepts_error_for_std() {
        let measurement = StatisticalMeasurement::new(
            cell_density(),
            vec![layer_parameter()],
            table(&[
                ("layer", json!(["L1", "L2"])),
                ("mean", json!([10.0, 20.0])),
                ("error", json!([1.0, 2.0])),
            ]),
        );
        assert!(measurement.is_ok());
    }

    #[test]
    fn test_statistical_measurement_still_requires_mean() {
        let err = StatisticalMeasurement::new(
            cell_density(),
            vec![layer_parameter()],
            table(&[
                ("layer", json!(["L1", "L2"])),
                ("std", json!([1.0, 2.0])),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, ValidityError::MissingColumn { .. }));
    }

    #[test]
    fn test_index_conditions_collapse_duplicates() {
        let data = table(&[
            ("layer", json!(["L1", "L1", "L2"])),
            ("cell_density", json!([10.0, 11.0, 20.0])),
        ]);
        let conditions = index_conditions(&data, &["layer".to_string()]);
        assert_eq!(conditions.len(), 2);
        assert_eq!(conditions[0].get_value("layer"), Some(&json!("L1")));
        assert_eq!(conditions[1].get_value("layer"), Some(&json!("L2")));
    }
}
