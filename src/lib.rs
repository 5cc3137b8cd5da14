//! DMT: Data Models and Tests.
//!
//! A framework for defining, running, and reporting statistical comparisons
//! ("validations") between a computational model and reference data, across
//! a hierarchy of measurable phenomena (cell density, synapse density,
//! connection probability, ...).
//!
//! The pipeline: an [`measurement::Adapter`] answers measurement queries
//! against a model, one sample per [`parameter::Condition`]; a
//! [`measurement::Collector`] aggregates samples into a mean/std/sample-size
//! summary [`table::Table`]; a [`comparison::Comparison`] aligns that summary
//! with reference data along jointly-observed conditions and renders a
//! [`comparison::Verdict`].

pub mod comparison;
pub mod logging;
pub mod measurement;
pub mod parameter;
pub mod phenomenon;
pub mod registry;
pub mod schema;
pub mod table;
pub mod value;

// Re-export key types for convenience
pub use comparison::{Comparison, MannWhitneyU, Pronouncement, StatTest, Verdict, WelchTTest};
pub use measurement::{Adapter, Collector, Data, Observation, StatisticalMeasurement};
pub use parameter::{BinnedParameter, Condition, DistanceBinner, FiniteParameter, Parameter};
pub use phenomenon::{Phenomenon, PhenomenonRegistry};
pub use schema::{FieldDef, FieldKind, Record, Schema, SchemaError};
pub use table::{normalize, ColumnPath, Table};
pub use value::HashKey;
