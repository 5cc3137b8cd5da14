//! Explicit field schemas for dynamic records.
//!
//! Reference datasets and report metadata arrive as dynamic key/value
//! payloads. A [`Schema`] declares the typed, documented, optionally
//! defaulted fields such a payload must carry; [`Schema::build`] validates
//! the supplied values once and returns a [`Record`], and every later
//! mutation through [`Record::set`] re-validates. Validation never coerces
//! silently: the only conversions are casts declared on the field itself.

use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Validation predicate applied after the type check.
pub type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Declared coercion applied before the type check.
pub type Cast = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Errors raised by schema construction and record validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("missing required field `{field}`: {doc}")]
    MissingField { field: String, doc: String },

    #[error("field `{field}` expects {expected}, got {actual}")]
    WrongType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("field `{field}` failed validation: {reason}")]
    FailedValidation { field: String, reason: String },

    #[error("schema `{schema}` has no field `{field}`")]
    UnknownField { schema: String, field: String },
}

/// Expected dynamic type of a field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Any value is admissible.
    Any,
    Bool,
    Int,
    /// Accepts integral numbers as well.
    Float,
    Number,
    Str,
    Seq,
    Map,
    /// Tuple-of-types equivalent: any listed kind admits the value.
    OneOf(Vec<FieldKind>),
}

impl FieldKind {
    /// Whether `value` is an instance of this kind.
    pub fn admits(&self, value: &Value) -> bool {
        match self {
            FieldKind::Any => true,
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Int => value.is_i64() || value.is_u64(),
            FieldKind::Float => value.is_number(),
            FieldKind::Number => value.is_number(),
            FieldKind::Str => value.is_string(),
            FieldKind::Seq => value.is_array(),
            FieldKind::Map => value.is_object(),
            FieldKind::OneOf(kinds) => kinds.iter().any(|k| k.admits(value)),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Any => write!(f, "any value"),
            FieldKind::Bool => write!(f, "a boolean"),
            FieldKind::Int => write!(f, "an integer"),
            FieldKind::Float => write!(f, "a float"),
            FieldKind::Number => write!(f, "a number"),
            FieldKind::Str => write!(f, "a string"),
            FieldKind::Seq => write!(f, "a sequence"),
            FieldKind::Map => write!(f, "a mapping"),
            FieldKind::OneOf(kinds) => {
                let names: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
                write!(f, "one of: {}", names.join(", "))
            }
        }
    }
}

/// One declared field of a record type.
#[derive(Clone)]
pub struct FieldDef {
    name: String,
    doc: String,
    kind: FieldKind,
    required: bool,
    default: Option<Value>,
    validator: Option<Validator>,
    validation_doc: String,
    cast: Option<Cast>,
}

impl FieldDef {
    /// Declare a field. Documentation is mandatory; the field defaults to
    /// required, any type, always-valid.
    pub fn new(name: impl Into<String>, doc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: doc.into(),
            kind: FieldKind::Any,
            required: true,
            default: None,
            validator: None,
            validation_doc: String::new(),
            cast: None,
        }
    }

    /// Constrain the expected type.
    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    /// Mark the field optional: absence is legal and reads yield `None`.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Supply a default used when no value is given.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Attach a validation predicate, with a reason echoed on failure.
    pub fn with_validator(
        mut self,
        reason: impl Into<String>,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(predicate));
        self.validation_doc = reason.into();
        self
    }

    /// Attach a declared cast applied before the type check.
    pub fn with_cast(mut self, cast: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.cast = Some(Arc::new(cast));
        self
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Documentation string.
    pub fn doc(&self) -> &str {
        &self.doc
    }

    /// Whether construction must supply this field (absent a default).
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Pure validity check: wrong type and failed predicate are distinct
    /// errors, and nothing is stored.
    pub fn assert_valid(&self, value: &Value) -> Result<(), SchemaError> {
        if !self.kind.admits(value) {
            return Err(SchemaError::WrongType {
                field: self.name.clone(),
                expected: self.kind.to_string(),
                actual: kind_of(value),
            });
        }
        if let Some(validator) = &self.validator {
            if !validator(value) {
                return Err(SchemaError::FailedValidation {
                    field: self.name.clone(),
                    reason: if self.validation_doc.is_empty() {
                        self.doc.clone()
                    } else {
                        self.validation_doc.clone()
                    },
                });
            }
        }
        Ok(())
    }

    fn admit(&self, value: Value) -> Result<Value, SchemaError> {
        let value = match &self.cast {
            Some(cast) => cast(value),
            None => value,
        };
        self.assert_valid(&value)?;
        Ok(value)
    }
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("default", &self.default)
            .finish()
    }
}

fn kind_of(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "an integer",
        Value::Number(_) => "a float",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
    .to_string()
}

/// An ordered collection of field definitions, plus schema-level shared
/// attributes (one value per schema, visible from every record built from
/// it).
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    fields: IndexMap<String, FieldDef>,
    attributes: IndexMap<String, Value>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            attributes: IndexMap::new(),
        }
    }

    /// Declare a field. Declaration order is the record's field order.
    pub fn field(mut self, def: FieldDef) -> Self {
        self.fields.insert(def.name.clone(), def);
        self
    }

    /// Declare a shared attribute, visible from every record of this schema.
    pub fn attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Schema name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field name to documentation, in declaration order.
    pub fn describe(&self) -> IndexMap<String, String> {
        self.fields
            .iter()
            .map(|(name, def)| (name.clone(), def.doc.clone()))
            .collect()
    }

    /// Shared attribute lookup.
    pub fn get_attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Validate `values` against this schema and produce a record.
    ///
    /// Every supplied value is cast (if declared), type-checked, and run
    /// through its predicate. A required field with no default and no
    /// supplied value fails naming the field and echoing its documentation;
    /// an optional one is simply absent. Unknown keys are rejected.
    pub fn build(self: &Arc<Self>, values: IndexMap<String, Value>) -> Result<Record, SchemaError> {
        let mut values = values;
        let mut bound = IndexMap::new();
        for (name, def) in &self.fields {
            match values.shift_remove(name) {
                Some(value) => {
                    bound.insert(name.clone(), def.admit(value)?);
                }
                None => match &def.default {
                    Some(default) => {
                        bound.insert(name.clone(), default.clone());
                    }
                    None if def.required => {
                        return Err(SchemaError::MissingField {
                            field: name.clone(),
                            doc: def.doc.clone(),
                        });
                    }
                    None => {}
                },
            }
        }
        if let Some(unknown) = values.keys().next() {
            return Err(SchemaError::UnknownField {
                schema: self.name.clone(),
                field: unknown.clone(),
            });
        }
        Ok(Record {
            schema: Arc::clone(self),
            values: bound,
        })
    }
}

/// A validated instance of a [`Schema`].
///
/// Optional fields that were not supplied are absent: [`Record::get`]
/// returns `None` and callers pattern-match, which is how "this measurement
/// has no narrative/data/illustration" is expressed.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<Schema>,
    values: IndexMap<String, Value>,
}

impl Record {
    /// Bound value of a field, `None` when the (optional) field is absent.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Re-validate and store a new value for a declared field.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), SchemaError> {
        let def = self
            .schema
            .fields
            .get(name)
            .ok_or_else(|| SchemaError::UnknownField {
                schema: self.schema.name.clone(),
                field: name.to_string(),
            })?;
        let value = def.admit(value)?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Shared schema-level attribute lookup.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.schema.get_attribute(name)
    }

    /// The schema this record was built from.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Bound fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}
