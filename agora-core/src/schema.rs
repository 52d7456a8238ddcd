//! Standard-model schemas, field descriptors, and the schema registry.
//!
//! Standard models are the canonical, provider-agnostic query/data schemas
//! for logical endpoints. Field names drawn from the reserved vocabularies
//! must carry the vocabulary description so generated documentation stays
//! consistent across providers.

use std::collections::BTreeMap;

use agora_types::{ModelName, ProviderKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AgoraError;

/// Reserved query field names and their canonical description substrings.
pub const RESERVED_QUERY_DESCRIPTIONS: &[(&str, &str)] = &[
    ("symbol", "Symbol to get data for"),
    ("start_date", "Start date of the data, in YYYY-MM-DD format"),
    ("end_date", "End date of the data, in YYYY-MM-DD format"),
    ("interval", "Time interval of the data to return"),
    ("period", "Time period of the data to return"),
    ("date", "A specific date to get data for"),
    ("limit", "The number of data entries to return"),
];

/// Reserved data field names and their canonical description substrings.
pub const RESERVED_DATA_DESCRIPTIONS: &[(&str, &str)] = &[
    ("symbol", "Symbol representing the entity requested in the data"),
    ("date", "The date of the data"),
    ("open", "The open price"),
    ("high", "The high price"),
    ("low", "The low price"),
    ("close", "The close price"),
    ("volume", "The trading volume"),
];

/// Look up the reserved description substring for a query field name.
#[must_use]
pub fn reserved_query_description(name: &str) -> Option<&'static str> {
    RESERVED_QUERY_DESCRIPTIONS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, d)| *d)
}

/// Look up the reserved description substring for a data field name.
#[must_use]
pub fn reserved_data_description(name: &str) -> Option<&'static str> {
    RESERVED_DATA_DESCRIPTIONS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, d)| *d)
}

/// Semantic type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SemanticType {
    /// Boolean flag.
    Bool,
    /// Integer count or size.
    Int,
    /// Floating-point quantity.
    Float,
    /// Free-form or enumerated string.
    String,
    /// Calendar date, ISO `YYYY-MM-DD`.
    Date,
    /// Timestamp, ISO 8601.
    DateTime,
}

impl SemanticType {
    /// Whether a JSON value matches this type. `null` only matches optional
    /// fields, which is checked by the caller; this tests the non-null shape.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Bool => value.is_boolean(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::String => value.is_string(),
            Self::Date => value
                .as_str()
                .is_some_and(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
            Self::DateTime => value.as_str().is_some_and(|s| {
                chrono::DateTime::parse_from_rfc3339(s).is_ok()
                    || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
            }),
        }
    }

    /// Parse an HTTP query-string token into a typed JSON value.
    ///
    /// # Errors
    /// Returns `Validation` when the token does not parse as this type.
    pub fn coerce_str(&self, name: &str, raw: &str) -> Result<Value, AgoraError> {
        let invalid = || {
            AgoraError::validation(format!(
                "parameter {name} expects a {self:?} value, got {raw:?}"
            ))
        };
        match self {
            Self::Bool => match raw {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            Self::Int => raw
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| invalid()),
            Self::Float => raw
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| invalid()),
            Self::String => Ok(Value::String(raw.to_string())),
            Self::Date | Self::DateTime => {
                let v = Value::String(raw.to_string());
                if self.matches(&v) { Ok(v) } else { Err(invalid()) }
            }
        }
    }
}

/// Descriptor of a single schema field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name, snake_case.
    pub name: String,
    /// Semantic type of accepted values.
    pub semantic_type: SemanticType,
    /// Whether the field may be absent or null. Missing optional values are
    /// strict-null: they are never coerced to zero.
    pub optional: bool,
    /// Default value applied by `transform_query` when the field is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Human-readable description.
    pub description: String,
    /// Provider-wire aliases for this field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Providers this field applies to. Empty on standard fields; populated
    /// by the merge engine on provider-extra fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderKey>,
}

impl FieldDescriptor {
    /// Build a required field of the given type.
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        let name = name.into();
        let description = reserved_query_description(&name)
            .or_else(|| reserved_data_description(&name))
            .unwrap_or_default()
            .to_string();
        Self {
            name,
            semantic_type,
            optional: false,
            default: None,
            description,
            aliases: Vec::new(),
            providers: Vec::new(),
        }
    }

    /// Mark the field optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Attach a default value (implies optional at the call surface).
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self.optional = true;
        self
    }

    /// Set the description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a provider-wire alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Whether a supplied value satisfies this field.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.optional;
        }
        self.semantic_type.matches(value)
    }
}

/// An ordered collection of field descriptors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    /// Empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from a list of fields.
    #[must_use]
    pub fn from_fields(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    /// Append a field, replacing any previous field of the same name.
    pub fn push(&mut self, field: FieldDescriptor) {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name == field.name) {
            *existing = field;
        } else {
            self.fields.push(field);
        }
    }

    /// Look up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Mutable lookup by name.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldDescriptor> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    /// Whether a field of this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Iterate fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validate a parameter object against this schema: required fields must
    /// be present and non-null, and every present field must match its type.
    ///
    /// # Errors
    /// Returns `Validation` naming the offending field.
    pub fn validate(&self, params: &serde_json::Map<String, Value>) -> Result<(), AgoraError> {
        for field in &self.fields {
            match params.get(&field.name) {
                Some(v) => {
                    if !field.accepts(v) {
                        return Err(AgoraError::validation(format!(
                            "field {} expects a {:?} value",
                            field.name, field.semantic_type
                        )));
                    }
                }
                None => {
                    if !field.optional && field.default.is_none() {
                        return Err(AgoraError::validation(format!(
                            "missing required field {}",
                            field.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// A canonical standard model: query schema plus data schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardModel {
    /// Unique logical model name.
    pub name: ModelName,
    /// Canonical query parameters.
    pub query: Schema,
    /// Canonical result-row schema.
    pub data: Schema,
}

impl StandardModel {
    /// Build a standard model from its schemas.
    pub fn new(name: impl Into<ModelName>, query: Schema, data: Schema) -> Self {
        Self {
            name: name.into(),
            query,
            data,
        }
    }
}

/// Registry of standard models, keyed by model name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    models: BTreeMap<ModelName, StandardModel>,
}

impl SchemaRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a standard model.
    ///
    /// # Errors
    /// Returns `Schema` if the model name is already registered, or if any
    /// field uses a reserved name without carrying its reserved description
    /// substring.
    pub fn register(&mut self, model: StandardModel) -> Result<(), AgoraError> {
        if self.models.contains_key(&model.name) {
            return Err(AgoraError::schema(format!(
                "duplicate standard model {}",
                model.name
            )));
        }
        for field in model.query.iter() {
            if let Some(required) = reserved_query_description(&field.name)
                && !field.description.contains(required)
            {
                return Err(AgoraError::schema(format!(
                    "query field {} of {} must describe itself as {required:?}",
                    field.name, model.name
                )));
            }
        }
        for field in model.data.iter() {
            if let Some(required) = reserved_data_description(&field.name)
                && !field.description.contains(required)
            {
                return Err(AgoraError::schema(format!(
                    "data field {} of {} must describe itself as {required:?}",
                    field.name, model.name
                )));
            }
        }
        self.models.insert(model.name.clone(), model);
        Ok(())
    }

    /// Look up a standard model by name.
    #[must_use]
    pub fn get(&self, name: &ModelName) -> Option<&StandardModel> {
        self.models.get(name)
    }

    /// Whether a model is registered.
    #[must_use]
    pub fn contains(&self, name: &ModelName) -> bool {
        self.models.contains_key(name)
    }

    /// Iterate models in name order.
    pub fn iter(&self) -> impl Iterator<Item = &StandardModel> {
        self.models.values()
    }

    /// Number of registered models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
