//! The canonical telemetry envelope (see spec §3) and its batch normalization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A field's `value` is any JSON term — scalar, object, or array.
pub type FieldValue = serde_json::Value;

/// One `(name, value, type, unit)` entry inside an envelope's `fields`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub title: String,
    pub value: FieldValue,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Int,
    Float,
    Str,
    Json,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Str => "str",
            FieldType::Json => "json",
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_table() -> String {
    "example".to_string()
}

fn default_deviceid() -> String {
    "no_id".to_string()
}

/// One inbound telemetry JSON object.
///
/// `fields` is an `IndexMap` so iteration order matches the order keys
/// appeared in the source JSON object (spec invariant: within a batch, the
/// key set and its order are identical across elements).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub timestamp: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_deviceid")]
    pub deviceid: String,
    #[serde(default)]
    pub fields: indexmap::IndexMap<String, Field>,
}

/// A normalized batch of one or more envelopes sharing `schema`, `table`,
/// and the key-set/order of `fields` (spec invariant).
#[derive(Debug, Clone)]
pub struct EnvelopeBatch(Vec<Envelope>);

impl EnvelopeBatch {
    pub fn as_slice(&self) -> &[Envelope] {
        &self.0
    }

    pub fn first(&self) -> &Envelope {
        // Non-empty by construction: `one_or_many` always yields >= 1 element.
        &self.0[0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Envelope> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a EnvelopeBatch {
    type Item = &'a Envelope;
    type IntoIter = std::slice::Iter<'a, Envelope>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Raised when the decoded JSON is neither a single envelope object nor a
/// list of envelope objects.
#[derive(Debug, thiserror::Error)]
#[error("envelope shape error: expected an object or a list of objects")]
pub struct ShapeError;

/// Normalize a duck-typed "single object vs list of objects" JSON payload
/// into a non-empty `EnvelopeBatch` (spec §9 redesign note).
pub fn normalize(value: serde_json::Value) -> Result<EnvelopeBatch, ShapeError> {
    match value {
        serde_json::Value::Object(_) => {
            let envelope: Envelope = serde_json::from_value(value).map_err(|_| ShapeError)?;
            Ok(EnvelopeBatch(vec![envelope]))
        }
        serde_json::Value::Array(items) => {
            if items.is_empty() {
                return Err(ShapeError);
            }
            let envelopes: Vec<Envelope> = items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<_, _>>()
                .map_err(|_| ShapeError)?;
            Ok(EnvelopeBatch(envelopes))
        }
        _ => Err(ShapeError),
    }
}

/// Metadata describing a field's declared type, used by DDL recovery.
///
/// Keyed by column name for `InsertPlan::column_types`.
pub type ColumnTypes = BTreeMap<String, FieldType>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_object_normalizes_to_one_element_batch() {
        let batch = normalize(json!({"timestamp": "t0", "fields": {}})).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.first().timestamp, "t0");
    }

    #[test]
    fn list_of_objects_normalizes_in_order() {
        let batch = normalize(json!([
            {"timestamp": "t0", "fields": {}},
            {"timestamp": "t1", "fields": {}},
        ]))
        .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.as_slice()[1].timestamp, "t1");
    }

    #[test]
    fn empty_list_is_a_shape_error() {
        assert!(normalize(json!([])).is_err());
    }

    #[test]
    fn scalar_payload_is_a_shape_error() {
        assert!(normalize(json!("not an envelope")).is_err());
    }

    #[test]
    fn defaults_fill_in_missing_schema_table_deviceid() {
        let batch = normalize(json!({"timestamp": "t0"})).unwrap();
        let envelope = batch.first();
        assert_eq!(envelope.schema, "public");
        assert_eq!(envelope.table, "example");
        assert_eq!(envelope.deviceid, "no_id");
    }
}
