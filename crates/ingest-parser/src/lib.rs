//! C3: pure transform from a telemetry envelope to one or more `InsertPlan`s.
//!
//! Grounded on `examples/original_source/plugins/parser_postgresql.py`'s
//! column/placeholder/row construction, reworked as a sentinel-returning
//! function instead of one that logs and returns `None` on bad input.

mod config;

use ingest_core::envelope::{self, Envelope, EnvelopeBatch, FieldType, FieldValue};
use ingest_core::plan::InsertPlan;

pub use config::{ColumnConfig, LogForkConfig, ParserConfig};

/// Target storage family. Only `Postgresql` is specified today; the enum
/// leaves room for additional flows without changing the `parse` call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Postgresql,
}

impl Flow {
    /// Case-insensitive match on `source.select`/`storage.select` (spec §9
    /// open question: several drafts normalize inconsistently; this design
    /// always matches case-insensitively).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgresql" => Some(Flow::Postgresql),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unsupported flow")]
    UnsupportedFlow,
    #[error(transparent)]
    Shape(#[from] envelope::ShapeError),
}

/// `parse(flow, storage_config, envelope) -> [InsertPlan]` (spec §4.3).
///
/// `raw` is the JSON value decoded from the wire payload: either a single
/// envelope object or a non-empty list of them.
pub fn parse(
    flow: Flow,
    config: &ParserConfig,
    raw: serde_json::Value,
) -> Result<Vec<InsertPlan>, ParseError> {
    match flow {
        Flow::Postgresql => {}
    }

    let batch = envelope::normalize(raw)?;
    let mut plans = Vec::with_capacity(2);
    plans.push(primary_plan(config, &batch));
    if let Some(secondary) = log_fork_plan(config, &batch) {
        plans.push(secondary);
    }
    Ok(plans)
}

fn stringify(field_type: FieldType, value: &FieldValue) -> FieldValue {
    if field_type == FieldType::Json {
        FieldValue::String(value.to_string())
    } else {
        value.clone()
    }
}

fn primary_plan(config: &ParserConfig, batch: &EnvelopeBatch) -> InsertPlan {
    let first = batch.first();
    let ts_col = &config.column.column_ts;
    let id_col = &config.column.column_id;

    let mut columns_name = format!("{ts_col},{id_col}");
    let mut placeholder = "%s,%s".to_string();
    let mut column_types = ingest_core::envelope::ColumnTypes::new();

    for (name, field) in &first.fields {
        columns_name.push(',');
        columns_name.push_str(name);
        placeholder.push_str(",%s");
        column_types.insert(name.clone(), field.field_type);
    }

    let rows = batch
        .iter()
        .map(|e| build_row(e, first))
        .collect::<Vec<_>>();

    InsertPlan {
        schema: first.schema.clone(),
        table: first.table.clone(),
        columns_name,
        placeholder,
        rows,
        column_types,
    }
}

fn build_row(e: &Envelope, shape: &Envelope) -> Vec<FieldValue> {
    let mut row = Vec::with_capacity(2 + shape.fields.len());
    row.push(FieldValue::String(e.timestamp.clone()));
    row.push(FieldValue::String(e.deviceid.clone()));
    for name in shape.fields.keys() {
        // Spec invariant: every element in a batch shares the same field
        // key-set; a missing key here means the batch violated that
        // invariant, so falling back to `Value::Null` is the least
        // surprising behavior rather than panicking mid-batch.
        let field = e.fields.get(name);
        match field {
            Some(field) => row.push(stringify(field.field_type, &field.value)),
            None => row.push(FieldValue::Null),
        }
    }
    row
}

const LOG_MESSAGE_KEY: &str = "message";

fn log_fork_plan(config: &ParserConfig, batch: &EnvelopeBatch) -> Option<InsertPlan> {
    if !config.log.enabled {
        return None;
    }

    let qualifying: Vec<&Envelope> = batch
        .iter()
        .filter(|e| e.fields.contains_key(LOG_MESSAGE_KEY))
        .collect();
    let shape = *qualifying.first()?;

    let present_columns: Vec<&String> = config
        .log
        .log_column
        .iter()
        .filter(|c| shape.fields.contains_key(c.as_str()))
        .collect();

    let ts_col = &config.column.column_ts;
    let id_col = &config.column.column_id;
    let mut columns_name = format!("{ts_col},{id_col}");
    let mut placeholder = "%s,%s".to_string();
    let mut column_types = ingest_core::envelope::ColumnTypes::new();

    for name in &present_columns {
        columns_name.push(',');
        columns_name.push_str(name);
        placeholder.push_str(",%s");
        if let Some(field) = shape.fields.get(name.as_str()) {
            column_types.insert((*name).clone(), field.field_type);
        }
    }

    let rows = qualifying
        .iter()
        .map(|e| {
            let mut row = Vec::with_capacity(2 + present_columns.len());
            row.push(FieldValue::String(e.timestamp.clone()));
            row.push(FieldValue::String(e.deviceid.clone()));
            for name in &present_columns {
                if let Some(field) = e.fields.get(name.as_str()) {
                    row.push(stringify(field.field_type, &field.value));
                } else {
                    row.push(FieldValue::Null);
                }
            }
            row
        })
        .collect();

    Some(InsertPlan {
        schema: config.log.log_schema.clone(),
        table: config.log.log_table.clone(),
        columns_name,
        placeholder,
        rows,
        column_types,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cfg() -> ParserConfig {
        ParserConfig {
            column: ColumnConfig {
                column_ts: "timestamp".to_string(),
                column_id: "id".to_string(),
            },
            log: LogForkConfig {
                enabled: true,
                log_schema: "monitor".to_string(),
                log_table: "log".to_string(),
                log_column: vec![
                    "message".to_string(),
                    "level".to_string(),
                    "source".to_string(),
                    "logpath".to_string(),
                ],
            },
        }
    }

    #[test]
    fn single_envelope_fresh_database() {
        let raw = json!({
            "timestamp": "2020-10-21 10:19:11",
            "schema": "alien",
            "table": "tree",
            "deviceid": "groot",
            "fields": {
                "x": {"name": "x", "value": 65.7, "type": "float"}
            }
        });

        let plans = parse(Flow::Postgresql, &cfg(), raw).unwrap();
        assert_eq!(plans.len(), 1);
        let plan = &plans[0];
        assert_eq!(plan.schema, "alien");
        assert_eq!(plan.table, "tree");
        assert_eq!(plan.columns_name, "timestamp,id,x");
        assert_eq!(plan.placeholder, "%s,%s,%s");
        assert_eq!(plan.rows.len(), 1);
        assert_eq!(
            plan.rows[0],
            vec![
                FieldValue::String("2020-10-21 10:19:11".to_string()),
                FieldValue::String("groot".to_string()),
                json!(65.7),
            ]
        );
        assert_eq!(plan.column_types.get("x"), Some(&FieldType::Float));
    }

    #[test]
    fn list_envelope_preserves_row_order() {
        let raw = json!([
            {
                "timestamp": "t1", "schema": "s", "table": "t", "deviceid": "d1",
                "fields": {
                    "x": {"name": "x", "value": 1, "type": "int"},
                    "y": {"name": "y", "value": 2, "type": "int"}
                }
            },
            {
                "timestamp": "t2", "schema": "s", "table": "t", "deviceid": "d2",
                "fields": {
                    "x": {"name": "x", "value": 3, "type": "int"},
                    "y": {"name": "y", "value": 4, "type": "int"}
                }
            }
        ]);

        let plans = parse(Flow::Postgresql, &cfg(), raw).unwrap();
        assert_eq!(plans.len(), 1);
        let plan = &plans[0];
        assert_eq!(plan.rows.len(), 2);
        assert_eq!(
            plan.rows[0],
            vec![
                FieldValue::String("t1".to_string()),
                FieldValue::String("d1".to_string()),
                json!(1),
                json!(2),
            ]
        );
        assert_eq!(
            plan.rows[1],
            vec![
                FieldValue::String("t2".to_string()),
                FieldValue::String("d2".to_string()),
                json!(3),
                json!(4),
            ]
        );
    }

    #[test]
    fn json_typed_field_round_trips() {
        let raw = json!({
            "timestamp": "t", "schema": "s", "table": "t", "deviceid": "d",
            "fields": {
                "blob": {"name": "blob", "value": {"a": 1, "b": [1,2,3]}, "type": "json"}
            }
        });

        let plans = parse(Flow::Postgresql, &cfg(), raw).unwrap();
        let plan = &plans[0];
        let stored = &plan.rows[0][2];
        let as_str = stored.as_str().expect("json field stored as string");
        let round_tripped: serde_json::Value = serde_json::from_str(as_str).unwrap();
        assert_eq!(round_tripped, json!({"a": 1, "b": [1,2,3]}));
    }

    #[test]
    fn log_fork_emitted_when_message_present() {
        let raw = json!({
            "timestamp": "t", "schema": "s", "table": "t", "deviceid": "groot",
            "fields": {
                "message": {"name": "message", "value": "stopped", "type": "str"},
                "level": {"name": "level", "value": 3, "type": "int"}
            }
        });

        let plans = parse(Flow::Postgresql, &cfg(), raw).unwrap();
        assert_eq!(plans.len(), 2);
        let secondary = &plans[1];
        assert_eq!(secondary.schema, "monitor");
        assert_eq!(secondary.table, "log");
        assert_eq!(secondary.columns_name, "timestamp,id,message,level");
        assert_eq!(
            secondary.rows[0],
            vec![
                FieldValue::String("t".to_string()),
                FieldValue::String("groot".to_string()),
                json!("stopped"),
                json!(3),
            ]
        );
    }

    #[test]
    fn no_log_fork_when_message_absent() {
        let raw = json!({
            "timestamp": "t", "schema": "s", "table": "t", "deviceid": "d",
            "fields": { "x": {"name": "x", "value": 1, "type": "int"} }
        });

        let plans = parse(Flow::Postgresql, &cfg(), raw).unwrap();
        assert_eq!(plans.len(), 1);
    }

    #[test]
    fn no_log_fork_when_switch_disabled() {
        let mut config = cfg();
        config.log.enabled = false;
        let raw = json!({
            "timestamp": "t", "schema": "s", "table": "t", "deviceid": "d",
            "fields": { "message": {"name": "message", "value": "hi", "type": "str"} }
        });

        let plans = parse(Flow::Postgresql, &config, raw).unwrap();
        assert_eq!(plans.len(), 1);
    }

    #[test]
    fn empty_fields_yields_fixed_columns_only() {
        let raw = json!({
            "timestamp": "t", "schema": "s", "table": "t", "deviceid": "d",
            "fields": {}
        });

        let plans = parse(Flow::Postgresql, &cfg(), raw).unwrap();
        let plan = &plans[0];
        assert_eq!(plan.columns_name, "timestamp,id");
        assert_eq!(plan.placeholder, "%s,%s");
        assert_eq!(plan.rows[0].len(), 2);
    }

    #[test]
    fn malformed_shape_is_rejected() {
        let raw = json!("not an object or list");
        let err = parse(Flow::Postgresql, &cfg(), raw).unwrap_err();
        assert!(matches!(err, ParseError::Shape(_)));
    }

    #[test]
    fn new_field_over_time_is_just_a_wider_plan() {
        // Scenario 3 from spec §8: the parser doesn't know about prior
        // plans, it just reflects whatever fields are present now — DDL
        // recovery for the new column lives entirely in ingest-db.
        let raw = json!({
            "timestamp": "t", "schema": "alien", "table": "tree", "deviceid": "groot",
            "fields": {
                "x": {"name": "x", "value": 1.0, "type": "float"},
                "y": {"name": "y", "value": "hi", "type": "str"}
            }
        });
        let plans = parse(Flow::Postgresql, &cfg(), raw).unwrap();
        assert_eq!(plans[0].columns_name, "timestamp,id,x,y");
        assert_eq!(plans[0].column_types.get("y"), Some(&FieldType::Str));
    }
}
