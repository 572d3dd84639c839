//! `InsertPlan` — the parser's output and the writer's input (spec §3).

use crate::envelope::{ColumnTypes, FieldValue};

/// A single insert batch, fully resolved from envelope(s): target table,
/// column list, placeholder string, row values, and the column-type map
/// DDL recovery needs to build `CREATE TABLE`/`ALTER TABLE` statements.
#[derive(Debug, Clone)]
pub struct InsertPlan {
    pub schema: String,
    pub table: String,

    /// Comma-joined column identifiers, `<ts_col>,<id_col>,<field columns...>`.
    pub columns_name: String,

    /// Comma-joined `%s` placeholders, one per column in `columns_name`.
    pub placeholder: String,

    /// One row per envelope element: `[timestamp, deviceid, field values...]`.
    pub rows: Vec<Vec<FieldValue>>,

    /// Declared type per variable-tail column name, used by DDL recovery.
    pub column_types: ColumnTypes,
}

impl InsertPlan {
    /// Number of comma-separated columns in `columns_name` — also the
    /// expected length of every row in `rows` (spec §8 universal invariant).
    pub fn column_count(&self) -> usize {
        self.columns_name.split(',').count()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `INSERT INTO <schema>.<table> (<columns>) VALUES (<placeholder>)`,
    /// the shape `executemany` binds `rows` against (spec §6).
    pub fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {}.{} ({}) VALUES ({})",
            self.schema, self.table, self.columns_name, self.placeholder
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn plan(rows: Vec<Vec<FieldValue>>) -> InsertPlan {
        InsertPlan {
            schema: "public".into(),
            table: "example".into(),
            columns_name: "timestamp,id,temp".into(),
            placeholder: "%s,%s,%s".into(),
            rows,
            column_types: BTreeMap::new(),
        }
    }

    #[test]
    fn column_count_matches_comma_separated_columns() {
        assert_eq!(plan(vec![]).column_count(), 3);
    }

    #[test]
    fn is_empty_reflects_row_count() {
        assert!(plan(vec![]).is_empty());
        assert!(!plan(vec![vec![FieldValue::Null, FieldValue::Null, FieldValue::Null]]).is_empty());
    }

    #[test]
    fn insert_sql_has_expected_shape() {
        let sql = plan(vec![]).insert_sql();
        assert_eq!(sql, "INSERT INTO public.example (timestamp,id,temp) VALUES (%s,%s,%s)");
    }
}
