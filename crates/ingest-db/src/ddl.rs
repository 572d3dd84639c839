//! `CREATE SCHEMA` / `CREATE TABLE` / hypertable / `ADD COLUMN`, grounded on
//! `examples/original_source/utils/timescale_wrapper_forklog.py`'s DDL
//! strings — same statements, same duplicate/undefined handling, translated
//! from exception classes to `sqlx::Error` SQLSTATE matches.

use crate::error::{SQLSTATE_DUPLICATE_SCHEMA, SQLSTATE_DUPLICATE_TABLE, SQLSTATE_INVALID_SCHEMA_NAME};
use ingest_core::envelope::{ColumnTypes, FieldType};
use sqlx::PgPool;

fn sql_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Int | FieldType::Float => "DOUBLE PRECISION",
        FieldType::Str | FieldType::Json => "VARCHAR",
    }
}

/// `CREATE SCHEMA <schema>`. A duplicate schema is not an error — another
/// worker may have created it already.
pub async fn create_schema(pool: &PgPool, schema: &str) -> anyhow::Result<()> {
    let sql = format!("CREATE SCHEMA {schema}");
    match sqlx::query(&sql).execute(pool).await {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err))
            if db_err.code().as_deref() == Some(SQLSTATE_DUPLICATE_SCHEMA) =>
        {
            tracing::warn!(event = "db.schema.duplicate", schema, "schema already exists");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// Plain (non-hypertable) table with a serial primary key, per spec §4.4's
/// `create_table` operation.
pub async fn create_table(
    pool: &PgPool,
    schema: &str,
    table: &str,
    columns: &ColumnTypes,
) -> anyhow::Result<()> {
    let mut columns_sql = "id SERIAL PRIMARY KEY".to_string();
    for (name, field_type) in columns {
        columns_sql.push_str(&format!(", {name} {} NULL", sql_type(*field_type)));
    }
    let sql = format!("CREATE TABLE {schema}.{table} ({columns_sql})");

    match sqlx::query(&sql).execute(pool).await {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err))
            if db_err.code().as_deref() == Some(SQLSTATE_DUPLICATE_TABLE) =>
        {
            tracing::warn!(event = "db.table.duplicate", schema, table, "table already exists");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// `CREATE TABLE` + `SELECT create_hypertable(...)`, the recovery path for
/// `InsertOutcome::NeedSchemaAndTable`.
pub async fn create_hypertable(
    pool: &PgPool,
    schema: &str,
    table: &str,
    column_time: &str,
    column_id: &str,
    columns: &ColumnTypes,
) -> anyhow::Result<()> {
    let mut columns_sql = format!("{column_time} TIMESTAMP NOT NULL, {column_id} VARCHAR NOT NULL");
    for (name, field_type) in columns {
        columns_sql.push_str(&format!(", {name} {} NULL", sql_type(*field_type)));
    }
    let create_sql = format!("CREATE TABLE {schema}.{table} ({columns_sql})");
    let hypertable_sql =
        format!("SELECT create_hypertable('{schema}.{table}', '{column_time}')");

    match sqlx::query(&create_sql).execute(pool).await {
        Ok(_) => {}
        Err(sqlx::Error::Database(db_err))
            if db_err.code().as_deref() == Some(SQLSTATE_INVALID_SCHEMA_NAME) =>
        {
            tracing::error!(event = "db.schema.missing", schema, "schema missing, creating it");
            create_schema(pool, schema).await?;
            return Ok(());
        }
        Err(sqlx::Error::Database(db_err))
            if db_err.code().as_deref() == Some(SQLSTATE_DUPLICATE_TABLE) =>
        {
            tracing::warn!(event = "db.hypertable.duplicate", schema, table, "hypertable already exists");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    }

    sqlx::query(&hypertable_sql).execute(pool).await?;
    Ok(())
}

/// `ALTER TABLE ... ADD COLUMN IF NOT EXISTS`, one statement per column —
/// TimescaleDB only accepts a single new column per `ALTER TABLE`.
pub async fn add_column(
    pool: &PgPool,
    schema: &str,
    table: &str,
    columns: &ColumnTypes,
) -> anyhow::Result<()> {
    for (name, field_type) in columns {
        let sql = format!(
            "ALTER TABLE {schema}.{table} ADD COLUMN IF NOT EXISTS {name} {}",
            sql_type(*field_type)
        );
        sqlx::query(&sql).execute(pool).await?;
    }
    Ok(())
}
