//! Sentinel classification of insert failures (spec §9 redesign note):
//! the original dispatches on driver exception classes
//! (`UndefinedTable`/`UndefinedColumn`/`OperationalError`/`InterfaceError`);
//! here the same distinctions come from the Postgres `SQLSTATE` sqlx already
//! surfaces on `sqlx::Error::Database`.

/// Which plan a self-healing retry is repairing, so the recovery step knows
/// whether to use the primary `(schema, table)` or the log-fork one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertStep {
    Primary,
    LogFork,
}

/// The four outcomes `insert()` distinguishes and the ones DDL recovery
/// can't fix are treated as fatal for that plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    NeedSchemaAndTable,
    NeedColumns,
    Transient,
    Fatal,
}

const SQLSTATE_UNDEFINED_TABLE: &str = "42P01";
const SQLSTATE_UNDEFINED_COLUMN: &str = "42703";
pub(crate) const SQLSTATE_DUPLICATE_SCHEMA: &str = "42P06";
pub(crate) const SQLSTATE_DUPLICATE_TABLE: &str = "42P07";
pub(crate) const SQLSTATE_INVALID_SCHEMA_NAME: &str = "3F000";

pub(crate) fn classify(err: &sqlx::Error) -> InsertOutcome {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some(SQLSTATE_UNDEFINED_TABLE) => InsertOutcome::NeedSchemaAndTable,
            Some(SQLSTATE_UNDEFINED_COLUMN) => InsertOutcome::NeedColumns,
            _ => InsertOutcome::Fatal,
        },
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            InsertOutcome::Transient
        }
        _ => InsertOutcome::Fatal,
    }
}
