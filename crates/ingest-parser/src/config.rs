//! Parser configuration — the slice of `storage.<select>` the parser needs.

/// Fixed column identifiers (spec §6: `storage.<select>.column.*`).
#[derive(Debug, Clone)]
pub struct ColumnConfig {
    pub column_ts: String,
    pub column_id: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            column_ts: "timestamp".to_string(),
            column_id: "id".to_string(),
        }
    }
}

/// Log-fork settings (spec §6: `storage.<select>.message.*`).
#[derive(Debug, Clone)]
pub struct LogForkConfig {
    pub enabled: bool,
    pub log_schema: String,
    pub log_table: String,
    pub log_column: Vec<String>,
}

impl Default for LogForkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_schema: "monitor".to_string(),
            log_table: "log".to_string(),
            log_column: vec![
                "message".to_string(),
                "level".to_string(),
                "source".to_string(),
                "logpath".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParserConfig {
    pub column: ColumnConfig,
    pub log: LogForkConfig,
}
