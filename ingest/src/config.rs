//! TOML configuration — the key tree in spec §6, loaded with the `config`
//! crate the way `siem_clickhouse_ingestion::config` builds its `Config`.

use clap::Parser;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppSection {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MainSection {
    /// Workers per topic; `0` or unset means "use the CPU count".
    #[serde(default)]
    pub number: usize,
}

fn default_mqtt_host() -> String {
    "127.0.0.1".to_string()
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_clean() -> bool {
    true
}
fn default_qos() -> u8 {
    0
}
fn default_keepalive() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct MqttSourceSection {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub clientid: String,
    #[serde(default = "default_clean")]
    pub clean: bool,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default = "default_qos")]
    pub qos: u8,
    #[serde(default = "default_keepalive")]
    pub keepalive: u64,
}

impl Default for MqttSourceSection {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            username: None,
            password: None,
            clientid: String::new(),
            clean: default_clean(),
            topics: Vec::new(),
            qos: default_qos(),
            keepalive: default_keepalive(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceSection {
    #[serde(default = "default_source_select")]
    pub select: String,
    #[serde(default)]
    pub mqtt: MqttSourceSection,
}

fn default_source_select() -> String {
    "mqtt".to_string()
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            select: default_source_select(),
            mqtt: MqttSourceSection::default(),
        }
    }
}

fn default_cordon() -> usize {
    5000
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSection {
    #[serde(default = "default_cordon")]
    pub cordon: usize,
    /// `"drop-oldest"` (default) or `"block"` (spec §5).
    #[serde(default)]
    pub backpressure: crate::queue::BackpressurePolicy,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            cordon: default_cordon(),
            backpressure: crate::queue::BackpressurePolicy::default(),
        }
    }
}

fn default_mincached() -> u32 {
    10
}
fn default_maxconnections() -> u32 {
    10
}
fn default_blocking() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct PoolSection {
    #[serde(default = "default_mincached")]
    pub mincached: u32,
    #[serde(default)]
    pub maxcached: u32,
    #[serde(default)]
    pub maxshared: u32,
    #[serde(default = "default_maxconnections")]
    pub maxconnections: u32,
    #[serde(default = "default_blocking")]
    pub blocking: bool,
    #[serde(default)]
    pub maxusage: u32,
    #[serde(default)]
    pub ping: u32,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            mincached: default_mincached(),
            maxcached: 0,
            maxshared: 0,
            maxconnections: default_maxconnections(),
            blocking: default_blocking(),
            maxusage: 0,
            ping: 1,
        }
    }
}

fn default_column_ts() -> String {
    "timestamp".to_string()
}
fn default_column_id() -> String {
    "id".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ColumnSection {
    #[serde(default = "default_column_ts")]
    pub column_ts: String,
    #[serde(default = "default_column_id")]
    pub column_id: String,
}

impl Default for ColumnSection {
    fn default() -> Self {
        Self {
            column_ts: default_column_ts(),
            column_id: default_column_id(),
        }
    }
}

fn default_message_schema() -> String {
    "monitor".to_string()
}
fn default_message_table() -> String {
    "log".to_string()
}
fn default_message_column() -> Vec<String> {
    vec![
        "message".to_string(),
        "level".to_string(),
        "source".to_string(),
        "logpath".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct MessageSection {
    #[serde(default)]
    pub message_switch: bool,
    #[serde(default = "default_message_schema")]
    pub message_schema: String,
    #[serde(default = "default_message_table")]
    pub message_table: String,
    #[serde(default = "default_message_column")]
    pub message_column: Vec<String>,
}

impl Default for MessageSection {
    fn default() -> Self {
        Self {
            message_switch: false,
            message_schema: default_message_schema(),
            message_table: default_message_table(),
            message_column: default_message_column(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PostgresqlStorageSection {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_postgres_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub dbname: String,
    #[serde(default)]
    pub pool: PoolSection,
    #[serde(default)]
    pub column: ColumnSection,
    #[serde(default)]
    pub message: MessageSection,
}

fn default_postgres_port() -> u16 {
    5432
}

impl Default for PostgresqlStorageSection {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_postgres_port(),
            user: String::new(),
            password: String::new(),
            dbname: String::new(),
            pool: PoolSection::default(),
            column: ColumnSection::default(),
            message: MessageSection::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSection {
    #[serde(default = "default_storage_select")]
    pub select: String,
    #[serde(default)]
    pub postgresql: PostgresqlStorageSection,
}

fn default_storage_select() -> String {
    "postgresql".to_string()
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            select: default_storage_select(),
            postgresql: PostgresqlStorageSection::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogSection {
    /// `tracing_subscriber::EnvFilter` directives, e.g. `"ingest=debug,info"`.
    /// Falls back to `RUST_LOG` when unset (SPEC_FULL §6 AMBIENT).
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub main: MainSection,
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub log: LogSection,
}

impl Config {
    /// Load `path` as TOML, falling back to an all-defaults `Config` when
    /// the path doesn't exist (spec §6 leaves the source format
    /// unprescribed; this build uses TOML, per the pack's other pipeline
    /// configs).
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::warn!(event = "config.missing", path = %path.display(), "config file not found, using defaults");
            return Ok(Config::default());
        }

        let built = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("INGEST").separator("__"))
            .build()?;
        Ok(built.try_deserialize()?)
    }
}

/// CLI surface: only the config file location is recognized (spec §6: "exit
/// codes and CLI surface are out of scope" beyond that).
#[derive(Parser, Debug, Clone)]
#[command(name = "ingest")]
pub struct Cli {
    /// Path to the TOML pipeline configuration.
    #[arg(long, env = "INGEST_CONFIG", default_value = "config.toml")]
    pub config: std::path::PathBuf,
}
