//! Writer configuration — `storage.<select>.*` (spec §6).

/// `database.timescale.pool.*`, mapped onto `sqlx::PgPoolOptions`.
///
/// The original DBUtils knobs (`maxcached`, `maxshared`, `maxusage`, `ping`)
/// don't have a direct sqlx equivalent — a `sqlx::Pool` doesn't keep idle
/// connections beyond `min_connections`/`max_connections` and pings on
/// acquire by default — so only the two that still mean something survive.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub mincached: u32,
    pub maxconnections: u32,
    /// `blocking = true` waits indefinitely for a free connection instead of
    /// failing fast; mapped to `PgPoolOptions::acquire_timeout`.
    pub blocking: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            mincached: 10,
            maxconnections: 10,
            blocking: true,
        }
    }
}

/// `storage.<select>.column.*` — the fixed columns every hypertable has.
#[derive(Debug, Clone)]
pub struct TableConfig {
    pub column_ts: String,
    pub column_id: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            column_ts: "timestamp".to_string(),
            column_id: "id".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub pool: PoolConfig,
    pub table: TableConfig,
}

impl DbConfig {
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.dbname
        )
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            user: String::new(),
            password: String::new(),
            dbname: String::new(),
            pool: PoolConfig::default(),
            table: TableConfig::default(),
        }
    }
}
