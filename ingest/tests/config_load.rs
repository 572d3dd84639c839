//! Round-trips the config key tree from spec §6 through a real TOML file.

use ingest::config::Config;
use ingest::queue::BackpressurePolicy;
use std::io::Write;

#[test]
fn toml_file_overrides_defaults() {
    let toml = r#"
[app]
name = "telemetry-ingest"
version = "1.0.0"

[main]
number = 4

[source]
select = "mqtt"

[source.mqtt]
host = "broker.internal"
topics = ["sensors/temp", "sensors/humidity"]
qos = 1

[cache]
cordon = 2500

[storage]
select = "postgresql"

[storage.postgresql]
host = "timescale.internal"
dbname = "telemetry"

[storage.postgresql.message]
message_switch = true
"#;

    let path = std::env::temp_dir().join(format!("ingest-test-{}.toml", std::process::id()));
    let mut file = std::fs::File::create(&path).expect("create temp config");
    file.write_all(toml.as_bytes()).expect("write temp config");
    drop(file);

    let config = Config::load(&path).expect("load config");
    std::fs::remove_file(&path).ok();

    assert_eq!(config.app.name, "telemetry-ingest");
    assert_eq!(config.main.number, 4);
    assert_eq!(config.source.mqtt.host, "broker.internal");
    assert_eq!(config.source.mqtt.topics.len(), 2);
    assert_eq!(config.source.mqtt.qos, 1);
    assert_eq!(config.cache.cordon, 2500);
    assert_eq!(config.storage.postgresql.dbname, "telemetry");
    assert!(config.storage.postgresql.message.message_switch);
    // Untouched keys keep their spec-default values.
    assert_eq!(config.storage.postgresql.column.column_ts, "timestamp");
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let path = std::env::temp_dir().join("ingest-test-does-not-exist.toml");
    let config = Config::load(&path).expect("load falls back cleanly");
    assert_eq!(config.cache.cordon, 5000);
    assert_eq!(config.cache.backpressure, BackpressurePolicy::DropOldest);
}

#[test]
fn cache_backpressure_selects_block_policy() {
    let toml = r#"
[cache]
cordon = 100
backpressure = "block"
"#;

    let path = std::env::temp_dir().join(format!("ingest-test-block-{}.toml", std::process::id()));
    let mut file = std::fs::File::create(&path).expect("create temp config");
    file.write_all(toml.as_bytes()).expect("write temp config");
    drop(file);

    let config = Config::load(&path).expect("load config");
    std::fs::remove_file(&path).ok();

    assert_eq!(config.cache.backpressure, BackpressurePolicy::Block);
}
