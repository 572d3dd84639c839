use anyhow::Context;
use clap::Parser;
use ingest::config::{Cli, Config};
use ingest::pipeline::{self, start_source, start_wizard};
use ingest::queue::TopicQueueMap;
use ingest_broker::{BrokerConfig, MqttSource};
use ingest_db::{DbConfig, PoolConfig, TableConfig, Writer};
use ingest_parser::{ColumnConfig, Flow, LogForkConfig, ParserConfig};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config).context("load pipeline config")?;

    let filter = match &config.log.filter {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid log.filter: {directives}"))?,
        None => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(
        event = "ingest.starting",
        app = %config.app.name,
        version = %config.app.version,
        "starting ingestion pipeline"
    );

    let flow = Flow::from_str(&config.storage.select)
        .with_context(|| format!("unsupported storage flow: {}", config.storage.select))?;

    let pg = &config.storage.postgresql;
    let db_config = DbConfig {
        host: pg.host.clone(),
        port: pg.port,
        user: pg.user.clone(),
        password: pg.password.clone(),
        dbname: pg.dbname.clone(),
        pool: PoolConfig {
            mincached: pg.pool.mincached,
            maxconnections: pg.pool.maxconnections,
            blocking: pg.pool.blocking,
        },
        table: TableConfig {
            column_ts: pg.column.column_ts.clone(),
            column_id: pg.column.column_id.clone(),
        },
    };
    let writer = Arc::new(Mutex::new(Writer::connect(db_config).await));

    let parser_config = Arc::new(ParserConfig {
        column: ColumnConfig {
            column_ts: pg.column.column_ts.clone(),
            column_id: pg.column.column_id.clone(),
        },
        log: LogForkConfig {
            enabled: pg.message.message_switch,
            log_schema: pg.message.message_schema.clone(),
            log_table: pg.message.message_table.clone(),
            log_column: pg.message.message_column.clone(),
        },
    });

    let mqtt = &config.source.mqtt;
    let broker_config = BrokerConfig {
        host: mqtt.host.clone(),
        port: mqtt.port,
        username: mqtt.username.clone(),
        password: mqtt.password.clone(),
        client_id: mqtt.clientid.clone(),
        clean_session: mqtt.clean,
        topics: mqtt.topics.clone(),
        qos: mqtt.qos,
        keepalive_secs: mqtt.keepalive,
        ..Default::default()
    };
    let source = MqttSource::new(broker_config);

    let queues = Arc::new(TopicQueueMap::new(
        &mqtt.topics,
        config.cache.cordon,
        config.cache.backpressure,
    ));
    let shutdown = CancellationToken::new();

    let workers_per_topic = pipeline::worker_count(config.main.number);
    let worker_handles = start_wizard(
        queues.clone(),
        writer.clone(),
        flow,
        parser_config,
        workers_per_topic,
        shutdown.clone(),
    );

    tracing::info!(
        event = "ingest.workers.started",
        workers_per_topic,
        topics = mqtt.topics.len(),
        "worker pool started"
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(event = "ingest.shutdown", "shutdown signal received");
        }
        _ = start_source(source, queues, shutdown.clone()) => {
            tracing::warn!(event = "ingest.source.exited", "source loop exited");
        }
    }

    shutdown.cancel();
    for handle in worker_handles {
        let _ = handle.await;
    }

    Ok(())
}
