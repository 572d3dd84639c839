//! C5: pipeline orchestration — the source loop and the worker pool.

use crate::queue::{TopicQueue, TopicQueueMap};
use anyhow::Context;
use ingest_broker::{BrokerMessage, MqttSource};
use ingest_db::{InsertStep, Writer};
use ingest_parser::{Flow, ParserConfig};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// `start_source()`: runs C1's subscribe loop, dispatching every inbound
/// message to its topic's queue until `shutdown` fires or the broker task
/// exits.
pub async fn start_source(source: MqttSource, queues: Arc<TopicQueueMap>, shutdown: CancellationToken) {
    let mut rx = source.stream();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            message = rx.recv() => {
                match message {
                    Some(BrokerMessage { topic, payload }) => queues.dispatch(&topic, payload).await,
                    None => return,
                }
            }
        }
    }
}

/// Workers per topic: `main.number` if positive, else the CPU count
/// (spec §4.5).
pub fn worker_count(configured: usize) -> usize {
    if configured > 0 {
        configured
    } else {
        num_cpus::get().max(1)
    }
}

/// `start_wizard()`: spawn `worker_count(N) * |topics|` identical drain-loop
/// workers, one task per worker.
pub fn start_wizard(
    queues: Arc<TopicQueueMap>,
    writer: Arc<Mutex<Writer>>,
    flow: Flow,
    parser_config: Arc<ParserConfig>,
    workers_per_topic: usize,
    shutdown: CancellationToken,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();
    for topic in queues.topics() {
        let Some(queue) = queues.queue(topic) else {
            continue;
        };
        for _ in 0..workers_per_topic {
            let topic = topic.to_string();
            let queue = queue.clone();
            let writer = writer.clone();
            let parser_config = parser_config.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                drain_loop(topic, queue, writer, flow, parser_config, shutdown).await;
            }));
        }
    }
    handles
}

/// One worker's loop (spec §4.5): block on `get`, decode, parse, insert
/// every resulting plan, log cost. Per-message failures are logged and the
/// worker moves to the next item — nothing here is fatal to the process.
async fn drain_loop(
    topic: String,
    queue: Arc<TopicQueue>,
    writer: Arc<Mutex<Writer>>,
    flow: Flow,
    parser_config: Arc<ParserConfig>,
    shutdown: CancellationToken,
) {
    loop {
        let (payload, size) = tokio::select! {
            _ = shutdown.cancelled() => return,
            item = queue.get() => item,
        };

        let start = Instant::now();
        if let Err(err) = handle_payload(&payload, flow, &parser_config, &writer).await {
            tracing::warn!(event = "worker.message.error", topic = %topic, error = %err, "dropping message");
        }
        tracing::info!(
            event = "worker.drained",
            topic = %topic,
            qsize = size,
            cost_ms = start.elapsed().as_millis() as u64,
            "drained one message"
        );
    }
}

async fn handle_payload(
    payload: &[u8],
    flow: Flow,
    parser_config: &ParserConfig,
    writer: &Mutex<Writer>,
) -> anyhow::Result<()> {
    let text = std::str::from_utf8(payload).context("payload is not utf-8")?;
    let raw: serde_json::Value = serde_json::from_str(text).context("payload is not json")?;
    let plans = ingest_parser::parse(flow, parser_config, raw)?;

    let mut writer = writer.lock().await;
    for (idx, plan) in plans.iter().enumerate() {
        if plan.is_empty() {
            continue;
        }
        let step = if idx == 0 {
            InsertStep::Primary
        } else {
            InsertStep::LogFork
        };
        if let Err(err) = writer.insert(plan, step).await {
            tracing::warn!(event = "worker.insert.failed", step = ?step, error = %err, "insert failed, batch dropped");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_honors_positive_configuration() {
        assert_eq!(worker_count(4), 4);
    }

    #[test]
    fn worker_count_falls_back_to_cpu_count() {
        assert!(worker_count(0) >= 1);
    }
}
