//! C1: MQTT broker source client.
//!
//! Grounded on `examples/original_source/utils/mqtt_wrapper.py`'s
//! connect/reconnect/reason-code handling, restructured the way
//! `rde-io::source_kafka::KafkaSource` turns a driver's own event loop into
//! a plain `mpsc` channel: one background task owns the connection, callers
//! just drain the channel.

pub mod config;

pub use config::BrokerConfig;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Incoming, MqttOptions};
use std::time::Duration;
use tokio::sync::mpsc;

const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// One received publish: topic plus the raw wire payload. `ingest-parser`
/// is what decodes the bytes, not this crate.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Mirrors the states rumqttc's event stream walks through (spec §4.1):
/// `Disconnected -> Connecting -> Connected -> (Disconnected | Failed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

fn connect_reason_phrase(code: ConnectReturnCode) -> &'static str {
    match code {
        ConnectReturnCode::Success => "connection successful",
        ConnectReturnCode::RefusedProtocolVersion => {
            "connection refused - incorrect protocol version"
        }
        ConnectReturnCode::BadClientId => "connection refused - invalid client identifier",
        ConnectReturnCode::ServiceUnavailable => "connection refused - server unavailable",
        ConnectReturnCode::BadUserNamePassword => {
            "connection refused - bad username or password"
        }
        ConnectReturnCode::NotAuthorized => "connection refused - not authorised",
    }
}

pub struct MqttSource {
    config: BrokerConfig,
}

impl MqttSource {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }

    /// Spawn the subscribe loop and hand back the channel it feeds. Every
    /// subscribed topic funnels into this one channel; `ingest::queue` is
    /// what fans messages back out by topic (spec §4.2).
    pub fn stream(self) -> mpsc::Receiver<BrokerMessage> {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        tokio::spawn(run(self.config, tx));
        rx
    }
}

fn build_client(config: &BrokerConfig) -> (AsyncClient, EventLoop) {
    let mut opts = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
    opts.set_keep_alive(Duration::from_secs(config.keepalive_secs));
    opts.set_clean_session(config.clean_session);
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        opts.set_credentials(username.clone(), password.clone());
    }
    AsyncClient::new(opts, config.event_capacity)
}

/// Owns one broker connection for its lifetime. On any `poll()` error or a
/// broker-initiated disconnect, the whole client/event-loop pair is
/// dropped and rebuilt after `RECONNECT_BACKOFF` — equivalent to the
/// original's `disconnect(); loop_stop(); reconnect(); loop_start()`, since
/// rumqttc has no standalone reconnect call on an existing `EventLoop`.
async fn run(config: BrokerConfig, tx: mpsc::Sender<BrokerMessage>) {
    loop {
        let (client, mut event_loop) = build_client(&config);

        for topic in &config.topics {
            if let Err(err) = client.subscribe(topic, config.qos()).await {
                tracing::error!(event = "broker.subscribe.failed", topic, error = %err, "subscribe failed");
            }
        }

        let disconnect_reason = drain(&mut event_loop, &tx).await;
        tracing::warn!(event = "broker.disconnected", reason = ?disconnect_reason, "mqtt connection lost, reconnecting");
        tokio::time::sleep(RECONNECT_BACKOFF).await;
    }
}

enum DisconnectReason {
    BrokerInitiated,
    PollError,
    ChannelClosed,
}

impl std::fmt::Debug for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DisconnectReason::BrokerInitiated => "broker_initiated",
            DisconnectReason::PollError => "poll_error",
            DisconnectReason::ChannelClosed => "channel_closed",
        };
        write!(f, "{label}")
    }
}

/// Drain one connection's events into `tx` until it disconnects, errors, or
/// the receiving end is gone.
async fn drain(event_loop: &mut EventLoop, tx: &mpsc::Sender<BrokerMessage>) -> DisconnectReason {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                tracing::info!(
                    event = "broker.connected",
                    reason = connect_reason_phrase(ack.code),
                    "connected to mqtt broker"
                );
            }
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                tracing::debug!(event = "broker.message.received", topic = %publish.topic, "received message");
                let message = BrokerMessage {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                };
                if tx.send(message).await.is_err() {
                    return DisconnectReason::ChannelClosed;
                }
            }
            Ok(Event::Incoming(Incoming::Disconnect)) => {
                return DisconnectReason::BrokerInitiated;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(event = "broker.poll_error", error = %err, "mqtt event loop error");
                return DisconnectReason::PollError;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos_maps_to_rumqttc_levels() {
        let mut config = BrokerConfig::default();
        config.qos = 0;
        assert_eq!(config.qos(), rumqttc::QoS::AtMostOnce);
        config.qos = 1;
        assert_eq!(config.qos(), rumqttc::QoS::AtLeastOnce);
        config.qos = 2;
        assert_eq!(config.qos(), rumqttc::QoS::ExactlyOnce);
    }

    #[test]
    fn empty_client_id_implies_clean_session() {
        let config = BrokerConfig::default();
        assert!(config.client_id.is_empty());
        assert!(config.clean_session);
    }

    #[test]
    fn reason_phrases_match_every_connect_return_code() {
        assert_eq!(
            connect_reason_phrase(ConnectReturnCode::Success),
            "connection successful"
        );
        assert_eq!(
            connect_reason_phrase(ConnectReturnCode::NotAuthorized),
            "connection refused - not authorised"
        );
    }
}
