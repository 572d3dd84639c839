//! `source.mqtt.*` (spec §6).

use rumqttc::QoS;

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Empty client id implies `clean_session = true`, matching the
    /// original's `CLEAN = False if CLIENTID else True`.
    pub client_id: String,
    pub clean_session: bool,
    pub topics: Vec<String>,
    pub qos: u8,
    pub keepalive_secs: u64,
    /// Capacity of the channel `MqttSource::stream` hands back.
    pub channel_capacity: usize,
    /// Capacity of rumqttc's internal request channel.
    pub event_capacity: usize,
}

impl BrokerConfig {
    pub fn qos(&self) -> QoS {
        match self.qos {
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            _ => QoS::AtMostOnce,
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        let client_id = String::new();
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            username: None,
            password: None,
            clean_session: client_id.is_empty(),
            client_id,
            topics: Vec::new(),
            qos: 0,
            keepalive_secs: 60,
            channel_capacity: 1024,
            event_capacity: 10,
        }
    }
}
