//! MQTT-to-TimescaleDB telemetry ingestion pipeline.
//!
//! Wires together `ingest-broker` (C1), the topic queue map (C2),
//! `ingest-parser` (C3), `ingest-db` (C4), and the worker pool that drives
//! them (C5).

pub mod config;
pub mod pipeline;
pub mod queue;
