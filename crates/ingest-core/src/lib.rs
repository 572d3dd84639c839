//! Shared domain types for the ingestion pipeline.
//!
//! This crate defines the cross-crate contract used by the broker client, the
//! parser, the database writer, and the pipeline binary: the telemetry
//! envelope, the parser's `InsertPlan` output, and a small shared error type.
//!
//! # API notes
//! `ingest-core` is an internal crate (`publish = false`).

pub mod envelope;
pub mod error;
pub mod plan;

pub use envelope::{Envelope, EnvelopeBatch, Field, FieldType, FieldValue};
pub use error::{Error, Result};
pub use plan::InsertPlan;
