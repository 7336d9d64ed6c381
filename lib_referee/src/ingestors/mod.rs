//! # Data Ingestors Module
//!
//! Entry point for everything the competitors' devices send. The only source
//! today is the per-team telemetry topic pair.

/// Topic routing and payload decoding for team telemetry.
pub mod telemetry;

pub use telemetry::{decode_report, route_topic, TelemetryIngestor, TopicMap};
