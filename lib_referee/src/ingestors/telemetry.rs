//! # Telemetry Ingestor
//!
//! Turns raw pub/sub messages into team reports. Each team publishes a JSON
//! object on its own topic; any other topic is ignored. A payload that does
//! not decode completely is rejected whole, so a bad message never leaves a
//! half-updated report behind.

use serde::Deserialize;

use crate::core::referee::Referee;
use crate::core::report::TeamReport;
use crate::core::side::Side;
use crate::error::DecodeError;

/// Topic names used on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMap {
    pub red: String,
    pub blue: String,
    /// Outbound topic for the match record.
    pub referee: String,
}

impl Default for TopicMap {
    fn default() -> Self {
        Self {
            red: "/red".to_string(),
            blue: "/blue".to_string(),
            referee: "/referee".to_string(),
        }
    }
}

impl TopicMap {
    /// Inbound topics to subscribe to.
    pub fn inbound(&self) -> Vec<String> {
        vec![self.red.clone(), self.blue.clone()]
    }
}

/// Maps an inbound topic to the side that publishes on it.
pub fn route_topic(topics: &TopicMap, topic: &str) -> Option<Side> {
    if topic == topics.red {
        Some(Side::Red)
    } else if topic == topics.blue {
        Some(Side::Blue)
    } else {
        None
    }
}

/// Decodes a telemetry payload. The payload must be a JSON object; unknown
/// keys are ignored and missing keys decode as unknown.
pub fn decode_report(payload: &[u8]) -> Result<TeamReport, DecodeError> {
    let value: serde_json::Value = serde_json::from_slice(payload)?;
    if !value.is_object() {
        return Err(DecodeError {
            reason: format!("expected a JSON object, got {}", value),
        });
    }
    Ok(TeamReport::deserialize(value)?)
}

/// Feeds decoded telemetry into the shared referee state.
#[derive(Clone)]
pub struct TelemetryIngestor {
    referee: Referee,
    topics: TopicMap,
}

impl TelemetryIngestor {
    pub fn new(referee: Referee, topics: TopicMap) -> Self {
        Self { referee, topics }
    }

    pub fn topics(&self) -> &TopicMap {
        &self.topics
    }

    /// Handles one inbound message. Returns the side it was credited to, or
    /// `None` when the topic is not a team topic.
    pub fn handle(&self, topic: &str, payload: &[u8]) -> Result<Option<Side>, DecodeError> {
        let Some(side) = route_topic(&self.topics, topic) else {
            log::trace!("Ignoring message on unrelated topic '{}'.", topic);
            return Ok(None);
        };
        let report = decode_report(payload)?;
        log::debug!("{} telemetry: {:?}", side, report);
        self.referee.ingest(side, report);
        Ok(Some(side))
    }
}
