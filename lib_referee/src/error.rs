//! # Error Taxonomy
//!
//! Errors raised by the referee engine. None of them is fatal to the process:
//! decode errors drop a single message, transport errors trigger the relay's
//! reset-and-retry cycle, rejected control commands are reported back to the
//! operator, and configuration errors are surfaced to the binary
//! at startup.

use thiserror::Error;

/// A malformed inbound telemetry payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Telemetry decode error: {reason}")]
pub struct DecodeError {
    /// What the decoder rejected.
    pub reason: String,
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        Self { reason: e.to_string() }
    }
}

/// Failures of the pub/sub transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Connection closed: {0}")]
    Closed(String),
}

#[derive(Debug, Error)]
pub enum RefereeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Command rejected: {0}")]
    Command(String),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
