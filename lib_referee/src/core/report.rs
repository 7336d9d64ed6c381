//! # Team Telemetry Report
//!
//! The latest decoded snapshot a competitor's device sent on its topic. Every
//! field is optional: a team that never reported, or whose link went quiet,
//! shows as "unknown" rather than as zero.

use serde::{Deserialize, Serialize};

/// Link state between the competitor's client and its robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum UartState {
    /// No serial device attached to the client.
    Disconnected,
    /// Serial device attached, wireless bridge not linked.
    WirelessDisconnected,
    /// Serial device attached and wireless bridge linked.
    WirelessConnected,
}

impl TryFrom<u8> for UartState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(UartState::Disconnected),
            1 => Ok(UartState::WirelessDisconnected),
            2 => Ok(UartState::WirelessConnected),
            other => Err(format!("uart_connect_state out of range: {}", other)),
        }
    }
}

impl From<UartState> for u8 {
    fn from(state: UartState) -> u8 {
        match state {
            UartState::Disconnected => 0,
            UartState::WirelessDisconnected => 1,
            UartState::WirelessConnected => 2,
        }
    }
}

/// Telemetry snapshot for one side. Replaced wholesale on every valid arrival.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamReport {
    /// Robot health as reported by the team's client.
    #[serde(default)]
    pub hp: Option<i64>,
    /// Serial/wireless link state.
    #[serde(default)]
    pub uart_connect_state: Option<UartState>,
    /// Video transmission frame rate.
    #[serde(default)]
    pub video_fps: Option<f64>,
    /// Transmit signal strength in dBm.
    #[serde(default)]
    pub tx_rssi: Option<f64>,
    /// Receive signal strength in dBm.
    #[serde(default)]
    pub rx_rssi: Option<f64>,
}

impl TeamReport {
    /// A fresh all-unknown report.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// True when no field has ever been filled in.
    pub fn is_unknown(&self) -> bool {
        *self == Self::unknown()
    }
}
