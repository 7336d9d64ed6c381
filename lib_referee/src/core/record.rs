//! # Match Record
//!
//! The single authoritative match state. It is what the publisher broadcasts
//! on the referee topic and what display devices render.

use serde::{Deserialize, Serialize};

use crate::core::side::{PerSide, Side};

/// Health every robot starts a match with.
pub const FULL_HEALTH: i64 = 100;

/// Lifecycle of a match. Encoded on the wire as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LifecycleState {
    InProgress,
    RedWins,
    BlueWins,
    Draw,
}

impl LifecycleState {
    /// The state in which `side` has won.
    pub fn win_for(side: Side) -> Self {
        match side {
            Side::Red => LifecycleState::RedWins,
            Side::Blue => LifecycleState::BlueWins,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != LifecycleState::InProgress
    }
}

impl TryFrom<u8> for LifecycleState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LifecycleState::InProgress),
            1 => Ok(LifecycleState::RedWins),
            2 => Ok(LifecycleState::BlueWins),
            3 => Ok(LifecycleState::Draw),
            other => Err(format!("match state out of range: {}", other)),
        }
    }
}

impl From<LifecycleState> for u8 {
    fn from(state: LifecycleState) -> u8 {
        match state {
            LifecycleState::InProgress => 0,
            LifecycleState::RedWins => 1,
            LifecycleState::BlueWins => 2,
            LifecycleState::Draw => 3,
        }
    }
}

/// Per-team part of the match record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRecord {
    /// Display name chosen by the operator.
    pub name: String,
    /// Authoritative health. Persists its last value after a disconnect.
    pub hp: i64,
    /// Epoch milliseconds of the most recent yellow card, 0 if none.
    pub yellow_card_ms: i64,
    /// Epoch milliseconds of the most recent health reset order, 0 if none.
    pub reset_hp_ms: i64,
}

impl TeamRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hp: FULL_HEALTH,
            yellow_card_ms: 0,
            reset_hp_ms: 0,
        }
    }
}

/// Authoritative match state, serialized as the referee topic payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Seconds on the clock. Negative while the pre-match lead time runs.
    pub countdown: i64,
    pub state: LifecycleState,
    /// Human-readable description of the result, empty while in progress.
    #[serde(rename = "txt")]
    pub result_text: String,
    #[serde(flatten)]
    pub teams: PerSide<TeamRecord>,
}

impl MatchRecord {
    pub fn new(red_name: impl Into<String>, blue_name: impl Into<String>) -> Self {
        Self {
            countdown: 0,
            state: LifecycleState::InProgress,
            result_text: String::new(),
            teams: PerSide {
                red: TeamRecord::new(red_name),
                blue: TeamRecord::new(blue_name),
            },
        }
    }

    pub fn team(&self, side: Side) -> &TeamRecord {
        &self.teams[side]
    }

    /// Writes a terminal (or in-progress) outcome and stops the clock display.
    pub(crate) fn finish(&mut self, state: LifecycleState, text: impl Into<String>) {
        self.state = state;
        self.result_text = text.into();
        self.countdown = 0;
    }
}

/// Serializes the record as the JSON payload published on the referee topic.
pub fn encode_record(record: &MatchRecord) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_layout() {
        let mut record = MatchRecord::new("Alpha", "Beta");
        record.countdown = -30;
        record.teams.blue.yellow_card_ms = 1_700_000_000_000;

        let value: serde_json::Value = serde_json::from_slice(&encode_record(&record).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "countdown": -30,
                "state": 0,
                "txt": "",
                "red": {"name": "Alpha", "hp": 100, "yellow_card_ms": 0, "reset_hp_ms": 0},
                "blue": {"name": "Beta", "hp": 100, "yellow_card_ms": 1_700_000_000_000i64, "reset_hp_ms": 0}
            })
        );
    }

    #[test]
    fn test_state_codes() {
        assert_eq!(u8::from(LifecycleState::RedWins), 1);
        assert_eq!(u8::from(LifecycleState::BlueWins), 2);
        assert_eq!(u8::from(LifecycleState::Draw), 3);
        assert_eq!(LifecycleState::win_for(Side::Blue), LifecycleState::BlueWins);
        assert!(!LifecycleState::InProgress.is_terminal());
        assert!(LifecycleState::try_from(4).is_err());
    }
}
