//! Shared fixtures for the end-to-end referee tests.

use std::time::Duration;

use lib_referee::connections::InboundMessage;
use lib_referee::core::{MatchRecord, Referee, RefereeSettings, RelaySettings};
use tokio::sync::broadcast;

pub fn referee_with_match(match_secs: u64) -> Referee {
    Referee::new(&RefereeSettings {
        match_duration: Duration::from_secs(match_secs),
        ..RefereeSettings::default()
    })
}

/// Relay timings small enough for paused-clock tests.
pub fn quick_relay_settings() -> RelaySettings {
    RelaySettings {
        publish_interval: Duration::from_millis(100),
        reconnect_base_delay: Duration::from_millis(100),
        reconnect_max_delay: Duration::from_millis(400),
    }
}

pub fn hp_payload(hp: i64) -> Vec<u8> {
    serde_json::json!({
        "hp": hp,
        "uart_connect_state": 2,
        "video_fps": 30.0,
        "tx_rssi": -40.0,
        "rx_rssi": -42.0
    })
    .to_string()
    .into_bytes()
}

/// Waits for the next match record published on `topic`, skipping other
/// traffic seen on the tap.
pub async fn next_record(tap: &mut broadcast::Receiver<InboundMessage>, topic: &str) -> MatchRecord {
    loop {
        match tap.recv().await {
            Ok(msg) if msg.topic == topic => {
                return serde_json::from_slice(&msg.payload).expect("published record is valid JSON");
            }
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => panic!("bus closed"),
        }
    }
}

/// Polls `cond` on the paused clock until it holds, or panics after `limit`.
pub async fn wait_until(limit: Duration, mut cond: impl FnMut() -> bool) {
    let started = tokio::time::Instant::now();
    while !cond() {
        assert!(started.elapsed() < limit, "condition not met within {:?}", limit);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
