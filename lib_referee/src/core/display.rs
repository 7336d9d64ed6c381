//! Text views of the match for operator displays.

use crate::core::record::{LifecycleState, MatchRecord};
use crate::core::report::{TeamReport, UartState};
use crate::core::side::Side;

const NOT_CONNECTED: &str = "not connected";

/// `m:ss`, or `-m:ss` during the pre-match lead time.
pub fn format_countdown(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let abs = seconds.unsigned_abs();
    format!("{}{}:{:02}", sign, abs / 60, abs % 60)
}

pub fn state_label(state: LifecycleState) -> &'static str {
    match state {
        LifecycleState::InProgress => "in progress",
        LifecycleState::RedWins => "red wins",
        LifecycleState::BlueWins => "blue wins",
        LifecycleState::Draw => "draw",
    }
}

/// Everything an operator panel shows for one side.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamStatusView {
    pub side: Side,
    pub name: String,
    pub hp: i64,
    pub client: String,
    pub video: String,
    pub link: String,
    pub tx: String,
    pub rx: String,
}

impl TeamStatusView {
    pub fn build(side: Side, record: &MatchRecord, rate: Option<usize>, report: &TeamReport) -> Self {
        let team = record.team(side);
        Self {
            side,
            name: team.name.clone(),
            hp: team.hp,
            client: rate.map_or_else(|| NOT_CONNECTED.to_string(), |hz| format!("{}Hz", hz)),
            video: report
                .video_fps
                .map_or_else(|| NOT_CONNECTED.to_string(), |fps| format!("{:.0}fps", fps)),
            link: link_label(report.uart_connect_state).to_string(),
            tx: dbm(report.tx_rssi),
            rx: dbm(report.rx_rssi),
        }
    }

    pub fn line(&self) -> String {
        format!(
            "{:<4} {:<16} hp={:>3} | client {} | video {} | {} | TX {} | RX {}",
            self.side, self.name, self.hp, self.client, self.video, self.link, self.tx, self.rx
        )
    }
}

fn link_label(state: Option<UartState>) -> &'static str {
    match state {
        None | Some(UartState::Disconnected) => "USB disconnected",
        Some(UartState::WirelessDisconnected) => "wireless disconnected",
        Some(UartState::WirelessConnected) => "wireless connected",
    }
}

fn dbm(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_CONNECTED.to_string(), |v| format!("{:.0}dBm", v))
}

/// One-line summary of the clock and the result.
pub fn headline(record: &MatchRecord) -> String {
    if record.result_text.is_empty() {
        format!("{} [{}]", format_countdown(record.countdown), state_label(record.state))
    } else {
        format!(
            "{} [{}] {}",
            format_countdown(record.countdown),
            state_label(record.state),
            record.result_text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(0), "0:00");
        assert_eq!(format_countdown(180), "3:00");
        assert_eq!(format_countdown(65), "1:05");
        assert_eq!(format_countdown(-30), "-0:30");
        assert_eq!(format_countdown(-120), "-2:00");
    }

    #[test]
    fn test_unknown_report_renders_as_disconnected() {
        let record = MatchRecord::new("Red Team", "Blue Team");
        let view = TeamStatusView::build(Side::Red, &record, None, &TeamReport::unknown());
        assert_eq!(view.client, "not connected");
        assert_eq!(view.video, "not connected");
        assert_eq!(view.link, "USB disconnected");
        assert_eq!(view.tx, "not connected");
        assert_eq!(view.hp, 100);
    }

    #[test]
    fn test_connected_report_renders_values() {
        let record = MatchRecord::new("Red Team", "Blue Team");
        let report = TeamReport {
            hp: Some(70),
            uart_connect_state: Some(UartState::WirelessConnected),
            video_fps: Some(29.6),
            tx_rssi: Some(-41.2),
            rx_rssi: Some(-55.0),
        };
        let view = TeamStatusView::build(Side::Blue, &record, Some(10), &report);
        assert_eq!(view.name, "Blue Team");
        assert_eq!(view.client, "10Hz");
        assert_eq!(view.video, "30fps");
        assert_eq!(view.link, "wireless connected");
        assert_eq!(view.tx, "-41dBm");
        assert_eq!(view.rx, "-55dBm");
    }

    #[test]
    fn test_headline_includes_result() {
        let mut record = MatchRecord::new("R", "B");
        record.finish(LifecycleState::Draw, "time expired, equal health");
        assert_eq!(headline(&record), "0:00 [draw] time expired, equal health");
    }
}
