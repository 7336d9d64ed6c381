use std::time::Duration;

use lib_referee::core::{LifecycleState, OfficiatingCommand, Side, TeamReport};
use lib_referee::ingestors::{TelemetryIngestor, TopicMap};
use project_tests::{hp_payload, referee_with_match};
use tokio::time::Instant;

fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

#[tokio::test]
async fn test_lead_time_then_match_window() {
    let referee = referee_with_match(180);
    let t0 = Instant::now();
    referee.arm_countdown_at(Duration::from_secs(5), t0).unwrap();
    assert_eq!(referee.snapshot().countdown, -5);

    referee.tick_at(t0 + secs(2.0));
    assert_eq!(referee.snapshot().countdown, -3);

    referee.tick_at(t0 + secs(5.0));
    assert_eq!(referee.snapshot().countdown, 180);

    referee.tick_at(t0 + secs(65.0));
    let record = referee.snapshot();
    assert_eq!(record.countdown, 120);
    assert_eq!(record.state, LifecycleState::InProgress);
}

#[tokio::test]
async fn test_phase_boundary_rounding() {
    let referee = referee_with_match(180);
    let t0 = Instant::now();
    referee.arm_countdown_at(Duration::from_secs(30), t0).unwrap();

    referee.tick_at(t0 + secs(29.4));
    assert_eq!(referee.snapshot().countdown, -1);

    referee.tick_at(t0 + secs(29.6));
    assert_eq!(referee.snapshot().countdown, 180);
}

#[tokio::test]
async fn test_health_exhaustion_ends_match_through_ingest() {
    let referee = referee_with_match(180);
    let ingestor = TelemetryIngestor::new(referee.clone(), TopicMap::default());
    let t0 = Instant::now();
    referee.arm_countdown_at(Duration::from_secs(5), t0).unwrap();

    assert_eq!(ingestor.handle("/red", &hp_payload(0)), Ok(Some(Side::Red)));
    assert_eq!(ingestor.handle("/blue", &hp_payload(64)), Ok(Some(Side::Blue)));

    let verdict = referee.tick().expect("red health exhausted ends the match");
    assert_eq!(verdict.state, LifecycleState::BlueWins);

    let record = referee.snapshot();
    assert_eq!(record.state, LifecycleState::BlueWins);
    assert_eq!(record.result_text, "red health exhausted");
    assert_eq!(record.countdown, 0);
    assert_eq!(record.teams.red.hp, 0);
    assert_eq!(record.teams.blue.hp, 64);
    assert_eq!(referee.deadline(), None);

    // Terminal state stays put while telemetry keeps arriving.
    ingestor.handle("/red", &hp_payload(100)).unwrap();
    assert_eq!(referee.tick(), None);
    assert_eq!(referee.snapshot().state, LifecycleState::BlueWins);
}

#[tokio::test]
async fn test_time_expiry_compares_health() {
    let referee = referee_with_match(180);
    let t0 = Instant::now();
    referee.arm_countdown_at(Duration::ZERO, t0).unwrap();
    referee.ingest_at(Side::Red, TeamReport { hp: Some(80), ..TeamReport::unknown() }, t0 + secs(179.5));
    referee.ingest_at(Side::Blue, TeamReport { hp: Some(81), ..TeamReport::unknown() }, t0 + secs(179.5));

    assert_eq!(referee.tick_at(t0 + secs(179.9)), None);
    let verdict = referee.tick_at(t0 + secs(180.0)).expect("deadline reached");
    assert_eq!(verdict.state, LifecycleState::BlueWins);
    assert_eq!(verdict.text, "time expired, blue ahead on health");
}

#[tokio::test]
async fn test_disconnect_keeps_last_health() {
    let referee = referee_with_match(180);
    let t0 = Instant::now();
    referee.ingest_at(Side::Red, TeamReport { hp: Some(55), ..TeamReport::unknown() }, t0);

    referee.tick_at(t0 + secs(0.5));
    assert_eq!(referee.snapshot().teams.red.hp, 55);
    assert_eq!(referee.rate_at(Side::Red, t0 + secs(0.5)), Some(1));

    referee.tick_at(t0 + secs(1.1));
    assert_eq!(referee.rate_at(Side::Red, t0 + secs(1.1)), None);
    assert!(referee.report(Side::Red).is_unknown());
    assert_eq!(referee.snapshot().teams.red.hp, 55);

    let view = referee.team_status_at(Side::Red, t0 + secs(1.1));
    assert_eq!(view.client, "not connected");
    assert_eq!(view.link, "USB disconnected");
}

#[tokio::test]
async fn test_out_of_range_health_is_clamped() {
    let referee = referee_with_match(180);
    let t0 = Instant::now();
    referee.ingest_at(Side::Blue, TeamReport { hp: Some(250), ..TeamReport::unknown() }, t0);
    referee.tick_at(t0);
    assert_eq!(referee.snapshot().teams.blue.hp, 100);
}

#[tokio::test]
async fn test_officiating_sequence() {
    let referee = referee_with_match(180);
    for line in ["name blue Steel Owls", "arm30", "yellow red", "redcard blue"] {
        referee.apply(line.parse::<OfficiatingCommand>().unwrap()).unwrap();
    }
    let record = referee.snapshot();
    assert_eq!(record.teams.blue.name, "Steel Owls");
    assert!(record.teams.red.yellow_card_ms > 0);
    assert_eq!(record.state, LifecycleState::RedWins);
    assert_eq!(referee.deadline(), None);

    referee.apply(OfficiatingCommand::Reset).unwrap();
    let record = referee.snapshot();
    assert_eq!(record.state, LifecycleState::InProgress);
    assert_eq!(record.result_text, "");
    assert_eq!(record.teams.red.yellow_card_ms, 0);
    assert!(record.teams.red.reset_hp_ms > 0);
    assert_eq!(record.teams.blue.name, "Steel Owls");
}
