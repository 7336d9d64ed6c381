//! # Referee Handle
//!
//! The match record, both telemetry links and the evaluator form one group of
//! shared mutable state. It sits behind a single mutex with short critical
//! sections: every method locks, reads or mutates, and returns. The lock is
//! never held across an `.await`, so ingest from the transport task never
//! waits on a tick for longer than one evaluator step.
//!
//! Each operation that depends on time has an `_at` variant taking the
//! instant (and, where relevant, the epoch-millisecond wall clock) explicitly.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::core::display::TeamStatusView;
use crate::core::evaluator::{Evaluator, Verdict, DEFAULT_MATCH_DURATION};
use crate::core::liveness::TeamLink;
use crate::core::officiating::OfficiatingCommand;
use crate::core::record::{LifecycleState, MatchRecord, FULL_HEALTH};
use crate::core::report::TeamReport;
use crate::core::side::{PerSide, Side};
use crate::error::RefereeError;

/// Match parameters fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct RefereeSettings {
    pub match_duration: Duration,
    pub red_name: String,
    pub blue_name: String,
}

impl Default for RefereeSettings {
    fn default() -> Self {
        Self {
            match_duration: DEFAULT_MATCH_DURATION,
            red_name: "Red Team".to_string(),
            blue_name: "Blue Team".to_string(),
        }
    }
}

struct RefereeState {
    record: MatchRecord,
    links: PerSide<TeamLink>,
    evaluator: Evaluator,
}

/// Cheap-to-clone handle onto the shared referee state.
#[derive(Clone)]
pub struct Referee {
    inner: Arc<Mutex<RefereeState>>,
}

/// Current wall clock in epoch milliseconds, as stamped into the record.
pub fn epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Referee {
    pub fn new(settings: &RefereeSettings) -> Self {
        let state = RefereeState {
            record: MatchRecord::new(settings.red_name.clone(), settings.blue_name.clone()),
            links: PerSide::from_fn(TeamLink::new),
            evaluator: Evaluator::new(settings.match_duration),
        };
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefereeState> {
        self.inner.lock().expect("Referee lock poisoned")
    }

    // --- Telemetry side ---

    /// Stores a freshly decoded report for `side` and stamps its arrival.
    pub fn ingest(&self, side: Side, report: TeamReport) {
        self.ingest_at(side, report, Instant::now());
    }

    pub fn ingest_at(&self, side: Side, report: TeamReport, now: Instant) {
        self.lock().links[side].accept(report, now);
    }

    /// Stamps an arrival for `side` without changing its report.
    pub fn record_arrival(&self, side: Side) {
        self.lock().links[side].record_arrival(Instant::now());
    }

    /// Messages received from `side` during the last second, `None` if the
    /// side is not connected.
    pub fn rate(&self, side: Side) -> Option<usize> {
        self.rate_at(side, Instant::now())
    }

    pub fn rate_at(&self, side: Side, now: Instant) -> Option<usize> {
        self.lock().links[side].rate(now)
    }

    /// Latest report from `side`, unknown once the side has gone quiet.
    pub fn report(&self, side: Side) -> TeamReport {
        self.report_at(side, Instant::now())
    }

    pub fn report_at(&self, side: Side, now: Instant) -> TeamReport {
        let mut state = self.lock();
        let link = &mut state.links[side];
        link.rate(now);
        link.report().clone()
    }

    /// Drops both sides' telemetry, as after the transport connection is lost.
    pub fn reset_telemetry(&self) {
        let mut state = self.lock();
        for side in Side::ALL {
            state.links[side].reset();
        }
    }

    // --- Clock ---

    /// One evaluator step at the current instant.
    pub fn tick(&self) -> Option<Verdict> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&self, now: Instant) -> Option<Verdict> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.evaluator.tick(&mut state.record, &mut state.links, now)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.lock().evaluator.deadline()
    }

    // --- Reads ---

    pub fn snapshot(&self) -> MatchRecord {
        self.lock().record.clone()
    }

    pub fn team_status(&self, side: Side) -> TeamStatusView {
        self.team_status_at(side, Instant::now())
    }

    pub fn team_status_at(&self, side: Side, now: Instant) -> TeamStatusView {
        let mut state = self.lock();
        let rate = state.links[side].rate(now);
        TeamStatusView::build(side, &state.record, rate, state.links[side].report())
    }

    // --- Control surface ---

    /// Back to a fresh match: clock and result cleared, full health, no cards,
    /// health-reset ordered for both sides, deadline disarmed.
    pub fn reset_match(&self) {
        self.reset_match_at(epoch_ms());
    }

    pub fn reset_match_at(&self, wall_ms: i64) {
        let mut state = self.lock();
        state.evaluator.disarm();
        state.record.finish(LifecycleState::InProgress, "");
        for side in Side::ALL {
            let team = &mut state.record.teams[side];
            team.hp = FULL_HEALTH;
            team.yellow_card_ms = 0;
            team.reset_hp_ms = wall_ms;
        }
        log::info!("Match reset.");
    }

    /// Arms the deadline `lead + match duration` from now.
    pub fn arm_countdown(&self, lead: Duration) -> Result<(), RefereeError> {
        self.arm_countdown_at(lead, Instant::now())
    }

    pub fn arm_countdown_at(&self, lead: Duration, now: Instant) -> Result<(), RefereeError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.evaluator.arm(&mut state.record, lead, now)
    }

    /// Writes an outcome directly and disarms the deadline.
    pub fn force_result(&self, outcome: LifecycleState, text: impl Into<String>) {
        let text = text.into();
        let mut state = self.lock();
        state.evaluator.disarm();
        state.record.finish(outcome, text.clone());
        log::info!("Result forced: {:?} ({}).", outcome, text);
    }

    pub fn declare_draw(&self) {
        self.force_result(LifecycleState::Draw, "head referee declared a draw");
    }

    /// The carded side forfeits the match.
    pub fn red_card(&self, side: Side) {
        let winner = side.opponent();
        self.force_result(
            LifecycleState::win_for(winner),
            format!("head referee ruling, {} wins", winner),
        );
    }

    pub fn yellow_card(&self, side: Side) {
        self.yellow_card_at(side, epoch_ms());
    }

    pub fn yellow_card_at(&self, side: Side, wall_ms: i64) {
        self.lock().record.teams[side].yellow_card_ms = wall_ms;
        log::info!("Yellow card issued to {}.", side);
    }

    /// Orders the side's client to restore its health. Only the stamp changes
    /// here; the restored value arrives with the next telemetry.
    pub fn reset_health(&self, side: Side) {
        self.reset_health_at(side, epoch_ms());
    }

    pub fn reset_health_at(&self, side: Side, wall_ms: i64) {
        self.lock().record.teams[side].reset_hp_ms = wall_ms;
        log::info!("Health reset ordered for {}.", side);
    }

    pub fn rename_team(&self, side: Side, name: impl Into<String>) {
        let name = name.into();
        log::info!("Renaming {} to '{}'.", side, name);
        self.lock().record.teams[side].name = name;
    }

    /// Dispatches a parsed control-surface command.
    pub fn apply(&self, command: OfficiatingCommand) -> Result<(), RefereeError> {
        match command {
            OfficiatingCommand::Arm(lead) => return self.arm_countdown(lead),
            OfficiatingCommand::Reset => self.reset_match(),
            OfficiatingCommand::Draw => self.declare_draw(),
            OfficiatingCommand::RedCard(side) => self.red_card(side),
            OfficiatingCommand::YellowCard(side) => self.yellow_card(side),
            OfficiatingCommand::ResetHealth(side) => self.reset_health(side),
            OfficiatingCommand::Rename(side, name) => self.rename_team(side, name),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn referee() -> Referee {
        Referee::new(&RefereeSettings::default())
    }

    #[test]
    fn test_reset_is_idempotent_and_disarms() {
        let referee = referee();
        let now = Instant::now();
        referee.arm_countdown_at(Duration::from_secs(30), now).unwrap();
        referee.yellow_card_at(Side::Red, 42);
        assert!(referee.deadline().is_some());

        referee.reset_match_at(1_000);
        let once = referee.snapshot();
        referee.reset_match_at(1_000);
        let twice = referee.snapshot();

        assert_eq!(once, twice);
        assert_eq!(referee.deadline(), None);
        assert_eq!(once.countdown, 0);
        assert_eq!(once.state, LifecycleState::InProgress);
        assert_eq!(once.teams.red.yellow_card_ms, 0);
        assert_eq!(once.teams.red.reset_hp_ms, 1_000);
        assert_eq!(once.teams.blue.reset_hp_ms, 1_000);
        assert_eq!(once.teams.blue.hp, FULL_HEALTH);
    }

    #[test]
    fn test_force_result_clears_armed_deadline() {
        let referee = referee();
        referee.arm_countdown_at(Duration::from_secs(5), Instant::now()).unwrap();
        referee.red_card(Side::Red);

        let record = referee.snapshot();
        assert_eq!(record.state, LifecycleState::BlueWins);
        assert_eq!(record.result_text, "head referee ruling, blue wins");
        assert_eq!(record.countdown, 0);
        assert_eq!(referee.deadline(), None);

        referee.declare_draw();
        assert_eq!(referee.snapshot().state, LifecycleState::Draw);
    }

    #[test]
    fn test_arm_from_terminal_restarts_match() {
        let referee = referee();
        referee.declare_draw();
        let now = Instant::now();
        referee.arm_countdown_at(Duration::from_secs(30), now).unwrap();

        let record = referee.snapshot();
        assert_eq!(record.state, LifecycleState::InProgress);
        assert!(record.result_text.is_empty());
        assert_eq!(record.countdown, -30);
        assert_eq!(referee.deadline(), Some(now + Duration::from_secs(210)));
    }

    #[test]
    fn test_oversized_lead_is_rejected_and_lock_stays_usable() {
        let referee = referee();
        let result = referee.apply(OfficiatingCommand::Arm(Duration::from_secs(u64::MAX)));
        assert!(matches!(result, Err(RefereeError::Command(_))));
        assert_eq!(referee.deadline(), None);

        let record = referee.snapshot();
        assert_eq!(record.state, LifecycleState::InProgress);
        assert_eq!(record.countdown, 0);
        assert!(referee.tick().is_none());
    }

    #[test]
    fn test_record_arrival_counts_without_replacing_report() {
        let referee = referee();
        let now = Instant::now();
        referee.ingest_at(
            Side::Blue,
            TeamReport {
                hp: Some(77),
                ..TeamReport::unknown()
            },
            now,
        );
        referee.record_arrival(Side::Blue);
        assert_eq!(referee.rate(Side::Blue), Some(2));
        assert_eq!(referee.report(Side::Blue).hp, Some(77));
    }

    #[test]
    fn test_report_read_drops_stale_telemetry() {
        let referee = referee();
        let now = Instant::now();
        referee.ingest_at(
            Side::Red,
            TeamReport {
                hp: Some(40),
                ..TeamReport::unknown()
            },
            now,
        );
        assert_eq!(referee.report_at(Side::Red, now + Duration::from_millis(500)).hp, Some(40));
        assert!(referee.report_at(Side::Red, now + Duration::from_millis(1100)).is_unknown());
        assert_eq!(referee.rate_at(Side::Red, now + Duration::from_millis(1100)), None);
    }

    #[test]
    fn test_stamps_have_no_numeric_side_effect() {
        let referee = referee();
        referee.yellow_card_at(Side::Blue, 7);
        referee.reset_health_at(Side::Blue, 9);
        let record = referee.snapshot();
        assert_eq!(record.teams.blue.yellow_card_ms, 7);
        assert_eq!(record.teams.blue.reset_hp_ms, 9);
        assert_eq!(record.teams.blue.hp, FULL_HEALTH);
        assert_eq!(record.teams.red.yellow_card_ms, 0);
    }

    #[test]
    fn test_apply_rename_and_status() {
        let referee = referee();
        referee
            .apply(OfficiatingCommand::Rename(Side::Red, "Iron Giants".to_string()))
            .unwrap();
        let now = Instant::now();
        referee.ingest_at(
            Side::Red,
            TeamReport {
                video_fps: Some(25.0),
                ..TeamReport::unknown()
            },
            now,
        );
        let view = referee.team_status_at(Side::Red, now);
        assert_eq!(view.name, "Iron Giants");
        assert_eq!(view.client, "1Hz");
        assert_eq!(view.video, "25fps");
    }

    #[test]
    fn test_reset_telemetry_forgets_both_sides() {
        let referee = referee();
        let now = Instant::now();
        for side in Side::ALL {
            referee.ingest_at(side, TeamReport { hp: Some(50), ..TeamReport::unknown() }, now);
        }
        referee.reset_telemetry();
        for side in Side::ALL {
            assert!(referee.report(side).is_unknown());
            assert_eq!(referee.rate_at(side, now), None);
        }
    }
}
