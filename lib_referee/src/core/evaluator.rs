//! # Match Clock and Outcome Evaluator
//!
//! Runs once per tick. In order, it:
//! 1. merges the health each connected side reports into the match record,
//! 2. derives the displayed countdown from the armed deadline,
//! 3. checks end-of-match conditions and, when one fires, finalizes the record
//!    and disarms the deadline.
//!
//! Health exhaustion is judged before time expiry. A terminal result is
//! one-way until the control surface resets or re-arms the match.

use std::time::Duration;
use tokio::time::Instant;

use crate::core::liveness::TeamLink;
use crate::core::record::{LifecycleState, MatchRecord, FULL_HEALTH};
use crate::core::side::{PerSide, Side};
use crate::error::RefereeError;

/// Default length of the in-match window.
pub const DEFAULT_MATCH_DURATION: Duration = Duration::from_secs(180);

/// A terminal decision together with its description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub state: LifecycleState,
    pub text: String,
}

impl Verdict {
    fn new(state: LifecycleState, text: impl Into<String>) -> Self {
        Self { state, text: text.into() }
    }
}

/// Health policy: reported values are clamped into `[0, FULL_HEALTH]` before
/// they reach the match record.
pub fn clamp_health(hp: i64) -> i64 {
    hp.clamp(0, FULL_HEALTH)
}

/// Decides whether the match is over given both healths and the seconds left
/// before the deadline.
pub fn judge(red_hp: i64, blue_hp: i64, remaining_secs: f64) -> Option<Verdict> {
    match (red_hp <= 0, blue_hp <= 0) {
        (true, true) => Some(Verdict::new(LifecycleState::Draw, "both teams' health exhausted")),
        (true, false) => Some(Verdict::new(LifecycleState::BlueWins, "red health exhausted")),
        (false, true) => Some(Verdict::new(LifecycleState::RedWins, "blue health exhausted")),
        (false, false) if remaining_secs <= 0.0 => Some(if red_hp > blue_hp {
            Verdict::new(LifecycleState::RedWins, "time expired, red ahead on health")
        } else if blue_hp > red_hp {
            Verdict::new(LifecycleState::BlueWins, "time expired, blue ahead on health")
        } else {
            Verdict::new(LifecycleState::Draw, "time expired, equal health")
        }),
        (false, false) => None,
    }
}

/// Countdown shown for a given number of seconds left before the deadline.
///
/// While more than `match_secs` remain the lead time is running and the value
/// is negative, counting up to zero. Afterwards it counts down from
/// `match_secs` and never goes below zero.
pub fn display_countdown(remaining_secs: f64, match_secs: f64) -> i64 {
    let lead = (match_secs - remaining_secs).round();
    if lead < 0.0 {
        lead as i64
    } else {
        remaining_secs.round().max(0.0) as i64
    }
}

/// Owner of the match deadline.
#[derive(Debug, Clone)]
pub struct Evaluator {
    match_duration: Duration,
    deadline: Option<Instant>,
}

impl Evaluator {
    pub fn new(match_duration: Duration) -> Self {
        Self {
            match_duration,
            deadline: None,
        }
    }

    pub fn match_duration(&self) -> Duration {
        self.match_duration
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Starts a new countdown: `lead` seconds of pre-match time followed by the
    /// full match window.
    ///
    /// A lead time too large to place on the clock is rejected and leaves
    /// both the record and the deadline untouched.
    pub fn arm(&mut self, record: &mut MatchRecord, lead: Duration, now: Instant) -> Result<(), RefereeError> {
        let deadline = lead
            .checked_add(self.match_duration)
            .and_then(|total| now.checked_add(total))
            .ok_or_else(|| RefereeError::Command(format!("lead time of {}s is out of range", lead.as_secs())))?;
        self.deadline = Some(deadline);
        record.finish(LifecycleState::InProgress, "");
        record.countdown = -(lead.as_secs_f64().round() as i64);
        log::info!(
            "Countdown armed: {}s lead, {}s match.",
            lead.as_secs(),
            self.match_duration.as_secs()
        );
        Ok(())
    }

    /// Disarms the deadline without touching the record.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// One evaluator step. Returns the verdict if this tick ended the match.
    pub fn tick(
        &mut self,
        record: &mut MatchRecord,
        links: &mut PerSide<TeamLink>,
        now: Instant,
    ) -> Option<Verdict> {
        for side in Side::ALL {
            let link = &mut links[side];
            if link.rate(now).is_some() {
                if let Some(hp) = link.report().hp {
                    record.teams[side].hp = clamp_health(hp);
                }
            }
        }

        let deadline = self.deadline?;
        debug_assert!(
            !record.state.is_terminal(),
            "terminal state {:?} with an armed deadline",
            record.state
        );
        if record.state.is_terminal() {
            log::error!("Invariant violation: match is {:?} but a deadline is still armed.", record.state);
            self.deadline = None;
            return None;
        }

        let remaining = signed_secs_until(deadline, now);
        record.countdown = display_countdown(remaining, self.match_duration.as_secs_f64());

        let verdict = judge(record.teams.red.hp, record.teams.blue.hp, remaining)?;
        record.finish(verdict.state, verdict.text.clone());
        self.deadline = None;
        log::info!("Match finished: {:?} ({}).", verdict.state, verdict.text);
        Some(verdict)
    }
}

fn signed_secs_until(deadline: Instant, now: Instant) -> f64 {
    if deadline >= now {
        (deadline - now).as_secs_f64()
    } else {
        -(now - deadline).as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::report::TeamReport;

    fn links() -> PerSide<TeamLink> {
        PerSide::from_fn(TeamLink::new)
    }

    fn send_hp(links: &mut PerSide<TeamLink>, side: Side, hp: i64, now: Instant) {
        links[side].accept(
            TeamReport {
                hp: Some(hp),
                ..TeamReport::unknown()
            },
            now,
        );
    }

    #[test]
    fn test_judge_health_exhaustion_before_time() {
        for remaining in [50.0, 0.0, -3.0] {
            assert_eq!(judge(0, 0, remaining).unwrap().state, LifecycleState::Draw);
            assert_eq!(judge(-5, 40, remaining).unwrap().state, LifecycleState::BlueWins);
            assert_eq!(judge(40, 0, remaining).unwrap().state, LifecycleState::RedWins);
        }
        assert_eq!(judge(0, 0, 10.0).unwrap().text, "both teams' health exhausted");
        assert_eq!(judge(0, 1, 10.0).unwrap().text, "red health exhausted");
    }

    #[test]
    fn test_judge_time_expiry_compares_health() {
        assert_eq!(judge(60, 50, 1.0), None);
        assert_eq!(judge(60, 50, 0.0).unwrap().state, LifecycleState::RedWins);
        assert_eq!(judge(50, 60, -0.1).unwrap().state, LifecycleState::BlueWins);
        let tie = judge(70, 70, 0.0).unwrap();
        assert_eq!(tie.state, LifecycleState::Draw);
        assert_eq!(tie.text, "time expired, equal health");
    }

    #[test]
    fn test_display_countdown_phases() {
        assert_eq!(display_countdown(210.0, 180.0), -30);
        assert_eq!(display_countdown(195.4, 180.0), -15);
        assert_eq!(display_countdown(180.0, 180.0), 180);
        assert_eq!(display_countdown(42.6, 180.0), 43);
        assert_eq!(display_countdown(-2.0, 180.0), 0);
    }

    #[test]
    fn test_clamp_health_policy() {
        assert_eq!(clamp_health(-20), 0);
        assert_eq!(clamp_health(55), 55);
        assert_eq!(clamp_health(250), FULL_HEALTH);
    }

    #[test]
    fn test_arm_then_lead_then_match_window() {
        let start = Instant::now();
        let mut record = MatchRecord::new("R", "B");
        let mut links = links();
        let mut evaluator = Evaluator::new(DEFAULT_MATCH_DURATION);

        evaluator.arm(&mut record, Duration::from_secs(30), start).unwrap();
        assert_eq!(record.countdown, -30);

        evaluator.tick(&mut record, &mut links, start + Duration::from_secs(10));
        assert_eq!(record.countdown, -20);

        evaluator.tick(&mut record, &mut links, start + Duration::from_secs(30));
        assert_eq!(record.countdown, 180);

        evaluator.tick(&mut record, &mut links, start + Duration::from_secs(100));
        assert_eq!(record.countdown, 110);
        assert_eq!(record.state, LifecycleState::InProgress);

        let verdict = evaluator.tick(&mut record, &mut links, start + Duration::from_secs(210));
        assert_eq!(verdict.unwrap().state, LifecycleState::Draw);
        assert_eq!(record.countdown, 0);
        assert_eq!(evaluator.deadline(), None);

        // Frozen once terminal.
        evaluator.tick(&mut record, &mut links, start + Duration::from_secs(300));
        assert_eq!(record.countdown, 0);
        assert_eq!(record.state, LifecycleState::Draw);
    }

    #[test]
    fn test_health_merge_only_while_connected() {
        let start = Instant::now();
        let mut record = MatchRecord::new("R", "B");
        let mut links = links();
        let mut evaluator = Evaluator::new(DEFAULT_MATCH_DURATION);

        send_hp(&mut links, Side::Red, 64, start);
        evaluator.tick(&mut record, &mut links, start + Duration::from_millis(100));
        assert_eq!(record.teams.red.hp, 64);
        assert_eq!(record.teams.blue.hp, FULL_HEALTH);

        // Red goes quiet: the record keeps the last known value.
        evaluator.tick(&mut record, &mut links, start + Duration::from_secs(5));
        assert_eq!(record.teams.red.hp, 64);
        assert!(links[Side::Red].report().is_unknown());
    }

    #[test]
    fn test_exhaustion_ends_match_and_disarms() {
        let start = Instant::now();
        let mut record = MatchRecord::new("R", "B");
        let mut links = links();
        let mut evaluator = Evaluator::new(DEFAULT_MATCH_DURATION);

        evaluator.arm(&mut record, Duration::from_secs(5), start).unwrap();
        let t = start + Duration::from_secs(5);
        evaluator.tick(&mut record, &mut links, t);
        assert_eq!(record.countdown, 180);

        send_hp(&mut links, Side::Red, 0, t);
        let verdict = evaluator.tick(&mut record, &mut links, t + Duration::from_millis(100)).unwrap();
        assert_eq!(verdict.state, LifecycleState::BlueWins);
        assert_eq!(record.state, LifecycleState::BlueWins);
        assert_eq!(record.result_text, "red health exhausted");
        assert_eq!(record.countdown, 0);
        assert_eq!(evaluator.deadline(), None);
    }

    #[test]
    fn test_arm_rejects_unrepresentable_lead() {
        let start = Instant::now();
        let mut record = MatchRecord::new("R", "B");
        let mut evaluator = Evaluator::new(DEFAULT_MATCH_DURATION);
        record.finish(LifecycleState::RedWins, "red card");

        let result = evaluator.arm(&mut record, Duration::from_secs(u64::MAX), start);
        assert!(matches!(result, Err(RefereeError::Command(_))));
        assert_eq!(evaluator.deadline(), None);
        assert_eq!(record.state, LifecycleState::RedWins);
        assert_eq!(record.result_text, "red card");
    }

    #[test]
    fn test_no_verdict_without_deadline() {
        let now = Instant::now();
        let mut record = MatchRecord::new("R", "B");
        let mut links = links();
        let mut evaluator = Evaluator::new(DEFAULT_MATCH_DURATION);

        send_hp(&mut links, Side::Blue, 0, now);
        assert_eq!(evaluator.tick(&mut record, &mut links, now), None);
        assert_eq!(record.teams.blue.hp, 0);
        assert_eq!(record.state, LifecycleState::InProgress);
    }
}
