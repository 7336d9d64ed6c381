//! # Liveness Tracker
//!
//! Each side keeps a one-second window of message arrival instants. The number
//! of arrivals left in the window after pruning is the side's message rate in
//! Hz; an empty window means the side is not connected.
//!
//! Pruning happens on every read (`prune_then_count`) and on every append, so
//! an idle side decays to "not connected" within one second of its last
//! message without any background timer.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::core::report::TeamReport;
use crate::core::side::Side;

/// Length of the sliding rate window.
pub const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Arrival instants for one side, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ArrivalWindow {
    arrivals: VecDeque<Instant>,
}

impl ArrivalWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an arrival and drops anything that has aged out.
    pub fn record(&mut self, now: Instant) {
        self.arrivals.push_back(now);
        self.prune(now);
    }

    /// Evicts every arrival older than `RATE_WINDOW` relative to `now`, then
    /// returns how many remain, or `None` if the window is empty.
    pub fn prune_then_count(&mut self, now: Instant) -> Option<usize> {
        self.prune(now);
        match self.arrivals.len() {
            0 => None,
            n => Some(n),
        }
    }

    pub fn clear(&mut self) {
        self.arrivals.clear();
    }

    // Arrivals are pushed in time order, so eviction is a prefix trim.
    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.arrivals.front() {
            if now.saturating_duration_since(*oldest) > RATE_WINDOW {
                self.arrivals.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Telemetry link of one side: its latest report and its arrival window.
#[derive(Debug, Clone)]
pub struct TeamLink {
    side: Side,
    report: TeamReport,
    window: ArrivalWindow,
}

impl TeamLink {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            report: TeamReport::unknown(),
            window: ArrivalWindow::new(),
        }
    }

    /// Replaces the report wholesale and stamps the arrival.
    pub fn accept(&mut self, report: TeamReport, now: Instant) {
        self.report = report;
        self.record_arrival(now);
    }

    pub fn record_arrival(&mut self, now: Instant) {
        self.window.record(now);
    }

    /// Current message rate in Hz, or `None` when nothing arrived during the
    /// last second. Going empty also drops the stale report.
    pub fn rate(&mut self, now: Instant) -> Option<usize> {
        let rate = self.window.prune_then_count(now);
        if rate.is_none() && !self.report.is_unknown() {
            log::info!("No telemetry from {} for {:?}, marking as not connected.", self.side, RATE_WINDOW);
            self.report = TeamReport::unknown();
        }
        rate
    }

    pub fn report(&self) -> &TeamReport {
        &self.report
    }

    /// Forgets all telemetry, as after a transport reset.
    pub fn reset(&mut self) {
        self.report = TeamReport::unknown();
        self.window.clear();
    }
}
