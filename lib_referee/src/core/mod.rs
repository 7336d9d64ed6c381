//! # Core Engine Module
//!
//! The match-state engine of the referee console.
//!
//! ## Core Components:
//!
//! - **`liveness`**: per-side one-second arrival windows; message rate and
//!   disconnect detection.
//! - **`record`**: the authoritative match record published to displays.
//! - **`evaluator`**: the per-tick health merge, countdown and verdict logic.
//! - **`referee`**: the shared, mutex-guarded handle that ingest, the clock,
//!   the publisher and the control surface all go through.
//! - **`relay`**: the transport session loop and the clock task.

/// Side selector and per-side pairs.
pub mod side;
/// Team telemetry snapshot.
pub mod report;
/// Arrival windows and per-side telemetry links.
pub mod liveness;
/// Authoritative match record and its wire form.
pub mod record;
/// Countdown and end-of-match evaluation.
pub mod evaluator;
/// Control-surface command set.
pub mod officiating;
/// Text views for operator displays.
pub mod display;
/// Shared referee state.
pub mod referee;
/// Transport session loop and clock task.
pub mod relay;

// --- Public API Re-exports ---
pub use side::{PerSide, Side};
pub use report::{TeamReport, UartState};
pub use liveness::{ArrivalWindow, TeamLink, RATE_WINDOW};
pub use record::{encode_record, LifecycleState, MatchRecord, TeamRecord, FULL_HEALTH};
pub use evaluator::{Evaluator, Verdict, DEFAULT_MATCH_DURATION};
pub use officiating::OfficiatingCommand;
pub use display::TeamStatusView;
pub use referee::{Referee, RefereeSettings};
pub use relay::{run_match_clock, Backoff, RefereeRelay, RelaySettings};
