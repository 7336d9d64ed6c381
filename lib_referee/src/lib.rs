//! # lib_referee
//!
//! Match-state engine and telemetry relay of the robotics competition referee
//! console. Team devices publish telemetry on per-team topics; the engine
//! tracks their liveness, merges reported health into the authoritative
//! match record, runs the match clock and judges the result, and republishes
//! the record for display devices.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod connections;
pub mod core;
pub mod error;
pub mod ingestors;

pub use error::{DecodeError, RefereeError, TransportError};
