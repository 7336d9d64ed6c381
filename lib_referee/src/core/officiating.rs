//! # Officiating Commands
//!
//! The actions a referee can take from the control surface, parsed from a
//! short text form so any front end (console, remote panel) can drive them.

use std::str::FromStr;
use std::time::Duration;

use crate::core::side::Side;

/// Lead-time presets offered by the control surface.
pub const LEAD_PRESETS: [(&str, u64); 3] = [("arm2m", 120), ("arm30", 30), ("arm5", 5)];

/// Longest lead time accepted from text input.
pub const MAX_LEAD_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfficiatingCommand {
    /// Back to a fresh match, orders both health resets.
    Reset,
    /// Arms the countdown with the given pre-match lead time.
    Arm(Duration),
    /// Head referee declares a draw.
    Draw,
    /// Red card: the carded side loses on the spot.
    RedCard(Side),
    YellowCard(Side),
    ResetHealth(Side),
    Rename(Side, String),
}

impl FromStr for OfficiatingCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or_else(|| "empty command".to_string())?.to_ascii_lowercase();

        if let Some((_, secs)) = LEAD_PRESETS.iter().find(|(name, _)| *name == verb) {
            return Ok(OfficiatingCommand::Arm(Duration::from_secs(*secs)));
        }

        let side = |word: Option<&str>| -> Result<Side, String> {
            word.ok_or_else(|| format!("'{}' needs a side (red|blue)", verb))?.parse()
        };

        match verb.as_str() {
            "reset" => Ok(OfficiatingCommand::Reset),
            "draw" => Ok(OfficiatingCommand::Draw),
            "arm" => {
                let secs = words
                    .next()
                    .ok_or_else(|| "'arm' needs a lead time in seconds".to_string())?
                    .parse::<u64>()
                    .map_err(|e| format!("invalid lead time: {}", e))?;
                if secs > MAX_LEAD_SECS {
                    return Err(format!("lead time {}s exceeds {}s", secs, MAX_LEAD_SECS));
                }
                Ok(OfficiatingCommand::Arm(Duration::from_secs(secs)))
            }
            "redcard" => Ok(OfficiatingCommand::RedCard(side(words.next())?)),
            "yellow" => Ok(OfficiatingCommand::YellowCard(side(words.next())?)),
            "resethp" => Ok(OfficiatingCommand::ResetHealth(side(words.next())?)),
            "name" => {
                let side = side(words.next())?;
                let name = words.collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    return Err("'name' needs a team name".to_string());
                }
                Ok(OfficiatingCommand::Rename(side, name))
            }
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}
