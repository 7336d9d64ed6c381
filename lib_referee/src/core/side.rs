//! # Competing Sides
//!
//! The two teams are addressed through a closed `Side` enum instead of string
//! keys, and any per-team state lives in a `PerSide<T>` pair indexed by it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// One of the two competing teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The red team, reporting on the red telemetry topic.
    Red,
    /// The blue team, reporting on the blue telemetry topic.
    Blue,
}

impl Side {
    /// Both sides, red first.
    pub const ALL: [Side; 2] = [Side::Red, Side::Blue];

    /// The other team.
    pub fn opponent(self) -> Side {
        match self {
            Side::Red => Side::Blue,
            Side::Blue => Side::Red,
        }
    }

    /// Lowercase name used on the wire and in the console.
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Red => "red",
            Side::Blue => "blue",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" | "r" => Ok(Side::Red),
            "blue" | "b" => Ok(Side::Blue),
            other => Err(format!("unknown side '{}', expected red or blue", other)),
        }
    }
}

/// A value held once per side. Serializes as `{"red": .., "blue": ..}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerSide<T> {
    pub red: T,
    pub blue: T,
}

impl<T> PerSide<T> {
    /// Builds both entries from a per-side factory, so no value is shared
    /// between the two teams.
    pub fn from_fn(mut f: impl FnMut(Side) -> T) -> Self {
        Self {
            red: f(Side::Red),
            blue: f(Side::Blue),
        }
    }
}

impl<T> Index<Side> for PerSide<T> {
    type Output = T;

    fn index(&self, side: Side) -> &T {
        match side {
            Side::Red => &self.red,
            Side::Blue => &self.blue,
        }
    }
}

impl<T> IndexMut<Side> for PerSide<T> {
    fn index_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Red => &mut self.red,
            Side::Blue => &mut self.blue,
        }
    }
}
