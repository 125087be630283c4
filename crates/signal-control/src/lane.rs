//! Lane and junction state types

use crate::SignalError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Junction approach
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    North,
    East,
    South,
    West,
}

impl Lane {
    /// Fixed service order: N -> E -> S -> W -> N
    pub const ALL: [Lane; 4] = [Lane::North, Lane::East, Lane::South, Lane::West];

    /// Next lane in the round-robin cycle
    pub fn next(self) -> Lane {
        match self {
            Lane::North => Lane::East,
            Lane::East => Lane::South,
            Lane::South => Lane::West,
            Lane::West => Lane::North,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Lane::North => "north",
            Lane::East => "east",
            Lane::South => "south",
            Lane::West => "west",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lane {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "north" => Ok(Lane::North),
            "east" => Ok(Lane::East),
            "south" => Ok(Lane::South),
            "west" => Ok(Lane::West),
            other => Err(SignalError::InvalidLane(other.to_string())),
        }
    }
}

/// Light aspect shown to one lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightState {
    Red,
    Yellow,
    Green,
}

/// Observable state of one lane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneState {
    pub vehicle_count: u32,
    pub light: LightState,
    /// Remaining green time; 0 while not green
    pub green_remaining_secs: f64,
}

/// Snapshot of the whole junction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JunctionState {
    pub current_green: Lane,
    pub lanes: BTreeMap<Lane, LaneState>,
    pub emergency_mode: bool,
    pub emergency_lane: Option<Lane>,
    pub emergency_elapsed_secs: f64,
}

impl JunctionState {
    /// Lanes currently shown green
    pub fn green_lanes(&self) -> Vec<Lane> {
        self.lanes
            .iter()
            .filter(|(_, s)| s.light == LightState::Green)
            .map(|(l, _)| *l)
            .collect()
    }
}
