//! Penalty table and risk classification

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Points and fixed fine for one violation type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Penalty {
    pub points: u32,
    pub fine_amount: f64,
}

/// Applied when a violation type is not in the table
const DEFAULT_PENALTY: Penalty = Penalty {
    points: 5,
    fine_amount: 500.0,
};

/// Violation-type -> penalty lookup with a low-severity default.
///
/// Unknown types never abort a recording; they fall back to the default and
/// get logged.
#[derive(Debug, Clone)]
pub struct PenaltyTable {
    entries: HashMap<String, Penalty>,
}

impl Default for PenaltyTable {
    fn default() -> Self {
        let mut entries = HashMap::new();
        for (name, points, fine_amount) in [
            ("illegal_parking", 10, 1000.0),
            ("no_stopping", 12, 1500.0),
            ("handicap_zone", 20, 2500.0),
            ("loading_zone", 6, 800.0),
            ("red_light_running", 15, 2000.0),
            ("speeding", 8, 1200.0),
        ] {
            entries.insert(name.to_string(), Penalty { points, fine_amount });
        }
        Self { entries }
    }
}

impl PenaltyTable {
    /// Override or add one violation type's penalty
    pub fn set(&mut self, violation_type: impl Into<String>, penalty: Penalty) {
        self.entries.insert(violation_type.into(), penalty);
    }

    pub fn lookup(&self, violation_type: &str) -> Penalty {
        match self.entries.get(violation_type) {
            Some(p) => *p,
            None => {
                debug!(violation_type, "unknown violation type, default penalty");
                DEFAULT_PENALTY
            }
        }
    }
}

/// Driver risk bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Excellent => "excellent",
            RiskLevel::Good => "good",
            RiskLevel::Fair => "fair",
            RiskLevel::Poor => "poor",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Total over all scores in [0, 100]
pub fn risk_level(score: u32) -> RiskLevel {
    match score {
        90..=u32::MAX => RiskLevel::Excellent,
        70..=89 => RiskLevel::Good,
        50..=69 => RiskLevel::Fair,
        30..=49 => RiskLevel::Poor,
        _ => RiskLevel::Critical,
    }
}
