//! Driver Scoring
//!
//! Durable per-driver behavior ledger:
//! - Lazily created scores starting at 100, clamped to [0, 100]
//! - Violation-type penalty table with a default for unknown types
//! - Risk level classification and slow point recovery
//! - Best-effort persistence through a store collaborator

pub mod engine;
pub mod penalty;

pub use engine::{DriverScore, ScoreStore, ScoringEngine, ViolationRecord};
pub use penalty::{risk_level, Penalty, PenaltyTable, RiskLevel};

use thiserror::Error;

/// Scoring errors
#[derive(Debug, Error)]
pub enum ScoringError {
    /// Persistence store temporarily unreachable; in-memory state remains
    /// the system of record
    #[error("Score store unavailable: {0}")]
    StoreUnavailable(String),
}
