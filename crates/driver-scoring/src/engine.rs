//! Scoring engine and store collaborator

use crate::penalty::{Penalty, PenaltyTable};
use crate::ScoringError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Highest (cleanest) possible score
pub const MAX_SCORE: u32 = 100;

/// A driver's running ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverScore {
    pub driver_id: String,
    pub current_score: u32,
    pub total_violations: u32,
    pub total_fines: f64,
    pub created_at: f64,
    pub updated_at: f64,
}

impl DriverScore {
    fn new(driver_id: String, now: f64) -> Self {
        Self {
            driver_id,
            current_score: MAX_SCORE,
            total_violations: 0,
            total_fines: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Immutable record of one applied violation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub violation_id: Uuid,
    pub driver_id: String,
    pub violation_type: String,
    pub points_deducted: u32,
    pub fine_amount: f64,
    pub license_plate: Option<String>,
    pub timestamp: f64,
}

/// Persistence collaborator for scores and violation records.
///
/// Writes are best-effort mirrors of in-memory state; a failing store must
/// never block or roll back the live ledger.
pub trait ScoreStore: Send + Sync {
    fn save_score(&self, score: &DriverScore) -> Result<(), ScoringError>;

    fn save_violation(&self, record: &ViolationRecord) -> Result<(), ScoringError>;
}

/// Per-driver score/fine engine.
///
/// In-memory state is the system of record for live behavior; the optional
/// store is an eventually-consistent durable mirror.
pub struct ScoringEngine {
    penalties: PenaltyTable,
    scores: HashMap<String, DriverScore>,
    history: Vec<ViolationRecord>,
    store: Option<Arc<dyn ScoreStore>>,
}

impl ScoringEngine {
    pub fn new(penalties: PenaltyTable) -> Self {
        Self {
            penalties,
            scores: HashMap::new(),
            history: Vec::new(),
            store: None,
        }
    }

    /// Attach a persistence collaborator
    pub fn with_store(mut self, store: Arc<dyn ScoreStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Fetch a driver's ledger, creating it at a clean 100 on first contact
    pub fn get_or_create(&mut self, driver_id: &str, now: f64) -> DriverScore {
        self.scores
            .entry(driver_id.to_string())
            .or_insert_with(|| {
                info!(driver_id, "new driver ledger");
                DriverScore::new(driver_id.to_string(), now)
            })
            .clone()
    }

    pub fn get(&self, driver_id: &str) -> Option<DriverScore> {
        self.scores.get(driver_id).cloned()
    }

    /// Apply a violation using the penalty table's fine for the type
    pub fn apply_violation(
        &mut self,
        driver_id: &str,
        violation_type: &str,
        license_plate: Option<String>,
        now: f64,
    ) -> (DriverScore, ViolationRecord) {
        let penalty = self.penalties.lookup(violation_type);
        self.apply_penalty(driver_id, violation_type, penalty, license_plate, now)
    }

    /// Apply a violation whose fine was computed elsewhere (dynamic parking
    /// fines); points still come from the table
    pub fn apply_violation_with_fine(
        &mut self,
        driver_id: &str,
        violation_type: &str,
        fine_amount: f64,
        license_plate: Option<String>,
        now: f64,
    ) -> (DriverScore, ViolationRecord) {
        let penalty = Penalty {
            points: self.penalties.lookup(violation_type).points,
            fine_amount,
        };
        self.apply_penalty(driver_id, violation_type, penalty, license_plate, now)
    }

    fn apply_penalty(
        &mut self,
        driver_id: &str,
        violation_type: &str,
        penalty: Penalty,
        license_plate: Option<String>,
        now: f64,
    ) -> (DriverScore, ViolationRecord) {
        let score = self
            .scores
            .entry(driver_id.to_string())
            .or_insert_with(|| DriverScore::new(driver_id.to_string(), now));

        score.current_score = score.current_score.saturating_sub(penalty.points);
        score.total_violations += 1;
        score.total_fines += penalty.fine_amount;
        score.updated_at = now;

        let record = ViolationRecord {
            violation_id: Uuid::new_v4(),
            driver_id: driver_id.to_string(),
            violation_type: violation_type.to_string(),
            points_deducted: penalty.points,
            fine_amount: penalty.fine_amount,
            license_plate,
            timestamp: now,
        };

        info!(
            driver_id,
            violation_type,
            points = penalty.points,
            fine = penalty.fine_amount,
            new_score = score.current_score,
            "violation applied"
        );

        let score = score.clone();
        self.history.push(record.clone());
        self.persist(&score, &record);
        (score, record)
    }

    /// Slow score regeneration for clean-driving periods; caps at 100.
    /// Optional; violation recording never depends on it.
    pub fn recover_points(&mut self, driver_id: &str, points: u32, now: f64) -> Option<DriverScore> {
        let score = self.scores.get_mut(driver_id)?;
        let recovered = (score.current_score + points).min(MAX_SCORE);
        if recovered != score.current_score {
            debug!(driver_id, from = score.current_score, to = recovered, "points recovered");
            score.current_score = recovered;
            score.updated_at = now;
        }
        let score = score.clone();
        if let Some(store) = &self.store {
            if let Err(e) = store.save_score(&score) {
                warn!(driver_id, error = %e, "score persist failed, continuing in memory");
            }
        }
        Some(score)
    }

    /// Immutable violation history for one driver, newest last
    pub fn history_for(&self, driver_id: &str) -> Vec<ViolationRecord> {
        self.history
            .iter()
            .filter(|r| r.driver_id == driver_id)
            .cloned()
            .collect()
    }

    fn persist(&self, score: &DriverScore, record: &ViolationRecord) {
        let Some(store) = &self.store else {
            return;
        };
        // Best-effort: failures are logged, never rolled back in memory
        if let Err(e) = store.save_score(score) {
            warn!(driver_id = %score.driver_id, error = %e, "score persist failed, continuing in memory");
        }
        if let Err(e) = store.save_violation(record) {
            warn!(driver_id = %score.driver_id, error = %e, "violation persist failed, continuing in memory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::penalty::{risk_level, RiskLevel};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine() -> ScoringEngine {
        ScoringEngine::new(PenaltyTable::default())
    }

    #[test]
    fn test_fresh_driver_starts_clean() {
        let mut engine = engine();
        let score = engine.get_or_create("driver-1", 0.0);
        assert_eq!(score.current_score, 100);
        assert_eq!(score.total_violations, 0);
        assert_eq!(score.total_fines, 0.0);
    }

    #[test]
    fn test_single_violation_arithmetic() {
        let mut engine = ScoringEngine::new(PenaltyTable::default());
        let mut table = PenaltyTable::default();
        table.set("test_type", Penalty { points: 10, fine_amount: 100.0 });
        engine.penalties = table;

        let (score, record) = engine.apply_violation("driver-1", "test_type", None, 5.0);
        assert_eq!(score.current_score, 90);
        assert_eq!(score.total_fines, 100.0);
        assert_eq!(score.total_violations, 1);
        assert_eq!(record.points_deducted, 10);
        assert_eq!(record.fine_amount, 100.0);
    }

    #[test]
    fn test_score_clamps_at_zero() {
        let mut engine = ScoringEngine::new(PenaltyTable::default());
        let mut table = PenaltyTable::default();
        table.set("test_type", Penalty { points: 10, fine_amount: 100.0 });
        engine.penalties = table;

        let mut last = None;
        for i in 0..11 {
            let (score, _) = engine.apply_violation("driver-1", "test_type", None, i as f64);
            last = Some(score);
        }
        let last = last.unwrap();
        assert_eq!(last.current_score, 0);
        assert_eq!(last.total_violations, 11);
        assert_eq!(last.total_fines, 1100.0);
    }

    #[test]
    fn test_unknown_type_uses_default_penalty() {
        let mut engine = engine();
        let (score, record) = engine.apply_violation("driver-1", "hovering", None, 0.0);
        assert_eq!(record.points_deducted, 5);
        assert_eq!(record.fine_amount, 500.0);
        assert_eq!(score.current_score, 95);
    }

    #[test]
    fn test_dynamic_fine_override() {
        let mut engine = engine();
        let (score, record) =
            engine.apply_violation_with_fine("driver-1", "illegal_parking", 1550.0, None, 0.0);
        // Points from the table, fine from the dynamic formula
        assert_eq!(record.points_deducted, 10);
        assert_eq!(record.fine_amount, 1550.0);
        assert_eq!(score.total_fines, 1550.0);
    }

    #[test]
    fn test_recovery_caps_at_max() {
        let mut engine = engine();
        engine.apply_violation("driver-1", "loading_zone", None, 0.0); // -6
        let score = engine.recover_points("driver-1", 50, 10.0).unwrap();
        assert_eq!(score.current_score, 100);
        assert!(engine.recover_points("ghost", 10, 10.0).is_none());
    }

    #[test]
    fn test_risk_level_tracks_score() {
        let mut engine = engine();
        let (score, _) = engine.apply_violation("driver-1", "handicap_zone", None, 0.0); // -20
        assert_eq!(risk_level(score.current_score), RiskLevel::Good);
    }

    #[test]
    fn test_history_is_append_only() {
        let mut engine = engine();
        engine.apply_violation("driver-1", "speeding", None, 0.0);
        engine.apply_violation("driver-1", "speeding", None, 1.0);
        engine.apply_violation("driver-2", "speeding", None, 2.0);
        assert_eq!(engine.history_for("driver-1").len(), 2);
        assert_eq!(engine.history_for("driver-2").len(), 1);
    }

    struct FailingStore {
        attempts: AtomicUsize,
    }

    impl ScoreStore for FailingStore {
        fn save_score(&self, _: &DriverScore) -> Result<(), ScoringError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(ScoringError::StoreUnavailable("db offline".into()))
        }

        fn save_violation(&self, _: &ViolationRecord) -> Result<(), ScoringError> {
            Err(ScoringError::StoreUnavailable("db offline".into()))
        }
    }

    #[test]
    fn test_store_failure_never_blocks_ledger() {
        let store = Arc::new(FailingStore { attempts: AtomicUsize::new(0) });
        let mut engine =
            ScoringEngine::new(PenaltyTable::default()).with_store(store.clone());

        let (score, _) = engine.apply_violation("driver-1", "speeding", None, 0.0);
        // In-memory state updated despite the failing mirror
        assert_eq!(score.current_score, 92);
        assert!(store.attempts.load(Ordering::SeqCst) > 0);
    }
}
