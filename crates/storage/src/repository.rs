//! Repository Implementation

use crate::StorageError;
use driver_scoring::{DriverScore, ScoreStore, ScoringError, ViolationRecord};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;
use violation_engine::Violation;

/// Repository for data access (in-memory implementation for now).
///
/// The live pipeline treats memory as the system of record; this mirror
/// exists so violations and scores survive a clean process exit once the
/// SQLite backend lands.
pub struct Repository {
    /// Violations keyed by id, insert-or-replace
    violations: Mutex<HashMap<Uuid, Violation>>,
    /// Violation ids in insertion order, for list-recent
    violation_order: Mutex<Vec<Uuid>>,
    /// Driver ledgers keyed by driver id
    drivers: Mutex<HashMap<String, DriverScore>>,
    /// Applied-violation records (append-only, retention-bounded)
    score_events: Mutex<Vec<ViolationRecord>>,
    /// Max retained score events
    max_score_events: usize,
}

impl Repository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        info!("Creating in-memory repository");
        Self {
            violations: Mutex::new(HashMap::new()),
            violation_order: Mutex::new(Vec::new()),
            drivers: Mutex::new(HashMap::new()),
            score_events: Mutex::new(Vec::with_capacity(1000)),
            max_score_events: 10_000,
        }
    }

    /// Create a new repository backed by SQLite (placeholder)
    pub async fn with_sqlite(_db_path: &str) -> Result<Self, StorageError> {
        // In real implementation, we would use sqlx here:
        // let pool = SqlitePool::connect(db_path).await?;
        // Run migrations, setup WAL mode, etc.

        Ok(Self::new())
    }

    /// Insert or replace a violation by id
    pub fn upsert_violation(&self, violation: &Violation) -> Result<(), StorageError> {
        let mut violations = self
            .violations
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {e}")))?;
        let mut order = self
            .violation_order
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {e}")))?;

        if violations.insert(violation.id, violation.clone()).is_none() {
            order.push(violation.id);
        }
        debug!(violation_id = %violation.id, "violation upserted");
        Ok(())
    }

    /// Read a violation by id
    pub fn get_violation(&self, id: &Uuid) -> Result<Violation, StorageError> {
        self.violations
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {e}")))?
            .get(id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    /// Most recently inserted violations, newest first
    pub fn list_recent_violations(&self, limit: usize) -> Result<Vec<Violation>, StorageError> {
        let violations = self
            .violations
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {e}")))?;
        let order = self
            .violation_order
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {e}")))?;

        Ok(order
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| violations.get(id).cloned())
            .collect())
    }

    /// Insert or replace a driver ledger
    pub fn upsert_driver(&self, score: &DriverScore) -> Result<(), StorageError> {
        self.drivers
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {e}")))?
            .insert(score.driver_id.clone(), score.clone());
        Ok(())
    }

    /// Read a driver ledger by id
    pub fn get_driver(&self, driver_id: &str) -> Result<DriverScore, StorageError> {
        self.drivers
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {e}")))?
            .get(driver_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    /// Append an applied-violation record
    pub fn append_score_event(&self, record: &ViolationRecord) -> Result<(), StorageError> {
        let mut events = self
            .score_events
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {e}")))?;

        // Enforce retention
        if events.len() >= self.max_score_events {
            events.remove(0);
        }
        events.push(record.clone());
        Ok(())
    }

    /// Recent applied-violation records, newest first
    pub fn recent_score_events(&self, limit: usize) -> Result<Vec<ViolationRecord>, StorageError> {
        let events = self
            .score_events
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {e}")))?;
        Ok(events.iter().rev().take(limit).cloned().collect())
    }

    /// Stored violation count
    pub fn violation_count(&self) -> usize {
        self.violations.lock().map(|v| v.len()).unwrap_or(0)
    }

    /// Stored driver count
    pub fn driver_count(&self) -> usize {
        self.drivers.lock().map(|d| d.len()).unwrap_or(0)
    }

    /// Clear all data (for testing)
    pub fn clear(&self) {
        if let Ok(mut v) = self.violations.lock() {
            v.clear();
        }
        if let Ok(mut o) = self.violation_order.lock() {
            o.clear();
        }
        if let Ok(mut d) = self.drivers.lock() {
            d.clear();
        }
        if let Ok(mut e) = self.score_events.lock() {
            e.clear();
        }
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreStore for Repository {
    fn save_score(&self, score: &DriverScore) -> Result<(), ScoringError> {
        self.upsert_driver(score)
            .map_err(|e| ScoringError::StoreUnavailable(e.to_string()))
    }

    fn save_violation(&self, record: &ViolationRecord) -> Result<(), ScoringError> {
        self.append_score_event(record)
            .map_err(|e| ScoringError::StoreUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use violation_engine::{ViolationStatus, ZoneType};

    fn violation(duration_secs: f64) -> Violation {
        Violation {
            id: Uuid::new_v4(),
            track_id: 1,
            zone_id: "zone_1".to_string(),
            zone_name: "Main St No Parking".to_string(),
            zone_type: ZoneType::NoParking,
            start_time: 0.0,
            end_time: None,
            duration_secs,
            license_plate: Some("ABC-1234".to_string()),
            fine_amount: 1550.0,
            status: ViolationStatus::Active,
        }
    }

    #[test]
    fn test_violation_insert_and_read_by_key() {
        let repo = Repository::new();
        let v = violation(8.0);

        repo.upsert_violation(&v).unwrap();
        let loaded = repo.get_violation(&v.id).unwrap();
        assert_eq!(loaded.fine_amount, 1550.0);
        assert_eq!(loaded.zone_id, "zone_1");
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let repo = Repository::new();
        let mut v = violation(8.0);
        repo.upsert_violation(&v).unwrap();

        v.duration_secs = 20.0;
        v.status = ViolationStatus::Resolved;
        repo.upsert_violation(&v).unwrap();

        assert_eq!(repo.violation_count(), 1);
        let loaded = repo.get_violation(&v.id).unwrap();
        assert_eq!(loaded.duration_secs, 20.0);
        assert_eq!(loaded.status, ViolationStatus::Resolved);
    }

    #[test]
    fn test_list_recent_newest_first() {
        let repo = Repository::new();
        let a = violation(1.0);
        let b = violation(2.0);
        repo.upsert_violation(&a).unwrap();
        repo.upsert_violation(&b).unwrap();

        let recent = repo.list_recent_violations(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, b.id);
    }

    #[test]
    fn test_missing_key_is_not_found() {
        let repo = Repository::new();
        assert!(matches!(
            repo.get_violation(&Uuid::new_v4()),
            Err(StorageError::NotFound)
        ));
        assert!(matches!(
            repo.get_driver("nobody"),
            Err(StorageError::NotFound)
        ));
    }

    #[test]
    fn test_driver_roundtrip_via_score_store() {
        let repo = Repository::new();
        let score = DriverScore {
            driver_id: "driver-1".to_string(),
            current_score: 90,
            total_violations: 1,
            total_fines: 1550.0,
            created_at: 0.0,
            updated_at: 8.0,
        };

        repo.save_score(&score).unwrap();
        let loaded = repo.get_driver("driver-1").unwrap();
        assert_eq!(loaded.current_score, 90);
        assert_eq!(repo.driver_count(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_constructor_placeholder() {
        let repo = Repository::with_sqlite("sqlite::memory:").await.unwrap();
        assert_eq!(repo.violation_count(), 0);
        assert_eq!(repo.driver_count(), 0);
    }

    #[test]
    fn test_score_event_retention() {
        let mut repo = Repository::new();
        repo.max_score_events = 5;

        for i in 0..10 {
            repo.append_score_event(&ViolationRecord {
                violation_id: Uuid::new_v4(),
                driver_id: "driver-1".to_string(),
                violation_type: "speeding".to_string(),
                points_deducted: 8,
                fine_amount: 1200.0,
                license_plate: None,
                timestamp: i as f64,
            })
            .unwrap();
        }

        let events = repo.recent_score_events(100).unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(events[0].timestamp, 9.0);
    }
}
