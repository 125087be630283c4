//! Storage Layer
//!
//! Provides SQLite persistence with repository pattern for violations,
//! driver scores, and applied-violation records. Insert-or-replace by key
//! plus read-by-key/list-recent; no multi-key transactions.

mod repository;

pub use repository::Repository;

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Record not found")]
    NotFound,
}
