use std::sync::PoisonError;
use thiserror::Error;
use uuid::Uuid;

use crate::database::DatabaseError;

/// Error type for repository operations
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Stored version moved on since the record was read
    #[error("Version conflict on {id}: expected {expected}, found {found}")]
    Conflict { id: Uuid, expected: u64, found: u64 },

    /// Backing store cannot be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLite error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Stored value could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Lock error
    #[error("Lock error: {0}")]
    Lock(String),
}

impl RepositoryError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RepositoryError::Unavailable(_) | RepositoryError::Pool(_) => true,
            #[cfg(feature = "sqlite")]
            RepositoryError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    /// Whether the error means the store itself is gone rather than one call failing
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RepositoryError::Unavailable(_) | RepositoryError::Pool(_))
    }
}

impl<T> From<PoisonError<T>> for RepositoryError {
    fn from(error: PoisonError<T>) -> Self {
        RepositoryError::Lock(error.to_string())
    }
}
