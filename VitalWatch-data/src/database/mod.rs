use thiserror::Error;

// Database modules
#[cfg(feature = "sqlite")]
pub mod connection;
#[cfg(feature = "sqlite")]
pub mod migrations;

// Re-export database connection functions
#[cfg(feature = "sqlite")]
pub use connection::*;

/// Database error enum
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Environment variable held an unusable value
    #[error("Database configuration error: {0}")]
    ConfigError(String),

    /// Connection pool could not be built
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    /// Migration error
    #[error("Database migration error: {0}")]
    MigrationError(String),

    /// SQLite connection pool error
    #[error("SQLite connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    /// SQLite error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
}

impl From<crate::env::InvalidVar> for DatabaseError {
    fn from(err: crate::env::InvalidVar) -> Self {
        DatabaseError::ConfigError(err.to_string())
    }
}
