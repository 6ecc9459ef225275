//! Database connection module for VitalWatch
//!
//! Builds the SQLite connection pool the repositories run on. A file-backed
//! database is used in production; an in-memory database backs the tests.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use tracing::info;

use super::migrations::run_sqlite_migrations;
use super::DatabaseError;
use crate::env::parse_var;

/// SQLite connection pool shared by the repositories
pub type SqlitePool = r2d2::Pool<SqliteConnectionManager>;

/// Database configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub sqlite_path: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "data/vitalwatch.db".to_string(),
            max_connections: 10,
            timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    /// Create a new database configuration from environment variables
    pub fn from_env() -> Result<Self, DatabaseError> {
        let defaults = Self::default();

        let sqlite_path = env::var("DB_SQLITE_PATH").unwrap_or(defaults.sqlite_path);
        let max_connections = parse_var("DB_MAX_CONNECTIONS", defaults.max_connections)?;
        let timeout_seconds = parse_var("DB_TIMEOUT_SECONDS", defaults.timeout_seconds)?;

        if max_connections == 0 {
            return Err(DatabaseError::ConfigError(
                "DB_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }

        info!(
            "Database configuration: path={}, max_connections={}, timeout={}s",
            sqlite_path, max_connections, timeout_seconds
        );

        Ok(Self {
            sqlite_path,
            max_connections,
            timeout_seconds,
        })
    }
}

/// Create a file-backed SQLite pool and bring its schema up to date
pub fn create_sqlite_pool(config: &DatabaseConfig) -> Result<SqlitePool, DatabaseError> {
    info!("Initializing SQLite database at: {}", config.sqlite_path);

    if let Some(parent) = Path::new(&config.sqlite_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            info!("Creating parent directory: {:?}", parent);
            fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(format!("cannot create {:?}: {}", parent, e))
            })?;
        }
    }

    let manager = SqliteConnectionManager::file(&config.sqlite_path)
        .with_flags(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE)
        .with_init(|conn| conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;"));

    let pool = r2d2::Pool::builder()
        .max_size(config.max_connections)
        .connection_timeout(Duration::from_secs(config.timeout_seconds))
        .build(manager)?;

    migrate(&pool)?;
    info!("SQLite connection pool created successfully");
    Ok(pool)
}

/// Create a single-connection in-memory SQLite pool.
///
/// Every in-memory connection is its own database, so the pool is capped at
/// one connection to keep all callers on the same schema.
pub fn create_in_memory_pool() -> Result<SqlitePool, DatabaseError> {
    info!("Initializing in-memory SQLite database");

    let pool = r2d2::Pool::builder()
        .max_size(1)
        .connection_timeout(Duration::from_secs(5))
        .build(SqliteConnectionManager::memory())?;

    migrate(&pool)?;
    Ok(pool)
}

fn migrate(pool: &SqlitePool) -> Result<(), DatabaseError> {
    let conn = pool.get()?;
    run_sqlite_migrations(&conn).map_err(DatabaseError::MigrationError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_pool_has_schema() {
        let pool = create_in_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('health_data', 'measurements', 'alerts', 'daily_summaries')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[test]
    fn test_default_config() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert!(config.sqlite_path.ends_with("vitalwatch.db"));
    }
}
