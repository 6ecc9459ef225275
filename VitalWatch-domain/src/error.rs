use thiserror::Error;
use uuid::Uuid;

use vital_watch_data::repository::RepositoryError;

/// Errors surfaced by the monitoring core
#[derive(Debug, Error)]
pub enum MonitoringError {
    /// The backing store cannot be reached; callers should back off
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Inbound record failed validation and was not stored
    #[error("Validation error: {0}")]
    Validation(String),

    /// Record changed underneath an update
    #[error("Alert {0} was modified concurrently")]
    Conflict(Uuid),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other repository failure
    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for MonitoringError {
    fn from(err: RepositoryError) -> Self {
        if err.is_unavailable() {
            return MonitoringError::StoreUnavailable(err.to_string());
        }
        match err {
            RepositoryError::Validation(msg) => MonitoringError::Validation(msg),
            RepositoryError::NotFound(msg) => MonitoringError::NotFound(msg),
            RepositoryError::Conflict { id, .. } => MonitoringError::Conflict(id),
            other => MonitoringError::Repository(other),
        }
    }
}
