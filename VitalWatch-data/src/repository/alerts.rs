use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Alert, Severity};
use super::errors::RepositoryError;

/// Repository trait for alerts
#[async_trait]
pub trait AlertRepositoryTrait: Send + Sync {
    /// Store a newly created alert
    async fn save_alert(&self, alert: Alert) -> Result<Alert, RepositoryError>;

    /// Replace a stored alert.
    ///
    /// Fails with [`RepositoryError::Conflict`] when the stored version differs
    /// from `alert.version`; on success the returned alert carries the bumped version.
    async fn update_alert(&self, alert: Alert) -> Result<Alert, RepositoryError>;

    /// Get an alert by ID
    async fn find_alert_by_id(&self, id: Uuid) -> Result<Option<Alert>, RepositoryError>;

    /// All alerts for a patient, newest first
    async fn find_alerts_by_patient(&self, patient_id: &str) -> Result<Vec<Alert>, RepositoryError>;

    /// All unread alerts, newest first
    async fn find_unread_alerts(&self) -> Result<Vec<Alert>, RepositoryError>;

    /// Alerts at exactly `severity` created strictly before `cutoff`, oldest first
    async fn find_alerts_by_severity_older_than(
        &self,
        severity: Severity,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Alert>, RepositoryError>;
}
