use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use vital_watch_data::models::{Alert, NewAlert, Severity};
use vital_watch_data::repository::{AlertRepositoryTrait, RepositoryError};

use crate::audit;
use crate::error::MonitoringError;
use crate::retry::RetryPolicy;

/// Attempts at re-reading an alert that changed underneath a read mark
const MARK_READ_ATTEMPTS: usize = 3;

/// Alert sink and lifecycle operations
pub struct AlertService<R: AlertRepositoryTrait> {
    repository: Arc<R>,
    retry: RetryPolicy,
}

impl<R: AlertRepositoryTrait> AlertService<R> {
    /// Create a new alert service
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_retry(repository, RetryPolicy::default())
    }

    pub fn with_retry(repository: Arc<R>, retry: RetryPolicy) -> Self {
        Self { repository, retry }
    }

    /// Record a new unread alert stamped with the current time
    pub async fn create(&self, alert: NewAlert) -> Result<Alert, MonitoringError> {
        let alert = alert.into_alert(Utc::now());
        let saved = self
            .retry
            .run("save_alert", || self.repository.save_alert(alert.clone()))
            .await?;
        audit::log_alert_created(&saved);
        Ok(saved)
    }

    /// Mark an alert as read.
    ///
    /// Unknown ids are a no-op returning `None`. A concurrent update (for
    /// example an escalation) is re-read and the mark applied on top of it.
    pub async fn mark_read(&self, id: Uuid) -> Result<Option<Alert>, MonitoringError> {
        for _ in 0..MARK_READ_ATTEMPTS {
            let Some(mut alert) = self.find(id).await? else {
                debug!(alert_id = %id, "Mark read on unknown alert ignored");
                return Ok(None);
            };
            if alert.is_read {
                return Ok(Some(alert));
            }

            alert.is_read = true;
            match self.repository.update_alert(alert).await {
                Ok(updated) => {
                    audit::log_alert_read(&updated);
                    return Ok(Some(updated));
                }
                Err(RepositoryError::Conflict { .. }) => {
                    warn!(alert_id = %id, "Alert changed while marking read, retrying");
                }
                Err(RepositoryError::NotFound(_)) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
        Err(MonitoringError::Conflict(id))
    }

    /// Mark every unread alert of a patient as read, returning how many changed
    pub async fn mark_all_read(&self, patient_id: &str) -> Result<usize, MonitoringError> {
        let unread: Vec<Uuid> = self
            .list_by_patient(patient_id)
            .await?
            .into_iter()
            .filter(|a| !a.is_read)
            .map(|a| a.id)
            .collect();

        let mut marked = 0;
        for id in unread {
            if let Some(alert) = self.mark_read(id).await? {
                if alert.is_read {
                    marked += 1;
                }
            }
        }
        Ok(marked)
    }

    /// Get an alert by ID
    pub async fn find(&self, id: Uuid) -> Result<Option<Alert>, MonitoringError> {
        Ok(self
            .retry
            .run("find_alert_by_id", || self.repository.find_alert_by_id(id))
            .await?)
    }

    /// All alerts of a patient, newest first
    pub async fn list_by_patient(&self, patient_id: &str) -> Result<Vec<Alert>, MonitoringError> {
        Ok(self
            .retry
            .run("find_alerts_by_patient", || self.repository.find_alerts_by_patient(patient_id))
            .await?)
    }

    /// All unread alerts, newest first
    pub async fn list_unread(&self) -> Result<Vec<Alert>, MonitoringError> {
        Ok(self
            .retry
            .run("find_unread_alerts", || self.repository.find_unread_alerts())
            .await?)
    }

    /// Alerts at exactly `severity` created before `cutoff`, oldest first
    pub async fn list_by_severity_older_than(
        &self,
        severity: Severity,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Alert>, MonitoringError> {
        Ok(self
            .retry
            .run("find_alerts_by_severity_older_than", || {
                self.repository.find_alerts_by_severity_older_than(severity, cutoff)
            })
            .await?)
    }

    /// Number of unread alerts for a patient
    pub async fn count_unread(&self, patient_id: &str) -> Result<usize, MonitoringError> {
        Ok(self
            .list_by_patient(patient_id)
            .await?
            .iter()
            .filter(|a| !a.is_read)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vital_watch_data::models::AlertSource;
    use vital_watch_data::repository::InMemoryStorage;

    fn new_alert(patient_id: &str, severity: Severity) -> NewAlert {
        NewAlert {
            patient_id: patient_id.to_string(),
            source_reading_id: None,
            message: "Low heart rate: 45 bpm".to_string(),
            severity,
            source: AlertSource::Threshold,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_timestamp_and_unread_state() {
        let service = AlertService::new(Arc::new(InMemoryStorage::new()));
        let before = Utc::now();

        let alert = service.create(new_alert("patient-1", Severity::Medium)).await.unwrap();

        assert!(!alert.is_read);
        assert_eq!(alert.version, 0);
        assert!(alert.timestamp >= before);
        assert_eq!(service.list_unread().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_read_is_noop_for_unknown_alert() {
        let service = AlertService::new(Arc::new(InMemoryStorage::new()));
        assert!(service.mark_read(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_read_leaves_severity_alone() {
        let service = AlertService::new(Arc::new(InMemoryStorage::new()));
        let alert = service.create(new_alert("patient-1", Severity::High)).await.unwrap();

        let read = service.mark_read(alert.id).await.unwrap().unwrap();
        assert!(read.is_read);
        assert_eq!(read.severity, Severity::High);
        assert_eq!(read.version, 1);

        // Marking twice changes nothing
        let again = service.mark_read(alert.id).await.unwrap().unwrap();
        assert_eq!(again.version, 1);
        assert!(service.list_unread().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_and_mark_all_read_per_patient() {
        let service = AlertService::new(Arc::new(InMemoryStorage::new()));
        service.create(new_alert("patient-1", Severity::Medium)).await.unwrap();
        service.create(new_alert("patient-1", Severity::Critical)).await.unwrap();
        service.create(new_alert("patient-2", Severity::High)).await.unwrap();

        assert_eq!(service.count_unread("patient-1").await.unwrap(), 2);
        assert_eq!(service.mark_all_read("patient-1").await.unwrap(), 2);
        assert_eq!(service.count_unread("patient-1").await.unwrap(), 0);
        assert_eq!(service.count_unread("patient-2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_outage_surfaces_as_unavailable() {
        let store = Arc::new(InMemoryStorage::new());
        store.simulate_outage(true);
        let service = AlertService::with_retry(store, RetryPolicy::none());

        let result = service.create(new_alert("patient-1", Severity::Medium)).await;
        assert!(matches!(result, Err(MonitoringError::StoreUnavailable(_))));
    }
}
