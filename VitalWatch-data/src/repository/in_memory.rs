use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Alert, DailySummary, HealthData, Measurement, MeasurementType, Severity};
use super::alerts::AlertRepositoryTrait;
use super::errors::RepositoryError;
use super::readings::{HealthDataRepositoryTrait, MeasurementRepositoryTrait};
use super::summaries::DailySummaryRepositoryTrait;

/// In-memory storage implementing every repository trait.
///
/// Records are kept in insertion order so that ties on timestamp resolve the
/// same way on every call. Cloning shares the underlying data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    health_data: Arc<Mutex<Vec<HealthData>>>,
    measurements: Arc<Mutex<Vec<Measurement>>>,
    alerts: Arc<Mutex<Vec<Alert>>>,
    summaries: Arc<Mutex<HashMap<(String, NaiveDate), DailySummary>>>,
    faults: Arc<Faults>,
}

#[derive(Debug, Default)]
struct Faults {
    outage: AtomicBool,
    failing_calls: AtomicUsize,
    failing_alert_updates: Mutex<HashSet<Uuid>>,
    failing_alert_saves: AtomicUsize,
    corrupt_history: AtomicBool,
}

impl InMemoryStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.faults.outage.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("in-memory store is offline".to_string()));
        }
        let consumed = self
            .faults
            .failing_calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(RepositoryError::Unavailable("injected transient failure".to_string()));
        }
        Ok(())
    }

    /// Number of stored alerts
    pub fn alert_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.alerts.lock()?.len())
    }

    /// Number of stored summary rows
    pub fn summary_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.summaries.lock()?.len())
    }
}

#[cfg(any(test, feature = "mock"))]
impl InMemoryStorage {
    /// Make every call fail with [`RepositoryError::Unavailable`] until switched back
    pub fn simulate_outage(&self, offline: bool) {
        self.faults.outage.store(offline, Ordering::SeqCst);
    }

    /// Fail the next `calls` repository calls with a transient error
    pub fn fail_next_calls(&self, calls: usize) {
        self.faults.failing_calls.store(calls, Ordering::SeqCst);
    }

    /// Make every update of the given alert fail
    pub fn fail_alert_updates_for(&self, id: Uuid) {
        if let Ok(mut failing) = self.faults.failing_alert_updates.lock() {
            failing.insert(id);
        }
    }

    /// Reject the next `saves` alert inserts with a permanent error
    pub fn fail_next_alert_saves(&self, saves: usize) {
        self.faults.failing_alert_saves.store(saves, Ordering::SeqCst);
    }

    /// Make measurement history lookups fail to decode until switched back
    pub fn corrupt_measurement_history(&self, corrupt: bool) {
        self.faults.corrupt_history.store(corrupt, Ordering::SeqCst);
    }
}

#[async_trait]
impl HealthDataRepositoryTrait for InMemoryStorage {
    async fn save_health_data(&self, data: HealthData) -> Result<HealthData, RepositoryError> {
        self.check_available()?;
        debug!("Storing health data in memory: {}", data.id);
        self.health_data.lock()?.push(data.clone());
        Ok(data)
    }

    async fn find_by_patient_and_time_range(
        &self,
        patient_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HealthData>, RepositoryError> {
        self.check_available()?;
        let store = self.health_data.lock()?;
        let mut readings: Vec<HealthData> = store
            .iter()
            .filter(|r| r.patient_id == patient_id && r.timestamp >= start && r.timestamp <= end)
            .cloned()
            .collect();
        readings.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(readings)
    }

    async fn find_patients_with_data(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, RepositoryError> {
        self.check_available()?;
        let store = self.health_data.lock()?;
        let mut patients: Vec<String> = store
            .iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .map(|r| r.patient_id.clone())
            .collect();
        patients.sort();
        patients.dedup();
        Ok(patients)
    }
}

#[async_trait]
impl MeasurementRepositoryTrait for InMemoryStorage {
    async fn save_measurement(&self, measurement: Measurement) -> Result<Measurement, RepositoryError> {
        self.check_available()?;
        debug!("Storing measurement in memory: {}", measurement.id);
        self.measurements.lock()?.push(measurement.clone());
        Ok(measurement)
    }

    async fn find_recent_by_patient_and_type(
        &self,
        patient_id: &str,
        measurement_type: &MeasurementType,
        limit: usize,
    ) -> Result<Vec<Measurement>, RepositoryError> {
        self.check_available()?;
        if self.faults.corrupt_history.load(Ordering::SeqCst) {
            return Err(RepositoryError::Decode(format!("history of {}", patient_id)));
        }
        let store = self.measurements.lock()?;
        let mut history: Vec<Measurement> = store
            .iter()
            .filter(|m| m.patient_id == patient_id && &m.measurement_type == measurement_type)
            .cloned()
            .collect();
        // Stable sort: equal timestamps keep insertion order
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        history.truncate(limit);
        Ok(history)
    }
}

#[async_trait]
impl AlertRepositoryTrait for InMemoryStorage {
    async fn save_alert(&self, alert: Alert) -> Result<Alert, RepositoryError> {
        self.check_available()?;
        let rejected = self
            .faults
            .failing_alert_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if rejected.is_ok() {
            return Err(RepositoryError::Validation(format!("insert of {} rejected", alert.id)));
        }
        debug!("Storing alert in memory: {}", alert.id);
        self.alerts.lock()?.push(alert.clone());
        Ok(alert)
    }

    async fn update_alert(&self, alert: Alert) -> Result<Alert, RepositoryError> {
        self.check_available()?;
        if self.faults.failing_alert_updates.lock()?.contains(&alert.id) {
            return Err(RepositoryError::Unavailable(format!("update of {} rejected", alert.id)));
        }

        let mut store = self.alerts.lock()?;
        let stored = store
            .iter_mut()
            .find(|a| a.id == alert.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("alert {}", alert.id)))?;

        if stored.version != alert.version {
            return Err(RepositoryError::Conflict {
                id: alert.id,
                expected: alert.version,
                found: stored.version,
            });
        }

        let mut updated = alert;
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn find_alert_by_id(&self, id: Uuid) -> Result<Option<Alert>, RepositoryError> {
        self.check_available()?;
        Ok(self.alerts.lock()?.iter().find(|a| a.id == id).cloned())
    }

    async fn find_alerts_by_patient(&self, patient_id: &str) -> Result<Vec<Alert>, RepositoryError> {
        self.check_available()?;
        let mut alerts: Vec<Alert> = self
            .alerts
            .lock()?
            .iter()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(alerts)
    }

    async fn find_unread_alerts(&self) -> Result<Vec<Alert>, RepositoryError> {
        self.check_available()?;
        let mut alerts: Vec<Alert> = self.alerts.lock()?.iter().filter(|a| !a.is_read).cloned().collect();
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(alerts)
    }

    async fn find_alerts_by_severity_older_than(
        &self,
        severity: Severity,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Alert>, RepositoryError> {
        self.check_available()?;
        let mut alerts: Vec<Alert> = self
            .alerts
            .lock()?
            .iter()
            .filter(|a| a.severity == severity && a.timestamp < cutoff)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(alerts)
    }
}

#[async_trait]
impl DailySummaryRepositoryTrait for InMemoryStorage {
    async fn find_summary(
        &self,
        patient_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySummary>, RepositoryError> {
        self.check_available()?;
        let store = self.summaries.lock()?;
        Ok(store.get(&(patient_id.to_string(), date)).cloned())
    }

    async fn upsert_summary(&self, summary: DailySummary) -> Result<DailySummary, RepositoryError> {
        self.check_available()?;
        let mut store = self.summaries.lock()?;
        let key = (summary.patient_id.clone(), summary.date);

        let mut row = summary;
        if let Some(existing) = store.get(&key) {
            row.id = existing.id;
            row.created_at = existing.created_at;
        }
        store.insert(key, row.clone());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertSource, NewAlert};
    use chrono::{Duration, TimeZone};

    fn alert_for(patient_id: &str, severity: Severity, timestamp: DateTime<Utc>) -> Alert {
        NewAlert {
            patient_id: patient_id.to_string(),
            source_reading_id: None,
            message: "test".to_string(),
            severity,
            source: AlertSource::Threshold,
        }
        .into_alert(timestamp)
    }

    #[tokio::test]
    async fn test_recent_measurements_break_ties_by_insertion_order() {
        let storage = InMemoryStorage::new();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();

        let first = Measurement::new("p1", MeasurementType::HeartRate, 60.0, at);
        let second = Measurement::new("p1", MeasurementType::HeartRate, 61.0, at);
        let newest = Measurement::new("p1", MeasurementType::HeartRate, 62.0, at + Duration::minutes(1));
        let other_type = Measurement::new("p1", MeasurementType::Spo2, 97.0, at + Duration::minutes(2));

        for m in [first.clone(), second.clone(), newest.clone(), other_type] {
            storage.save_measurement(m).await.unwrap();
        }

        let history = storage
            .find_recent_by_patient_and_type("p1", &MeasurementType::HeartRate, 10)
            .await
            .unwrap();
        let ids: Vec<Uuid> = history.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![newest.id, first.id, second.id]);

        let limited = storage
            .find_recent_by_patient_and_type("p1", &MeasurementType::HeartRate, 2)
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_update_alert_detects_stale_version() {
        let storage = InMemoryStorage::new();
        let alert = storage
            .save_alert(alert_for("p1", Severity::Medium, Utc::now()))
            .await
            .unwrap();

        let mut first = alert.clone();
        first.is_read = true;
        let saved = storage.update_alert(first).await.unwrap();
        assert_eq!(saved.version, 1);

        let mut stale = alert;
        stale.severity = Severity::High;
        let result = storage.update_alert(stale).await;
        assert!(matches!(result, Err(RepositoryError::Conflict { expected: 0, found: 1, .. })));
    }

    #[tokio::test]
    async fn test_severity_query_uses_strict_cutoff() {
        let storage = InMemoryStorage::new();
        let cutoff = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let old = storage
            .save_alert(alert_for("p1", Severity::Medium, cutoff - Duration::seconds(1)))
            .await
            .unwrap();
        storage.save_alert(alert_for("p1", Severity::Medium, cutoff)).await.unwrap();
        storage
            .save_alert(alert_for("p1", Severity::High, cutoff - Duration::hours(1)))
            .await
            .unwrap();

        let found = storage
            .find_alerts_by_severity_older_than(Severity::Medium, cutoff)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, old.id);
    }

    #[tokio::test]
    async fn test_upsert_keeps_identity_of_existing_row() {
        let storage = InMemoryStorage::new();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let created = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();

        let first = storage
            .upsert_summary(DailySummary::new("p1", date, created))
            .await
            .unwrap();

        let mut second = DailySummary::new("p1", date, created + Duration::hours(1));
        second.total_steps = 4200;
        let stored = storage.upsert_summary(second).await.unwrap();

        assert_eq!(stored.id, first.id);
        assert_eq!(stored.created_at, created);
        assert_eq!(stored.total_steps, 4200);
        assert_eq!(storage.summary_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_outage_and_transient_failures() {
        let storage = InMemoryStorage::new();

        storage.fail_next_calls(1);
        assert!(storage.find_unread_alerts().await.unwrap_err().is_transient());
        assert!(storage.find_unread_alerts().await.is_ok());

        storage.simulate_outage(true);
        assert!(storage.find_unread_alerts().await.unwrap_err().is_unavailable());
        storage.simulate_outage(false);
        assert!(storage.find_unread_alerts().await.is_ok());
    }

    #[tokio::test]
    async fn test_injected_alert_and_history_faults() {
        let storage = InMemoryStorage::new();

        storage.fail_next_alert_saves(1);
        let rejected = storage.save_alert(alert_for("p1", Severity::Medium, Utc::now())).await;
        assert!(matches!(rejected, Err(RepositoryError::Validation(_))));
        assert!(storage.save_alert(alert_for("p1", Severity::Medium, Utc::now())).await.is_ok());
        assert_eq!(storage.alert_count().unwrap(), 1);

        storage.corrupt_measurement_history(true);
        let history = storage
            .find_recent_by_patient_and_type("p1", &MeasurementType::HeartRate, 5)
            .await;
        assert!(matches!(history, Err(RepositoryError::Decode(_))));
        storage.corrupt_measurement_history(false);
        assert!(storage
            .find_recent_by_patient_and_type("p1", &MeasurementType::HeartRate, 5)
            .await
            .is_ok());
    }
}
