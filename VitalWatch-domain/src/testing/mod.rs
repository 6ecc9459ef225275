// Testing utilities for the domain layer
// This module is only available when the "mock" feature is enabled

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use vital_watch_data::models::{Alert, AlertSource, HealthData, NewAlert, Severity};
use vital_watch_data::repository::{AlertRepositoryTrait, RepositoryError};

// Re-export the fault-injecting store from the data layer
pub use vital_watch_data::repository::InMemoryStorage;

use crate::config::MonitoringConfig;
use crate::retry::RetryPolicy;
use crate::services::MonitoringService;

/// Monitoring service over a fresh in-memory store, retries without backoff
pub fn in_memory_service() -> (Arc<InMemoryStorage>, MonitoringService<InMemoryStorage>) {
    let store = Arc::new(InMemoryStorage::new());
    let config = MonitoringConfig {
        retry: RetryPolicy {
            attempts: 3,
            backoff: std::time::Duration::ZERO,
        },
        ..MonitoringConfig::default()
    };
    (store.clone(), MonitoringService::new(store, config))
}

/// Builder for multi-vital test records
#[derive(Debug, Clone)]
pub struct HealthDataBuilder {
    data: HealthData,
}

impl HealthDataBuilder {
    pub fn new(patient_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            data: HealthData::new(patient_id, timestamp),
        }
    }

    pub fn heart_rate(mut self, bpm: i32) -> Self {
        self.data.heart_rate = Some(bpm);
        self
    }

    pub fn spo2(mut self, percent: i32) -> Self {
        self.data.spo2 = Some(percent);
        self
    }

    pub fn blood_pressure(mut self, systolic: i32, diastolic: i32) -> Self {
        self.data.systolic = Some(systolic);
        self.data.diastolic = Some(diastolic);
        self
    }

    pub fn temperature(mut self, celsius: f64) -> Self {
        self.data.temperature = Some(celsius);
        self
    }

    pub fn steps(mut self, steps: i32) -> Self {
        self.data.steps = Some(steps);
        self
    }

    pub fn sleep_minutes(mut self, minutes: i32) -> Self {
        self.data.sleep_minutes = Some(minutes);
        self
    }

    pub fn build(self) -> HealthData {
        self.data
    }
}

/// Store a threshold alert created `age` before `now`
pub async fn seed_alert(
    store: &InMemoryStorage,
    patient_id: &str,
    severity: Severity,
    age: Duration,
    now: DateTime<Utc>,
) -> Result<Alert, RepositoryError> {
    let alert = NewAlert {
        patient_id: patient_id.to_string(),
        source_reading_id: None,
        message: format!("Seeded {} alert", severity),
        severity,
        source: AlertSource::Threshold,
    }
    .into_alert(now - age);
    store.save_alert(alert).await
}
