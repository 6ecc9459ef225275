use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{HealthData, Measurement, MeasurementType};
use super::errors::RepositoryError;

/// Repository trait for multi-vital health data records
#[async_trait]
pub trait HealthDataRepositoryTrait: Send + Sync {
    /// Store a new record
    async fn save_health_data(&self, data: HealthData) -> Result<HealthData, RepositoryError>;

    /// Records for a patient with `start <= timestamp <= end`, oldest first
    async fn find_by_patient_and_time_range(
        &self,
        patient_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HealthData>, RepositoryError>;

    /// Distinct patients with at least one record in `start..=end`, sorted
    async fn find_patients_with_data(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, RepositoryError>;
}

/// Repository trait for legacy single-value measurements
#[async_trait]
pub trait MeasurementRepositoryTrait: Send + Sync {
    /// Store a new measurement
    async fn save_measurement(&self, measurement: Measurement) -> Result<Measurement, RepositoryError>;

    /// Most recent measurements of one type for a patient.
    ///
    /// Ordered by timestamp descending; equal timestamps keep insertion order.
    async fn find_recent_by_patient_and_type(
        &self,
        patient_id: &str,
        measurement_type: &MeasurementType,
        limit: usize,
    ) -> Result<Vec<Measurement>, RepositoryError>;
}
