//! Personal-baseline anomaly detection
//!
//! A reading is compared with the patient's own most recent readings of the
//! same type. Short histories never flag; flat histories use a relative
//! deviation rule because a z-score is meaningless there.

use std::sync::Arc;

use tracing::debug;

use vital_watch_data::models::Measurement;
use vital_watch_data::repository::MeasurementRepositoryTrait;

use crate::config::AnomalyConfig;
use crate::entities::AnomalyAssessment;
use crate::error::MonitoringError;
use crate::retry::RetryPolicy;

/// Statistical check of a reading against the patient's recent history
pub struct AnomalyDetector<R: MeasurementRepositoryTrait> {
    repository: Arc<R>,
    config: AnomalyConfig,
    retry: RetryPolicy,
}

impl<R: MeasurementRepositoryTrait> AnomalyDetector<R> {
    /// Create a detector with default settings
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_config(repository, AnomalyConfig::default(), RetryPolicy::default())
    }

    pub fn with_config(repository: Arc<R>, config: AnomalyConfig, retry: RetryPolicy) -> Self {
        Self {
            repository,
            config,
            retry,
        }
    }

    /// Whether the measurement departs from the patient's baseline
    pub async fn is_anomaly(&self, measurement: &Measurement) -> Result<bool, MonitoringError> {
        Ok(self.evaluate(measurement).await?.is_anomaly)
    }

    /// Full assessment of the measurement against its history.
    ///
    /// The measurement itself is excluded from the history even if it has
    /// already been stored, so calling this before or after saving gives the
    /// same answer.
    pub async fn evaluate(&self, measurement: &Measurement) -> Result<AnomalyAssessment, MonitoringError> {
        let limit = self.config.history_limit;
        let history = self
            .retry
            .run("find_recent_by_patient_and_type", || {
                self.repository.find_recent_by_patient_and_type(
                    &measurement.patient_id,
                    &measurement.measurement_type,
                    limit + 1,
                )
            })
            .await?;

        let values: Vec<f64> = history
            .iter()
            .filter(|m| m.id != measurement.id)
            .take(limit)
            .map(|m| m.value)
            .collect();

        let assessment = assess(measurement.value, &values, &self.config);
        debug!(
            patient_id = %measurement.patient_id,
            measurement_type = %measurement.measurement_type,
            history_size = assessment.history_size,
            is_anomaly = assessment.is_anomaly,
            "Anomaly assessment complete"
        );
        Ok(assessment)
    }
}

/// Assess `value` against `history` (most recent first)
pub fn assess(value: f64, history: &[f64], config: &AnomalyConfig) -> AnomalyAssessment {
    let n = history.len();
    if n < config.min_history.max(2) {
        return AnomalyAssessment::insufficient(value, n);
    }

    let mean = history.iter().sum::<f64>() / n as f64;
    let variance = history.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std_dev = variance.sqrt();
    let deviation = (value - mean).abs();

    let (z_score, is_anomaly) = if std_dev < config.flat_sigma {
        (None, deviation > config.flat_relative_deviation * mean.abs())
    } else {
        let z = deviation / std_dev;
        (Some(z), z > config.z_threshold)
    };

    AnomalyAssessment {
        value,
        history_size: n,
        mean: Some(mean),
        std_dev: Some(std_dev),
        z_score,
        is_anomaly,
    }
}
