use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};
use validator::ValidationErrors;

use vital_watch_data::models::{Alert, AlertSource, DailySummary, Measurement, NewAlert, Severity, VitalReading};
use vital_watch_data::repository::VitalStore;

use crate::config::MonitoringConfig;
use crate::error::MonitoringError;
use crate::retry::RetryPolicy;
use crate::services::aggregation::DailyAggregator;
use crate::services::alerts::AlertService;
use crate::services::anomaly::AnomalyDetector;
use crate::services::escalation::{EscalationReport, EscalationScheduler};
use crate::services::messages::{anomaly_message, breach_message};
use crate::services::thresholds::evaluate_reading;

/// Entry point of the monitoring pipeline.
///
/// Owns one of each component over a shared store.
pub struct MonitoringService<S: VitalStore> {
    store: Arc<S>,
    alerts: AlertService<S>,
    detector: AnomalyDetector<S>,
    escalation: Arc<EscalationScheduler<S>>,
    aggregator: DailyAggregator<S>,
    retry: RetryPolicy,
}

impl<S: VitalStore> MonitoringService<S> {
    /// Create a new monitoring service
    pub fn new(store: Arc<S>, config: MonitoringConfig) -> Self {
        let retry = config.retry;
        Self {
            alerts: AlertService::with_retry(store.clone(), retry),
            detector: AnomalyDetector::with_config(store.clone(), config.anomaly, retry),
            escalation: Arc::new(EscalationScheduler::with_config(
                store.clone(),
                config.escalation,
                retry,
            )),
            aggregator: DailyAggregator::with_config(store.clone(), config.aggregation, retry),
            store,
            retry,
        }
    }

    /// Validate, store and evaluate one inbound reading.
    ///
    /// Returns the alerts raised for it: threshold alerts first, then an
    /// anomaly alert for legacy measurements that depart from the patient's
    /// baseline. Invalid readings are rejected before anything is stored.
    /// Once the reading is stored the call succeeds; an alert that cannot be
    /// saved is logged and left out of the result.
    pub async fn ingest(&self, reading: VitalReading) -> Result<Vec<Alert>, MonitoringError> {
        reading
            .validate()
            .map_err(|e| MonitoringError::Validation(describe_validation_errors(&e)))?;

        let reading = self.store_reading(reading).await?;
        let reading_id = reading.id();
        let patient_id = reading.patient_id().to_string();

        // The reading is stored from here on; alert failures are logged per item
        let mut raised = Vec::new();
        for breach in evaluate_reading(&reading) {
            let created = self
                .alerts
                .create(NewAlert {
                    patient_id: patient_id.clone(),
                    source_reading_id: Some(reading_id),
                    message: breach_message(&breach),
                    severity: breach.severity,
                    source: AlertSource::Threshold,
                })
                .await;
            match created {
                Ok(alert) => raised.push(alert),
                Err(e) => warn!(
                    patient_id = %patient_id,
                    reading_id = %reading_id,
                    vital = %breach.vital,
                    error = %e,
                    "Failed to raise threshold alert"
                ),
            }
        }

        if let VitalReading::Measurement(measurement) = &reading {
            match self.check_anomaly(measurement).await {
                Ok(Some(alert)) => raised.push(alert),
                Ok(None) => {}
                Err(e) => warn!(
                    patient_id = %patient_id,
                    reading_id = %reading_id,
                    error = %e,
                    "Anomaly check failed"
                ),
            }
        }

        debug!(
            patient_id = %patient_id,
            reading_id = %reading_id,
            alerts = raised.len(),
            "Reading ingested"
        );
        Ok(raised)
    }

    /// Run one escalation pass now; `None` when a pass is already running
    pub async fn run_escalation_pass(&self) -> Result<Option<EscalationReport>, MonitoringError> {
        self.escalation.run_escalation_pass().await
    }

    /// Build or rebuild one patient's summary for `date`
    pub async fn generate_daily_summary(
        &self,
        patient_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySummary>, MonitoringError> {
        self.aggregator.generate_summary(patient_id, date).await
    }

    /// Build summaries for every patient with readings on `date`
    pub async fn generate_summaries_for_date(&self, date: NaiveDate) -> Result<Vec<DailySummary>, MonitoringError> {
        self.aggregator.generate_summaries_for_date(date).await
    }

    pub fn alerts(&self) -> &AlertService<S> {
        &self.alerts
    }

    pub fn detector(&self) -> &AnomalyDetector<S> {
        &self.detector
    }

    /// Shared handle for running the scheduler loop in its own task
    pub fn escalation_scheduler(&self) -> Arc<EscalationScheduler<S>> {
        self.escalation.clone()
    }

    pub fn aggregator(&self) -> &DailyAggregator<S> {
        &self.aggregator
    }

    async fn store_reading(&self, reading: VitalReading) -> Result<VitalReading, MonitoringError> {
        let received_at = Utc::now();
        let stored = match reading {
            VitalReading::HealthData(mut data) => {
                data.received_at = received_at;
                let saved = self
                    .retry
                    .run("save_health_data", || self.store.save_health_data(data.clone()))
                    .await?;
                VitalReading::HealthData(saved)
            }
            VitalReading::Measurement(mut measurement) => {
                measurement.received_at = received_at;
                let saved = self
                    .retry
                    .run("save_measurement", || self.store.save_measurement(measurement.clone()))
                    .await?;
                VitalReading::Measurement(saved)
            }
        };
        Ok(stored)
    }

    async fn check_anomaly(&self, measurement: &Measurement) -> Result<Option<Alert>, MonitoringError> {
        let assessment = self.detector.evaluate(measurement).await?;
        if !assessment.is_anomaly {
            return Ok(None);
        }

        info!(
            patient_id = %measurement.patient_id,
            measurement_type = %measurement.measurement_type,
            "Reading departs from patient baseline"
        );
        let alert = self
            .alerts
            .create(NewAlert {
                patient_id: measurement.patient_id.clone(),
                source_reading_id: Some(measurement.id),
                message: anomaly_message(&measurement.measurement_type, &assessment),
                severity: Severity::Medium,
                source: AlertSource::Anomaly,
            })
            .await?;
        Ok(Some(alert))
    }
}

/// Flatten validator output into one readable line
fn describe_validation_errors(errors: &ValidationErrors) -> String {
    let mut fields: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let messages: Vec<String> = errors
                .iter()
                .map(|err| match &err.message {
                    Some(msg) => msg.to_string(),
                    None => format!("Invalid {}", field),
                })
                .collect();
            format!("{}: {}", field, messages.join(", "))
        })
        .collect();
    fields.sort();
    fields.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use vital_watch_data::models::{HealthData, MeasurementType};
    use vital_watch_data::repository::{AlertRepositoryTrait, InMemoryStorage, MeasurementRepositoryTrait};

    fn service() -> (Arc<InMemoryStorage>, MonitoringService<InMemoryStorage>) {
        let store = Arc::new(InMemoryStorage::new());
        (store.clone(), MonitoringService::new(store, MonitoringConfig::default()))
    }

    #[tokio::test]
    async fn test_ingest_health_data_raises_threshold_alerts() {
        let (store, service) = service();
        let mut data = HealthData::new("patient-1", Utc::now());
        data.heart_rate = Some(160);
        data.temperature = Some(34.5);
        let reading_id = data.id;

        let alerts = service.ingest(data.into()).await.unwrap();

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].message, "Critical heart rate: 160 bpm");
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(alerts[1].message, "Low temperature: 34.5°C");
        assert!(alerts.iter().all(|a| a.source_reading_id == Some(reading_id)));
        assert_eq!(store.alert_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_ingest_rejects_invalid_reading_before_storing() {
        let (store, service) = service();
        let mut data = HealthData::new("", Utc::now());
        data.heart_rate = Some(200);

        let result = service.ingest(data.into()).await;

        assert!(matches!(result, Err(MonitoringError::Validation(ref msg)) if msg.contains("patient_id")));
        assert_eq!(store.alert_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ingest_measurement_flags_anomaly_and_threshold() {
        let (store, service) = service();
        for minutes_ago in 1..=6 {
            store
                .save_measurement(Measurement::new(
                    "patient-1",
                    MeasurementType::HeartRate,
                    70.0,
                    Utc::now() - Duration::minutes(minutes_ago),
                ))
                .await
                .unwrap();
        }

        let spike = Measurement::new("patient-1", MeasurementType::HeartRate, 110.0, Utc::now());
        let alerts = service.ingest(spike.into()).await.unwrap();

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].source, AlertSource::Threshold);
        assert_eq!(alerts[0].severity, Severity::High);
        assert_eq!(alerts[1].source, AlertSource::Anomaly);
        assert_eq!(alerts[1].severity, Severity::Medium);
        assert!(alerts[1].message.starts_with("Unusual heart rate reading: 110 bpm"));
    }

    #[tokio::test]
    async fn test_unknown_measurement_type_is_stored_without_alerts() {
        let (store, service) = service();
        let glucose = Measurement::new("patient-1", MeasurementType::Other("glucose".to_string()), 350.0, Utc::now());

        let alerts = service.ingest(glucose.into()).await.unwrap();

        assert!(alerts.is_empty());
        let stored = store
            .find_recent_by_patient_and_type("patient-1", &MeasurementType::Other("glucose".to_string()), 10)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert!(store.find_unread_alerts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_history_lookup_keeps_threshold_alerts() {
        let (store, service) = service();
        store.corrupt_measurement_history(true);
        let spike = Measurement::new("patient-1", MeasurementType::HeartRate, 160.0, Utc::now());

        let alerts = tokio_test::assert_ok!(service.ingest(spike.into()).await);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].source, AlertSource::Threshold);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(store.alert_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_alert_save_does_not_abort_remaining_breaches() {
        let (store, service) = service();
        store.fail_next_alert_saves(1);
        let mut data = HealthData::new("patient-1", Utc::now());
        data.heart_rate = Some(160);
        data.temperature = Some(34.5);

        let alerts = tokio_test::assert_ok!(service.ingest(data.into()).await);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "Low temperature: 34.5°C");
        assert_eq!(store.alert_count().unwrap(), 1);
    }

    #[test]
    fn test_validation_errors_are_flattened() {
        let data = HealthData::new("", Utc::now());
        let errors = VitalReading::from(data).validate().unwrap_err();
        let text = describe_validation_errors(&errors);
        assert!(text.starts_with("patient_id: "));
    }

    #[test]
    fn test_empty_measurement_type_is_reported_under_wire_name() {
        let measurement = Measurement::new("patient-1", MeasurementType::Other(String::new()), 1.0, Utc::now());
        let errors = VitalReading::from(measurement).validate().unwrap_err();
        let text = describe_validation_errors(&errors);
        assert_eq!(text, "type: Measurement type must be between 1 and 64 characters");
    }
}
