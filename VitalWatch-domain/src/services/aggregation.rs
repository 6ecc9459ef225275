//! Daily aggregation of multi-vital readings into one summary row per
//! patient and calendar day.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info, warn};

use vital_watch_data::models::{DailySummary, HealthData};
use vital_watch_data::repository::{DailySummaryRepositoryTrait, HealthDataRepositoryTrait};

use crate::config::AggregationConfig;
use crate::error::MonitoringError;
use crate::retry::RetryPolicy;

type SummaryKey = (String, NaiveDate);
type KeyLocks = Mutex<HashMap<SummaryKey, Arc<tokio::sync::Mutex<()>>>>;

/// A holder's share of one key's lock; the map entry goes with the last holder
struct KeyLease<'a> {
    locks: &'a KeyLocks,
    key: SummaryKey,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for KeyLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map and this lease hold it: nobody else is waiting
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}

/// Folds a day's readings into [`DailySummary`] rows
pub struct DailyAggregator<R>
where
    R: HealthDataRepositoryTrait + DailySummaryRepositoryTrait,
{
    repository: Arc<R>,
    config: AggregationConfig,
    retry: RetryPolicy,
    locks: KeyLocks,
}

impl<R> DailyAggregator<R>
where
    R: HealthDataRepositoryTrait + DailySummaryRepositoryTrait,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_config(repository, AggregationConfig::default(), RetryPolicy::default())
    }

    pub fn with_config(repository: Arc<R>, config: AggregationConfig, retry: RetryPolicy) -> Self {
        Self {
            repository,
            config,
            retry,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Inclusive UTC bounds of `date` under the configured offset
    pub fn window(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        day_window(date, self.config.utc_offset)
    }

    /// Build or rebuild the summary for one patient and day.
    ///
    /// Returns `None` and writes nothing when the day has no readings.
    /// Concurrent calls for the same patient and day run one after another.
    pub async fn generate_summary(
        &self,
        patient_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySummary>, MonitoringError> {
        let lease = self.lease(patient_id, date);
        let _guard = lease.lock.lock().await;
        self.aggregate(patient_id, date).await
    }

    /// Generate summaries for every patient with readings on `date`.
    ///
    /// A failure for one patient is logged and does not stop the others.
    pub async fn generate_summaries_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<DailySummary>, MonitoringError> {
        let (start, end) = self.window(date);
        let patients = self
            .retry
            .run("find_patients_with_data", || self.repository.find_patients_with_data(start, end))
            .await?;

        let mut summaries = Vec::with_capacity(patients.len());
        let mut failed = 0;
        for patient_id in &patients {
            match self.generate_summary(patient_id, date).await {
                Ok(Some(summary)) => summaries.push(summary),
                Ok(None) => {}
                Err(e) => {
                    failed += 1;
                    warn!(patient_id = %patient_id, %date, error = %e, "Daily summary failed");
                }
            }
        }

        info!(
            %date,
            patients = patients.len(),
            generated = summaries.len(),
            failed,
            "Daily summaries generated"
        );
        Ok(summaries)
    }

    async fn aggregate(
        &self,
        patient_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySummary>, MonitoringError> {
        let (start, end) = self.window(date);
        let readings = self
            .retry
            .run("find_by_patient_and_time_range", || {
                self.repository.find_by_patient_and_time_range(patient_id, start, end)
            })
            .await?;

        if readings.is_empty() {
            debug!(patient_id, %date, "No readings for day, summary skipped");
            return Ok(None);
        }

        let now = Utc::now();
        let existing = self
            .retry
            .run("find_summary", || self.repository.find_summary(patient_id, date))
            .await?;
        let base = existing.unwrap_or_else(|| DailySummary::new(patient_id, date, now));
        let summary = summarize(base, &readings, now);

        let saved = self
            .retry
            .run("upsert_summary", || self.repository.upsert_summary(summary.clone()))
            .await?;
        debug!(
            patient_id,
            %date,
            data_points = saved.data_points_count,
            "Daily summary stored"
        );
        Ok(Some(saved))
    }

    fn lease(&self, patient_id: &str, date: NaiveDate) -> KeyLease<'_> {
        let key = (patient_id.to_string(), date);
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = locks.entry(key.clone()).or_default().clone();
        KeyLease {
            locks: &self.locks,
            key,
            lock,
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Inclusive UTC bounds of the calendar day `date` in `offset`
pub fn day_window(date: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_midnight = date.and_time(NaiveTime::MIN);
    let start = (local_midnight - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc();
    let end = start + Duration::days(1) - Duration::nanoseconds(1);
    (start, end)
}

/// Recompute `summary` from a day's readings.
///
/// Averages and extremes are only replaced when at least one reading carries
/// the field; totals are always recomputed.
pub fn summarize(mut summary: DailySummary, readings: &[HealthData], now: DateTime<Utc>) -> DailySummary {
    let heart_rates: Vec<i32> = readings.iter().filter_map(|r| r.heart_rate).collect();
    if let Some(avg) = average(heart_rates.iter().map(|&v| f64::from(v))) {
        summary.avg_heart_rate = Some(avg);
        summary.min_heart_rate = heart_rates.iter().copied().min();
        summary.max_heart_rate = heart_rates.iter().copied().max();
    }

    let spo2: Vec<i32> = readings.iter().filter_map(|r| r.spo2).collect();
    if let Some(avg) = average(spo2.iter().map(|&v| f64::from(v))) {
        summary.avg_spo2 = Some(avg);
        summary.min_spo2 = spo2.iter().copied().min();
    }

    if let Some(avg) = average(readings.iter().filter_map(|r| r.systolic).map(f64::from)) {
        summary.avg_systolic = Some(avg);
    }
    if let Some(avg) = average(readings.iter().filter_map(|r| r.diastolic).map(f64::from)) {
        summary.avg_diastolic = Some(avg);
    }
    if let Some(avg) = average(readings.iter().filter_map(|r| r.temperature)) {
        summary.avg_temperature = Some(avg);
    }

    summary.total_steps = readings.iter().filter_map(|r| r.steps).map(i64::from).sum();
    summary.total_sleep_minutes = readings.iter().filter_map(|r| r.sleep_minutes).map(i64::from).sum();
    summary.total_calories = readings.iter().filter_map(|r| r.calories).fold(0.0, |acc, v| acc + v);
    summary.total_distance = readings.iter().filter_map(|r| r.distance).fold(0.0, |acc, v| acc + v);
    summary.data_points_count = readings.len() as i64;
    summary.updated_at = now;
    summary
}

fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vital_watch_data::repository::InMemoryStorage;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    fn reading_at(hour: u32) -> HealthData {
        HealthData::new("patient-1", Utc.with_ymd_and_hms(2024, 3, 10, hour, 0, 0).unwrap())
    }

    #[test]
    fn test_day_window_bounds() {
        let (start, end) = day_window(date(), FixedOffset::east_opt(0).unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap() - Duration::nanoseconds(1));

        // UTC+2: local midnight is 22:00 UTC the day before
        let (start, _) = day_window(date(), FixedOffset::east_opt(2 * 3600).unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 9, 22, 0, 0).unwrap());
    }

    #[test]
    fn test_summarize_heart_rate_statistics() {
        let readings: Vec<HealthData> = [70, 80, 75]
            .into_iter()
            .enumerate()
            .map(|(i, hr)| {
                let mut r = reading_at(8 + i as u32);
                r.heart_rate = Some(hr);
                r
            })
            .collect();

        let summary = summarize(DailySummary::new("patient-1", date(), Utc::now()), &readings, Utc::now());
        assert_eq!(summary.avg_heart_rate, Some(75.0));
        assert_eq!(summary.min_heart_rate, Some(70));
        assert_eq!(summary.max_heart_rate, Some(80));
        assert_eq!(summary.data_points_count, 3);
        assert_eq!(summary.total_steps, 0);
    }

    #[test]
    fn test_summarize_mixed_null_window() {
        let mut first = reading_at(9);
        first.steps = Some(1000);
        first.systolic = Some(120);
        let mut second = reading_at(10);
        second.heart_rate = Some(60);
        second.diastolic = Some(80);
        second.steps = Some(500);
        second.calories = Some(120.5);

        let summary = summarize(DailySummary::new("patient-1", date(), Utc::now()), &[first, second], Utc::now());
        assert_eq!(summary.avg_heart_rate, Some(60.0));
        assert_eq!(summary.avg_systolic, Some(120.0));
        assert_eq!(summary.avg_diastolic, Some(80.0));
        assert_eq!(summary.avg_spo2, None);
        assert_eq!(summary.min_spo2, None);
        assert_eq!(summary.avg_temperature, None);
        assert_eq!(summary.total_steps, 1500);
        assert_eq!(summary.total_sleep_minutes, 0);
        assert_eq!(summary.total_calories, 120.5);
        assert_eq!(summary.total_distance, 0.0);
        assert_eq!(summary.data_points_count, 2);
    }

    #[test]
    fn test_summarize_keeps_loaded_averages_without_data() {
        let mut loaded = DailySummary::new("patient-1", date(), Utc::now());
        loaded.avg_spo2 = Some(97.0);
        loaded.total_steps = 9999;

        let mut reading = reading_at(12);
        reading.heart_rate = Some(72);
        let summary = summarize(loaded, &[reading], Utc::now());

        assert_eq!(summary.avg_spo2, Some(97.0));
        assert_eq!(summary.total_steps, 0);
    }

    #[tokio::test]
    async fn test_empty_day_writes_nothing() {
        let store = Arc::new(InMemoryStorage::new());
        let aggregator = DailyAggregator::new(store.clone());

        assert!(aggregator.generate_summary("patient-1", date()).await.unwrap().is_none());
        assert_eq!(store.summary_count().unwrap(), 0);
        assert_eq!(aggregator.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_runs_for_same_key_produce_one_row() {
        let store = Arc::new(InMemoryStorage::new());
        for hour in [6, 12, 18] {
            let mut r = reading_at(hour);
            r.heart_rate = Some(70);
            store.save_health_data(r).await.unwrap();
        }
        let aggregator = Arc::new(DailyAggregator::new(store.clone()));

        let runs: Vec<_> = (0..8)
            .map(|_| {
                let aggregator = aggregator.clone();
                tokio::spawn(async move { aggregator.generate_summary("patient-1", date()).await })
            })
            .collect();
        for run in futures::future::join_all(runs).await {
            let summary = run.unwrap().unwrap().unwrap();
            assert_eq!(summary.data_points_count, 3);
        }

        assert_eq!(store.summary_count().unwrap(), 1);
        assert_eq!(aggregator.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_releases_its_key() {
        let store = Arc::new(InMemoryStorage::new());
        let aggregator = DailyAggregator::new(store);

        {
            let held = aggregator.lease("patient-1", date());
            let _busy = held.lock.lock().await;

            let waiting = tokio::time::timeout(
                std::time::Duration::from_millis(20),
                aggregator.generate_summary("patient-1", date()),
            )
            .await;
            assert!(waiting.is_err());
            assert_eq!(aggregator.tracked_keys(), 1);
        }

        assert_eq!(aggregator.tracked_keys(), 0);
    }
}
