//! VitalWatch worker
//!
//! Composition root: builds the SQLite-backed monitoring service from the
//! environment and runs the recurring jobs until cancelled.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use vital_watch_data::database::{create_sqlite_pool, DatabaseConfig};
use vital_watch_data::repository::{SqliteStorage, VitalStore};
use vital_watch_domain::config::MonitoringConfig;
use vital_watch_domain::MonitoringService;

/// Everything the worker reads from the environment
#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    pub database: DatabaseConfig,
    pub monitoring: MonitoringConfig,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database: DatabaseConfig::from_env().context("invalid database configuration")?,
            monitoring: MonitoringConfig::from_env().context("invalid monitoring configuration")?,
        })
    }
}

/// Open the database and build the monitoring service over it
pub fn build_service(config: &WorkerConfig) -> anyhow::Result<Arc<MonitoringService<SqliteStorage>>> {
    let pool = create_sqlite_pool(&config.database)
        .with_context(|| format!("failed to open database at {}", config.database.sqlite_path))?;
    let store = Arc::new(SqliteStorage::new(pool));
    Ok(Arc::new(MonitoringService::new(store, config.monitoring.clone())))
}

/// Run the escalation scheduler and the summary job until `cancel` fires
pub async fn run<S: VitalStore>(
    service: Arc<MonitoringService<S>>,
    config: MonitoringConfig,
    cancel: CancellationToken,
) {
    let scheduler = service.escalation_scheduler();
    let escalation = {
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };
    let summaries = tokio::spawn(run_summary_job(
        service,
        config.aggregation.interval,
        config.aggregation.utc_offset,
        cancel,
    ));

    let (escalation, summaries) = tokio::join!(escalation, summaries);
    if let Err(e) = escalation {
        error!(error = %e, "Escalation task ended abnormally");
    }
    if let Err(e) = summaries {
        error!(error = %e, "Summary task ended abnormally");
    }
}

/// Periodically rebuild yesterday's and today's summaries for every patient.
///
/// Yesterday is included so late-arriving readings still land in its row.
pub async fn run_summary_job<S: VitalStore>(
    service: Arc<MonitoringService<S>>,
    period: Duration,
    utc_offset: FixedOffset,
    cancel: CancellationToken,
) {
    info!(interval_secs = period.as_secs(), %utc_offset, "Daily summary job started");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Daily summary job stopping");
                break;
            }
            _ = interval.tick() => {
                for date in summary_dates(Utc::now(), utc_offset) {
                    if let Err(e) = service.generate_summaries_for_date(date).await {
                        error!(%date, error = %e, "Daily summary pass failed");
                    }
                }
            }
        }
    }
}

/// Yesterday and today in the given offset
pub fn summary_dates(now: DateTime<Utc>, utc_offset: FixedOffset) -> Vec<NaiveDate> {
    let today = now.with_timezone(&utc_offset).date_naive();
    today.pred_opt().into_iter().chain([today]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vital_watch_data::models::Severity;
    use vital_watch_data::repository::AlertRepositoryTrait;
    use vital_watch_domain::testing::{in_memory_service, seed_alert, HealthDataBuilder};

    #[test]
    fn test_summary_dates_follow_offset() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 23, 30, 0).unwrap();

        let utc = summary_dates(now, FixedOffset::east_opt(0).unwrap());
        assert_eq!(
            utc,
            vec![
                NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
                NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
            ]
        );

        // Already the next day at UTC+2
        let east = summary_dates(now, FixedOffset::east_opt(2 * 3600).unwrap());
        assert_eq!(east[1], NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
    }

    #[tokio::test]
    async fn test_jobs_run_until_cancelled() {
        let (store, service) = in_memory_service();
        let service = Arc::new(service);
        let reading = HealthDataBuilder::new("patient-w", Utc::now()).heart_rate(72).steps(400).build();
        tokio_test::assert_ok!(service.ingest(reading.into()).await);
        let stale = seed_alert(&store, "patient-w", Severity::Medium, chrono::Duration::hours(1), Utc::now())
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run(service.clone(), MonitoringConfig::default(), cancel.clone()));

        // Both loops tick immediately on start
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let escalated = store.find_alert_by_id(stale.id).await.unwrap().unwrap();
            if store.summary_count().unwrap() > 0 && escalated.severity == Severity::High {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "jobs never ran");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .expect("worker did not stop")
            .unwrap();
        assert_eq!(store.summary_count().unwrap(), 1);
    }
}
