use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use crate::database::SqlitePool;
use crate::models::{Alert, DailySummary, HealthData, Measurement, MeasurementType, Severity};
use super::alerts::AlertRepositoryTrait;
use super::errors::RepositoryError;
use super::readings::{HealthDataRepositoryTrait, MeasurementRepositoryTrait};
use super::summaries::DailySummaryRepositoryTrait;

/// SQLite-backed storage implementing every repository trait.
///
/// Timestamps are stored as fixed-width RFC 3339 text with nanoseconds so that
/// lexical order matches chronological order. Queries run on the blocking pool.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, op: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, RepositoryError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            op(&conn)
        })
        .await
        .map_err(|e| RepositoryError::Unavailable(format!("storage task failed: {}", e)))?
    }
}

fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn ts_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn uuid_at(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn health_data_from_row(row: &Row) -> rusqlite::Result<HealthData> {
    Ok(HealthData {
        id: uuid_at(row, 0)?,
        patient_id: row.get(1)?,
        device_id: row.get(2)?,
        heart_rate: row.get(3)?,
        spo2: row.get(4)?,
        systolic: row.get(5)?,
        diastolic: row.get(6)?,
        temperature: row.get(7)?,
        steps: row.get(8)?,
        sleep_minutes: row.get(9)?,
        calories: row.get(10)?,
        distance: row.get(11)?,
        timestamp: ts_at(row, 12)?,
        received_at: ts_at(row, 13)?,
    })
}

fn measurement_from_row(row: &Row) -> rusqlite::Result<Measurement> {
    Ok(Measurement {
        id: uuid_at(row, 0)?,
        patient_id: row.get(1)?,
        device_id: row.get(2)?,
        measurement_type: MeasurementType::from(row.get::<_, String>(3)?),
        value: row.get(4)?,
        timestamp: ts_at(row, 5)?,
        received_at: ts_at(row, 6)?,
    })
}

fn alert_from_row(row: &Row) -> rusqlite::Result<Alert> {
    let source_reading_id = match row.get::<_, Option<String>>(2)? {
        Some(raw) => Some(Uuid::parse_str(&raw).map_err(|e| conversion_error(2, e))?),
        None => None,
    };
    Ok(Alert {
        id: uuid_at(row, 0)?,
        patient_id: row.get(1)?,
        source_reading_id,
        message: row.get(3)?,
        severity: row.get::<_, String>(4)?.parse().map_err(|e: String| conversion_error(4, e))?,
        source: row.get::<_, String>(5)?.parse().map_err(|e: String| conversion_error(5, e))?,
        timestamp: ts_at(row, 6)?,
        is_read: row.get(7)?,
        version: row.get::<_, i64>(8)? as u64,
    })
}

fn summary_from_row(row: &Row) -> rusqlite::Result<DailySummary> {
    let raw_date: String = row.get(2)?;
    Ok(DailySummary {
        id: uuid_at(row, 0)?,
        patient_id: row.get(1)?,
        date: NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d").map_err(|e| conversion_error(2, e))?,
        avg_heart_rate: row.get(3)?,
        min_heart_rate: row.get(4)?,
        max_heart_rate: row.get(5)?,
        total_steps: row.get(6)?,
        total_sleep_minutes: row.get(7)?,
        avg_spo2: row.get(8)?,
        min_spo2: row.get(9)?,
        avg_systolic: row.get(10)?,
        avg_diastolic: row.get(11)?,
        avg_temperature: row.get(12)?,
        total_calories: row.get(13)?,
        total_distance: row.get(14)?,
        data_points_count: row.get(15)?,
        created_at: ts_at(row, 16)?,
        updated_at: ts_at(row, 17)?,
    })
}

const HEALTH_DATA_COLUMNS: &str = "id, patient_id, device_id, heart_rate, spo2, systolic, diastolic, \
     temperature, steps, sleep_minutes, calories, distance, timestamp, received_at";

const MEASUREMENT_COLUMNS: &str =
    "id, patient_id, device_id, measurement_type, value, timestamp, received_at";

const ALERT_COLUMNS: &str =
    "id, patient_id, source_reading_id, message, severity, source, timestamp, is_read, version";

const SUMMARY_COLUMNS: &str = "id, patient_id, date, avg_heart_rate, min_heart_rate, max_heart_rate, \
     total_steps, total_sleep_minutes, avg_spo2, min_spo2, avg_systolic, avg_diastolic, \
     avg_temperature, total_calories, total_distance, data_points_count, created_at, updated_at";

fn query_alerts(
    conn: &Connection,
    filter: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Alert>, RepositoryError> {
    let sql = format!("SELECT {} FROM alerts {}", ALERT_COLUMNS, filter);
    let mut stmt = conn.prepare(&sql)?;
    let alerts = stmt
        .query_map(params, alert_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(alerts)
}

#[async_trait]
impl HealthDataRepositoryTrait for SqliteStorage {
    async fn save_health_data(&self, data: HealthData) -> Result<HealthData, RepositoryError> {
        debug!("Storing health data in database: id={}", data.id);
        self.run(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO health_data ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                    HEALTH_DATA_COLUMNS
                ),
                params![
                    data.id.to_string(),
                    data.patient_id,
                    data.device_id,
                    data.heart_rate,
                    data.spo2,
                    data.systolic,
                    data.diastolic,
                    data.temperature,
                    data.steps,
                    data.sleep_minutes,
                    data.calories,
                    data.distance,
                    encode_ts(&data.timestamp),
                    encode_ts(&data.received_at),
                ],
            )?;
            Ok(data)
        })
        .await
    }

    async fn find_by_patient_and_time_range(
        &self,
        patient_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HealthData>, RepositoryError> {
        let patient_id = patient_id.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM health_data
                 WHERE patient_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3
                 ORDER BY timestamp ASC, rowid ASC",
                HEALTH_DATA_COLUMNS
            ))?;
            let readings = stmt
                .query_map(params![patient_id, encode_ts(&start), encode_ts(&end)], health_data_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(readings)
        })
        .await
    }

    async fn find_patients_with_data(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, RepositoryError> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT patient_id FROM health_data
                 WHERE timestamp >= ?1 AND timestamp <= ?2
                 ORDER BY patient_id",
            )?;
            let patients = stmt
                .query_map(params![encode_ts(&start), encode_ts(&end)], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(patients)
        })
        .await
    }
}

#[async_trait]
impl MeasurementRepositoryTrait for SqliteStorage {
    async fn save_measurement(&self, measurement: Measurement) -> Result<Measurement, RepositoryError> {
        debug!("Storing measurement in database: id={}", measurement.id);
        self.run(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO measurements ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    MEASUREMENT_COLUMNS
                ),
                params![
                    measurement.id.to_string(),
                    measurement.patient_id,
                    measurement.device_id,
                    measurement.measurement_type.as_str(),
                    measurement.value,
                    encode_ts(&measurement.timestamp),
                    encode_ts(&measurement.received_at),
                ],
            )?;
            Ok(measurement)
        })
        .await
    }

    async fn find_recent_by_patient_and_type(
        &self,
        patient_id: &str,
        measurement_type: &MeasurementType,
        limit: usize,
    ) -> Result<Vec<Measurement>, RepositoryError> {
        let patient_id = patient_id.to_string();
        let kind = measurement_type.as_str().to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM measurements
                 WHERE patient_id = ?1 AND measurement_type = ?2
                 ORDER BY timestamp DESC, rowid ASC
                 LIMIT ?3",
                MEASUREMENT_COLUMNS
            ))?;
            let history = stmt
                .query_map(params![patient_id, kind, limit], measurement_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(history)
        })
        .await
    }
}

#[async_trait]
impl AlertRepositoryTrait for SqliteStorage {
    async fn save_alert(&self, alert: Alert) -> Result<Alert, RepositoryError> {
        debug!("Storing alert in database: id={}", alert.id);
        self.run(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO alerts ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    ALERT_COLUMNS
                ),
                params![
                    alert.id.to_string(),
                    alert.patient_id,
                    alert.source_reading_id.map(|id| id.to_string()),
                    alert.message,
                    alert.severity.as_str(),
                    alert.source.as_str(),
                    encode_ts(&alert.timestamp),
                    alert.is_read,
                    alert.version as i64,
                ],
            )?;
            Ok(alert)
        })
        .await
    }

    async fn update_alert(&self, alert: Alert) -> Result<Alert, RepositoryError> {
        debug!("Updating alert in database: id={} version={}", alert.id, alert.version);
        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE alerts SET message = ?1, severity = ?2, is_read = ?3, version = version + 1
                 WHERE id = ?4 AND version = ?5",
                params![
                    alert.message,
                    alert.severity.as_str(),
                    alert.is_read,
                    alert.id.to_string(),
                    alert.version as i64,
                ],
            )?;

            if changed == 0 {
                let found: Option<i64> = conn
                    .query_row(
                        "SELECT version FROM alerts WHERE id = ?1",
                        params![alert.id.to_string()],
                        |row| row.get(0),
                    )
                    .optional()?;
                return Err(match found {
                    Some(found) => RepositoryError::Conflict {
                        id: alert.id,
                        expected: alert.version,
                        found: found as u64,
                    },
                    None => RepositoryError::NotFound(format!("alert {}", alert.id)),
                });
            }

            let mut updated = alert;
            updated.version += 1;
            Ok(updated)
        })
        .await
    }

    async fn find_alert_by_id(&self, id: Uuid) -> Result<Option<Alert>, RepositoryError> {
        self.run(move |conn| {
            let alert = conn
                .query_row(
                    &format!("SELECT {} FROM alerts WHERE id = ?1", ALERT_COLUMNS),
                    params![id.to_string()],
                    alert_from_row,
                )
                .optional()?;
            Ok(alert)
        })
        .await
    }

    async fn find_alerts_by_patient(&self, patient_id: &str) -> Result<Vec<Alert>, RepositoryError> {
        let patient_id = patient_id.to_string();
        self.run(move |conn| {
            query_alerts(
                conn,
                "WHERE patient_id = ?1 ORDER BY timestamp DESC, rowid ASC",
                &[&patient_id],
            )
        })
        .await
    }

    async fn find_unread_alerts(&self) -> Result<Vec<Alert>, RepositoryError> {
        self.run(|conn| query_alerts(conn, "WHERE is_read = 0 ORDER BY timestamp DESC, rowid ASC", &[]))
            .await
    }

    async fn find_alerts_by_severity_older_than(
        &self,
        severity: Severity,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Alert>, RepositoryError> {
        self.run(move |conn| {
            query_alerts(
                conn,
                "WHERE severity = ?1 AND timestamp < ?2 ORDER BY timestamp ASC, rowid ASC",
                &[&severity.as_str(), &encode_ts(&cutoff)],
            )
        })
        .await
    }
}

#[async_trait]
impl DailySummaryRepositoryTrait for SqliteStorage {
    async fn find_summary(
        &self,
        patient_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySummary>, RepositoryError> {
        let patient_id = patient_id.to_string();
        self.run(move |conn| {
            let summary = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM daily_summaries WHERE patient_id = ?1 AND date = ?2",
                        SUMMARY_COLUMNS
                    ),
                    params![patient_id, date.format("%Y-%m-%d").to_string()],
                    summary_from_row,
                )
                .optional()?;
            Ok(summary)
        })
        .await
    }

    async fn upsert_summary(&self, summary: DailySummary) -> Result<DailySummary, RepositoryError> {
        debug!(
            "Upserting daily summary in database: patient={} date={}",
            summary.patient_id, summary.date
        );
        self.run(move |conn| {
            let date = summary.date.format("%Y-%m-%d").to_string();
            conn.execute(
                &format!(
                    "INSERT INTO daily_summaries ({}) VALUES
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
                     ON CONFLICT (patient_id, date) DO UPDATE SET
                        avg_heart_rate = excluded.avg_heart_rate,
                        min_heart_rate = excluded.min_heart_rate,
                        max_heart_rate = excluded.max_heart_rate,
                        total_steps = excluded.total_steps,
                        total_sleep_minutes = excluded.total_sleep_minutes,
                        avg_spo2 = excluded.avg_spo2,
                        min_spo2 = excluded.min_spo2,
                        avg_systolic = excluded.avg_systolic,
                        avg_diastolic = excluded.avg_diastolic,
                        avg_temperature = excluded.avg_temperature,
                        total_calories = excluded.total_calories,
                        total_distance = excluded.total_distance,
                        data_points_count = excluded.data_points_count,
                        updated_at = excluded.updated_at",
                    SUMMARY_COLUMNS
                ),
                params![
                    summary.id.to_string(),
                    summary.patient_id,
                    date,
                    summary.avg_heart_rate,
                    summary.min_heart_rate,
                    summary.max_heart_rate,
                    summary.total_steps,
                    summary.total_sleep_minutes,
                    summary.avg_spo2,
                    summary.min_spo2,
                    summary.avg_systolic,
                    summary.avg_diastolic,
                    summary.avg_temperature,
                    summary.total_calories,
                    summary.total_distance,
                    summary.data_points_count,
                    encode_ts(&summary.created_at),
                    encode_ts(&summary.updated_at),
                ],
            )?;

            let stored = conn.query_row(
                &format!(
                    "SELECT {} FROM daily_summaries WHERE patient_id = ?1 AND date = ?2",
                    SUMMARY_COLUMNS
                ),
                params![summary.patient_id, date],
                summary_from_row,
            )?;
            Ok(stored)
        })
        .await
    }
}
