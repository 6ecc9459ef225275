use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Storage model for one patient's aggregated vitals over one calendar day.
///
/// Unique per `(patient_id, date)`. Averages, minima and maxima stay `None`
/// until a day contains at least one contributing value; totals are plain sums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// Unique identifier for the summary row
    pub id: Uuid,

    /// Patient the summary belongs to
    pub patient_id: String,

    /// Calendar day covered by the summary
    pub date: NaiveDate,

    pub avg_heart_rate: Option<f64>,
    pub min_heart_rate: Option<i32>,
    pub max_heart_rate: Option<i32>,

    pub total_steps: i64,
    pub total_sleep_minutes: i64,

    pub avg_spo2: Option<f64>,
    pub min_spo2: Option<i32>,

    pub avg_systolic: Option<f64>,
    pub avg_diastolic: Option<f64>,

    pub avg_temperature: Option<f64>,

    pub total_calories: f64,
    pub total_distance: f64,

    /// Number of readings that fell in the day window
    pub data_points_count: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailySummary {
    /// Create an empty summary row for a patient and day
    pub fn new(patient_id: impl Into<String>, date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id: patient_id.into(),
            date,
            avg_heart_rate: None,
            min_heart_rate: None,
            max_heart_rate: None,
            total_steps: 0,
            total_sleep_minutes: 0,
            avg_spo2: None,
            min_spo2: None,
            avg_systolic: None,
            avg_diastolic: None,
            avg_temperature: None,
            total_calories: 0.0,
            total_distance: 0.0,
            data_points_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
