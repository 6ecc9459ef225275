use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

/// Storage model for a multi-vital record pushed by a smartwatch or a manual device.
///
/// Every vital is optional; a record carrying only steps is as valid as one
/// carrying a full set of vitals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct HealthData {
    /// Unique identifier for the record
    pub id: Uuid,

    /// Patient the record belongs to
    #[validate(length(min = 1, max = 128, message = "Patient id must be between 1 and 128 characters"))]
    pub patient_id: String,

    /// Optional device that produced the record
    pub device_id: Option<String>,

    /// Heart rate in beats per minute
    pub heart_rate: Option<i32>,

    /// Peripheral oxygen saturation in percent
    pub spo2: Option<i32>,

    /// Systolic blood pressure in mmHg
    pub systolic: Option<i32>,

    /// Diastolic blood pressure in mmHg
    pub diastolic: Option<i32>,

    /// Body temperature in degrees Celsius
    pub temperature: Option<f64>,

    /// Step count
    pub steps: Option<i32>,

    /// Minutes slept
    pub sleep_minutes: Option<i32>,

    /// Active calories burned
    pub calories: Option<f64>,

    /// Distance covered in kilometres
    pub distance: Option<f64>,

    /// When the vitals were taken (event time)
    pub timestamp: DateTime<Utc>,

    /// When the record reached the server
    pub received_at: DateTime<Utc>,
}

impl HealthData {
    /// Create an empty record for a patient; vitals are filled in by the caller.
    pub fn new(patient_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id: patient_id.into(),
            device_id: None,
            heart_rate: None,
            spo2: None,
            systolic: None,
            diastolic: None,
            temperature: None,
            steps: None,
            sleep_minutes: None,
            calories: None,
            distance: None,
            timestamp,
            received_at: Utc::now(),
        }
    }
}

/// Known measurement types on the legacy generic path.
///
/// Unrecognised type strings are kept verbatim (normalised) in `Other` so they
/// still get stored and build their own history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MeasurementType {
    HeartRate,
    Spo2,
    BloodPressureSystolic,
    BloodPressureDiastolic,
    Temperature,
    Steps,
    SleepMinutes,
    Calories,
    Distance,
    Other(String),
}

impl MeasurementType {
    /// Canonical key used for storage and history lookups
    pub fn as_str(&self) -> &str {
        match self {
            MeasurementType::HeartRate => "heart_rate",
            MeasurementType::Spo2 => "spo2",
            MeasurementType::BloodPressureSystolic => "blood_pressure_systolic",
            MeasurementType::BloodPressureDiastolic => "blood_pressure_diastolic",
            MeasurementType::Temperature => "temperature",
            MeasurementType::Steps => "steps",
            MeasurementType::SleepMinutes => "sleep_minutes",
            MeasurementType::Calories => "calories",
            MeasurementType::Distance => "distance",
            MeasurementType::Other(raw) => raw,
        }
    }

    /// Display unit for the type, empty when the type carries no unit
    pub fn unit(&self) -> &'static str {
        match self {
            MeasurementType::HeartRate => "bpm",
            MeasurementType::Spo2 => "%",
            MeasurementType::BloodPressureSystolic | MeasurementType::BloodPressureDiastolic => "mmHg",
            MeasurementType::Temperature => "°C",
            MeasurementType::Steps => "steps",
            MeasurementType::SleepMinutes => "min",
            MeasurementType::Calories => "kcal",
            MeasurementType::Distance => "km",
            MeasurementType::Other(_) => "",
        }
    }
}

impl FromStr for MeasurementType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Ok(match normalized.as_str() {
            "heart_rate" | "heartrate" => MeasurementType::HeartRate,
            "spo2" | "oxygen_saturation" => MeasurementType::Spo2,
            "blood_pressure_systolic" | "systolic" => MeasurementType::BloodPressureSystolic,
            "blood_pressure_diastolic" | "diastolic" => MeasurementType::BloodPressureDiastolic,
            "temperature" => MeasurementType::Temperature,
            "steps" => MeasurementType::Steps,
            "sleep_minutes" => MeasurementType::SleepMinutes,
            "calories" => MeasurementType::Calories,
            "distance" => MeasurementType::Distance,
            _ => MeasurementType::Other(normalized),
        })
    }
}

impl From<String> for MeasurementType {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<MeasurementType> for String {
    fn from(value: MeasurementType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn validate_measurement_type(kind: &MeasurementType) -> Result<(), ValidationError> {
    let key = kind.as_str();
    if key.is_empty() || key.len() > 64 {
        let mut error = ValidationError::new("measurement_type");
        error.message = Some("Measurement type must be between 1 and 64 characters".into());
        return Err(error);
    }
    Ok(())
}

/// Storage model for a legacy single-value measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Measurement {
    /// Unique identifier for the measurement
    pub id: Uuid,

    /// Patient the measurement belongs to
    #[validate(length(min = 1, max = 128, message = "Patient id must be between 1 and 128 characters"))]
    pub patient_id: String,

    /// Optional device that produced the measurement
    pub device_id: Option<String>,

    /// What was measured
    #[serde(rename = "type")]
    #[validate(custom = "validate_measurement_type")]
    pub measurement_type: MeasurementType,

    /// Raw measured value
    pub value: f64,

    /// When the measurement was taken (event time)
    pub timestamp: DateTime<Utc>,

    /// When the measurement reached the server
    pub received_at: DateTime<Utc>,
}

impl Measurement {
    pub fn new(
        patient_id: impl Into<String>,
        measurement_type: MeasurementType,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id: patient_id.into(),
            device_id: None,
            measurement_type,
            value,
            timestamp,
            received_at: Utc::now(),
        }
    }
}

/// One inbound record on the ingestion stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VitalReading {
    HealthData(HealthData),
    Measurement(Measurement),
}

impl VitalReading {
    pub fn id(&self) -> Uuid {
        match self {
            VitalReading::HealthData(data) => data.id,
            VitalReading::Measurement(measurement) => measurement.id,
        }
    }

    pub fn patient_id(&self) -> &str {
        match self {
            VitalReading::HealthData(data) => &data.patient_id,
            VitalReading::Measurement(measurement) => &measurement.patient_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            VitalReading::HealthData(data) => data.timestamp,
            VitalReading::Measurement(measurement) => measurement.timestamp,
        }
    }

    /// Validate whichever record shape this is
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            VitalReading::HealthData(data) => data.validate(),
            VitalReading::Measurement(measurement) => measurement.validate(),
        }
    }
}

impl From<HealthData> for VitalReading {
    fn from(value: HealthData) -> Self {
        VitalReading::HealthData(value)
    }
}

impl From<Measurement> for VitalReading {
    fn from(value: Measurement) -> Self {
        VitalReading::Measurement(value)
    }
}
