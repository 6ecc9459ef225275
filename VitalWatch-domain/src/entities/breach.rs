use std::fmt;

use serde::{Deserialize, Serialize};

use vital_watch_data::models::{MeasurementType, Severity};

/// Vital signs covered by the clinical threshold rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalSign {
    HeartRate,
    Spo2,
    Systolic,
    Temperature,
}

impl VitalSign {
    /// Label used in alert messages
    pub fn label(&self) -> &'static str {
        match self {
            VitalSign::HeartRate => "heart rate",
            VitalSign::Spo2 => "SpO2 level",
            VitalSign::Systolic => "blood pressure",
            VitalSign::Temperature => "temperature",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            VitalSign::HeartRate => "bpm",
            VitalSign::Spo2 => "%",
            VitalSign::Systolic => "mmHg",
            VitalSign::Temperature => "°C",
        }
    }

    /// Vital sign checked for a legacy measurement type, if any
    pub fn for_measurement_type(measurement_type: &MeasurementType) -> Option<Self> {
        match measurement_type {
            MeasurementType::HeartRate => Some(VitalSign::HeartRate),
            MeasurementType::Spo2 => Some(VitalSign::Spo2),
            _ => None,
        }
    }
}

impl fmt::Display for VitalSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Side of the normal band a value fell on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    High,
    Low,
}

/// A single fired threshold rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBreach {
    pub vital: VitalSign,
    /// Raw value as measured
    pub value: f64,
    pub direction: Direction,
    pub severity: Severity,
}

impl ThresholdBreach {
    pub fn new(vital: VitalSign, value: f64, direction: Direction, severity: Severity) -> Self {
        Self {
            vital,
            value,
            direction,
            severity,
        }
    }
}
