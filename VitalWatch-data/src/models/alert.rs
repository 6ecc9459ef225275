use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alert severity, ordered from least to most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(format!("invalid severity: {}", other)),
        }
    }
}

/// Which evaluator raised an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSource {
    /// Fixed clinical threshold
    Threshold,
    /// Deviation from the patient's own baseline
    Anomaly,
}

impl AlertSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSource::Threshold => "THRESHOLD",
            AlertSource::Anomaly => "ANOMALY",
        }
    }
}

impl FromStr for AlertSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "THRESHOLD" => Ok(AlertSource::Threshold),
            "ANOMALY" => Ok(AlertSource::Anomaly),
            other => Err(format!("invalid alert source: {}", other)),
        }
    }
}

/// Storage model for an alert raised for care staff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique identifier for the alert
    pub id: Uuid,

    /// Patient the alert concerns
    pub patient_id: String,

    /// Reading that triggered the alert, if any
    pub source_reading_id: Option<Uuid>,

    /// Human-readable description
    pub message: String,

    /// Current severity
    pub severity: Severity,

    /// Evaluator that raised the alert
    pub source: AlertSource,

    /// Creation time, assigned by the store
    pub timestamp: DateTime<Utc>,

    /// Whether care staff have seen the alert
    pub is_read: bool,

    /// Optimistic concurrency counter, bumped on every update
    pub version: u64,
}

/// Input data for recording a new alert
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub patient_id: String,
    pub source_reading_id: Option<Uuid>,
    pub message: String,
    pub severity: Severity,
    pub source: AlertSource,
}

impl NewAlert {
    /// Materialise the alert with a fresh id, the given creation time and the unread flag
    pub fn into_alert(self, timestamp: DateTime<Utc>) -> Alert {
        Alert {
            id: Uuid::new_v4(),
            patient_id: self.patient_id,
            source_reading_id: self.source_reading_id,
            message: self.message,
            severity: self.severity,
            source: self.source,
            timestamp,
            is_read: false,
            version: 0,
        }
    }
}
