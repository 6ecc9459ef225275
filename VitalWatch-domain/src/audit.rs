use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use vital_watch_data::models::{Alert, Severity};

/// Alert lifecycle events worth an audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertEventType {
    /// Alert recorded by the rule engine or anomaly detector
    Created,
    /// Severity raised by the escalation scheduler
    Escalated,
    /// Alert acknowledged by care staff
    Read,
}

impl std::fmt::Display for AlertEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertEventType::Created => write!(f, "CREATED"),
            AlertEventType::Escalated => write!(f, "ESCALATED"),
            AlertEventType::Read => write!(f, "READ"),
        }
    }
}

/// Alert audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Type of alert event
    pub event_type: AlertEventType,
    /// Alert the event applies to
    pub alert_id: Uuid,
    /// Patient the alert concerns
    pub patient_id: String,
    /// Severity after the event
    pub severity: Severity,
    /// Severity before the event, for escalations
    pub previous_severity: Option<Severity>,
    /// When the event happened
    pub timestamp: DateTime<Utc>,
}

impl AlertEvent {
    /// Create a new event describing the alert's current state
    pub fn new(event_type: AlertEventType, alert: &Alert) -> Self {
        Self {
            event_type,
            alert_id: alert.id,
            patient_id: alert.patient_id.clone(),
            severity: alert.severity,
            previous_severity: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the severity the alert had before the event
    pub fn with_previous_severity(mut self, severity: Severity) -> Self {
        self.previous_severity = Some(severity);
        self
    }
}

/// Log an alert event.
///
/// Messages are not logged; they embed raw vitals.
pub fn log_alert_event(event: AlertEvent) {
    info!(
        target: "audit",
        event_type = %event.event_type,
        alert_id = %event.alert_id,
        patient_id = %event.patient_id,
        severity = %event.severity,
        previous_severity = ?event.previous_severity,
        timestamp = %event.timestamp.to_rfc3339(),
        "ALERT-LOG"
    );
}

/// Log a newly created alert
pub fn log_alert_created(alert: &Alert) {
    log_alert_event(AlertEvent::new(AlertEventType::Created, alert));
}

/// Log a severity escalation
pub fn log_alert_escalated(alert: &Alert, previous: Severity) {
    log_alert_event(AlertEvent::new(AlertEventType::Escalated, alert).with_previous_severity(previous));
}

/// Log an acknowledgement
pub fn log_alert_read(alert: &Alert) {
    log_alert_event(AlertEvent::new(AlertEventType::Read, alert));
}
