// Domain services
// Rule evaluation, anomaly detection and the scheduled jobs that act on stored alerts and readings.
pub mod aggregation;
pub mod alerts;
pub mod anomaly;
pub mod escalation;
pub mod messages;
pub mod monitoring;
pub mod thresholds;

// Re-export the service types used by callers
pub use aggregation::DailyAggregator;
pub use alerts::AlertService;
pub use anomaly::AnomalyDetector;
pub use escalation::{EscalationReport, EscalationScheduler};
pub use monitoring::MonitoringService;
