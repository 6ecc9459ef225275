// Domain entities and value objects
pub mod assessment;
pub mod breach;

// Storage models shared with the data layer
pub use vital_watch_data::models::{
    Alert, AlertSource, DailySummary, HealthData, Measurement, MeasurementType, NewAlert, Severity,
    VitalReading,
};

pub use assessment::AnomalyAssessment;
pub use breach::{Direction, ThresholdBreach, VitalSign};
