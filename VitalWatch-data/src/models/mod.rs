pub mod alert;
pub mod summary;
pub mod vitals;

pub use alert::{Alert, AlertSource, NewAlert, Severity};
pub use summary::DailySummary;
pub use vitals::{HealthData, Measurement, MeasurementType, VitalReading};
