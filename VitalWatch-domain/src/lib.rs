// VitalWatch Domain
// This crate contains the health-monitoring and alerting logic for VitalWatch

// Alert audit trail
pub mod audit;

// Runtime configuration
pub mod config;

// Domain entities
pub mod entities;

// Error types
pub mod error;

// Bounded retry for store calls
pub mod retry;

// Services that implement business logic
pub mod services;

// Re-export the data layer for convenience
pub use vital_watch_data::{database, repository};

pub use config::MonitoringConfig;
pub use error::MonitoringError;
pub use services::MonitoringService;

// Testing utilities - only available with mock feature
#[cfg(feature = "mock")]
pub mod testing;
