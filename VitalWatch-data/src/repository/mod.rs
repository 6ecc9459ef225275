// Repository module structure
pub mod errors;
mod alerts;
mod in_memory;
mod readings;
#[cfg(feature = "sqlite")]
mod storage;
mod summaries;

// Re-export commonly used types
pub use errors::RepositoryError;
pub use alerts::AlertRepositoryTrait;
pub use in_memory::InMemoryStorage;
pub use readings::{HealthDataRepositoryTrait, MeasurementRepositoryTrait};
#[cfg(feature = "sqlite")]
pub use storage::SqliteStorage;
pub use summaries::DailySummaryRepositoryTrait;

/// Everything the monitoring core needs from a backing store
pub trait VitalStore:
    HealthDataRepositoryTrait
    + MeasurementRepositoryTrait
    + AlertRepositoryTrait
    + DailySummaryRepositoryTrait
    + Send
    + Sync
    + 'static
{
}

impl<T> VitalStore for T where
    T: HealthDataRepositoryTrait
        + MeasurementRepositoryTrait
        + AlertRepositoryTrait
        + DailySummaryRepositoryTrait
        + Send
        + Sync
        + 'static
{
}
