use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::DailySummary;
use super::errors::RepositoryError;

/// Repository trait for daily summaries
#[async_trait]
pub trait DailySummaryRepositoryTrait: Send + Sync {
    /// Summary for a patient and day, if one was generated
    async fn find_summary(
        &self,
        patient_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySummary>, RepositoryError>;

    /// Insert or overwrite the row keyed by `(patient_id, date)`.
    ///
    /// An existing row keeps its `id` and `created_at`.
    async fn upsert_summary(&self, summary: DailySummary) -> Result<DailySummary, RepositoryError>;
}
