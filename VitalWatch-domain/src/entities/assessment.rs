use serde::{Deserialize, Serialize};

/// Outcome of comparing a reading with the patient's own recent history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyAssessment {
    /// Value under assessment
    pub value: f64,
    /// Number of history points used as the baseline
    pub history_size: usize,
    /// Baseline mean, absent when history is too short
    pub mean: Option<f64>,
    /// Sample standard deviation of the baseline
    pub std_dev: Option<f64>,
    /// Distance from the mean in standard deviations.
    ///
    /// Absent for short or flat histories, where the relative deviation rule applies instead.
    pub z_score: Option<f64>,
    pub is_anomaly: bool,
}

impl AnomalyAssessment {
    /// Assessment for a reading without enough history to judge
    pub fn insufficient(value: f64, history_size: usize) -> Self {
        Self {
            value,
            history_size,
            mean: None,
            std_dev: None,
            z_score: None,
            is_anomaly: false,
        }
    }
}
