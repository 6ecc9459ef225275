//! Runtime configuration for the monitoring core
//!
//! Every setting has a default matching the reference clinical behaviour and
//! can be overridden through environment variables (a `.env` file is loaded
//! by the worker before these are read).

use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use thiserror::Error;
use tracing::info;

use vital_watch_data::env::{parse_var, InvalidVar};

use crate::retry::RetryPolicy;

/// Configuration errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Variable present but not parseable
    #[error(transparent)]
    Invalid(#[from] InvalidVar),

    /// Values parse but do not make sense together
    #[error("Invalid configuration: {0}")]
    OutOfRange(String),
}

/// Escalation scheduler settings
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationConfig {
    /// Time between scheduled passes
    pub interval: Duration,
    /// How long a MEDIUM alert may stay unescalated
    pub dwell: chrono::Duration,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            dwell: chrono::Duration::minutes(15),
        }
    }
}

/// Personal-baseline anomaly detector settings
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyConfig {
    /// Most recent same-type readings used as the baseline
    pub history_limit: usize,
    /// Fewer history points than this never flag an anomaly
    pub min_history: usize,
    /// z-score above which a value is anomalous
    pub z_threshold: f64,
    /// Standard deviation below which the series counts as flat
    pub flat_sigma: f64,
    /// Relative deviation from the mean that flags a flat series
    pub flat_relative_deviation: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            history_limit: 20,
            min_history: 5,
            z_threshold: 2.5,
            flat_sigma: 0.1,
            flat_relative_deviation: 0.2,
        }
    }
}

/// Daily aggregation settings
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationConfig {
    /// Offset defining where a calendar day starts and ends
    pub utc_offset: FixedOffset,
    /// Time between scheduled summary passes in the worker
    pub interval: Duration,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
            interval: Duration::from_secs(3600),
        }
    }
}

/// Complete monitoring configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitoringConfig {
    pub escalation: EscalationConfig,
    pub anomaly: AnomalyConfig,
    pub aggregation: AggregationConfig,
    pub retry: RetryPolicy,
}

impl MonitoringConfig {
    /// Read configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let escalation = EscalationConfig {
            interval: Duration::from_secs(parse_var(
                "ESCALATION_INTERVAL_SECS",
                defaults.escalation.interval.as_secs(),
            )?),
            dwell: dwell_from_minutes(parse_var(
                "ESCALATION_DWELL_MINUTES",
                defaults.escalation.dwell.num_minutes(),
            )?)?,
        };

        let anomaly = AnomalyConfig {
            history_limit: parse_var("ANOMALY_HISTORY_LIMIT", defaults.anomaly.history_limit)?,
            min_history: parse_var("ANOMALY_MIN_HISTORY", defaults.anomaly.min_history)?,
            z_threshold: parse_var("ANOMALY_Z_THRESHOLD", defaults.anomaly.z_threshold)?,
            ..defaults.anomaly
        };

        let aggregation = AggregationConfig {
            utc_offset: offset_from_minutes(parse_var("SUMMARY_UTC_OFFSET_MINUTES", 0)?)?,
            interval: Duration::from_secs(parse_var(
                "SUMMARY_INTERVAL_SECS",
                defaults.aggregation.interval.as_secs(),
            )?),
        };

        let retry = RetryPolicy {
            attempts: parse_var("STORE_RETRY_ATTEMPTS", defaults.retry.attempts)?,
            backoff: Duration::from_millis(parse_var(
                "STORE_RETRY_BACKOFF_MS",
                defaults.retry.backoff.as_millis() as u64,
            )?),
        };

        let config = Self {
            escalation,
            anomaly,
            aggregation,
            retry,
        };
        config.validate()?;

        info!(
            escalation_interval_secs = config.escalation.interval.as_secs(),
            escalation_dwell_minutes = config.escalation.dwell.num_minutes(),
            anomaly_history_limit = config.anomaly.history_limit,
            anomaly_min_history = config.anomaly.min_history,
            summary_utc_offset = %config.aggregation.utc_offset,
            "Monitoring configuration loaded"
        );
        Ok(config)
    }

    /// Check that the values make sense together
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.escalation.interval.is_zero() {
            return Err(ConfigError::OutOfRange("escalation interval must be positive".to_string()));
        }
        if self.escalation.dwell < chrono::Duration::zero() {
            return Err(ConfigError::OutOfRange("escalation dwell cannot be negative".to_string()));
        }
        // The sample standard deviation needs two points
        if self.anomaly.min_history < 2 {
            return Err(ConfigError::OutOfRange("anomaly min history must be at least 2".to_string()));
        }
        if self.anomaly.history_limit < self.anomaly.min_history {
            return Err(ConfigError::OutOfRange(
                "anomaly history limit must not be below min history".to_string(),
            ));
        }
        if !(self.anomaly.z_threshold.is_finite() && self.anomaly.z_threshold > 0.0) {
            return Err(ConfigError::OutOfRange("anomaly z threshold must be positive".to_string()));
        }
        if self.aggregation.interval.is_zero() {
            return Err(ConfigError::OutOfRange("summary interval must be positive".to_string()));
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::OutOfRange("store retry attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn dwell_from_minutes(minutes: i64) -> Result<chrono::Duration, ConfigError> {
    chrono::Duration::try_minutes(minutes).ok_or_else(|| {
        ConfigError::OutOfRange(format!("ESCALATION_DWELL_MINUTES {} is out of range", minutes))
    })
}

fn offset_from_minutes(minutes: i32) -> Result<FixedOffset, ConfigError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| {
            ConfigError::OutOfRange(format!("SUMMARY_UTC_OFFSET_MINUTES {} is not a valid offset", minutes))
        })
}
