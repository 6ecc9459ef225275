//! Timed escalation of unattended alerts
//!
//! MEDIUM alerts older than the dwell time are raised to HIGH and their
//! message marked with [`ESCALATED_PREFIX`]. HIGH and CRITICAL alerts are left
//! alone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use vital_watch_data::models::Severity;
use vital_watch_data::repository::AlertRepositoryTrait;

use crate::audit;
use crate::config::EscalationConfig;
use crate::error::MonitoringError;
use crate::retry::RetryPolicy;
use crate::services::messages::{escalated_message, ESCALATED_PREFIX};

/// Outcome of one escalation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EscalationReport {
    /// Alerts returned by the age query
    pub scanned: usize,
    /// Alerts raised to HIGH
    pub escalated: usize,
    /// Alerts whose update failed, including version conflicts
    pub failed: usize,
}

/// Recurring scan that raises the severity of old MEDIUM alerts
pub struct EscalationScheduler<R: AlertRepositoryTrait> {
    repository: Arc<R>,
    config: EscalationConfig,
    retry: RetryPolicy,
    running: AtomicBool,
}

/// Clears the single-flight flag when a pass ends, however it ends
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<R: AlertRepositoryTrait> EscalationScheduler<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_config(repository, EscalationConfig::default(), RetryPolicy::default())
    }

    pub fn with_config(repository: Arc<R>, config: EscalationConfig, retry: RetryPolicy) -> Self {
        Self {
            repository,
            config,
            retry,
            running: AtomicBool::new(false),
        }
    }

    /// Run one pass against the real clock
    pub async fn run_escalation_pass(&self) -> Result<Option<EscalationReport>, MonitoringError> {
        self.run_pass_at(Utc::now()).await
    }

    /// Run one pass as if the current time were `now`.
    ///
    /// Returns `Ok(None)` without touching the store when another pass is
    /// still in flight. Per-alert failures are logged and counted; only a
    /// failing scan query is an error.
    pub async fn run_pass_at(&self, now: DateTime<Utc>) -> Result<Option<EscalationReport>, MonitoringError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Escalation pass already running, skipping trigger");
            return Ok(None);
        }
        let _guard = PassGuard(&self.running);

        let cutoff = now - self.config.dwell;
        let candidates = self
            .retry
            .run("find_alerts_by_severity_older_than", || {
                self.repository
                    .find_alerts_by_severity_older_than(Severity::Medium, cutoff)
            })
            .await?;

        let mut report = EscalationReport {
            scanned: candidates.len(),
            ..EscalationReport::default()
        };

        for alert in candidates {
            if alert.severity != Severity::Medium {
                continue;
            }
            let previous = alert.severity;
            let mut escalated = alert.clone();
            escalated.severity = Severity::High;
            escalated.message = escalated_message(&alert.message);

            match self
                .retry
                .run("update_alert", || self.repository.update_alert(escalated.clone()))
                .await
            {
                Ok(updated) => {
                    report.escalated += 1;
                    audit::log_alert_escalated(&updated, previous);
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        alert_id = %alert.id,
                        patient_id = %alert.patient_id,
                        error = %e,
                        "Failed to escalate alert"
                    );
                }
            }
        }

        if report.scanned > 0 {
            info!(
                scanned = report.scanned,
                escalated = report.escalated,
                failed = report.failed,
                prefix = ESCALATED_PREFIX.trim(),
                "Escalation pass complete"
            );
        } else {
            debug!("Escalation pass found nothing to escalate");
        }
        Ok(Some(report))
    }

    /// Run passes on the configured period until `cancel` fires.
    ///
    /// Missed ticks are skipped rather than replayed. A pass that has started
    /// is allowed to finish before cancellation is observed.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            dwell_minutes = self.config.dwell.num_minutes(),
            "Escalation scheduler started"
        );

        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Escalation scheduler stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_escalation_pass().await {
                        error!(error = %e, "Escalation pass failed");
                    }
                }
            }
        }
    }
}
