//! Periodic phase check: advances every active cycle whose current phase
//! has run its configured length.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use bookclub_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome};
use bookclub_core::errors::{ApplicationError, DomainError};
use bookclub_core::phases::{PhaseTransitionError, TransitionRequest};

use crate::service::{BookClubService, CommitResult};

pub const SCHEDULER_ACTOR: &str = "scheduler";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub correlation_id: String,
    pub checked: usize,
    pub advanced: usize,
    pub skipped: usize,
    pub failed: usize,
    pub awaiting_completion: usize,
    pub notification_failures: usize,
}

pub struct PhaseScheduler {
    service: Arc<BookClubService>,
    interval: Duration,
}

impl PhaseScheduler {
    pub fn new(service: Arc<BookClubService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    pub async fn run_once(&self) -> Result<CheckReport, ApplicationError> {
        self.run_check_pass(Utc::now()).await
    }

    /// One pass over the active cycles. A failure on one cycle is logged and
    /// counted; only failing to list the cycles fails the pass.
    pub async fn run_check_pass(&self, now: DateTime<Utc>) -> Result<CheckReport, ApplicationError> {
        let correlation_id = format!("check-{}", Uuid::new_v4());
        let ctx = AuditContext::new(correlation_id.clone(), SCHEDULER_ACTOR);
        let mut report = CheckReport { correlation_id: correlation_id.clone(), ..CheckReport::default() };

        let cycles = self.service.repositories().cycles.list_active().await?;
        info!(
            event_name = "scheduler.check.started",
            correlation_id = %correlation_id,
            active_cycles = cycles.len(),
            "phase check started"
        );

        for cycle in cycles {
            report.checked += 1;
            if !self.service.engine().is_expired(&cycle, now) {
                report.skipped += 1;
                continue;
            }

            match self.service.commit_transition(&cycle, TransitionRequest::Advance, now, &ctx).await {
                Ok(CommitResult::Applied(change)) => {
                    report.advanced += 1;
                    if !change.notified {
                        report.notification_failures += 1;
                    }
                    info!(
                        event_name = "scheduler.check.advanced",
                        correlation_id = %correlation_id,
                        cycle_id = %cycle.id,
                        from = change.outcome.from.as_str(),
                        to = change.outcome.to.as_str(),
                        "expired phase advanced"
                    );
                }
                Ok(CommitResult::Superseded) => {
                    report.skipped += 1;
                    info!(
                        event_name = "scheduler.check.skipped",
                        correlation_id = %correlation_id,
                        cycle_id = %cycle.id,
                        "cycle moved on before this pass could advance it"
                    );
                }
                Err(ApplicationError::Domain(DomainError::InvalidTransition(
                    PhaseTransitionError::AwaitingCompletion { .. },
                ))) => {
                    report.awaiting_completion += 1;
                    info!(
                        event_name = "scheduler.check.skipped",
                        correlation_id = %correlation_id,
                        cycle_id = %cycle.id,
                        "discussion has run its course; waiting for an admin to complete the cycle"
                    );
                }
                Err(failure) => {
                    report.failed += 1;
                    error!(
                        event_name = "scheduler.check.failed",
                        correlation_id = %correlation_id,
                        cycle_id = %cycle.id,
                        error = %failure,
                        "phase check failed for cycle"
                    );
                }
            }
        }

        let outcome = if report.failed > 0 { AuditOutcome::Failed } else { AuditOutcome::Success };
        self.service.audit_sink().emit(
            AuditEvent::new(
                None,
                correlation_id.clone(),
                "scheduler.check_completed",
                AuditCategory::Scheduler,
                SCHEDULER_ACTOR,
                outcome,
            )
            .with_metadata("checked", report.checked.to_string())
            .with_metadata("advanced", report.advanced.to_string())
            .with_metadata("skipped", report.skipped.to_string())
            .with_metadata("failed", report.failed.to_string()),
        );
        info!(
            event_name = "scheduler.check.completed",
            correlation_id = %correlation_id,
            checked = report.checked,
            advanced = report.advanced,
            skipped = report.skipped,
            failed = report.failed,
            awaiting_completion = report.awaiting_completion,
            "phase check completed"
        );
        Ok(report)
    }

    /// Runs a pass every `interval` until `shutdown` flips to true.
    pub async fn run_interval(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(failure) = self.run_once().await {
                        warn!(
                            event_name = "scheduler.check.failed",
                            error = %failure,
                            "phase check pass could not run"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(event_name = "scheduler.stopped", "phase scheduler stopped");
                        return;
                    }
                }
            }
        }
    }
}
