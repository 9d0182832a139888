use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use tracing::{debug, error, info};

use super::{resolve_batch_size, DEFAULT_WORKER_BATCH_SIZE, SYSTEM_ACTOR};
use crate::workflows::submissions::clock::Clock;
use crate::workflows::submissions::domain::{ActorRole, AuditAction};
use crate::workflows::submissions::error::SubmissionError;
use crate::workflows::submissions::events::{timestamp, SubmissionEventType};
use crate::workflows::submissions::lifecycle::LifecycleAction;
use crate::workflows::submissions::metrics;
use crate::workflows::submissions::recorder::{AuditEntry, TransitionRecorder};
use crate::workflows::submissions::repository::{AutoApproveRepository, SubmissionRepository};
use crate::workflows::submissions::service::SubmissionPorts;

pub const AUTO_APPROVE_AFTER_HOURS: i64 = 48;
pub const AUTO_APPROVE_REASON: &str = "auto_approve_48h";

const JOB: &str = "auto_approve";

/// Approves pending, unreported submissions nobody reviewed within the SLA.
pub struct AutoApproveJob {
    submissions: Arc<dyn SubmissionRepository>,
    candidates: Arc<dyn AutoApproveRepository>,
    recorder: TransitionRecorder,
    clock: Arc<dyn Clock>,
    batch_size: usize,
    disabled: bool,
}

impl AutoApproveJob {
    pub fn new(ports: &SubmissionPorts, candidates: Arc<dyn AutoApproveRepository>) -> Self {
        Self {
            submissions: ports.submissions.clone(),
            candidates,
            recorder: TransitionRecorder::new(
                ports.submissions.clone(),
                ports.outbox.clone(),
                ports.ids.clone(),
            ),
            clock: ports.clock.clone(),
            batch_size: DEFAULT_WORKER_BATCH_SIZE,
            disabled: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = resolve_batch_size(batch_size);
        self
    }

    /// Kill switch; a disabled job returns immediately.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Returns the number of submissions approved in this run.
    pub fn run_once(&self) -> Result<usize, SubmissionError> {
        if self.disabled {
            debug!(event = "submission_auto_approve_disabled", "auto approve job disabled");
            return Ok(0);
        }
        let started = Instant::now();
        let now = self.clock.now();
        let threshold = now - Duration::hours(AUTO_APPROVE_AFTER_HOURS);

        let items = self
            .candidates
            .list_pending_auto_approve(threshold, self.batch_size)
            .map_err(|err| {
                error!(event = "submission_auto_approve_list_failed", error = %err, "auto approve listing failed");
                err
            })?;

        let mut processed = 0;
        for mut submission in items {
            let previous = submission.approve(
                LifecycleAction::AutoApprove,
                None,
                AUTO_APPROVE_REASON,
                now,
            )?;
            self.submissions.update(&submission).map_err(|err| {
                error!(
                    event = "submission_auto_approve_update_failed",
                    submission_id = %submission.submission_id,
                    error = %err,
                    "auto approve update failed"
                );
                err
            })?;
            self.recorder.audit(
                &submission,
                AuditEntry {
                    action: AuditAction::AutoApproved,
                    previous: Some(previous),
                    actor_id: SYSTEM_ACTOR,
                    actor_role: ActorRole::System,
                    reason_code: AUTO_APPROVE_REASON,
                    reason_notes: "",
                },
                now,
            )?;
            self.recorder.emit(
                SubmissionEventType::AutoApproved,
                &submission,
                now,
                vec![("auto_approved_at", timestamp(now))],
            )?;
            processed += 1;
        }

        metrics::record_worker_items(JOB, processed);
        metrics::observe_worker_run(JOB, started.elapsed());
        if processed > 0 {
            info!(
                event = "submission_auto_approve_completed",
                processed_count = processed,
                "auto approve run completed"
            );
        }
        Ok(processed)
    }
}
