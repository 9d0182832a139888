use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error, info};

use super::{resolve_batch_size, DEFAULT_WORKER_BATCH_SIZE, SYSTEM_ACTOR};
use crate::workflows::submissions::clock::Clock;
use crate::workflows::submissions::domain::{ActorRole, AuditAction, ViewSnapshot};
use crate::workflows::submissions::error::SubmissionError;
use crate::workflows::submissions::events::{timestamp, SubmissionEventType};
use crate::workflows::submissions::metrics;
use crate::workflows::submissions::recorder::{AuditEntry, TransitionRecorder};
use crate::workflows::submissions::repository::{SubmissionRepository, ViewLockRepository};
use crate::workflows::submissions::service::SubmissionPorts;

pub const DEFAULT_PLATFORM_FEE_RATE: f64 = 0.15;
pub const VIEW_LOCK_REASON: &str = "verification_completed";

const JOB: &str = "view_lock";

/// Freezes views and settles payouts once the verification window has closed.
pub struct ViewLockJob {
    submissions: Arc<dyn SubmissionRepository>,
    due: Arc<dyn ViewLockRepository>,
    recorder: TransitionRecorder,
    clock: Arc<dyn Clock>,
    batch_size: usize,
    fee_rate: f64,
    disabled: bool,
}

impl ViewLockJob {
    pub fn new(ports: &SubmissionPorts, due: Arc<dyn ViewLockRepository>) -> Self {
        Self {
            submissions: ports.submissions.clone(),
            due,
            recorder: TransitionRecorder::new(
                ports.submissions.clone(),
                ports.outbox.clone(),
                ports.ids.clone(),
            ),
            clock: ports.clock.clone(),
            batch_size: DEFAULT_WORKER_BATCH_SIZE,
            fee_rate: DEFAULT_PLATFORM_FEE_RATE,
            disabled: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = resolve_batch_size(batch_size);
        self
    }

    /// Non-positive rates fall back to the default fee.
    pub fn with_fee_rate(mut self, fee_rate: f64) -> Self {
        self.fee_rate = if fee_rate > 0.0 {
            fee_rate
        } else {
            DEFAULT_PLATFORM_FEE_RATE
        };
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Returns the number of submissions locked in this run.
    pub fn run_once(&self) -> Result<usize, SubmissionError> {
        if self.disabled {
            debug!(event = "submission_view_lock_disabled", "view lock job disabled");
            return Ok(0);
        }
        let started = Instant::now();
        let now = self.clock.now();

        let items = self
            .due
            .list_due_view_lock(now, self.batch_size)
            .map_err(|err| {
                error!(event = "submission_view_lock_list_failed", error = %err, "view lock listing failed");
                err
            })?;

        let mut processed = 0;
        for mut submission in items {
            let previous = submission.lock_views(self.fee_rate, now)?;
            let locked_views = submission.views_count;
            self.submissions.update(&submission).map_err(|err| {
                error!(
                    event = "submission_view_lock_update_failed",
                    submission_id = %submission.submission_id,
                    error = %err,
                    "view lock update failed"
                );
                err
            })?;
            self.submissions.add_view_snapshot(ViewSnapshot {
                snapshot_id: self.recorder.next_id(),
                submission_id: submission.submission_id.clone(),
                views_count: locked_views,
                synced_at: now,
                is_anomaly: false,
                anomaly_reason: None,
            })?;
            self.recorder.audit(
                &submission,
                AuditEntry {
                    action: AuditAction::ViewLocked,
                    previous: Some(previous),
                    actor_id: SYSTEM_ACTOR,
                    actor_role: ActorRole::System,
                    reason_code: VIEW_LOCK_REASON,
                    reason_notes: "",
                },
                now,
            )?;
            self.recorder.emit(
                SubmissionEventType::Verified,
                &submission,
                now,
                vec![("verified_at", timestamp(now))],
            )?;
            self.recorder.emit(
                SubmissionEventType::ViewLocked,
                &submission,
                now,
                vec![
                    ("locked_views", Value::from(locked_views)),
                    ("locked_at", timestamp(now)),
                ],
            )?;
            processed += 1;
        }

        metrics::record_worker_items(JOB, processed);
        metrics::observe_worker_run(JOB, started.elapsed());
        if processed > 0 {
            info!(
                event = "submission_view_lock_completed",
                processed_count = processed,
                "view lock run completed"
            );
        }
        Ok(processed)
    }
}
