use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use super::{observe, StatusOutcome};
use crate::workflows::submissions::domain::{ActorRole, AuditAction, Submission, SubmissionId};
use crate::workflows::submissions::error::SubmissionError;
use crate::workflows::submissions::events::{timestamp, SubmissionEventType};
use crate::workflows::submissions::idempotency::{
    Admission, IdempotencyKey, ReplayPayload, RequestHash,
};
use crate::workflows::submissions::lifecycle::LifecycleAction;
use crate::workflows::submissions::recorder::AuditEntry;
use crate::workflows::submissions::repository::RepositoryError;
use crate::workflows::submissions::service::SubmissionService;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApproveSubmission {
    #[serde(default)]
    pub idempotency_key: String,
    #[serde(default)]
    pub submission_id: String,
    #[serde(default)]
    pub actor_id: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RejectSubmission {
    #[serde(default)]
    pub idempotency_key: String,
    #[serde(default)]
    pub submission_id: String,
    #[serde(default)]
    pub actor_id: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Serialize)]
struct ReviewFingerprint<'a> {
    op: &'static str,
    submission_id: &'a str,
    actor_id: &'a str,
    reason: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

impl SubmissionService {
    /// Approve a pending or flagged submission and open its verification window.
    pub fn approve(&self, cmd: ApproveSubmission) -> Result<StatusOutcome, SubmissionError> {
        observe("approve", self.approve_inner(cmd))
    }

    /// Reject a pending or flagged submission. Cancellation reasons route to `cancelled`.
    pub fn reject(&self, cmd: RejectSubmission) -> Result<StatusOutcome, SubmissionError> {
        observe("reject", self.reject_inner(cmd))
    }

    fn approve_inner(&self, cmd: ApproveSubmission) -> Result<StatusOutcome, SubmissionError> {
        let key = IdempotencyKey::parse(&cmd.idempotency_key)?;
        let now = self.ports.clock.now();
        let hash = RequestHash::of(&ReviewFingerprint {
            op: "approve",
            submission_id: cmd.submission_id.trim(),
            actor_id: cmd.actor_id.trim(),
            reason: cmd.reason.trim(),
            notes: None,
        })?;
        if let Admission::Replay(payload) = self.guard.check(&key, &hash, now)? {
            return replayed_outcome(payload);
        }

        let mut submission = self.load_for_review(&cmd.submission_id, &cmd.actor_id, "approve")?;
        let actor_id = cmd.actor_id.trim();
        let previous = submission
            .approve(LifecycleAction::Approve, Some(actor_id), &cmd.reason, now)
            .map_err(|err| {
                error!(
                    event = "submission_approve_invalid_state",
                    submission_id = %submission.submission_id,
                    status = %err.from,
                    "submission approve invalid state transition"
                );
                err
            })?;

        self.ports.submissions.update(&submission)?;
        self.recorder.audit(
            &submission,
            AuditEntry {
                action: AuditAction::Approved,
                previous: Some(previous),
                actor_id,
                actor_role: ActorRole::BrandCreator,
                reason_code: &cmd.reason,
                reason_notes: "",
            },
            now,
        )?;
        self.recorder.emit(
            SubmissionEventType::Approved,
            &submission,
            now,
            vec![("approved_at", timestamp(now))],
        )?;

        let outcome = self.commit_review(&key, hash, &submission, now)?;
        info!(
            event = "submission_approved",
            submission_id = %submission.submission_id,
            actor_id,
            "submission approved"
        );
        Ok(outcome)
    }

    fn reject_inner(&self, cmd: RejectSubmission) -> Result<StatusOutcome, SubmissionError> {
        let key = IdempotencyKey::parse(&cmd.idempotency_key)?;
        let now = self.ports.clock.now();
        let hash = RequestHash::of(&ReviewFingerprint {
            op: "reject",
            submission_id: cmd.submission_id.trim(),
            actor_id: cmd.actor_id.trim(),
            reason: cmd.reason.trim(),
            notes: Some(cmd.notes.trim()),
        })?;
        if let Admission::Replay(payload) = self.guard.check(&key, &hash, now)? {
            return replayed_outcome(payload);
        }

        let mut submission = self.load_for_review(&cmd.submission_id, &cmd.actor_id, "reject")?;
        let actor_id = cmd.actor_id.trim();
        let rejection = submission
            .reject(&cmd.reason, &cmd.notes, now)
            .map_err(|err| {
                error!(
                    event = "submission_reject_invalid_state",
                    submission_id = %submission.submission_id,
                    status = %err.from,
                    "submission reject invalid state transition"
                );
                err
            })?;

        let (action, event_type, timestamp_field) = if rejection.cancelled {
            (
                AuditAction::Cancelled,
                SubmissionEventType::Cancelled,
                "cancelled_at",
            )
        } else {
            (
                AuditAction::Rejected,
                SubmissionEventType::Rejected,
                "rejected_at",
            )
        };

        self.ports.submissions.update(&submission)?;
        self.recorder.audit(
            &submission,
            AuditEntry {
                action,
                previous: Some(rejection.previous),
                actor_id,
                actor_role: ActorRole::BrandCreator,
                reason_code: &cmd.reason,
                reason_notes: &cmd.notes,
            },
            now,
        )?;
        self.recorder.emit(
            event_type,
            &submission,
            now,
            vec![
                ("reason", Value::from(cmd.reason.trim())),
                (timestamp_field, timestamp(now)),
            ],
        )?;

        let outcome = self.commit_review(&key, hash, &submission, now)?;
        let result_event = if rejection.cancelled {
            "submission_cancelled"
        } else {
            "submission_rejected"
        };
        info!(
            event = result_event,
            submission_id = %submission.submission_id,
            actor_id,
            "submission review recorded"
        );
        Ok(outcome)
    }

    /// Lookup first, then the actor check.
    fn load_for_review(
        &self,
        submission_id: &str,
        actor_id: &str,
        operation: &'static str,
    ) -> Result<Submission, SubmissionError> {
        let id = SubmissionId::from(submission_id);
        let submission = self
            .ports
            .submissions
            .fetch(&id)?
            .ok_or(RepositoryError::NotFound)
            .map_err(|err| {
                error!(
                    event = "submission_review_lookup_failed",
                    operation,
                    submission_id = %id,
                    "submission review lookup failed"
                );
                err
            })?;
        if actor_id.trim().is_empty() {
            error!(
                event = "submission_review_missing_actor",
                operation,
                submission_id = %id,
                "submission review failed: missing actor"
            );
            return Err(SubmissionError::UnauthorizedActor);
        }
        Ok(submission)
    }

    fn commit_review(
        &self,
        key: &IdempotencyKey,
        hash: RequestHash,
        submission: &Submission,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<StatusOutcome, SubmissionError> {
        self.guard.commit(
            key,
            hash,
            ReplayPayload::Reviewed {
                submission_id: submission.submission_id.clone(),
                status: submission.status,
            },
            now,
        )?;
        Ok(StatusOutcome {
            submission_id: submission.submission_id.clone(),
            status: submission.status,
            replayed: false,
        })
    }
}

fn replayed_outcome(payload: ReplayPayload) -> Result<StatusOutcome, SubmissionError> {
    match payload {
        ReplayPayload::Reviewed {
            submission_id,
            status,
        }
        | ReplayPayload::Reported {
            submission_id,
            status,
        } => Ok(StatusOutcome {
            submission_id,
            status,
            replayed: true,
        }),
        _ => Err(SubmissionError::IdempotencyKeyConflict),
    }
}
