use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use super::{observe, StatusOutcome};
use crate::workflows::submissions::domain::{
    non_empty, ActorRole, AuditAction, SubmissionFlag, SubmissionId, SubmissionReport,
};
use crate::workflows::submissions::error::SubmissionError;
use crate::workflows::submissions::events::{timestamp, SubmissionEventType};
use crate::workflows::submissions::idempotency::{
    Admission, IdempotencyKey, ReplayPayload, RequestHash,
};
use crate::workflows::submissions::recorder::AuditEntry;
use crate::workflows::submissions::repository::RepositoryError;
use crate::workflows::submissions::service::SubmissionService;

/// A user's moderation report against a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReportSubmission {
    #[serde(default)]
    pub idempotency_key: String,
    #[serde(default)]
    pub submission_id: String,
    #[serde(default)]
    pub reporter_id: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Serialize)]
struct ReportFingerprint<'a> {
    op: &'static str,
    submission_id: &'a str,
    reporter_id: &'a str,
    reason: &'a str,
    description: &'a str,
}

impl SubmissionService {
    /// Record a report, flagging a pending submission on its first report.
    pub fn report(&self, cmd: ReportSubmission) -> Result<StatusOutcome, SubmissionError> {
        observe("report", self.report_inner(cmd))
    }

    fn report_inner(&self, cmd: ReportSubmission) -> Result<StatusOutcome, SubmissionError> {
        let key = IdempotencyKey::parse(&cmd.idempotency_key)?;
        let reporter_id = cmd.reporter_id.trim();
        if reporter_id.is_empty() {
            return Err(SubmissionError::UnauthorizedActor);
        }
        let reason = cmd.reason.trim();
        if reason.is_empty() {
            return Err(SubmissionError::InvalidInput("reason is required"));
        }

        let now = self.ports.clock.now();
        let hash = RequestHash::of(&ReportFingerprint {
            op: "report",
            submission_id: cmd.submission_id.trim(),
            reporter_id,
            reason,
            description: cmd.description.trim(),
        })?;
        if let Admission::Replay(payload) = self.guard.check(&key, &hash, now)? {
            return match payload {
                ReplayPayload::Reported {
                    submission_id,
                    status,
                } => Ok(StatusOutcome {
                    submission_id,
                    status,
                    replayed: true,
                }),
                _ => Err(SubmissionError::IdempotencyKeyConflict),
            };
        }

        let id = SubmissionId::from(cmd.submission_id.as_str());
        let mut submission = self
            .ports
            .submissions
            .fetch(&id)?
            .ok_or(RepositoryError::NotFound)?;

        let report = SubmissionReport {
            report_id: self.recorder.next_id(),
            submission_id: submission.submission_id.clone(),
            reported_by_id: reporter_id.to_string(),
            reason: reason.to_string(),
            description: non_empty(&cmd.description),
            reported_at: now,
        };
        if let Err(err) = self.ports.submissions.add_report(report.clone()) {
            if !matches!(err, RepositoryError::AlreadyReported) {
                error!(
                    event = "submission_report_persistence_failed",
                    submission_id = %id,
                    error = %err,
                    "submission report persistence failed"
                );
            }
            return Err(err.into());
        }

        let previous = submission.record_report(now)?;
        self.ports.submissions.update(&submission)?;
        self.ports
            .submissions
            .add_flag(SubmissionFlag::from_report(self.recorder.next_id(), &report))?;
        self.recorder.audit(
            &submission,
            AuditEntry {
                action: AuditAction::Flagged,
                previous: Some(previous),
                actor_id: reporter_id,
                actor_role: ActorRole::User,
                reason_code: reason,
                reason_notes: &cmd.description,
            },
            now,
        )?;
        self.recorder.emit(
            SubmissionEventType::Flagged,
            &submission,
            now,
            vec![
                ("reason", Value::from(reason)),
                ("flagged_at", timestamp(now)),
            ],
        )?;
        self.guard.commit(
            &key,
            hash,
            ReplayPayload::Reported {
                submission_id: submission.submission_id.clone(),
                status: submission.status,
            },
            now,
        )?;

        info!(
            event = "submission_reported",
            submission_id = %submission.submission_id,
            reporter_id,
            reported_count = submission.reported_count,
            status = %submission.status,
            "submission reported"
        );
        Ok(StatusOutcome {
            submission_id: submission.submission_id,
            status: submission.status,
            replayed: false,
        })
    }
}
