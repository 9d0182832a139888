use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::clock::IdGenerator;
use super::domain::{non_empty, ActorRole, AuditAction, Submission, SubmissionAudit, SubmissionStatus};
use super::error::SubmissionError;
use super::events::{EventEnvelope, SubmissionEventType};
use super::outbox::OutboxWriter;
use super::repository::SubmissionRepository;

/// Who did what to a submission, as written to the audit trail.
#[derive(Debug, Clone, Copy)]
pub struct AuditEntry<'a> {
    pub action: AuditAction,
    pub previous: Option<SubmissionStatus>,
    pub actor_id: &'a str,
    pub actor_role: ActorRole,
    pub reason_code: &'a str,
    pub reason_notes: &'a str,
}

/// Appends audit rows and outbox events after a state change.
#[derive(Clone)]
pub struct TransitionRecorder {
    submissions: Arc<dyn SubmissionRepository>,
    outbox: Arc<dyn OutboxWriter>,
    ids: Arc<dyn IdGenerator>,
}

impl TransitionRecorder {
    pub fn new(
        submissions: Arc<dyn SubmissionRepository>,
        outbox: Arc<dyn OutboxWriter>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            submissions,
            outbox,
            ids,
        }
    }

    pub fn audit(
        &self,
        submission: &Submission,
        entry: AuditEntry<'_>,
        now: DateTime<Utc>,
    ) -> Result<(), SubmissionError> {
        self.submissions.add_audit(SubmissionAudit {
            audit_id: self.ids.new_id(),
            submission_id: submission.submission_id.clone(),
            action: entry.action,
            old_status: entry.previous,
            new_status: submission.status,
            actor_id: entry.actor_id.trim().to_string(),
            actor_role: entry.actor_role,
            reason_code: non_empty(entry.reason_code),
            reason_notes: non_empty(entry.reason_notes),
            created_at: now,
        })?;
        Ok(())
    }

    pub fn emit(
        &self,
        event_type: SubmissionEventType,
        submission: &Submission,
        now: DateTime<Utc>,
        extra: Vec<(&'static str, Value)>,
    ) -> Result<EventEnvelope, SubmissionError> {
        let envelope =
            EventEnvelope::for_submission(self.ids.new_id(), event_type, submission, now, extra);
        self.outbox.append_outbox(&envelope)?;
        Ok(envelope)
    }

    pub(crate) fn next_id(&self) -> String {
        self.ids.new_id()
    }
}
