use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{observe, ApproveSubmission, RejectSubmission, Replayable};
use crate::workflows::submissions::domain::{
    non_empty, BulkOperationType, BulkSubmissionOperation, SubmissionId,
};
use crate::workflows::submissions::error::SubmissionError;
use crate::workflows::submissions::idempotency::{
    Admission, IdempotencyKey, ReplayPayload, RequestHash,
};
use crate::workflows::submissions::service::SubmissionService;

/// Campaign id recorded when no submission in the batch resolves.
pub const UNKNOWN_CAMPAIGN_ID: &str = "00000000-0000-0000-0000-000000000000";

const DEFAULT_BULK_REJECT_REASON: &str = "bulk_reject";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BulkOperation {
    #[serde(default)]
    pub idempotency_key: String,
    #[serde(default)]
    pub actor_id: String,
    pub operation_type: String,
    pub submission_ids: Vec<String>,
    #[serde(default)]
    pub reason_code: String,
    #[serde(default)]
    pub reason: String,
}

impl BulkOperation {
    /// Trimmed ids with blanks kept in place, so the fingerprint covers every counted entry.
    fn trimmed_ids(&self) -> Vec<&str> {
        self.submission_ids.iter().map(|id| id.trim()).collect()
    }

    fn sanitized_ids(&self) -> Vec<String> {
        self.submission_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Reason code, then free-text reason, then `bulk_reject`.
    fn reject_reason(&self) -> &str {
        [self.reason_code.trim(), self.reason.trim()]
            .into_iter()
            .find(|value| !value.is_empty())
            .unwrap_or(DEFAULT_BULK_REJECT_REASON)
    }
}

/// Counts cached under the outer key and replayed verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOperationResult {
    pub processed: usize,
    pub succeeded_count: usize,
    pub failed_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    #[serde(flatten)]
    pub result: BulkOperationResult,
    pub replayed: bool,
}

impl Replayable for BulkOutcome {
    fn replayed(&self) -> bool {
        self.replayed
    }
}

#[derive(Serialize)]
struct BulkFingerprint<'a> {
    op: &'static str,
    actor_id: &'a str,
    operation_type: &'a str,
    submission_ids: Vec<&'a str>,
    reason_code: &'a str,
    reason: &'a str,
}

impl SubmissionService {
    /// Approve or reject many submissions under one key. Item failures are counted, not raised.
    pub fn bulk_operation(&self, cmd: BulkOperation) -> Result<BulkOutcome, SubmissionError> {
        observe("bulk", self.bulk_inner(cmd))
    }

    fn bulk_inner(&self, cmd: BulkOperation) -> Result<BulkOutcome, SubmissionError> {
        let key = IdempotencyKey::parse(&cmd.idempotency_key)?;
        let actor_id = cmd.actor_id.trim();
        if actor_id.is_empty() {
            return Err(SubmissionError::UnauthorizedActor);
        }
        let operation = BulkOperationType::parse(&cmd.operation_type).ok_or(
            SubmissionError::InvalidInput("operation_type must be bulk_approve or bulk_reject"),
        )?;
        if cmd.submission_ids.is_empty() {
            return Err(SubmissionError::InvalidInput("submission_ids must not be empty"));
        }

        let now = self.ports.clock.now();
        let hash = RequestHash::of(&BulkFingerprint {
            op: "bulk",
            actor_id,
            operation_type: operation.label(),
            submission_ids: cmd.trimmed_ids(),
            reason_code: cmd.reason_code.trim(),
            reason: cmd.reason.trim(),
        })?;
        if let Admission::Replay(payload) = self.guard.check(&key, &hash, now)? {
            let ReplayPayload::Bulk(result) = payload else {
                return Err(SubmissionError::IdempotencyKeyConflict);
            };
            return Ok(BulkOutcome {
                result,
                replayed: true,
            });
        }

        let mut result = BulkOperationResult::default();
        for raw_id in &cmd.submission_ids {
            result.processed += 1;
            let target = raw_id.trim();
            if target.is_empty() {
                result.failed_count += 1;
                continue;
            }

            let item_key = key.scoped(target, operation.label()).as_str().to_string();
            let item = match operation {
                BulkOperationType::BulkApprove => self.approve(ApproveSubmission {
                    idempotency_key: item_key,
                    submission_id: target.to_string(),
                    actor_id: actor_id.to_string(),
                    reason: cmd.reason_code.trim().to_string(),
                }),
                BulkOperationType::BulkReject => self.reject(RejectSubmission {
                    idempotency_key: item_key,
                    submission_id: target.to_string(),
                    actor_id: actor_id.to_string(),
                    reason: cmd.reject_reason().to_string(),
                    notes: cmd.reason.trim().to_string(),
                }),
            };

            match item {
                Ok(_) => result.succeeded_count += 1,
                Err(err) => {
                    warn!(
                        event = "submission_bulk_item_failed",
                        operation_type = operation.label(),
                        submission_id = target,
                        error = %err,
                        "bulk item failed"
                    );
                    result.failed_count += 1;
                }
            }
        }

        self.ports
            .submissions
            .add_bulk_operation(BulkSubmissionOperation {
                operation_id: self.recorder.next_id(),
                campaign_id: self.resolve_campaign_id(&cmd.submission_ids),
                operation_type: operation,
                submission_ids: cmd.sanitized_ids(),
                performed_by: actor_id.to_string(),
                succeeded_count: result.succeeded_count,
                failed_count: result.failed_count,
                reason_code: non_empty(&cmd.reason_code),
                reason_notes: non_empty(&cmd.reason),
                created_at: now,
            })?;
        self.guard
            .commit(&key, hash, ReplayPayload::Bulk(result), now)?;

        info!(
            event = "submission_bulk_operation_completed",
            operation_type = operation.label(),
            processed = result.processed,
            succeeded_count = result.succeeded_count,
            failed_count = result.failed_count,
            "bulk operation completed"
        );
        Ok(BulkOutcome {
            result,
            replayed: false,
        })
    }

    /// Campaign of the first resolvable submission, else [`UNKNOWN_CAMPAIGN_ID`].
    fn resolve_campaign_id(&self, submission_ids: &[String]) -> String {
        submission_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .find_map(|id| {
                self.ports
                    .submissions
                    .fetch(&SubmissionId::from(id))
                    .ok()
                    .flatten()
                    .map(|submission| submission.campaign_id)
                    .filter(|campaign_id| !campaign_id.trim().is_empty())
            })
            .unwrap_or_else(|| UNKNOWN_CAMPAIGN_ID.to_string())
    }
}
