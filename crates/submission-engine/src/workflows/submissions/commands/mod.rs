//! Idempotent mutations: create, approve/reject, report, and bulk review.
//!
//! Every command follows the same sequence: validate the key, hash the request, replay or
//! reject on a cached record, mutate, append the audit row, append the outbox event, and
//! finally commit the idempotency record.

mod bulk;
mod create;
mod report;
mod review;

pub use bulk::{BulkOperation, BulkOperationResult, BulkOutcome, UNKNOWN_CAMPAIGN_ID};
pub use create::{CreateSubmission, CreateSubmissionResult};
pub use report::ReportSubmission;
pub use review::{ApproveSubmission, RejectSubmission};

use serde::Serialize;

use super::domain::{SubmissionId, SubmissionStatus};
use super::error::SubmissionError;
use super::metrics;

/// Result of a single-submission status command (approve, reject, report).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusOutcome {
    pub submission_id: SubmissionId,
    pub status: SubmissionStatus,
    pub replayed: bool,
}

impl Replayable for StatusOutcome {
    fn replayed(&self) -> bool {
        self.replayed
    }
}

/// Outcomes that can come from the replay cache.
pub trait Replayable {
    fn replayed(&self) -> bool;
}

/// Count the command outcome and hand the result back unchanged.
pub(super) fn observe<T: Replayable>(
    command: &'static str,
    result: Result<T, SubmissionError>,
) -> Result<T, SubmissionError> {
    let outcome = match &result {
        Ok(value) if value.replayed() => "replayed",
        Ok(_) => "ok",
        Err(err) => err.code(),
    };
    metrics::record_command(command, outcome);
    result
}
