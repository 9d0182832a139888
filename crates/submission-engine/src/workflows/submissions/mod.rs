//! Creator submission lifecycle: idempotent commands, the status state machine, the
//! transactional outbox and its relay, inbound dedup, and the reconciliation workers.
//!
//! Everything talks to storage and the event bus through the ports in [`repository`],
//! [`idempotency`], [`outbox`], [`events`], and [`consumer`]. [`memory`] provides in-process
//! adapters for all of them.

pub mod clock;
pub mod commands;
pub mod consumer;
pub mod domain;
pub mod error;
pub mod events;
pub mod idempotency;
pub mod lifecycle;
pub mod memory;
pub mod metrics;
pub mod outbox;
pub(crate) mod post_reference;
pub mod queries;
pub(crate) mod recorder;
pub mod repository;
pub mod router;
pub mod service;
pub mod workers;

#[cfg(test)]
mod tests;

pub use clock::{Clock, FixedClock, IdGenerator, SequentialIds, SystemClock, UuidIdGenerator};
pub use commands::{
    ApproveSubmission, BulkOperation, BulkOperationResult, BulkOutcome, CreateSubmission,
    CreateSubmissionResult, RejectSubmission, ReportSubmission, StatusOutcome,
};
pub use consumer::{CampaignLaunchedConsumer, ConsumeError, ConsumeOutcome, DedupGate};
pub use domain::{Platform, Submission, SubmissionId, SubmissionStatus};
pub use error::SubmissionError;
pub use events::{EventEnvelope, EventPublisher, EventSubscriber, SubmissionEventType};
pub use memory::{InMemoryEventBus, InMemorySubmissionStore};
pub use outbox::{OutboxRelay, RelayReport, RetryPolicy};
pub use queries::{DashboardSummary, SubmissionAnalytics};
pub use repository::{CampaignForSubmission, RepositoryError, SubmissionFilter};
pub use router::submission_router;
pub use service::{SubmissionPorts, SubmissionService};
pub use workers::{AutoApproveJob, ViewLockJob};
