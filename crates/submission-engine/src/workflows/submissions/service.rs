use std::sync::Arc;

use chrono::Duration;

use super::clock::{Clock, IdGenerator};
use super::idempotency::{IdempotencyGuard, IdempotencyStore};
use super::outbox::OutboxWriter;
use super::recorder::TransitionRecorder;
use super::repository::{CampaignReadRepository, SubmissionRepository};

/// Collaborators the command and query layer depends on.
#[derive(Clone)]
pub struct SubmissionPorts {
    pub submissions: Arc<dyn SubmissionRepository>,
    /// When absent, campaign status, platform allow-list, and rate checks are skipped.
    pub campaigns: Option<Arc<dyn CampaignReadRepository>>,
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub outbox: Arc<dyn OutboxWriter>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
}

/// Service composing the submission repository, idempotency guard, and outbox.
///
/// Commands live in `commands/*`, reads in `queries`; both are `impl` blocks on this type.
pub struct SubmissionService {
    pub(super) ports: SubmissionPorts,
    pub(super) guard: IdempotencyGuard,
    pub(super) recorder: TransitionRecorder,
}

impl SubmissionService {
    pub fn new(ports: SubmissionPorts, idempotency_ttl: Duration) -> Self {
        let guard = IdempotencyGuard::new(ports.idempotency.clone(), idempotency_ttl);
        let recorder = TransitionRecorder::new(
            ports.submissions.clone(),
            ports.outbox.clone(),
            ports.ids.clone(),
        );
        Self {
            ports,
            guard,
            recorder,
        }
    }

    pub fn ports(&self) -> &SubmissionPorts {
        &self.ports
    }
}
