use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::submissions::clock::{FixedClock, SequentialIds};
use crate::workflows::submissions::commands::{
    ApproveSubmission, CreateSubmission, RejectSubmission, ReportSubmission,
};
use crate::workflows::submissions::domain::{
    BulkSubmissionOperation, Submission, SubmissionAudit, SubmissionFlag, SubmissionId,
    SubmissionReport, ViewSnapshot,
};
use crate::workflows::submissions::idempotency::DEFAULT_IDEMPOTENCY_TTL_HOURS;
use crate::workflows::submissions::memory::InMemorySubmissionStore;
use crate::workflows::submissions::repository::{
    CampaignForSubmission, CampaignReadRepository, RepositoryError, SubmissionFilter,
    SubmissionRepository,
};
use crate::workflows::submissions::service::{SubmissionPorts, SubmissionService};

pub(super) const CAMPAIGN: &str = "camp-1";
pub(super) const CREATOR: &str = "creator-1";
pub(super) const REVIEWER: &str = "brand-1";
pub(super) const TIKTOK_URL: &str = "https://tiktok.com/@creator/video/123";

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) struct Harness {
    pub(super) service: SubmissionService,
    pub(super) store: Arc<InMemorySubmissionStore>,
    pub(super) clock: Arc<FixedClock>,
}

impl Harness {
    pub(super) fn ports(&self) -> &SubmissionPorts {
        self.service.ports()
    }

    pub(super) fn fetch(&self, id: &SubmissionId) -> Submission {
        self.store
            .fetch(id)
            .expect("fetch succeeds")
            .expect("submission present")
    }

    pub(super) fn event_types(&self) -> Vec<String> {
        self.store
            .outbox_events()
            .into_iter()
            .map(|envelope| envelope.event_type)
            .collect()
    }
}

pub(super) fn active_campaign(campaign_id: &str) -> CampaignForSubmission {
    CampaignForSubmission {
        campaign_id: campaign_id.to_string(),
        status: "active".to_string(),
        allowed_platforms: Vec::new(),
        rate_per_1k_views: 0.0,
    }
}

/// Service over the in-memory store with `camp-1` active and the campaign lookup enabled.
pub(super) fn harness() -> Harness {
    let store = Arc::new(InMemorySubmissionStore::new());
    store.set_campaign(active_campaign(CAMPAIGN));
    build(store.clone(), Some(store))
}

/// Service with the campaign lookup disabled.
pub(super) fn harness_without_campaigns() -> Harness {
    build(Arc::new(InMemorySubmissionStore::new()), None)
}

fn build(
    store: Arc<InMemorySubmissionStore>,
    campaigns: Option<Arc<InMemorySubmissionStore>>,
) -> Harness {
    let clock = Arc::new(FixedClock::new(start()));
    let ports = SubmissionPorts {
        submissions: store.clone(),
        campaigns: campaigns.map(|store| -> Arc<dyn CampaignReadRepository> { store }),
        idempotency: store.clone(),
        outbox: store.clone(),
        clock: clock.clone(),
        ids: Arc::new(SequentialIds::new("id")),
    };
    Harness {
        service: SubmissionService::new(ports, Duration::hours(DEFAULT_IDEMPOTENCY_TTL_HOURS)),
        store,
        clock,
    }
}

pub(super) fn create_cmd(key: &str) -> CreateSubmission {
    CreateSubmission {
        idempotency_key: key.to_string(),
        creator_id: CREATOR.to_string(),
        campaign_id: CAMPAIGN.to_string(),
        platform: "tiktok".to_string(),
        post_url: TIKTOK_URL.to_string(),
        cpv_rate: 0.2,
    }
}

pub(super) fn create_pending(harness: &Harness, key: &str, post_url: &str) -> Submission {
    harness
        .service
        .create_submission(CreateSubmission {
            post_url: post_url.to_string(),
            ..create_cmd(key)
        })
        .expect("create succeeds")
        .submission
}

pub(super) fn approve_cmd(key: &str, id: &SubmissionId) -> ApproveSubmission {
    ApproveSubmission {
        idempotency_key: key.to_string(),
        submission_id: id.to_string(),
        actor_id: REVIEWER.to_string(),
        reason: "meets brief".to_string(),
    }
}

pub(super) fn reject_cmd(key: &str, id: &SubmissionId, reason: &str) -> RejectSubmission {
    RejectSubmission {
        idempotency_key: key.to_string(),
        submission_id: id.to_string(),
        actor_id: REVIEWER.to_string(),
        reason: reason.to_string(),
        notes: "see guidelines".to_string(),
    }
}

pub(super) fn report_cmd(key: &str, id: &SubmissionId, reporter: &str) -> ReportSubmission {
    ReportSubmission {
        idempotency_key: key.to_string(),
        submission_id: id.to_string(),
        reporter_id: reporter.to_string(),
        reason: "spam".to_string(),
        description: "reposted content".to_string(),
    }
}

/// Repository whose every call fails as if the database were offline.
pub(super) struct UnavailableRepository;

impl SubmissionRepository for UnavailableRepository {
    fn create(&self, _submission: Submission) -> Result<Submission, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _submission: &Submission) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _filter: &SubmissionFilter) -> Result<Vec<Submission>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn add_report(&self, _report: SubmissionReport) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn add_flag(&self, _flag: SubmissionFlag) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn add_audit(&self, _audit: SubmissionAudit) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn add_bulk_operation(&self, _operation: BulkSubmissionOperation) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn add_view_snapshot(&self, _snapshot: ViewSnapshot) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn unavailable_service() -> SubmissionService {
    let store = Arc::new(InMemorySubmissionStore::new());
    let ports = SubmissionPorts {
        submissions: Arc::new(UnavailableRepository),
        campaigns: None,
        idempotency: store.clone(),
        outbox: store,
        clock: Arc::new(FixedClock::new(start())),
        ids: Arc::new(SequentialIds::new("id")),
    };
    SubmissionService::new(ports, Duration::hours(DEFAULT_IDEMPOTENCY_TTL_HOURS))
}

pub(super) fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
