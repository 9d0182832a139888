use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use super::{observe, Replayable};
use crate::workflows::submissions::domain::{
    ActorRole, AuditAction, NewSubmission, Platform, Submission, SubmissionId,
};
use crate::workflows::submissions::error::SubmissionError;
use crate::workflows::submissions::events::{timestamp, SubmissionEventType};
use crate::workflows::submissions::idempotency::{
    Admission, IdempotencyKey, ReplayPayload, RequestHash,
};
use crate::workflows::submissions::post_reference::parse_post_url;
use crate::workflows::submissions::recorder::AuditEntry;
use crate::workflows::submissions::repository::RepositoryError;
use crate::workflows::submissions::service::SubmissionService;

/// Creator request to register a post against a campaign.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreateSubmission {
    #[serde(default)]
    pub idempotency_key: String,
    pub creator_id: String,
    pub campaign_id: String,
    pub platform: String,
    pub post_url: String,
    #[serde(default)]
    pub cpv_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateSubmissionResult {
    pub submission: Submission,
    pub replayed: bool,
}

impl Replayable for CreateSubmissionResult {
    fn replayed(&self) -> bool {
        self.replayed
    }
}

#[derive(Serialize)]
struct CreateFingerprint<'a> {
    op: &'static str,
    creator_id: &'a str,
    campaign_id: &'a str,
    platform: String,
    post_url: &'a str,
    cpv_rate: f64,
}

impl<'a> CreateFingerprint<'a> {
    fn of(cmd: &'a CreateSubmission) -> Self {
        let platform = Platform::normalize(&cmd.platform)
            .map(|platform| platform.label().to_string())
            .unwrap_or_else(|| cmd.platform.trim().to_ascii_lowercase());
        Self {
            op: "create",
            creator_id: cmd.creator_id.trim(),
            campaign_id: cmd.campaign_id.trim(),
            platform,
            post_url: cmd.post_url.trim(),
            cpv_rate: cmd.cpv_rate,
        }
    }
}

impl SubmissionService {
    /// Register a new pending submission, or replay the one created under the same key.
    pub fn create_submission(
        &self,
        cmd: CreateSubmission,
    ) -> Result<CreateSubmissionResult, SubmissionError> {
        observe("create", self.create_inner(cmd))
    }

    fn create_inner(&self, cmd: CreateSubmission) -> Result<CreateSubmissionResult, SubmissionError> {
        let key = IdempotencyKey::parse(&cmd.idempotency_key).map_err(|err| {
            error!(
                event = "submission_create_missing_idempotency",
                "submission create failed: missing idempotency key"
            );
            err
        })?;
        let now = self.ports.clock.now();
        let hash = RequestHash::of(&CreateFingerprint::of(&cmd))?;

        if let Admission::Replay(payload) = self.guard.check(&key, &hash, now)? {
            let ReplayPayload::Created { submission_id } = payload else {
                return Err(SubmissionError::IdempotencyKeyConflict);
            };
            let submission = self
                .ports
                .submissions
                .fetch(&submission_id)?
                .ok_or(RepositoryError::NotFound)?;
            return Ok(CreateSubmissionResult {
                submission,
                replayed: true,
            });
        }

        let platform = Platform::normalize(&cmd.platform).ok_or_else(|| {
            error!(
                event = "submission_create_unsupported_platform",
                platform = %cmd.platform,
                "submission create failed: unsupported platform"
            );
            SubmissionError::UnsupportedPlatform(cmd.platform.trim().to_string())
        })?;

        let campaign_id = cmd.campaign_id.trim();
        let creator_id = cmd.creator_id.trim();
        let post_url = cmd.post_url.trim();
        if campaign_id.is_empty() || creator_id.is_empty() || post_url.is_empty() {
            error!(
                event = "submission_create_invalid_input",
                campaign_id,
                creator_id,
                "submission create failed: invalid input"
            );
            return Err(SubmissionError::InvalidInput(
                "campaign_id, creator_id, and post_url are required",
            ));
        }

        let mut cpv_rate = cmd.cpv_rate;
        if let Some(campaigns) = &self.ports.campaigns {
            let campaign = campaigns.campaign_for_submission(campaign_id)?;
            if !campaign.is_active() {
                error!(
                    event = "submission_create_campaign_not_active",
                    campaign_id,
                    campaign_status = %campaign.status,
                    "submission create failed: campaign not active"
                );
                return Err(SubmissionError::CampaignNotActive {
                    status: campaign.status,
                });
            }
            if !campaign.allows(platform) {
                error!(
                    event = "submission_create_platform_not_allowed",
                    campaign_id,
                    %platform,
                    "submission create failed: platform not allowed"
                );
                return Err(SubmissionError::PlatformNotAllowed {
                    platform: platform.label().to_string(),
                });
            }
            if campaign.rate_per_1k_views > 0.0 {
                cpv_rate = campaign.rate_per_1k_views;
            }
        }

        let reference = parse_post_url(platform, post_url).map_err(|err| {
            error!(
                event = "submission_create_url_parse_failed",
                %platform,
                post_url,
                "submission create url parse failed"
            );
            err
        })?;

        let submission = Submission::open(
            NewSubmission {
                submission_id: SubmissionId(self.recorder.next_id()),
                campaign_id: campaign_id.to_string(),
                creator_id: creator_id.to_string(),
                platform,
                post_url: post_url.to_string(),
                post_id: reference.post_id,
                creator_platform_handle: reference.handle,
                cpv_rate,
            },
            now,
        );
        if !submission.is_complete() {
            return Err(SubmissionError::InvalidInput(
                "campaign_id, creator_id, and post_url are required",
            ));
        }

        let submission = self.ports.submissions.create(submission).map_err(|err| {
            error!(
                event = "submission_create_persistence_failed",
                campaign_id,
                creator_id,
                error = %err,
                "submission create persistence failed"
            );
            err
        })?;

        self.recorder.audit(
            &submission,
            AuditEntry {
                action: AuditAction::Created,
                previous: None,
                actor_id: &submission.creator_id,
                actor_role: ActorRole::Creator,
                reason_code: "",
                reason_notes: "",
            },
            now,
        )?;
        self.recorder.emit(
            SubmissionEventType::Created,
            &submission,
            now,
            vec![
                ("status", Value::from(submission.status.label())),
                ("created_at", timestamp(now)),
            ],
        )?;
        self.guard.commit(
            &key,
            hash,
            ReplayPayload::Created {
                submission_id: submission.submission_id.clone(),
            },
            now,
        )?;

        info!(
            event = "submission_created",
            submission_id = %submission.submission_id,
            campaign_id = %submission.campaign_id,
            creator_id = %submission.creator_id,
            "submission created"
        );
        Ok(CreateSubmissionResult {
            submission,
            replayed: false,
        })
    }
}
