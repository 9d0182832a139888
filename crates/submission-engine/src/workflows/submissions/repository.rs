use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    BulkSubmissionOperation, Platform, Submission, SubmissionAudit, SubmissionFlag, SubmissionId,
    SubmissionReport, SubmissionStatus, ViewSnapshot,
};

/// Rolling window inside which the same (campaign, creator, post URL) is a duplicate.
pub const DUPLICATE_WINDOW_HOURS: i64 = 24;

/// Filter used by list queries. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubmissionFilter {
    pub creator_id: Option<String>,
    pub campaign_id: Option<String>,
    pub status: Option<SubmissionStatus>,
}

impl SubmissionFilter {
    pub fn matches(&self, submission: &Submission) -> bool {
        let field_matches = |wanted: &Option<String>, actual: &str| match wanted {
            Some(value) if !value.trim().is_empty() => value.trim() == actual,
            _ => true,
        };

        field_matches(&self.creator_id, &submission.creator_id)
            && field_matches(&self.campaign_id, &submission.campaign_id)
            && self.status.map_or(true, |status| status == submission.status)
    }
}

/// Campaign facts needed to accept a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignForSubmission {
    pub campaign_id: String,
    pub status: String,
    pub allowed_platforms: Vec<String>,
    pub rate_per_1k_views: f64,
}

impl CampaignForSubmission {
    pub fn is_active(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("active")
    }

    /// An empty allow-list accepts every platform.
    pub fn allows(&self, platform: Platform) -> bool {
        self.allowed_platforms.is_empty()
            || self
                .allowed_platforms
                .iter()
                .any(|item| Platform::normalize(item) == Some(platform))
    }
}

/// Persistence port for submissions and their moderation side-records.
pub trait SubmissionRepository: Send + Sync {
    /// Insert a new submission, enforcing the duplicate window.
    fn create(&self, submission: Submission) -> Result<Submission, RepositoryError>;
    fn update(&self, submission: &Submission) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &SubmissionId) -> Result<Option<Submission>, RepositoryError>;
    /// Matching submissions, newest first.
    fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, RepositoryError>;
    /// One report per (submission, reporter); repeats yield `AlreadyReported`.
    fn add_report(&self, report: SubmissionReport) -> Result<(), RepositoryError>;
    fn add_flag(&self, flag: SubmissionFlag) -> Result<(), RepositoryError>;
    fn add_audit(&self, audit: SubmissionAudit) -> Result<(), RepositoryError>;
    fn add_bulk_operation(&self, operation: BulkSubmissionOperation) -> Result<(), RepositoryError>;
    fn add_view_snapshot(&self, snapshot: ViewSnapshot) -> Result<(), RepositoryError>;
}

pub trait AutoApproveRepository: Send + Sync {
    /// Pending, unreported submissions created at or before `threshold`, oldest first.
    fn list_pending_auto_approve(
        &self,
        threshold: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Submission>, RepositoryError>;
}

pub trait ViewLockRepository: Send + Sync {
    /// Approved or verification-period submissions whose window ended at or before
    /// `threshold` and whose views are not locked, ordered by window end.
    fn list_due_view_lock(
        &self,
        threshold: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Submission>, RepositoryError>;
}

/// Read model owned by the campaign context.
pub trait CampaignReadRepository: Send + Sync {
    fn campaign_for_submission(
        &self,
        campaign_id: &str,
    ) -> Result<CampaignForSubmission, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("duplicate submission")]
    DuplicateSubmission,
    #[error("submission already reported by this user")]
    AlreadyReported,
    #[error("campaign not found")]
    CampaignNotFound,
    #[error("record already exists with different content")]
    Conflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
