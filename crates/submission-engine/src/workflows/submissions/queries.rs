use serde::Serialize;
use tracing::{debug, error};

use super::domain::{Submission, SubmissionId, SubmissionStatus};
use super::error::SubmissionError;
use super::repository::{RepositoryError, SubmissionFilter};
use super::service::SubmissionService;

/// Status counts over a creator's or a campaign's submissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub flagged: usize,
}

impl DashboardSummary {
    /// Statuses outside the four tracked buckets only count toward `total`.
    pub fn summarize(items: &[Submission]) -> Self {
        items.iter().fold(
            Self {
                total: items.len(),
                ..Self::default()
            },
            |mut summary, item| {
                match item.status {
                    SubmissionStatus::Pending => summary.pending += 1,
                    SubmissionStatus::Approved => summary.approved += 1,
                    SubmissionStatus::Rejected => summary.rejected += 1,
                    SubmissionStatus::Flagged => summary.flagged += 1,
                    _ => {}
                }
                summary
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionAnalytics {
    pub submission_id: SubmissionId,
    pub view_count: u64,
    pub reported: u32,
}

impl SubmissionService {
    /// Fetch one submission. When `actor_id` is present it must be the creator.
    pub fn get_submission(
        &self,
        id: &SubmissionId,
        actor_id: Option<&str>,
    ) -> Result<Submission, SubmissionError> {
        let submission = self
            .ports
            .submissions
            .fetch(id)
            .map_err(|err| {
                error!(
                    event = "submission_get_failed",
                    submission_id = %id,
                    error = %err,
                    "submission lookup failed"
                );
                err
            })?
            .ok_or(RepositoryError::NotFound)?;

        match actor_id.map(str::trim) {
            Some(actor) if !actor.is_empty() && actor != submission.creator_id => {
                error!(
                    event = "submission_get_forbidden",
                    submission_id = %id,
                    actor_id = actor,
                    "submission read by a non-owner"
                );
                Err(SubmissionError::UnauthorizedActor)
            }
            _ => Ok(submission),
        }
    }

    pub fn list_submissions(
        &self,
        filter: &SubmissionFilter,
    ) -> Result<Vec<Submission>, SubmissionError> {
        Ok(self.ports.submissions.list(&trimmed(filter))?)
    }

    pub fn creator_dashboard(&self, creator_id: &str) -> Result<DashboardSummary, SubmissionError> {
        let items = self.ports.submissions.list(&SubmissionFilter {
            creator_id: Some(creator_id.trim().to_string()),
            ..SubmissionFilter::default()
        })?;
        Ok(DashboardSummary::summarize(&items))
    }

    pub fn brand_dashboard(&self, campaign_id: &str) -> Result<DashboardSummary, SubmissionError> {
        let items = self.ports.submissions.list(&SubmissionFilter {
            campaign_id: Some(campaign_id.trim().to_string()),
            ..SubmissionFilter::default()
        })?;
        let summary = DashboardSummary::summarize(&items);
        debug!(
            event = "submission_brand_dashboard_computed",
            campaign_id = campaign_id.trim(),
            total = summary.total,
            "brand dashboard computed"
        );
        Ok(summary)
    }

    /// View and report counters for the owning creator.
    pub fn analytics(
        &self,
        id: &SubmissionId,
        actor_id: Option<&str>,
    ) -> Result<SubmissionAnalytics, SubmissionError> {
        let submission = self.get_submission(id, actor_id)?;
        Ok(SubmissionAnalytics {
            submission_id: submission.submission_id,
            view_count: submission.views_count,
            reported: submission.reported_count,
        })
    }
}

fn trimmed(filter: &SubmissionFilter) -> SubmissionFilter {
    let clean = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    SubmissionFilter {
        creator_id: clean(&filter.creator_id),
        campaign_id: clean(&filter.campaign_id),
        status: filter.status,
    }
}
