use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lifecycle::{self, InvalidTransition, LifecycleAction};

/// Length of the verification period opened by an approval.
pub const VERIFICATION_PERIOD_DAYS: i64 = 30;

/// Identifier wrapper for creator submissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub String);

impl SubmissionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubmissionId {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

/// Lifecycle states a submission can occupy. Wire labels are the snake_case names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Flagged,
    Approved,
    VerificationPeriod,
    ViewLocked,
    RewardEligible,
    Paid,
    Disputed,
    Rejected,
    Cancelled,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 10] = [
        SubmissionStatus::Pending,
        SubmissionStatus::Flagged,
        SubmissionStatus::Approved,
        SubmissionStatus::VerificationPeriod,
        SubmissionStatus::ViewLocked,
        SubmissionStatus::RewardEligible,
        SubmissionStatus::Paid,
        SubmissionStatus::Disputed,
        SubmissionStatus::Rejected,
        SubmissionStatus::Cancelled,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Flagged => "flagged",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::VerificationPeriod => "verification_period",
            SubmissionStatus::ViewLocked => "view_locked",
            SubmissionStatus::RewardEligible => "reward_eligible",
            SubmissionStatus::Paid => "paid",
            SubmissionStatus::Disputed => "disputed",
            SubmissionStatus::Rejected => "rejected",
            SubmissionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Social platforms a submission may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "tiktok")]
    TikTok,
    #[serde(rename = "instagram")]
    Instagram,
    #[serde(rename = "youtube")]
    YouTube,
    #[serde(rename = "x", alias = "twitter")]
    X,
}

impl Platform {
    /// Case-insensitive lookup; `twitter` is folded into `x`.
    pub fn normalize(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "tiktok" => Some(Platform::TikTok),
            "instagram" => Some(Platform::Instagram),
            "youtube" => Some(Platform::YouTube),
            "x" | "twitter" => Some(Platform::X),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Platform::TikTok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::YouTube => "youtube",
            Platform::X => "x",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Payout figures computed once views are locked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub gross_amount: f64,
    pub platform_fee: f64,
    pub net_amount: f64,
}

impl Settlement {
    /// `gross = views / 1000 * cpv`, fee is a share of gross, net is the remainder.
    pub fn compute(locked_views: u64, cpv_rate: f64, fee_rate: f64) -> Self {
        let gross_amount = (locked_views as f64 / 1000.0) * cpv_rate;
        let platform_fee = gross_amount * fee_rate;
        Self {
            gross_amount,
            platform_fee,
            net_amount: gross_amount - platform_fee,
        }
    }
}

/// A creator's claim that a post belongs to a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub submission_id: SubmissionId,
    pub campaign_id: String,
    pub creator_id: String,
    pub platform: Platform,
    pub post_url: String,
    pub post_id: String,
    pub creator_platform_handle: String,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub approval_reason: Option<String>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub rejection_notes: Option<String>,
    pub reported_count: u32,
    pub verification_start: Option<DateTime<Utc>>,
    pub verification_window_end: Option<DateTime<Utc>>,
    pub views_count: u64,
    pub locked_views: Option<u64>,
    pub locked_at: Option<DateTime<Utc>>,
    pub last_view_sync: Option<DateTime<Utc>>,
    pub cpv_rate: f64,
    pub settlement: Option<Settlement>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// Input required to open a fresh pending submission.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub submission_id: SubmissionId,
    pub campaign_id: String,
    pub creator_id: String,
    pub platform: Platform,
    pub post_url: String,
    pub post_id: String,
    pub creator_platform_handle: String,
    pub cpv_rate: f64,
}

impl Submission {
    pub fn open(input: NewSubmission, now: DateTime<Utc>) -> Self {
        Self {
            submission_id: input.submission_id,
            campaign_id: input.campaign_id,
            creator_id: input.creator_id,
            platform: input.platform,
            post_url: input.post_url,
            post_id: input.post_id,
            creator_platform_handle: input.creator_platform_handle,
            status: SubmissionStatus::Pending,
            created_at: now,
            updated_at: now,
            approved_at: None,
            approved_by: None,
            approval_reason: None,
            rejected_at: None,
            rejection_reason: None,
            rejection_notes: None,
            reported_count: 0,
            verification_start: None,
            verification_window_end: None,
            views_count: 0,
            locked_views: None,
            locked_at: None,
            last_view_sync: None,
            cpv_rate: input.cpv_rate,
            settlement: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Mirrors the create-time validation: identity fields and URL must be present.
    pub fn is_complete(&self) -> bool {
        !self.campaign_id.trim().is_empty()
            && !self.creator_id.trim().is_empty()
            && !self.post_url.trim().is_empty()
    }

    /// Move to `approved` and open the verification window. Returns the previous status.
    pub fn approve(
        &mut self,
        action: LifecycleAction,
        approved_by: Option<&str>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<SubmissionStatus, InvalidTransition> {
        let previous = self.status;
        self.status = lifecycle::next_status(previous, action)?;
        self.approved_at = Some(now);
        self.approved_by = approved_by.and_then(non_empty);
        self.approval_reason = non_empty(reason);
        self.verification_start = Some(now);
        self.verification_window_end = Some(now + Duration::days(VERIFICATION_PERIOD_DAYS));
        self.updated_at = now;
        Ok(previous)
    }

    /// Reject or cancel depending on the reason code.
    pub fn reject(
        &mut self,
        reason: &str,
        notes: &str,
        now: DateTime<Utc>,
    ) -> Result<Rejection, InvalidTransition> {
        let previous = self.status;
        let action = if lifecycle::is_cancellation_reason(reason) {
            LifecycleAction::Cancel
        } else {
            LifecycleAction::Reject
        };
        self.status = lifecycle::next_status(previous, action)?;
        self.updated_at = now;

        if action == LifecycleAction::Cancel {
            self.rejected_at = None;
            self.rejection_reason = None;
            self.rejection_notes = None;
        } else {
            self.rejected_at = Some(now);
            self.rejection_reason = non_empty(reason);
            self.rejection_notes = non_empty(notes);
        }

        Ok(Rejection {
            previous,
            cancelled: action == LifecycleAction::Cancel,
        })
    }

    /// Count a moderation report. Pending submissions become flagged; other states keep
    /// accumulating reports without moving.
    pub fn record_report(&mut self, now: DateTime<Utc>) -> Result<SubmissionStatus, InvalidTransition> {
        let previous = self.status;
        self.status = lifecycle::next_status(previous, LifecycleAction::Report)?;
        self.reported_count += 1;
        self.updated_at = now;
        Ok(previous)
    }

    /// Freeze the view count and compute the settlement. `locked_views` can only be set once.
    pub fn lock_views(
        &mut self,
        fee_rate: f64,
        now: DateTime<Utc>,
    ) -> Result<SubmissionStatus, InvalidTransition> {
        let previous = self.status;
        if self.locked_views.is_some() {
            return Err(InvalidTransition {
                from: previous,
                action: LifecycleAction::LockViews,
            });
        }
        self.status = lifecycle::next_status(previous, LifecycleAction::LockViews)?;
        self.locked_views = Some(self.views_count);
        self.locked_at = Some(now);
        self.settlement = Some(Settlement::compute(self.views_count, self.cpv_rate, fee_rate));
        self.updated_at = now;
        Ok(previous)
    }
}

/// Outcome of a reject call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub previous: SubmissionStatus,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Approved,
    AutoApproved,
    Rejected,
    Cancelled,
    Flagged,
    ViewLocked,
}

impl AuditAction {
    pub fn label(&self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::Approved => "approved",
            AuditAction::AutoApproved => "auto_approved",
            AuditAction::Rejected => "rejected",
            AuditAction::Cancelled => "cancelled",
            AuditAction::Flagged => "flagged",
            AuditAction::ViewLocked => "view_locked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Creator,
    BrandCreator,
    User,
    System,
}

/// Append-only record of one state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionAudit {
    pub audit_id: String,
    pub submission_id: SubmissionId,
    pub action: AuditAction,
    pub old_status: Option<SubmissionStatus>,
    pub new_status: SubmissionStatus,
    pub actor_id: String,
    pub actor_role: ActorRole,
    pub reason_code: Option<String>,
    pub reason_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub const DEFAULT_FLAG_SEVERITY: &str = "medium";
pub const USER_REPORT_FLAG: &str = "user_report";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionFlag {
    pub flag_id: String,
    pub submission_id: SubmissionId,
    pub flag_type: String,
    pub severity: String,
    pub details: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SubmissionFlag {
    /// Moderation flag raised by a user report.
    pub fn from_report(flag_id: String, report: &SubmissionReport) -> Self {
        let mut details = BTreeMap::new();
        details.insert("reason".to_string(), Value::from(report.reason.clone()));
        details.insert(
            "description".to_string(),
            Value::from(report.description.clone().unwrap_or_default()),
        );
        details.insert(
            "reporter_id".to_string(),
            Value::from(report.reported_by_id.clone()),
        );

        Self {
            flag_id,
            submission_id: report.submission_id.clone(),
            flag_type: USER_REPORT_FLAG.to_string(),
            severity: DEFAULT_FLAG_SEVERITY.to_string(),
            details,
            created_at: report.reported_at,
            is_resolved: false,
            resolved_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReport {
    pub report_id: String,
    pub submission_id: SubmissionId,
    pub reported_by_id: String,
    pub reason: String,
    pub description: Option<String>,
    pub reported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperationType {
    BulkApprove,
    BulkReject,
}

impl BulkOperationType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "bulk_approve" => Some(BulkOperationType::BulkApprove),
            "bulk_reject" => Some(BulkOperationType::BulkReject),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BulkOperationType::BulkApprove => "bulk_approve",
            BulkOperationType::BulkReject => "bulk_reject",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSubmissionOperation {
    pub operation_id: String,
    pub campaign_id: String,
    pub operation_type: BulkOperationType,
    pub submission_ids: Vec<String>,
    pub performed_by: String,
    pub succeeded_count: usize,
    pub failed_count: usize,
    pub reason_code: Option<String>,
    pub reason_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Point-in-time view count captured when views are locked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub snapshot_id: String,
    pub submission_id: SubmissionId,
    pub views_count: u64,
    pub synced_at: DateTime<Utc>,
    pub is_anomaly: bool,
    pub anomaly_reason: Option<String>,
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid timestamp")
    }

    fn pending() -> Submission {
        Submission::open(
            NewSubmission {
                submission_id: SubmissionId("sub-1".to_string()),
                campaign_id: "camp-1".to_string(),
                creator_id: "creator-1".to_string(),
                platform: Platform::TikTok,
                post_url: "https://tiktok.com/@creator/video/1".to_string(),
                post_id: "1".to_string(),
                creator_platform_handle: "@creator".to_string(),
                cpv_rate: 0.2,
            },
            now(),
        )
    }

    #[test]
    fn platform_normalization_folds_twitter_into_x() {
        assert_eq!(Platform::normalize(" Twitter "), Some(Platform::X));
        assert_eq!(Platform::normalize("TikTok"), Some(Platform::TikTok));
        assert_eq!(Platform::normalize("myspace"), None);
        let decoded: Platform = serde_json::from_str("\"twitter\"").expect("alias decodes");
        assert_eq!(decoded, Platform::X);
    }

    #[test]
    fn status_labels_round_trip_through_parse() {
        for status in SubmissionStatus::ALL {
            assert_eq!(SubmissionStatus::parse(status.label()), Some(status));
        }
        assert_eq!(
            serde_json::to_value(SubmissionStatus::VerificationPeriod).expect("serializes"),
            Value::from("verification_period")
        );
    }

    #[test]
    fn approve_opens_thirty_day_window() {
        let mut submission = pending();
        let previous = submission
            .approve(LifecycleAction::Approve, Some(" reviewer "), "great", now())
            .expect("pending approves");

        assert_eq!(previous, SubmissionStatus::Pending);
        assert_eq!(submission.status, SubmissionStatus::Approved);
        assert_eq!(submission.approved_by.as_deref(), Some("reviewer"));
        assert_eq!(
            submission.verification_window_end,
            Some(now() + Duration::days(30))
        );
    }

    #[test]
    fn cancellation_reason_clears_rejection_fields() {
        let mut submission = pending();
        let rejection = submission
            .reject("Campaign_Cancelled", "brand pulled out", now())
            .expect("pending rejects");

        assert!(rejection.cancelled);
        assert_eq!(submission.status, SubmissionStatus::Cancelled);
        assert!(submission.rejected_at.is_none());
        assert!(submission.rejection_reason.is_none());
        assert!(submission.rejection_notes.is_none());
    }

    #[test]
    fn reports_flag_pending_once_and_accumulate() {
        let mut submission = pending();
        submission.record_report(now()).expect("report accepted");
        submission.record_report(now()).expect("report accepted");

        assert_eq!(submission.status, SubmissionStatus::Flagged);
        assert_eq!(submission.reported_count, 2);
    }

    #[test]
    fn settlement_splits_fee_from_gross() {
        let settlement = Settlement::compute(5000, 0.2, 0.15);
        assert!((settlement.gross_amount - 1.0).abs() < 1e-9);
        assert!((settlement.platform_fee - 0.15).abs() < 1e-9);
        assert!((settlement.net_amount - 0.85).abs() < 1e-9);
    }

    #[test]
    fn locked_views_are_immutable() {
        let mut submission = pending();
        submission
            .approve(LifecycleAction::Approve, Some("reviewer"), "", now())
            .expect("approves");
        submission.views_count = 5000;
        submission.lock_views(0.15, now()).expect("locks");

        submission.views_count = 9000;
        submission.status = SubmissionStatus::Approved;
        assert!(submission.lock_views(0.15, now()).is_err());
        assert_eq!(submission.locked_views, Some(5000));
    }
}
