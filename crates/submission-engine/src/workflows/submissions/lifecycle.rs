//! Single transition table shared by commands and reconciliation workers.

use std::fmt;

use super::domain::SubmissionStatus;

/// Inputs that can move a submission between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Approve,
    AutoApprove,
    Reject,
    Cancel,
    Report,
    LockViews,
}

impl LifecycleAction {
    pub fn label(&self) -> &'static str {
        match self {
            LifecycleAction::Approve => "approve",
            LifecycleAction::AutoApprove => "auto_approve",
            LifecycleAction::Reject => "reject",
            LifecycleAction::Cancel => "cancel",
            LifecycleAction::Report => "report",
            LifecycleAction::LockViews => "lock_views",
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} a submission in status {from}")]
pub struct InvalidTransition {
    pub from: SubmissionStatus,
    pub action: LifecycleAction,
}

/// Resolve the status reached by applying `action` in state `from`.
///
/// Reports never fail: a pending submission becomes flagged and every other state stays put.
pub fn next_status(
    from: SubmissionStatus,
    action: LifecycleAction,
) -> Result<SubmissionStatus, InvalidTransition> {
    use SubmissionStatus::*;

    let next = match (action, from) {
        (LifecycleAction::Approve, Pending | Flagged) => Some(Approved),
        (LifecycleAction::AutoApprove, Pending) => Some(Approved),
        (LifecycleAction::Reject, Pending | Flagged) => Some(Rejected),
        (LifecycleAction::Cancel, Pending | Flagged) => Some(Cancelled),
        (LifecycleAction::Report, Pending) => Some(Flagged),
        (LifecycleAction::Report, other) => Some(other),
        (LifecycleAction::LockViews, Approved | VerificationPeriod) => Some(ViewLocked),
        _ => None,
    };

    next.ok_or(InvalidTransition { from, action })
}

/// Reject reasons that route to `cancelled` instead of `rejected`.
pub fn is_cancellation_reason(reason: &str) -> bool {
    matches!(
        reason.trim().to_ascii_lowercase().as_str(),
        "campaign_cancelled" | "submission_cancelled" | "cancelled"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_actions_only_leave_pending_or_flagged() {
        for status in SubmissionStatus::ALL {
            let allowed = matches!(status, SubmissionStatus::Pending | SubmissionStatus::Flagged);
            assert_eq!(
                next_status(status, LifecycleAction::Approve).is_ok(),
                allowed,
                "approve from {status}"
            );
            assert_eq!(
                next_status(status, LifecycleAction::Reject).is_ok(),
                allowed,
                "reject from {status}"
            );
        }
    }

    #[test]
    fn auto_approve_requires_pending() {
        assert_eq!(
            next_status(SubmissionStatus::Pending, LifecycleAction::AutoApprove),
            Ok(SubmissionStatus::Approved)
        );
        assert!(next_status(SubmissionStatus::Flagged, LifecycleAction::AutoApprove).is_err());
    }

    #[test]
    fn report_flags_pending_and_leaves_others() {
        assert_eq!(
            next_status(SubmissionStatus::Pending, LifecycleAction::Report),
            Ok(SubmissionStatus::Flagged)
        );
        assert_eq!(
            next_status(SubmissionStatus::Approved, LifecycleAction::Report),
            Ok(SubmissionStatus::Approved)
        );
        assert_eq!(
            next_status(SubmissionStatus::Flagged, LifecycleAction::Report),
            Ok(SubmissionStatus::Flagged)
        );
    }

    #[test]
    fn view_lock_from_verification_states_only() {
        assert_eq!(
            next_status(SubmissionStatus::VerificationPeriod, LifecycleAction::LockViews),
            Ok(SubmissionStatus::ViewLocked)
        );
        let err = next_status(SubmissionStatus::Rejected, LifecycleAction::LockViews)
            .expect_err("rejected cannot lock");
        assert_eq!(
            err.to_string(),
            "cannot lock_views a submission in status rejected"
        );
    }

    #[test]
    fn cancellation_reasons_are_case_insensitive() {
        assert!(is_cancellation_reason(" CANCELLED "));
        assert!(is_cancellation_reason("submission_cancelled"));
        assert!(!is_cancellation_reason("spam"));
    }
}
