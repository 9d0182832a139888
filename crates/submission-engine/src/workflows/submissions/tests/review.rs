use super::common::*;
use chrono::Duration;

use crate::workflows::submissions::commands::ApproveSubmission;
use crate::workflows::submissions::domain::{ActorRole, AuditAction, SubmissionId, SubmissionStatus};
use crate::workflows::submissions::SubmissionError;

#[test]
fn approve_opens_verification_window_and_emits_event() {
    let harness = harness();
    let submission = create_pending(&harness, "k1", TIKTOK_URL);

    let outcome = harness
        .service
        .approve(approve_cmd("a1", &submission.submission_id))
        .expect("approve succeeds");

    assert_eq!(outcome.status, SubmissionStatus::Approved);
    assert!(!outcome.replayed);
    let stored = harness.fetch(&submission.submission_id);
    assert_eq!(stored.approved_by.as_deref(), Some(REVIEWER));
    assert_eq!(stored.approval_reason.as_deref(), Some("meets brief"));
    assert_eq!(stored.approved_at, Some(start()));
    assert_eq!(stored.verification_window_end, Some(start() + Duration::days(30)));

    let audits = harness.store.audits(&submission.submission_id);
    let approval = audits.last().expect("approval audit");
    assert_eq!(approval.action, AuditAction::Approved);
    assert_eq!(approval.actor_role, ActorRole::BrandCreator);
    assert_eq!(approval.old_status, Some(SubmissionStatus::Pending));
    assert_eq!(
        harness.event_types(),
        vec![
            "submission.created".to_string(),
            "submission.approved".to_string()
        ]
    );
}

#[test]
fn approve_replay_returns_stored_outcome_without_mutation() {
    let harness = harness();
    let submission = create_pending(&harness, "k1", TIKTOK_URL);
    harness
        .service
        .approve(approve_cmd("a1", &submission.submission_id))
        .expect("approve succeeds");

    let replay = harness
        .service
        .approve(approve_cmd("a1", &submission.submission_id))
        .expect("replay succeeds");

    assert!(replay.replayed);
    assert_eq!(replay.status, SubmissionStatus::Approved);
    assert_eq!(harness.store.audits(&submission.submission_id).len(), 2);
    assert_eq!(harness.store.outbox_events().len(), 2);
}

#[test]
fn approve_with_new_key_after_approval_is_invalid_transition() {
    let harness = harness();
    let submission = create_pending(&harness, "k1", TIKTOK_URL);
    harness
        .service
        .approve(approve_cmd("a1", &submission.submission_id))
        .expect("approve succeeds");

    match harness
        .service
        .approve(approve_cmd("a2", &submission.submission_id))
    {
        Err(SubmissionError::InvalidTransition(err)) => {
            assert_eq!(err.from, SubmissionStatus::Approved);
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[test]
fn review_checks_lookup_before_actor() {
    let harness = harness();

    match harness.service.approve(ApproveSubmission {
        actor_id: String::new(),
        ..approve_cmd("a1", &SubmissionId::from("missing"))
    }) {
        Err(SubmissionError::NotFound) => {}
        other => panic!("expected not found, got {other:?}"),
    }

    let submission = create_pending(&harness, "k1", TIKTOK_URL);
    match harness.service.approve(ApproveSubmission {
        actor_id: "  ".to_string(),
        ..approve_cmd("a2", &submission.submission_id)
    }) {
        Err(SubmissionError::UnauthorizedActor) => {}
        other => panic!("expected unauthorized actor, got {other:?}"),
    }
    assert_eq!(
        harness.fetch(&submission.submission_id).status,
        SubmissionStatus::Pending
    );
}

#[test]
fn reject_records_reason_and_notes() {
    let harness = harness();
    let submission = create_pending(&harness, "k1", TIKTOK_URL);

    let outcome = harness
        .service
        .reject(reject_cmd("r1", &submission.submission_id, "off_brief"))
        .expect("reject succeeds");

    assert_eq!(outcome.status, SubmissionStatus::Rejected);
    let stored = harness.fetch(&submission.submission_id);
    assert_eq!(stored.rejection_reason.as_deref(), Some("off_brief"));
    assert_eq!(stored.rejection_notes.as_deref(), Some("see guidelines"));
    assert_eq!(stored.rejected_at, Some(start()));

    let events = harness.store.outbox_events();
    let rejected = events.last().expect("rejected event");
    assert_eq!(rejected.event_type, "submission.rejected");
    assert_eq!(rejected.data["reason"], "off_brief");
}

#[test]
fn cancellation_reason_cancels_and_clears_rejection_fields() {
    let harness = harness();
    let submission = create_pending(&harness, "k1", TIKTOK_URL);

    let outcome = harness
        .service
        .reject(reject_cmd("r1", &submission.submission_id, "Campaign_Cancelled"))
        .expect("cancel succeeds");

    assert_eq!(outcome.status, SubmissionStatus::Cancelled);
    let stored = harness.fetch(&submission.submission_id);
    assert!(stored.rejected_at.is_none());
    assert!(stored.rejection_reason.is_none());
    assert!(stored.rejection_notes.is_none());

    let audits = harness.store.audits(&submission.submission_id);
    assert_eq!(
        audits.last().map(|audit| audit.action),
        Some(AuditAction::Cancelled)
    );
    assert_eq!(
        harness.event_types().last().map(String::as_str),
        Some("submission.cancelled")
    );
}

#[test]
fn flagged_submissions_can_still_be_reviewed() {
    let harness = harness();
    let submission = create_pending(&harness, "k1", TIKTOK_URL);
    harness
        .service
        .report(report_cmd("rep-1", &submission.submission_id, "viewer-1"))
        .expect("report succeeds");

    let outcome = harness
        .service
        .reject(reject_cmd("r1", &submission.submission_id, "spam"))
        .expect("flagged submissions are reviewable");
    assert_eq!(outcome.status, SubmissionStatus::Rejected);
}

#[test]
fn rejected_submissions_cannot_be_approved() {
    let harness = harness();
    let submission = create_pending(&harness, "k1", TIKTOK_URL);
    harness
        .service
        .reject(reject_cmd("r1", &submission.submission_id, "off_brief"))
        .expect("reject succeeds");

    match harness
        .service
        .approve(approve_cmd("a1", &submission.submission_id))
    {
        Err(err @ SubmissionError::InvalidTransition(_)) => {
            assert_eq!(err.code(), "invalid_status_transition");
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }
}
