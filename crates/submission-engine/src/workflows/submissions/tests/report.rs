use super::common::*;

use crate::workflows::submissions::commands::ReportSubmission;
use crate::workflows::submissions::domain::{
    ActorRole, AuditAction, SubmissionStatus, DEFAULT_FLAG_SEVERITY, USER_REPORT_FLAG,
};
use crate::workflows::submissions::SubmissionError;

#[test]
fn first_report_flags_pending_submission() {
    let harness = harness();
    let submission = create_pending(&harness, "k1", TIKTOK_URL);

    let outcome = harness
        .service
        .report(report_cmd("rep-1", &submission.submission_id, "viewer-1"))
        .expect("report succeeds");

    assert_eq!(outcome.status, SubmissionStatus::Flagged);
    let stored = harness.fetch(&submission.submission_id);
    assert_eq!(stored.reported_count, 1);

    let flags = harness.store.flags(&submission.submission_id);
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].flag_type, USER_REPORT_FLAG);
    assert_eq!(flags[0].severity, DEFAULT_FLAG_SEVERITY);
    assert_eq!(flags[0].details["reporter_id"], "viewer-1");

    let audit = harness
        .store
        .audits(&submission.submission_id)
        .pop()
        .expect("flag audit");
    assert_eq!(audit.action, AuditAction::Flagged);
    assert_eq!(audit.actor_role, ActorRole::User);
    assert_eq!(audit.reason_code.as_deref(), Some("spam"));
    assert_eq!(
        harness.event_types().last().map(String::as_str),
        Some("submission.flagged")
    );
}

#[test]
fn same_reporter_cannot_report_twice() {
    let harness = harness();
    let submission = create_pending(&harness, "k1", TIKTOK_URL);
    harness
        .service
        .report(report_cmd("rep-1", &submission.submission_id, "viewer-1"))
        .expect("first report succeeds");

    match harness
        .service
        .report(report_cmd("rep-2", &submission.submission_id, "viewer-1"))
    {
        Err(SubmissionError::AlreadyReported) => {}
        other => panic!("expected already reported, got {other:?}"),
    }
    assert_eq!(harness.fetch(&submission.submission_id).reported_count, 1);
    assert_eq!(harness.store.reports(&submission.submission_id).len(), 1);
}

#[test]
fn further_reports_accumulate_without_moving_status() {
    let harness = harness();
    let submission = create_pending(&harness, "k1", TIKTOK_URL);
    harness
        .service
        .report(report_cmd("rep-1", &submission.submission_id, "viewer-1"))
        .expect("first report");
    let second = harness
        .service
        .report(report_cmd("rep-2", &submission.submission_id, "viewer-2"))
        .expect("second report");

    assert_eq!(second.status, SubmissionStatus::Flagged);
    let stored = harness.fetch(&submission.submission_id);
    assert_eq!(stored.reported_count, 2);
    let flagged_audits = harness
        .store
        .audits(&submission.submission_id)
        .into_iter()
        .filter(|audit| audit.old_status == Some(SubmissionStatus::Pending))
        .filter(|audit| audit.new_status == SubmissionStatus::Flagged)
        .count();
    assert_eq!(flagged_audits, 1);
}

#[test]
fn report_on_approved_submission_keeps_status() {
    let harness = harness();
    let submission = create_pending(&harness, "k1", TIKTOK_URL);
    harness
        .service
        .approve(approve_cmd("a1", &submission.submission_id))
        .expect("approve succeeds");

    let outcome = harness
        .service
        .report(report_cmd("rep-1", &submission.submission_id, "viewer-1"))
        .expect("report on approved submission is accepted");
    assert_eq!(outcome.status, SubmissionStatus::Approved);
    assert_eq!(harness.fetch(&submission.submission_id).reported_count, 1);
}

#[test]
fn report_replay_returns_cached_status() {
    let harness = harness();
    let submission = create_pending(&harness, "k1", TIKTOK_URL);
    harness
        .service
        .report(report_cmd("rep-1", &submission.submission_id, "viewer-1"))
        .expect("first report");

    let replay = harness
        .service
        .report(report_cmd("rep-1", &submission.submission_id, "viewer-1"))
        .expect("replay");
    assert!(replay.replayed);
    assert_eq!(replay.status, SubmissionStatus::Flagged);
    assert_eq!(harness.store.reports(&submission.submission_id).len(), 1);
}

#[test]
fn report_requires_reporter_and_reason() {
    let harness = harness();
    let submission = create_pending(&harness, "k1", TIKTOK_URL);

    match harness.service.report(ReportSubmission {
        reporter_id: String::new(),
        ..report_cmd("rep-1", &submission.submission_id, "viewer-1")
    }) {
        Err(SubmissionError::UnauthorizedActor) => {}
        other => panic!("expected unauthorized actor, got {other:?}"),
    }

    match harness.service.report(ReportSubmission {
        reason: " ".to_string(),
        ..report_cmd("rep-2", &submission.submission_id, "viewer-1")
    }) {
        Err(SubmissionError::InvalidInput(_)) => {}
        other => panic!("expected invalid input, got {other:?}"),
    }
}
