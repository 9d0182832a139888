use super::common::*;

use crate::workflows::submissions::commands::{BulkOperation, UNKNOWN_CAMPAIGN_ID};
use crate::workflows::submissions::domain::{BulkOperationType, SubmissionStatus};
use crate::workflows::submissions::SubmissionError;

fn bulk(key: &str, operation_type: &str, ids: Vec<String>) -> BulkOperation {
    BulkOperation {
        idempotency_key: key.to_string(),
        actor_id: REVIEWER.to_string(),
        operation_type: operation_type.to_string(),
        submission_ids: ids,
        reason_code: String::new(),
        reason: String::new(),
    }
}

#[test]
fn bulk_approve_counts_successes_and_failures() {
    let harness = harness();
    let first = create_pending(&harness, "k1", "https://tiktok.com/@creator/video/1");
    let second = create_pending(&harness, "k2", "https://tiktok.com/@creator/video/2");

    let outcome = harness
        .service
        .bulk_operation(bulk(
            "bulk-1",
            "bulk_approve",
            vec![
                first.submission_id.to_string(),
                " ".to_string(),
                second.submission_id.to_string(),
                "missing".to_string(),
            ],
        ))
        .expect("bulk succeeds");

    assert!(!outcome.replayed);
    assert_eq!(outcome.result.processed, 4);
    assert_eq!(outcome.result.succeeded_count, 2);
    assert_eq!(outcome.result.failed_count, 2);
    assert_eq!(
        harness.fetch(&first.submission_id).status,
        SubmissionStatus::Approved
    );
    assert_eq!(
        harness.fetch(&second.submission_id).status,
        SubmissionStatus::Approved
    );

    let operations = harness.store.bulk_operations();
    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0].campaign_id, CAMPAIGN);
    assert_eq!(operations[0].operation_type, BulkOperationType::BulkApprove);
    assert_eq!(operations[0].succeeded_count, 2);
}

#[test]
fn bulk_replay_returns_identical_counts_without_reprocessing() {
    let harness = harness();
    let submission = create_pending(&harness, "k1", TIKTOK_URL);
    let cmd = bulk(
        "bulk-1",
        "bulk_reject",
        vec![submission.submission_id.to_string(), "missing".to_string()],
    );

    let first = harness
        .service
        .bulk_operation(cmd.clone())
        .expect("bulk succeeds");
    let events_after_first = harness.store.outbox_events().len();
    let replay = harness.service.bulk_operation(cmd).expect("replay succeeds");

    assert!(replay.replayed);
    assert_eq!(replay.result, first.result);
    assert_eq!(harness.store.outbox_events().len(), events_after_first);
    assert_eq!(harness.store.bulk_operations().len(), 1);
}

#[test]
fn bulk_reject_falls_back_to_default_reason() {
    let harness = harness();
    let submission = create_pending(&harness, "k1", TIKTOK_URL);

    harness
        .service
        .bulk_operation(bulk(
            "bulk-1",
            "bulk_reject",
            vec![submission.submission_id.to_string()],
        ))
        .expect("bulk succeeds");

    let stored = harness.fetch(&submission.submission_id);
    assert_eq!(stored.status, SubmissionStatus::Rejected);
    assert_eq!(stored.rejection_reason.as_deref(), Some("bulk_reject"));
}

#[test]
fn bulk_items_are_idempotent_under_derived_keys() {
    let harness = harness();
    let submission = create_pending(&harness, "k1", TIKTOK_URL);
    let id = submission.submission_id.to_string();

    harness
        .service
        .bulk_operation(bulk("bulk-1", "bulk_approve", vec![id.clone()]))
        .expect("bulk succeeds");

    let item = harness
        .service
        .approve(crate::workflows::submissions::commands::ApproveSubmission {
            idempotency_key: format!("bulk-1:{id}:bulk_approve"),
            submission_id: id,
            actor_id: REVIEWER.to_string(),
            reason: String::new(),
        })
        .expect("derived key replays");
    assert!(item.replayed);
}

#[test]
fn bulk_with_no_resolvable_submission_uses_sentinel_campaign() {
    let harness = harness();
    let outcome = harness
        .service
        .bulk_operation(bulk("bulk-1", "bulk_approve", vec!["ghost".to_string()]))
        .expect("bulk succeeds even when every item fails");

    assert_eq!(outcome.result.failed_count, 1);
    assert_eq!(
        harness.store.bulk_operations()[0].campaign_id,
        UNKNOWN_CAMPAIGN_ID
    );
}

#[test]
fn bulk_key_reused_with_different_blank_entries_is_a_conflict() {
    let harness = harness();
    let first = create_pending(&harness, "k1", "https://tiktok.com/@creator/video/1");
    let second = create_pending(&harness, "k2", "https://tiktok.com/@creator/video/2");
    let with_blank = bulk(
        "bulk-1",
        "bulk_approve",
        vec![
            first.submission_id.to_string(),
            " ".to_string(),
            second.submission_id.to_string(),
        ],
    );

    let outcome = harness
        .service
        .bulk_operation(with_blank.clone())
        .expect("bulk succeeds");
    assert_eq!(outcome.result.processed, 3);
    assert_eq!(outcome.result.failed_count, 1);

    match harness.service.bulk_operation(BulkOperation {
        submission_ids: vec![
            first.submission_id.to_string(),
            second.submission_id.to_string(),
        ],
        ..with_blank.clone()
    }) {
        Err(SubmissionError::IdempotencyKeyConflict) => {}
        other => panic!("expected idempotency conflict, got {other:?}"),
    }

    let padded = BulkOperation {
        submission_ids: vec![
            format!(" {} ", first.submission_id),
            "".to_string(),
            second.submission_id.to_string(),
        ],
        ..with_blank
    };
    let replay = harness
        .service
        .bulk_operation(padded)
        .expect("trimmed ids replay");
    assert!(replay.replayed);
    assert_eq!(replay.result, outcome.result);
}

#[test]
fn bulk_validates_operation_ids_and_actor() {
    let harness = harness();

    match harness
        .service
        .bulk_operation(bulk("bulk-1", "bulk_delete", vec!["a".to_string()]))
    {
        Err(SubmissionError::InvalidInput(_)) => {}
        other => panic!("expected invalid operation type, got {other:?}"),
    }

    match harness
        .service
        .bulk_operation(bulk("bulk-2", "bulk_approve", Vec::new()))
    {
        Err(SubmissionError::InvalidInput(_)) => {}
        other => panic!("expected empty id list error, got {other:?}"),
    }

    match harness.service.bulk_operation(BulkOperation {
        actor_id: String::new(),
        ..bulk("bulk-3", "bulk_approve", vec!["a".to_string()])
    }) {
        Err(SubmissionError::UnauthorizedActor) => {}
        other => panic!("expected unauthorized actor, got {other:?}"),
    }
}
