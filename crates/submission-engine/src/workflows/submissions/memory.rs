//! In-process adapters for every submission port.
//!
//! Used by the API binary's demo mode and by the test suites. Mutations are serialized behind
//! one mutex; uniqueness rules are enforced through keyed indexes rather than scans.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use super::consumer::{ConsumeError, EventDedupStore, Reservation};
use super::domain::{
    BulkSubmissionOperation, Submission, SubmissionAudit, SubmissionFlag, SubmissionId,
    SubmissionReport, SubmissionStatus, ViewSnapshot,
};
use super::events::{EventEnvelope, EventHandler, EventPublisher, EventSubscriber, PublishError};
use super::idempotency::{IdempotencyRecord, IdempotencyStore};
use super::outbox::{OutboxMessage, OutboxRepository, OutboxWriter};
use super::repository::{
    AutoApproveRepository, CampaignForSubmission, CampaignReadRepository, RepositoryError,
    SubmissionFilter, SubmissionRepository, ViewLockRepository, DUPLICATE_WINDOW_HOURS,
};

type DuplicateKey = (String, String, String);

#[derive(Debug, Clone)]
struct DedupRow {
    payload_hash: String,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct StoreState {
    submissions: Vec<Submission>,
    by_id: HashMap<SubmissionId, usize>,
    duplicate_index: HashMap<DuplicateKey, Vec<usize>>,
    campaigns: HashMap<String, CampaignForSubmission>,
    reports: Vec<SubmissionReport>,
    reporters: HashMap<(SubmissionId, String), usize>,
    flags: Vec<SubmissionFlag>,
    audits: Vec<SubmissionAudit>,
    bulk_operations: Vec<BulkSubmissionOperation>,
    snapshots: Vec<ViewSnapshot>,
    idempotency: HashMap<String, IdempotencyRecord>,
    outbox: Vec<OutboxMessage>,
    outbox_index: HashMap<String, usize>,
    event_dedup: HashMap<String, DedupRow>,
}

impl StoreState {
    fn outbox_row(&mut self, outbox_id: &str) -> Result<&mut OutboxMessage, RepositoryError> {
        let index = *self
            .outbox_index
            .get(outbox_id.trim())
            .ok_or(RepositoryError::NotFound)?;
        Ok(&mut self.outbox[index])
    }
}

fn duplicate_key(submission: &Submission) -> DuplicateKey {
    (
        submission.campaign_id.clone(),
        submission.creator_id.clone(),
        submission.post_url.clone(),
    )
}

/// Reference store backing every repository, idempotency, outbox, and dedup port.
#[derive(Default)]
pub struct InMemorySubmissionStore {
    state: Mutex<StoreState>,
}

impl InMemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the campaign read model for `campaign.campaign_id`.
    pub fn set_campaign(&self, campaign: CampaignForSubmission) {
        let mut state = self.state.lock().expect("store mutex poisoned");
        state
            .campaigns
            .insert(campaign.campaign_id.trim().to_string(), campaign);
    }

    pub fn audits(&self, id: &SubmissionId) -> Vec<SubmissionAudit> {
        let state = self.state.lock().expect("store mutex poisoned");
        state
            .audits
            .iter()
            .filter(|audit| &audit.submission_id == id)
            .cloned()
            .collect()
    }

    pub fn flags(&self, id: &SubmissionId) -> Vec<SubmissionFlag> {
        let state = self.state.lock().expect("store mutex poisoned");
        state
            .flags
            .iter()
            .filter(|flag| &flag.submission_id == id)
            .cloned()
            .collect()
    }

    pub fn reports(&self, id: &SubmissionId) -> Vec<SubmissionReport> {
        let state = self.state.lock().expect("store mutex poisoned");
        state
            .reports
            .iter()
            .filter(|report| &report.submission_id == id)
            .cloned()
            .collect()
    }

    pub fn snapshots(&self, id: &SubmissionId) -> Vec<ViewSnapshot> {
        let state = self.state.lock().expect("store mutex poisoned");
        state
            .snapshots
            .iter()
            .filter(|snapshot| &snapshot.submission_id == id)
            .cloned()
            .collect()
    }

    pub fn bulk_operations(&self) -> Vec<BulkSubmissionOperation> {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .bulk_operations
            .clone()
    }

    /// Every outbox row in append order, including published and dead-lettered ones.
    pub fn outbox_messages(&self) -> Vec<OutboxMessage> {
        self.state.lock().expect("store mutex poisoned").outbox.clone()
    }

    /// Decoded envelopes in append order.
    pub fn outbox_events(&self) -> Vec<EventEnvelope> {
        self.outbox_messages()
            .iter()
            .filter_map(|row| serde_json::from_str(&row.payload).ok())
            .collect()
    }

    pub fn submission_count(&self) -> usize {
        self.state.lock().expect("store mutex poisoned").submissions.len()
    }
}

impl SubmissionRepository for InMemorySubmissionStore {
    fn create(&self, submission: Submission) -> Result<Submission, RepositoryError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        if state.by_id.contains_key(&submission.submission_id) {
            return Err(RepositoryError::Conflict);
        }

        let key = duplicate_key(&submission);
        let window = Duration::hours(DUPLICATE_WINDOW_HOURS);
        let duplicate = state
            .duplicate_index
            .get(&key)
            .into_iter()
            .flatten()
            .map(|index| &state.submissions[*index])
            .any(|existing| {
                existing.status != SubmissionStatus::Cancelled
                    && submission.created_at - existing.created_at <= window
            });
        if duplicate {
            return Err(RepositoryError::DuplicateSubmission);
        }

        let index = state.submissions.len();
        state.by_id.insert(submission.submission_id.clone(), index);
        state.duplicate_index.entry(key).or_default().push(index);
        state.submissions.push(submission.clone());
        Ok(submission)
    }

    fn update(&self, submission: &Submission) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let index = *state
            .by_id
            .get(&submission.submission_id)
            .ok_or(RepositoryError::NotFound)?;
        state.submissions[index] = submission.clone();
        Ok(())
    }

    fn fetch(&self, id: &SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        let state = self.state.lock().expect("store mutex poisoned");
        Ok(state
            .by_id
            .get(&SubmissionId::from(id.as_str()))
            .map(|index| state.submissions[*index].clone()))
    }

    fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, RepositoryError> {
        let state = self.state.lock().expect("store mutex poisoned");
        let mut items: Vec<Submission> = state
            .submissions
            .iter()
            .rev()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();
        items.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(items)
    }

    fn add_report(&self, report: SubmissionReport) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let reporter = report.reported_by_id.trim().to_string();
        let key = (report.submission_id.clone(), reporter.clone());
        if !reporter.is_empty() && state.reporters.contains_key(&key) {
            return Err(RepositoryError::AlreadyReported);
        }
        let index = state.reports.len();
        state.reports.push(report);
        if !reporter.is_empty() {
            state.reporters.insert(key, index);
        }
        Ok(())
    }

    fn add_flag(&self, flag: SubmissionFlag) -> Result<(), RepositoryError> {
        self.state.lock().expect("store mutex poisoned").flags.push(flag);
        Ok(())
    }

    fn add_audit(&self, audit: SubmissionAudit) -> Result<(), RepositoryError> {
        self.state.lock().expect("store mutex poisoned").audits.push(audit);
        Ok(())
    }

    fn add_bulk_operation(&self, operation: BulkSubmissionOperation) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .bulk_operations
            .push(operation);
        Ok(())
    }

    fn add_view_snapshot(&self, snapshot: ViewSnapshot) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .snapshots
            .push(snapshot);
        Ok(())
    }
}

impl AutoApproveRepository for InMemorySubmissionStore {
    fn list_pending_auto_approve(
        &self,
        threshold: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Submission>, RepositoryError> {
        let state = self.state.lock().expect("store mutex poisoned");
        let mut items: Vec<Submission> = state
            .submissions
            .iter()
            .filter(|item| {
                item.status == SubmissionStatus::Pending
                    && item.reported_count == 0
                    && item.created_at <= threshold
            })
            .cloned()
            .collect();
        items.sort_by_key(|item| item.created_at);
        items.truncate(limit);
        Ok(items)
    }
}

impl ViewLockRepository for InMemorySubmissionStore {
    fn list_due_view_lock(
        &self,
        threshold: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Submission>, RepositoryError> {
        let state = self.state.lock().expect("store mutex poisoned");
        let mut items: Vec<Submission> = state
            .submissions
            .iter()
            .filter(|item| {
                item.locked_views.is_none()
                    && matches!(
                        item.status,
                        SubmissionStatus::Approved | SubmissionStatus::VerificationPeriod
                    )
                    && item
                        .verification_window_end
                        .is_some_and(|window_end| window_end <= threshold)
            })
            .cloned()
            .collect();
        items.sort_by_key(|item| item.verification_window_end);
        items.truncate(limit);
        Ok(items)
    }
}

impl CampaignReadRepository for InMemorySubmissionStore {
    fn campaign_for_submission(
        &self,
        campaign_id: &str,
    ) -> Result<CampaignForSubmission, RepositoryError> {
        let state = self.state.lock().expect("store mutex poisoned");
        state
            .campaigns
            .get(campaign_id.trim())
            .cloned()
            .ok_or(RepositoryError::CampaignNotFound)
    }
}

impl IdempotencyStore for InMemorySubmissionStore {
    fn get_record(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, RepositoryError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let key = key.trim();
        match state.idempotency.get(key) {
            Some(record) if record.is_expired(now) => {
                state.idempotency.remove(key);
                Ok(None)
            }
            Some(record) => Ok(Some(record.clone())),
            None => Ok(None),
        }
    }

    fn put_record(&self, record: IdempotencyRecord) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let key = record.key.trim().to_string();
        if let Some(existing) = state.idempotency.get(&key) {
            if existing.request_hash != record.request_hash || existing.payload != record.payload {
                return Err(RepositoryError::Conflict);
            }
            return Ok(());
        }
        state.idempotency.insert(key, record);
        Ok(())
    }
}

impl OutboxWriter for InMemorySubmissionStore {
    fn append_outbox(&self, envelope: &EventEnvelope) -> Result<(), RepositoryError> {
        let row = OutboxMessage::from_envelope(envelope)
            .map_err(|err| RepositoryError::Unavailable(err.to_string()))?;
        let mut state = self.state.lock().expect("store mutex poisoned");
        if let Some(index) = state.outbox_index.get(&row.outbox_id) {
            if state.outbox[*index].payload != row.payload {
                return Err(RepositoryError::Conflict);
            }
            return Ok(());
        }
        let index = state.outbox.len();
        state.outbox_index.insert(row.outbox_id.clone(), index);
        state.outbox.push(row);
        Ok(())
    }
}

impl OutboxRepository for InMemorySubmissionStore {
    fn list_pending_outbox(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboxMessage>, RepositoryError> {
        let state = self.state.lock().expect("store mutex poisoned");
        let mut undelivered: Vec<&OutboxMessage> = state
            .outbox
            .iter()
            .filter(|row| row.published_at.is_none() && row.dead_lettered_at.is_none())
            .collect();
        undelivered.sort_by_key(|row| row.created_at);

        let mut waiting: HashSet<&str> = HashSet::new();
        let mut items = Vec::new();
        for row in undelivered {
            if items.len() >= limit {
                break;
            }
            if waiting.contains(row.partition_key.as_str()) {
                continue;
            }
            if row.is_deliverable(now) {
                items.push(row.clone());
            } else {
                waiting.insert(row.partition_key.as_str());
            }
        }
        Ok(items)
    }

    fn mark_outbox_published(&self, outbox_id: &str, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let row = state.outbox_row(outbox_id)?;
        row.published_at = Some(at);
        Ok(())
    }

    fn record_outbox_failure(
        &self,
        outbox_id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let row = state.outbox_row(outbox_id)?;
        row.attempts += 1;
        row.last_error = Some(error.to_string());
        row.next_attempt_at = next_attempt_at;
        Ok(())
    }

    fn mark_outbox_dead_lettered(
        &self,
        outbox_id: &str,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let row = state.outbox_row(outbox_id)?;
        row.attempts += 1;
        row.last_error = Some(error.to_string());
        row.dead_lettered_at = Some(at);
        Ok(())
    }
}

impl EventDedupStore for InMemorySubmissionStore {
    fn reserve_event(
        &self,
        event_id: &str,
        payload_hash: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Reservation, RepositoryError> {
        let mut state = self.state.lock().expect("store mutex poisoned");
        let key = event_id.trim().to_string();
        let payload_hash = payload_hash.trim();
        if let Some(row) = state.event_dedup.get(&key) {
            if row.expires_at > now {
                if row.payload_hash != payload_hash {
                    return Err(RepositoryError::Conflict);
                }
                return Ok(Reservation::AlreadyProcessed);
            }
        }
        state.event_dedup.insert(
            key,
            DedupRow {
                payload_hash: payload_hash.to_string(),
                expires_at,
            },
        );
        Ok(Reservation::Reserved)
    }
}

/// Synchronous in-process bus. Published envelopes are recorded and handed to every handler
/// subscribed to the topic.
#[derive(Default)]
pub struct InMemoryEventBus {
    published: Mutex<Vec<(String, EventEnvelope)>>,
    handlers: Mutex<HashMap<String, Vec<(String, EventHandler)>>>,
    failing: Mutex<Vec<String>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish of `event_id` fail until [`InMemoryEventBus::recover_event`].
    pub fn fail_event(&self, event_id: &str) {
        self.failing
            .lock()
            .expect("bus mutex poisoned")
            .push(event_id.to_string());
    }

    pub fn recover_event(&self, event_id: &str) {
        self.failing
            .lock()
            .expect("bus mutex poisoned")
            .retain(|id| id != event_id);
    }

    /// `(topic, envelope)` pairs in publish order.
    pub fn published(&self) -> Vec<(String, EventEnvelope)> {
        self.published.lock().expect("bus mutex poisoned").clone()
    }

    pub fn published_types(&self) -> Vec<String> {
        self.published()
            .into_iter()
            .map(|(topic, _)| topic)
            .collect()
    }

    /// Hand `envelope` to every handler on `topic` and collect their results.
    pub fn deliver(
        &self,
        topic: &str,
        envelope: &EventEnvelope,
    ) -> Vec<Result<(), ConsumeError>> {
        let handlers: Vec<EventHandler> = self
            .handlers
            .lock()
            .expect("bus mutex poisoned")
            .get(topic)
            .map(|entries| entries.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default();
        handlers.iter().map(|handler| handler(envelope)).collect()
    }
}

impl EventPublisher for InMemoryEventBus {
    fn publish(&self, topic: &str, envelope: &EventEnvelope) -> Result<(), PublishError> {
        let failing = self
            .failing
            .lock()
            .expect("bus mutex poisoned")
            .iter()
            .any(|id| id == &envelope.event_id);
        if failing {
            return Err(PublishError::Transport(format!(
                "broker refused {}",
                envelope.event_id
            )));
        }

        self.published
            .lock()
            .expect("bus mutex poisoned")
            .push((topic.to_string(), envelope.clone()));
        for result in self.deliver(topic, envelope) {
            if let Err(err) = result {
                warn!(
                    event = "submission_bus_handler_failed",
                    topic,
                    event_id = %envelope.event_id,
                    error = %err,
                    "in-process handler failed"
                );
            }
        }
        Ok(())
    }
}

impl EventSubscriber for InMemoryEventBus {
    fn subscribe(&self, topic: &str, group: &str, handler: EventHandler) -> Result<(), PublishError> {
        self.handlers
            .lock()
            .expect("bus mutex poisoned")
            .entry(topic.to_string())
            .or_default()
            .push((group.to_string(), handler));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn dedup_reservation_is_replaced_after_expiry() {
        let store = InMemorySubmissionStore::new();
        assert_eq!(
            store.reserve_event("evt-1", "hash-a", at(2), at(1)).expect("reserves"),
            Reservation::Reserved
        );
        assert_eq!(
            store.reserve_event("evt-1", "hash-a", at(2), at(1)).expect("replays"),
            Reservation::AlreadyProcessed
        );
        match store.reserve_event("evt-1", "hash-b", at(2), at(1)) {
            Err(RepositoryError::Conflict) => {}
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(
            store.reserve_event("evt-1", "hash-b", at(5), at(3)).expect("expired"),
            Reservation::Reserved
        );
    }

    fn envelope(event_id: &str, partition: &str, hour: u32) -> EventEnvelope {
        EventEnvelope {
            event_id: event_id.to_string(),
            event_type: "submission.created".to_string(),
            occurred_at: at(hour),
            source_service: "submission-service".to_string(),
            trace_id: event_id.to_string(),
            schema_version: 1,
            partition_key_path: "submission_id".to_string(),
            partition_key: partition.to_string(),
            data: serde_json::json!({ "submission_id": partition }),
        }
    }

    #[test]
    fn pending_outbox_holds_rows_behind_a_row_awaiting_retry() {
        let store = InMemorySubmissionStore::new();
        store.append_outbox(&envelope("evt-1", "sub-1", 1)).expect("append");
        store.append_outbox(&envelope("evt-2", "sub-1", 2)).expect("append");
        store.append_outbox(&envelope("evt-3", "sub-2", 2)).expect("append");
        store
            .record_outbox_failure("evt-1", "broker down", at(6))
            .expect("failure recorded");

        let ids: Vec<String> = store
            .list_pending_outbox(10, at(3))
            .expect("lists")
            .into_iter()
            .map(|row| row.outbox_id)
            .collect();
        assert_eq!(ids, vec!["evt-3".to_string()]);

        let ids: Vec<String> = store
            .list_pending_outbox(10, at(6))
            .expect("lists")
            .into_iter()
            .map(|row| row.outbox_id)
            .collect();
        assert_eq!(ids, vec!["evt-1", "evt-2", "evt-3"]);

        store
            .mark_outbox_dead_lettered("evt-1", "gave up", at(6))
            .expect("dead lettered");
        store
            .record_outbox_failure("evt-3", "broker down", at(9))
            .expect("failure recorded");
        let ids: Vec<String> = store
            .list_pending_outbox(10, at(6))
            .expect("lists")
            .into_iter()
            .map(|row| row.outbox_id)
            .collect();
        assert_eq!(ids, vec!["evt-2".to_string()]);
    }

    #[test]
    fn outbox_failures_are_counted_per_row() {
        let store = InMemorySubmissionStore::new();
        match store.record_outbox_failure("missing", "boom", at(1)) {
            Err(RepositoryError::NotFound) => {}
            other => panic!("expected not found, got {other:?}"),
        }
    }
}
