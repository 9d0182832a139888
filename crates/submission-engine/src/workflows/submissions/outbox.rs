//! Transactional outbox and the relay that drains it.
//!
//! Commands append envelopes next to their state change; the relay publishes them later on its
//! own cadence. A failed publish reschedules that row with exponential backoff and holds back
//! the later rows of its partition until it is delivered or dead-lettered; other partitions keep
//! flowing. Rows that exhaust their attempts, or whose stored payload no longer decodes, are
//! dead-lettered and never listed again.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::clock::Clock;
use super::error::SubmissionError;
use super::events::{EventEnvelope, EventPublisher};
use super::metrics;
use super::repository::RepositoryError;

pub const DEFAULT_RELAY_BATCH_SIZE: usize = 100;

/// Stored outbox row plus its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub outbox_id: String,
    pub event_type: String,
    pub partition_key: String,
    /// Serialized [`EventEnvelope`].
    pub payload: String,
    pub created_at: DateTime<Utc>,
    pub attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub dead_lettered_at: Option<DateTime<Utc>>,
}

impl OutboxMessage {
    /// New undelivered row keyed by the envelope's event id.
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Self, serde_json::Error> {
        Ok(Self {
            outbox_id: envelope.event_id.trim().to_string(),
            event_type: envelope.event_type.trim().to_string(),
            partition_key: envelope.partition_key.trim().to_string(),
            payload: serde_json::to_string(envelope)?,
            created_at: envelope.occurred_at,
            attempts: 0,
            next_attempt_at: envelope.occurred_at,
            last_error: None,
            published_at: None,
            dead_lettered_at: None,
        })
    }

    pub fn is_deliverable(&self, now: DateTime<Utc>) -> bool {
        self.published_at.is_none() && self.dead_lettered_at.is_none() && self.next_attempt_at <= now
    }
}

/// Append side used by commands and workers.
pub trait OutboxWriter: Send + Sync {
    /// Idempotent on event id: the same payload again is a no-op, a different one a `Conflict`.
    fn append_outbox(&self, envelope: &EventEnvelope) -> Result<(), RepositoryError>;
}

/// Drain side used by the relay.
pub trait OutboxRepository: Send + Sync {
    /// Deliverable rows (not published, not dead-lettered, due by `now`), oldest first.
    /// A row queued behind an undelivered row of the same partition that is not yet due is
    /// held back.
    fn list_pending_outbox(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboxMessage>, RepositoryError>;
    fn mark_outbox_published(&self, outbox_id: &str, at: DateTime<Utc>)
        -> Result<(), RepositoryError>;
    /// Increment attempts, store the error, and push the row to `next_attempt_at`.
    fn record_outbox_failure(
        &self,
        outbox_id: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    fn mark_outbox_dead_lettered(
        &self,
        outbox_id: &str,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

/// Backoff schedule for failed publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::seconds(5),
            max_delay: Duration::minutes(5),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay before the next try after `failures` failed attempts (1-based).
    pub fn delay_after(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        let delay = self.base_delay * 2_i32.pow(exponent);
        delay.min(self.max_delay)
    }

    pub fn exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }
}

/// Per-run counts returned by [`OutboxRelay::run_once`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayReport {
    pub published: usize,
    pub retried: usize,
    pub dead_lettered: usize,
}

impl RelayReport {
    pub fn is_empty(&self) -> bool {
        self.published == 0 && self.retried == 0 && self.dead_lettered == 0
    }
}

pub struct OutboxRelay {
    outbox: Arc<dyn OutboxRepository>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    batch_size: usize,
    retry: RetryPolicy,
}

impl OutboxRelay {
    pub fn new(
        outbox: Arc<dyn OutboxRepository>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            outbox,
            publisher,
            clock,
            batch_size: DEFAULT_RELAY_BATCH_SIZE,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = if batch_size == 0 {
            DEFAULT_RELAY_BATCH_SIZE
        } else {
            batch_size
        };
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Publish one batch of due rows. Only bookkeeping failures abort the run.
    pub fn run_once(&self) -> Result<RelayReport, SubmissionError> {
        let now = self.clock.now();
        let pending = self
            .outbox
            .list_pending_outbox(self.batch_size, now)
            .map_err(|err| {
                error!(event = "submission_outbox_list_failed", error = %err, "outbox list failed");
                err
            })?;

        let mut report = RelayReport::default();
        let mut held: HashSet<String> = HashSet::new();
        for row in pending {
            if held.contains(&row.partition_key) {
                continue;
            }
            let envelope: EventEnvelope = match serde_json::from_str(&row.payload) {
                Ok(envelope) => envelope,
                Err(err) => {
                    error!(
                        event = "submission_outbox_decode_failed",
                        outbox_id = %row.outbox_id,
                        error = %err,
                        "outbox payload does not decode; dead-lettering"
                    );
                    self.outbox
                        .mark_outbox_dead_lettered(&row.outbox_id, &err.to_string(), now)?;
                    report.dead_lettered += 1;
                    continue;
                }
            };

            let topic = if envelope.event_type.trim().is_empty() {
                row.event_type.as_str()
            } else {
                envelope.event_type.as_str()
            };

            match self.publisher.publish(topic, &envelope) {
                Ok(()) => {
                    self.outbox.mark_outbox_published(&row.outbox_id, now)?;
                    report.published += 1;
                }
                Err(err) => {
                    let failures = row.attempts + 1;
                    let reason = err.to_string();
                    if self.retry.exhausted(failures) {
                        error!(
                            event = "submission_outbox_dead_lettered",
                            outbox_id = %row.outbox_id,
                            event_id = %envelope.event_id,
                            topic,
                            attempts = failures,
                            error = %reason,
                            "outbox row exhausted its attempts"
                        );
                        self.outbox
                            .mark_outbox_dead_lettered(&row.outbox_id, &reason, now)?;
                        report.dead_lettered += 1;
                    } else {
                        let next_attempt_at = now + self.retry.delay_after(failures);
                        warn!(
                            event = "submission_outbox_publish_failed",
                            outbox_id = %row.outbox_id,
                            event_id = %envelope.event_id,
                            topic,
                            attempts = failures,
                            %next_attempt_at,
                            error = %reason,
                            "outbox publish failed; rescheduled"
                        );
                        self.outbox
                            .record_outbox_failure(&row.outbox_id, &reason, next_attempt_at)?;
                        held.insert(row.partition_key.clone());
                        report.retried += 1;
                    }
                }
            }
        }

        metrics::record_relay("published", report.published);
        metrics::record_relay("retried", report.retried);
        metrics::record_relay("dead_lettered", report.dead_lettered);
        if !report.is_empty() {
            info!(
                event = "submission_outbox_relay_completed",
                published = report.published,
                retried = report.retried,
                dead_lettered = report.dead_lettered,
                "outbox relay cycle completed"
            );
        }
        Ok(report)
    }
}
