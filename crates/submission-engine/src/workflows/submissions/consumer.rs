//! Inbound event handling built on reserve-then-process dedup.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use super::clock::Clock;
use super::events::{EventEnvelope, EventHandler, EventSubscriber, PublishError};
use super::metrics;
use super::repository::RepositoryError;

pub const CAMPAIGN_LAUNCHED_TOPIC: &str = "campaign.launched";
pub const DEFAULT_CAMPAIGN_LAUNCHED_GROUP: &str = "submission-service-campaign-launched-cg";
pub const DEFAULT_DEDUP_TTL_HOURS: i64 = 7 * 24;

/// Answer from [`EventDedupStore::reserve_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// First delivery (or the previous reservation expired); the caller must process it.
    Reserved,
    /// Same event id and payload hash seen before; the caller skips it.
    AlreadyProcessed,
}

pub trait EventDedupStore: Send + Sync {
    /// Reserve `event_id`. A live reservation with a different hash yields `Conflict`;
    /// reservations expired at `now` are replaced.
    fn reserve_event(
        &self,
        event_id: &str,
        payload_hash: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Reservation, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ConsumeError {
    #[error("event {event_id} redelivered with a different payload")]
    PayloadConflict { event_id: String },
    #[error("decode {topic} payload: {source}")]
    Decode {
        topic: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{topic} payload missing {field}")]
    MissingField {
        topic: &'static str,
        field: &'static str,
    },
    #[error(transparent)]
    Repository(RepositoryError),
}

/// Hex SHA-256 of the event data as serialized JSON.
pub fn payload_hash(envelope: &EventEnvelope) -> String {
    let bytes = serde_json::to_vec(&envelope.data).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}

/// Reserve-then-process gate shared by consumers.
#[derive(Clone)]
pub struct DedupGate {
    store: Arc<dyn EventDedupStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl DedupGate {
    pub fn new(store: Arc<dyn EventDedupStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        let ttl = if ttl <= Duration::zero() {
            Duration::hours(DEFAULT_DEDUP_TTL_HOURS)
        } else {
            ttl
        };
        Self { store, clock, ttl }
    }

    /// Returns `true` when the event must be processed.
    pub fn admit(&self, envelope: &EventEnvelope) -> Result<bool, ConsumeError> {
        let now = self.clock.now();
        let hash = payload_hash(envelope);
        match self
            .store
            .reserve_event(&envelope.event_id, &hash, now + self.ttl, now)
        {
            Ok(Reservation::Reserved) => Ok(true),
            Ok(Reservation::AlreadyProcessed) => Ok(false),
            Err(RepositoryError::Conflict) => {
                error!(
                    event = "submission_inbound_dedup_conflict",
                    event_id = %envelope.event_id,
                    event_type = %envelope.event_type,
                    "event id redelivered with a different payload"
                );
                Err(ConsumeError::PayloadConflict {
                    event_id: envelope.event_id.clone(),
                })
            }
            Err(other) => Err(ConsumeError::Repository(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Processed { campaign_id: String },
    Duplicate,
}

#[derive(Debug, Deserialize)]
struct CampaignLaunchedData {
    #[serde(default)]
    campaign_id: String,
}

/// Consumer for `campaign.launched`.
pub struct CampaignLaunchedConsumer {
    gate: DedupGate,
    group: String,
}

impl CampaignLaunchedConsumer {
    pub fn new(gate: DedupGate) -> Self {
        Self {
            gate,
            group: DEFAULT_CAMPAIGN_LAUNCHED_GROUP.to_string(),
        }
    }

    pub fn with_group(mut self, group: &str) -> Self {
        if !group.trim().is_empty() {
            self.group = group.trim().to_string();
        }
        self
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Register with the subscriber under the configured consumer group.
    pub fn start(self: Arc<Self>, subscriber: &dyn EventSubscriber) -> Result<(), PublishError> {
        let group = self.group.clone();
        let consumer = Arc::clone(&self);
        let handler: EventHandler =
            Arc::new(move |envelope: &EventEnvelope| consumer.handle(envelope).map(|_| ()));
        subscriber.subscribe(CAMPAIGN_LAUNCHED_TOPIC, &group, handler)
    }

    pub fn handle(&self, envelope: &EventEnvelope) -> Result<ConsumeOutcome, ConsumeError> {
        let admitted = self.gate.admit(envelope).map_err(|err| {
            metrics::record_inbound(CAMPAIGN_LAUNCHED_TOPIC, "dedup_error");
            err
        })?;
        if !admitted {
            debug!(
                event = "submission_campaign_launched_replayed",
                event_id = %envelope.event_id,
                "campaign.launched already processed"
            );
            metrics::record_inbound(CAMPAIGN_LAUNCHED_TOPIC, "duplicate");
            return Ok(ConsumeOutcome::Duplicate);
        }

        let data: CampaignLaunchedData =
            serde_json::from_value(envelope.data.clone()).map_err(|source| ConsumeError::Decode {
                topic: CAMPAIGN_LAUNCHED_TOPIC,
                source,
            })?;
        let campaign_id = data.campaign_id.trim();
        if campaign_id.is_empty() {
            metrics::record_inbound(CAMPAIGN_LAUNCHED_TOPIC, "invalid");
            return Err(ConsumeError::MissingField {
                topic: CAMPAIGN_LAUNCHED_TOPIC,
                field: "campaign_id",
            });
        }

        info!(
            event = "submission_campaign_launched_consumed",
            event_id = %envelope.event_id,
            campaign_id,
            group = %self.group,
            "campaign launch event consumed"
        );
        metrics::record_inbound(CAMPAIGN_LAUNCHED_TOPIC, "processed");
        Ok(ConsumeOutcome::Processed {
            campaign_id: campaign_id.to_string(),
        })
    }
}
