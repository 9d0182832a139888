use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::consumer::ConsumeError;
use super::domain::Submission;

pub const SOURCE_SERVICE: &str = "submission-service";
pub const SCHEMA_VERSION: u32 = 1;
pub const PARTITION_KEY_PATH: &str = "submission_id";

/// Canonical event types emitted through the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionEventType {
    Created,
    Approved,
    Rejected,
    Flagged,
    AutoApproved,
    Verified,
    ViewLocked,
    Cancelled,
}

impl SubmissionEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionEventType::Created => "submission.created",
            SubmissionEventType::Approved => "submission.approved",
            SubmissionEventType::Rejected => "submission.rejected",
            SubmissionEventType::Flagged => "submission.flagged",
            SubmissionEventType::AutoApproved => "submission.auto_approved",
            SubmissionEventType::Verified => "submission.verified",
            SubmissionEventType::ViewLocked => "submission.view_locked",
            SubmissionEventType::Cancelled => "submission.cancelled",
        }
    }
}

impl fmt::Display for SubmissionEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire envelope shared by every published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: String,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub source_service: String,
    pub trace_id: String,
    pub schema_version: u32,
    pub partition_key_path: String,
    pub partition_key: String,
    pub data: Value,
}

impl EventEnvelope {
    /// Build a submission event. `data` always carries the submission, creator, user, and
    /// campaign ids; `extra` adds event specific fields.
    pub fn for_submission(
        event_id: String,
        event_type: SubmissionEventType,
        submission: &Submission,
        occurred_at: DateTime<Utc>,
        extra: Vec<(&'static str, Value)>,
    ) -> Self {
        let mut data = Map::new();
        data.insert(
            "submission_id".to_string(),
            Value::from(submission.submission_id.as_str()),
        );
        data.insert(
            "creator_id".to_string(),
            Value::from(submission.creator_id.as_str()),
        );
        data.insert(
            "user_id".to_string(),
            Value::from(submission.creator_id.as_str()),
        );
        data.insert(
            "campaign_id".to_string(),
            Value::from(submission.campaign_id.as_str()),
        );
        for (field, value) in extra {
            data.insert(field.to_string(), value);
        }

        Self {
            trace_id: event_id.clone(),
            event_id,
            event_type: event_type.as_str().to_string(),
            occurred_at,
            source_service: SOURCE_SERVICE.to_string(),
            schema_version: SCHEMA_VERSION,
            partition_key_path: PARTITION_KEY_PATH.to_string(),
            partition_key: submission.submission_id.as_str().to_string(),
            data: Value::Object(data),
        }
    }
}

pub(crate) fn timestamp(at: DateTime<Utc>) -> Value {
    Value::from(at.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Callback invoked for each delivered event.
pub type EventHandler = Arc<dyn Fn(&EventEnvelope) -> Result<(), ConsumeError> + Send + Sync>;

/// Outbound bus port used by the outbox relay.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &str, envelope: &EventEnvelope) -> Result<(), PublishError>;
}

/// Inbound bus port used by consumers.
pub trait EventSubscriber: Send + Sync {
    fn subscribe(&self, topic: &str, group: &str, handler: EventHandler) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("event transport unavailable: {0}")]
    Transport(String),
    #[error("topic {topic} rejected event {event_id}: {reason}")]
    Rejected {
        topic: String,
        event_id: String,
        reason: String,
    },
}
