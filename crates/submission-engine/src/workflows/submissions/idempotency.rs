//! Request-hash keyed replay cache used by every mutating command.
//!
//! A key seen with the same request hash replays the stored outcome; the same key with a
//! different hash is a conflict. Records are written only after the mutation, its audit row,
//! and its outbox event are persisted, so a crash in between leaves the command retryable.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::commands::BulkOperationResult;
use super::domain::{SubmissionId, SubmissionStatus};
use super::error::SubmissionError;
use super::repository::RepositoryError;

pub const DEFAULT_IDEMPOTENCY_TTL_HOURS: i64 = 7 * 24;

/// Client supplied idempotency key. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn parse(raw: &str) -> Result<Self, SubmissionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SubmissionError::IdempotencyKeyRequired);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Derived key for one item of a bulk request: `outer:item:action`.
    pub fn scoped(&self, item: &str, action: &str) -> Self {
        Self(format!("{}:{}:{}", self.0, item, action))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex-encoded SHA-256 of the canonical JSON form of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestHash(pub String);

impl RequestHash {
    pub fn of<T: Serialize>(request: &T) -> Result<Self, SubmissionError> {
        let canonical = serde_json::to_vec(request)?;
        Ok(Self(hex::encode(Sha256::digest(&canonical))))
    }
}

/// Outcome cached for replay, one variant per command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayPayload {
    Created {
        submission_id: SubmissionId,
    },
    Reviewed {
        submission_id: SubmissionId,
        status: SubmissionStatus,
    },
    Reported {
        submission_id: SubmissionId,
        status: SubmissionStatus,
    },
    Bulk(BulkOperationResult),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub request_hash: RequestHash,
    pub payload: ReplayPayload,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

pub trait IdempotencyStore: Send + Sync {
    /// Live record for `key`; expired records are treated as absent.
    fn get_record(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, RepositoryError>;

    /// Store a record. A live record under the same key with a different hash is a `Conflict`.
    fn put_record(&self, record: IdempotencyRecord) -> Result<(), RepositoryError>;
}

/// Result of checking a key before running a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Fresh,
    Replay(ReplayPayload),
}

/// Wraps an [`IdempotencyStore`] with the hash comparison and TTL rules.
#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn IdempotencyStore>,
    ttl: Duration,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn IdempotencyStore>, ttl: Duration) -> Self {
        let ttl = if ttl <= Duration::zero() {
            Duration::hours(DEFAULT_IDEMPOTENCY_TTL_HOURS)
        } else {
            ttl
        };
        Self { store, ttl }
    }

    pub fn check(
        &self,
        key: &IdempotencyKey,
        hash: &RequestHash,
        now: DateTime<Utc>,
    ) -> Result<Admission, SubmissionError> {
        match self.store.get_record(key.as_str(), now)? {
            None => Ok(Admission::Fresh),
            Some(record) if &record.request_hash == hash => Ok(Admission::Replay(record.payload)),
            Some(_) => {
                tracing::error!(
                    event = "submission_idempotency_conflict",
                    idempotency_key = %key,
                    "idempotency key reused with a different request"
                );
                Err(SubmissionError::IdempotencyKeyConflict)
            }
        }
    }

    pub fn commit(
        &self,
        key: &IdempotencyKey,
        hash: RequestHash,
        payload: ReplayPayload,
        now: DateTime<Utc>,
    ) -> Result<(), SubmissionError> {
        self.store.put_record(IdempotencyRecord {
            key: key.as_str().to_string(),
            request_hash: hash,
            payload,
            expires_at: now + self.ttl,
        })?;
        Ok(())
    }
}
