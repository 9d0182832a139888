use axum::http::StatusCode;

use super::lifecycle::InvalidTransition;
use super::repository::RepositoryError;

/// Error raised by submission commands, queries, and workers.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("submission not found")]
    NotFound,
    #[error("invalid submission input: {0}")]
    InvalidInput(&'static str),
    #[error("invalid submission url")]
    InvalidSubmissionUrl,
    #[error("unsupported platform '{0}'")]
    UnsupportedPlatform(String),
    #[error("actor is not authorized")]
    UnauthorizedActor,
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("duplicate submission")]
    DuplicateSubmission,
    #[error("submission already reported by this user")]
    AlreadyReported,
    #[error("idempotency key is required")]
    IdempotencyKeyRequired,
    #[error("idempotency key conflict")]
    IdempotencyKeyConflict,
    #[error("campaign not found")]
    CampaignNotFound,
    #[error("campaign is not active (status '{status}')")]
    CampaignNotActive { status: String },
    #[error("platform {platform} not allowed for campaign")]
    PlatformNotAllowed { platform: String },
    #[error(transparent)]
    Repository(RepositoryError),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SubmissionError {
    /// Stable machine-readable code exposed to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            SubmissionError::NotFound => "submission_not_found",
            SubmissionError::InvalidInput(_) => "invalid_submission_input",
            SubmissionError::InvalidSubmissionUrl => "invalid_submission_url",
            SubmissionError::UnsupportedPlatform(_) => "unsupported_platform",
            SubmissionError::UnauthorizedActor => "unauthorized_actor",
            SubmissionError::InvalidTransition(_) => "invalid_status_transition",
            SubmissionError::DuplicateSubmission => "duplicate_submission",
            SubmissionError::AlreadyReported => "already_reported",
            SubmissionError::IdempotencyKeyRequired => "idempotency_key_required",
            SubmissionError::IdempotencyKeyConflict => "idempotency_key_conflict",
            SubmissionError::CampaignNotFound => "campaign_not_found",
            SubmissionError::CampaignNotActive { .. } => "campaign_not_active",
            SubmissionError::PlatformNotAllowed { .. } => "platform_not_allowed",
            SubmissionError::Repository(RepositoryError::Unavailable(_)) => {
                "dependency_unavailable"
            }
            SubmissionError::Repository(_) => "repository_error",
            SubmissionError::Serialization(_) => "serialization_error",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            SubmissionError::NotFound | SubmissionError::CampaignNotFound => StatusCode::NOT_FOUND,
            SubmissionError::InvalidInput(_)
            | SubmissionError::InvalidSubmissionUrl
            | SubmissionError::UnsupportedPlatform(_)
            | SubmissionError::IdempotencyKeyRequired => StatusCode::BAD_REQUEST,
            SubmissionError::UnauthorizedActor => StatusCode::FORBIDDEN,
            SubmissionError::InvalidTransition(_)
            | SubmissionError::DuplicateSubmission
            | SubmissionError::AlreadyReported
            | SubmissionError::IdempotencyKeyConflict => StatusCode::CONFLICT,
            SubmissionError::CampaignNotActive { .. }
            | SubmissionError::PlatformNotAllowed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            SubmissionError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            SubmissionError::Repository(_) | SubmissionError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether a caller may retry the same request unchanged.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            SubmissionError::Repository(RepositoryError::Unavailable(_))
        )
    }
}

impl From<RepositoryError> for SubmissionError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => SubmissionError::NotFound,
            RepositoryError::DuplicateSubmission => SubmissionError::DuplicateSubmission,
            RepositoryError::AlreadyReported => SubmissionError::AlreadyReported,
            RepositoryError::CampaignNotFound => SubmissionError::CampaignNotFound,
            RepositoryError::Conflict => SubmissionError::IdempotencyKeyConflict,
            other => SubmissionError::Repository(other),
        }
    }
}
