use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::commands::{
    ApproveSubmission, BulkOperation, CreateSubmission, RejectSubmission, ReportSubmission,
};
use super::domain::{SubmissionId, SubmissionStatus};
use super::error::SubmissionError;
use super::repository::SubmissionFilter;
use super::service::SubmissionService;
use crate::error::AppError;

pub const ACTOR_HEADER: &str = "x-user-id";
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

type ApiResult = Result<Response, AppError>;

/// Router exposing submission commands, queries, and dashboards.
pub fn submission_router(service: Arc<SubmissionService>) -> Router {
    Router::new()
        .route(
            "/api/v1/submissions",
            post(create_handler).get(list_handler),
        )
        .route("/api/v1/submissions/bulk", post(bulk_handler))
        .route("/api/v1/submissions/{submission_id}", get(get_handler))
        .route(
            "/api/v1/submissions/{submission_id}/analytics",
            get(analytics_handler),
        )
        .route(
            "/api/v1/submissions/{submission_id}/approve",
            post(approve_handler),
        )
        .route(
            "/api/v1/submissions/{submission_id}/reject",
            post(reject_handler),
        )
        .route(
            "/api/v1/submissions/{submission_id}/report",
            post(report_handler),
        )
        .route(
            "/api/v1/dashboards/creators/{creator_id}",
            get(creator_dashboard_handler),
        )
        .route(
            "/api/v1/dashboards/campaigns/{campaign_id}",
            get(brand_dashboard_handler),
        )
        .with_state(service)
}

fn header(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

fn optional_header(headers: &HeaderMap, name: &str) -> Option<String> {
    Some(header(headers, name)).filter(|value| !value.is_empty())
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateBody {
    #[serde(default)]
    campaign_id: String,
    #[serde(default)]
    platform: String,
    #[serde(default)]
    post_url: String,
    #[serde(default)]
    cpv_rate: f64,
}

pub(crate) async fn create_handler(
    State(service): State<Arc<SubmissionService>>,
    headers: HeaderMap,
    Json(body): Json<CreateBody>,
) -> ApiResult {
    let result = service.create_submission(CreateSubmission {
        idempotency_key: header(&headers, IDEMPOTENCY_HEADER),
        creator_id: header(&headers, ACTOR_HEADER),
        campaign_id: body.campaign_id,
        platform: body.platform,
        post_url: body.post_url,
        cpv_rate: body.cpv_rate,
    })?;
    let status = if result.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(result)).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    creator_id: Option<String>,
    campaign_id: Option<String>,
    status: Option<String>,
}

pub(crate) async fn list_handler(
    State(service): State<Arc<SubmissionService>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult {
    let status = match query.status.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(
            SubmissionStatus::parse(raw)
                .ok_or(SubmissionError::InvalidInput("unknown status filter"))?,
        ),
        _ => None,
    };
    let filter = SubmissionFilter {
        creator_id: optional_header(&headers, ACTOR_HEADER).or(query.creator_id),
        campaign_id: query.campaign_id,
        status,
    };
    let items = service.list_submissions(&filter)?;
    Ok((StatusCode::OK, Json(json!({ "items": items }))).into_response())
}

pub(crate) async fn get_handler(
    State(service): State<Arc<SubmissionService>>,
    headers: HeaderMap,
    Path(submission_id): Path<String>,
) -> ApiResult {
    let actor = optional_header(&headers, ACTOR_HEADER);
    let submission =
        service.get_submission(&SubmissionId::from(submission_id.as_str()), actor.as_deref())?;
    Ok((StatusCode::OK, Json(json!({ "submission": submission }))).into_response())
}

pub(crate) async fn analytics_handler(
    State(service): State<Arc<SubmissionService>>,
    headers: HeaderMap,
    Path(submission_id): Path<String>,
) -> ApiResult {
    let actor = optional_header(&headers, ACTOR_HEADER);
    let analytics =
        service.analytics(&SubmissionId::from(submission_id.as_str()), actor.as_deref())?;
    Ok((StatusCode::OK, Json(analytics)).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReviewBody {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    notes: String,
}

pub(crate) async fn approve_handler(
    State(service): State<Arc<SubmissionService>>,
    headers: HeaderMap,
    Path(submission_id): Path<String>,
    Json(body): Json<ReviewBody>,
) -> ApiResult {
    let outcome = service.approve(ApproveSubmission {
        idempotency_key: header(&headers, IDEMPOTENCY_HEADER),
        submission_id,
        actor_id: header(&headers, ACTOR_HEADER),
        reason: body.reason,
    })?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

pub(crate) async fn reject_handler(
    State(service): State<Arc<SubmissionService>>,
    headers: HeaderMap,
    Path(submission_id): Path<String>,
    Json(body): Json<ReviewBody>,
) -> ApiResult {
    let outcome = service.reject(RejectSubmission {
        idempotency_key: header(&headers, IDEMPOTENCY_HEADER),
        submission_id,
        actor_id: header(&headers, ACTOR_HEADER),
        reason: body.reason,
        notes: body.notes,
    })?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReportBody {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    description: String,
}

pub(crate) async fn report_handler(
    State(service): State<Arc<SubmissionService>>,
    headers: HeaderMap,
    Path(submission_id): Path<String>,
    Json(body): Json<ReportBody>,
) -> ApiResult {
    let outcome = service.report(ReportSubmission {
        idempotency_key: header(&headers, IDEMPOTENCY_HEADER),
        submission_id,
        reporter_id: header(&headers, ACTOR_HEADER),
        reason: body.reason,
        description: body.description,
    })?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkBody {
    #[serde(default)]
    operation_type: String,
    #[serde(default)]
    submission_ids: Vec<String>,
    #[serde(default)]
    reason_code: String,
    #[serde(default)]
    reason: String,
}

pub(crate) async fn bulk_handler(
    State(service): State<Arc<SubmissionService>>,
    headers: HeaderMap,
    Json(body): Json<BulkBody>,
) -> ApiResult {
    let outcome = service.bulk_operation(BulkOperation {
        idempotency_key: header(&headers, IDEMPOTENCY_HEADER),
        actor_id: header(&headers, ACTOR_HEADER),
        operation_type: body.operation_type,
        submission_ids: body.submission_ids,
        reason_code: body.reason_code,
        reason: body.reason,
    })?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

pub(crate) async fn creator_dashboard_handler(
    State(service): State<Arc<SubmissionService>>,
    Path(creator_id): Path<String>,
) -> ApiResult {
    let summary = service.creator_dashboard(&creator_id)?;
    Ok((StatusCode::OK, Json(summary)).into_response())
}

pub(crate) async fn brand_dashboard_handler(
    State(service): State<Arc<SubmissionService>>,
    Path(campaign_id): Path<String>,
) -> ApiResult {
    let summary = service.brand_dashboard(&campaign_id)?;
    Ok((StatusCode::OK, Json(summary)).into_response())
}
