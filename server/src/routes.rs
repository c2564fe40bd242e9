//! HTTP surface for the comparison pipeline.
//!
//! All routes except `/health` require an `X-User-Id` header set by the
//! upstream authenticating proxy; the handlers trust it as the verified
//! owner. Every JSON body, success and error alike, carries the legal
//! disclaimer.
//!
//! # Endpoints
//!
//! | Method   | Path                          | Description |
//! |----------|-------------------------------|-------------|
//! | `POST`   | `/v1/comparisons`             | Create a comparison job (202) |
//! | `GET`    | `/v1/comparisons`             | List the caller's jobs |
//! | `GET`    | `/v1/comparisons/{id}/status` | Poll job state and progress |
//! | `GET`    | `/v1/comparisons/{id}/result` | Fetch the result of a terminal job |
//! | `DELETE` | `/v1/comparisons/{id}`        | Delete a terminal job |
//! | `GET`    | `/health`                     | Health check, unauthenticated |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "..." }, "disclaimer": "..." }
//! ```
//!
//! Error codes: `validation_error` (400), `unauthorized` (401),
//! `not_found` (404), `result_not_ready` (409), `job_in_flight` (409),
//! `internal_error` (500).

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use coverdiff::legal::LEGAL_DISCLAIMER;
use coverdiff::{
    ComparisonResult, CoverdiffError, DeleteOutcome, Job, JobState, NewJob, StoredResult,
};

use crate::state::AppState;

const DEFAULT_LIST_LIMIT: u64 = 20;
const MAX_LIST_LIMIT: u64 = 100;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/comparisons",
            get(handle_list).post(handle_create),
        )
        .route("/v1/comparisons/{id}", axum::routing::delete(handle_delete))
        .route("/v1/comparisons/{id}/status", get(handle_status))
        .route("/v1/comparisons/{id}/result", get(handle_result))
        .route("/health", get(handle_health))
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
    disclaimer: &'static str,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
            disclaimer: LEGAL_DISCLAIMER,
        };
        (self.status, Json(body)).into_response()
    }
}

fn validation_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "validation_error",
        message: message.into(),
    }
}

fn unauthorized() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: "X-User-Id header is required".to_string(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn result_not_ready() -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "result_not_ready",
        message: "The comparison has not finished yet".to_string(),
    }
}

fn job_in_flight() -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "job_in_flight",
        message: "The job is still being processed and cannot be deleted".to_string(),
    }
}

fn internal_error(err: &CoverdiffError) -> AppError {
    error!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal_error",
        message: "An internal error occurred".to_string(),
    }
}

/// Maps core errors onto the HTTP contract. Validation failures carry
/// their message through; everything else collapses to a generic 500.
fn map_error(err: CoverdiffError) -> AppError {
    match err {
        CoverdiffError::Validation(message) => validation_error(message),
        other => internal_error(&other),
    }
}

/// Extracts the verified owner from `X-User-Id`.
fn require_owner(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(unauthorized)
}

// ============ Payloads ============

/// A job as presented to callers. Storage keys stay internal.
#[derive(Serialize)]
struct JobPayload {
    id: String,
    state: &'static str,
    progress: u8,
    status_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    baseline_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    renewal_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    policy_type: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    estimated_seconds_remaining: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JobErrorPayload>,
}

#[derive(Serialize)]
struct JobErrorPayload {
    kind: &'static str,
    message: String,
}

impl JobPayload {
    fn from_job(job: Job, model_timeout_seconds: u64) -> Self {
        let estimated_seconds_remaining = match job.state {
            JobState::Processing => Some(estimate_seconds_remaining(
                job.progress,
                model_timeout_seconds,
            )),
            _ => None,
        };
        let error = match (job.error_kind, job.error_message) {
            (Some(kind), message) => Some(JobErrorPayload {
                kind: kind.surface(),
                message: message.unwrap_or_else(|| kind.user_message().to_string()),
            }),
            (None, _) => None,
        };

        Self {
            id: job.id,
            state: job.state.as_str(),
            progress: job.progress,
            status_message: job.status_message,
            baseline_filename: job.baseline_filename,
            renewal_filename: job.renewal_filename,
            company_name: job.company_name,
            policy_type: job.policy_type,
            created_at: job.created_at,
            updated_at: job.updated_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            estimated_seconds_remaining,
            error,
        }
    }
}

/// Extrapolates remaining time from progress against the model budget.
/// Informational only; never written back into job state.
fn estimate_seconds_remaining(progress: u8, model_timeout_seconds: u64) -> u64 {
    let remaining = u64::from(100 - progress.min(100));
    model_timeout_seconds * remaining / 100
}

// ============ POST /v1/comparisons ============

#[derive(Deserialize)]
struct CreateRequest {
    baseline_key: String,
    renewal_key: String,
    #[serde(default)]
    baseline_filename: Option<String>,
    #[serde(default)]
    renewal_filename: Option<String>,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    policy_type: Option<String>,
}

#[derive(Serialize)]
struct CreateResponse {
    job: JobPayload,
    disclaimer: &'static str,
}

async fn handle_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateRequest>,
) -> Result<Response, AppError> {
    let owner_id = require_owner(&headers)?;

    let job = state
        .store
        .create(NewJob {
            owner_id,
            baseline_key: request.baseline_key,
            renewal_key: request.renewal_key,
            baseline_filename: request.baseline_filename,
            renewal_filename: request.renewal_filename,
            company_name: request.company_name,
            policy_type: request.policy_type,
        })
        .map_err(map_error)?;

    state
        .pool
        .submit(job.id.clone())
        .await
        .map_err(|e| internal_error(&e.into()))?;

    let body = CreateResponse {
        job: JobPayload::from_job(job, state.model_timeout_seconds),
        disclaimer: LEGAL_DISCLAIMER,
    };
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

// ============ GET /v1/comparisons ============

#[derive(Deserialize)]
struct ListParams {
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    offset: Option<u64>,
}

#[derive(Serialize)]
struct Pagination {
    total: u64,
    limit: u64,
    offset: u64,
}

#[derive(Serialize)]
struct ListResponse {
    jobs: Vec<JobPayload>,
    pagination: Pagination,
    disclaimer: &'static str,
}

async fn handle_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, AppError> {
    let owner_id = require_owner(&headers)?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let (jobs, total) = state
        .store
        .list_for_owner(&owner_id, limit, offset)
        .map_err(map_error)?;

    Ok(Json(ListResponse {
        jobs: jobs
            .into_iter()
            .map(|job| JobPayload::from_job(job, state.model_timeout_seconds))
            .collect(),
        pagination: Pagination {
            total,
            limit,
            offset,
        },
        disclaimer: LEGAL_DISCLAIMER,
    }))
}

// ============ GET /v1/comparisons/{id}/status ============

#[derive(Serialize)]
struct StatusResponse {
    job: JobPayload,
    disclaimer: &'static str,
}

async fn handle_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let owner_id = require_owner(&headers)?;

    let job = state
        .store
        .get_for_owner(&id, &owner_id)
        .map_err(map_error)?
        .ok_or_else(|| not_found(format!("no comparison job with id: {}", id)))?;

    Ok(Json(StatusResponse {
        job: JobPayload::from_job(job, state.model_timeout_seconds),
        disclaimer: LEGAL_DISCLAIMER,
    }))
}

// ============ GET /v1/comparisons/{id}/result ============

#[derive(Serialize)]
struct ResultResponse {
    job_id: String,
    status: &'static str,
    result: ComparisonResult,
    analysis_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    processing_time_seconds: Option<i64>,
    created_at: DateTime<Utc>,
    disclaimer: &'static str,
}

impl ResultResponse {
    fn from_stored(stored: StoredResult) -> Self {
        Self {
            job_id: stored.job_id,
            status: "completed",
            result: stored.result,
            analysis_version: stored.analysis_version,
            model_version: stored.model_version,
            processing_time_seconds: stored.processing_time_seconds,
            created_at: stored.created_at,
            disclaimer: LEGAL_DISCLAIMER,
        }
    }
}

#[derive(Serialize)]
struct FailedResultResponse {
    job_id: String,
    status: &'static str,
    error: JobErrorPayload,
    disclaimer: &'static str,
}

async fn handle_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let owner_id = require_owner(&headers)?;

    let job = state
        .store
        .get_for_owner(&id, &owner_id)
        .map_err(map_error)?
        .ok_or_else(|| not_found(format!("no comparison job with id: {}", id)))?;

    match job.state {
        JobState::Completed => {
            let stored = state
                .store
                .result(&job.id)
                .map_err(map_error)?
                .ok_or_else(|| {
                    // Completion and result insert are one transaction, so
                    // this indicates a corrupted database.
                    internal_error(&CoverdiffError::Validation(format!(
                        "completed job {} has no stored result",
                        job.id
                    )))
                })?;
            Ok(Json(ResultResponse::from_stored(stored)).into_response())
        }
        JobState::Failed => {
            let kind = job
                .error_kind
                .map(|k| k.surface())
                .unwrap_or("analysis_error");
            let message = job
                .error_message
                .unwrap_or_else(|| "The comparison failed".to_string());
            Ok(Json(FailedResultResponse {
                job_id: job.id,
                status: "failed",
                error: JobErrorPayload { kind, message },
                disclaimer: LEGAL_DISCLAIMER,
            })
            .into_response())
        }
        JobState::Pending | JobState::Processing => Err(result_not_ready()),
    }
}

// ============ DELETE /v1/comparisons/{id} ============

async fn handle_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let owner_id = require_owner(&headers)?;

    match state
        .store
        .delete_for_owner(&id, &owner_id)
        .map_err(map_error)?
    {
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT),
        DeleteOutcome::InFlight => Err(job_in_flight()),
        DeleteOutcome::NotFound => Err(not_found(format!("no comparison job with id: {}", id))),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
