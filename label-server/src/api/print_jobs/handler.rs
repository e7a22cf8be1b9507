//! Print Job API Handlers

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use shared::error::{ApiResponse, AppResult};
use shared::models::{DispatchReport, JobFilter, JobSnapshot};

use crate::api::extract::IdPath;
use crate::auth::CurrentUser;
use crate::core::ServerState;

/// Manual dispatch body; an absent body dispatches every pending job
#[derive(Debug, Default, Deserialize)]
pub struct DispatchRequest {
    pub limit: Option<usize>,
}

/// GET /api/print-jobs - list jobs, newest first
pub async fn list(
    State(state): State<ServerState>,
    _user: CurrentUser,
    Query(filter): Query<JobFilter>,
) -> AppResult<ApiResponse<Vec<JobSnapshot>>> {
    let jobs = state.pipeline().list_jobs(&filter)?;
    Ok(ApiResponse::success(jobs.iter().map(JobSnapshot::from).collect()))
}

/// GET /api/print-jobs/{id}
pub async fn get_by_id(
    State(state): State<ServerState>,
    _user: CurrentUser,
    IdPath(id): IdPath,
) -> AppResult<ApiResponse<JobSnapshot>> {
    let job = state.pipeline().get_job(id)?;
    Ok(ApiResponse::success(JobSnapshot::from(&job)))
}

/// POST /api/print-jobs/{id}/retry - move a failed job back to pending
pub async fn retry(
    State(state): State<ServerState>,
    user: CurrentUser,
    IdPath(id): IdPath,
) -> AppResult<ApiResponse<JobSnapshot>> {
    let job = state.pipeline().retry_job(user.user_id, id)?;
    Ok(ApiResponse::success(JobSnapshot::from(&job)))
}

/// POST /api/print-jobs/dispatch - send pending jobs to the printer now
pub async fn dispatch_pending(
    State(state): State<ServerState>,
    user: CurrentUser,
    request: Option<Json<DispatchRequest>>,
) -> AppResult<ApiResponse<DispatchReport>> {
    let Json(request) = request.unwrap_or_default();
    let report = state.pipeline().dispatch_pending(request.limit).await?;

    tracing::info!(
        user_id = %user.user_id,
        attempted = report.attempted,
        completed = report.completed.len(),
        failed = report.failed.len(),
        "Manual dispatch finished"
    );
    Ok(ApiResponse::success(report))
}
