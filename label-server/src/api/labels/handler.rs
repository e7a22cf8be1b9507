//! Label API Handlers

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use shared::error::{ApiResponse, AppResult};
use shared::models::{BatchSubmission, JobFilter, JobSnapshot, LabelFilter, LabelPayload, LabelRecord};

use crate::api::extract::IdPath;
use crate::auth::CurrentUser;
use crate::core::ServerState;

/// Batch intake body
#[derive(Debug, Deserialize)]
pub struct LabelBatchRequest {
    #[serde(default)]
    pub labels: Vec<LabelPayload>,
}

/// A label with its print jobs
#[derive(Debug, Serialize)]
pub struct LabelDetail {
    #[serde(flatten)]
    pub label: LabelRecord,
    pub jobs: Vec<JobSnapshot>,
}

/// POST /api/labels/batch - classify, persist and print a batch
pub async fn submit_batch(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(request): Json<LabelBatchRequest>,
) -> AppResult<ApiResponse<BatchSubmission>> {
    let submission = state
        .pipeline()
        .submit_batch(user.user_id, &request.labels)
        .await?;

    tracing::info!(
        user_id = %user.user_id,
        new_count = submission.result.new_count,
        duplicate_count = submission.result.duplicate_count,
        error_count = submission.result.error_count,
        "Label batch processed"
    );
    Ok(ApiResponse::success(submission))
}

/// GET /api/labels - list labels, newest first
pub async fn list(
    State(state): State<ServerState>,
    _user: CurrentUser,
    Query(filter): Query<LabelFilter>,
) -> AppResult<ApiResponse<Vec<LabelRecord>>> {
    let labels = state.pipeline().list_labels(&filter)?;
    Ok(ApiResponse::success(labels))
}

/// GET /api/labels/{id} - one label and its print jobs
pub async fn get_by_id(
    State(state): State<ServerState>,
    _user: CurrentUser,
    IdPath(id): IdPath,
) -> AppResult<ApiResponse<LabelDetail>> {
    let pipeline = state.pipeline();
    let label = pipeline.get_label(id)?;
    let jobs = pipeline
        .list_jobs(&JobFilter {
            label_ref: Some(id),
            ..Default::default()
        })?
        .iter()
        .map(JobSnapshot::from)
        .collect();
    Ok(ApiResponse::success(LabelDetail { label, jobs }))
}

/// POST /api/labels/{id}/print - render a stored label again and queue a job
pub async fn print(
    State(state): State<ServerState>,
    user: CurrentUser,
    IdPath(id): IdPath,
) -> AppResult<ApiResponse<JobSnapshot>> {
    let job = state.pipeline().print_label(user.user_id, id)?;
    Ok(ApiResponse::success(JobSnapshot::from(&job)))
}
