//! Jobs retry handler

use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
    http::StatusCode,
};
use http_common::{BoxRequestError, RequestError};
use job_store::{JobId, JobStatus};
use serde_json::{Value as JsonValue, json};

use crate::ctx::Ctx;

/// Handler for the `POST /jobs/{id}/retry` endpoint
///
/// Retries a failed job by creating a fresh queued job with the same type,
/// payload and attempt budget. The failed row is left untouched; terminal
/// states are never reopened.
#[tracing::instrument(skip_all, err)]
pub async fn handler(
    State(ctx): State<Ctx>,
    path: Result<Path<JobId>, PathRejection>,
) -> Result<Json<JsonValue>, BoxRequestError> {
    let Path(id) = path.map_err(|err| {
        tracing::debug!(error=?err, "invalid job ID in path");
        Error::InvalidId { err }
    })?;

    let job = ctx
        .store
        .get_job(id)
        .await
        .map_err(Error::Store)?
        .ok_or(Error::NotFound { id })?;

    if job.status != JobStatus::Failed {
        return Err(Error::Conflict {
            message: format!("can only retry failed jobs, current status is '{}'", job.status),
        }
        .into());
    }

    let new_id = ctx
        .store
        .retry_job(id)
        .await
        .map_err(Error::Store)?
        .ok_or_else(|| Error::Conflict {
            message: "job is no longer in the failed state".to_owned(),
        })?;

    Ok(Json(json!({
        "job_id": new_id,
        "original_job_id": id,
        "status": "queued",
    })))
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The job ID in the URL path is invalid
    #[error("invalid job ID: {err}")]
    InvalidId { err: PathRejection },

    /// Job not found
    #[error("job '{id}' not found")]
    NotFound { id: JobId },

    /// Job state conflict (cannot perform operation)
    #[error("job conflict: {message}")]
    Conflict { message: String },

    /// Job store error
    #[error("job store error: {0}")]
    Store(#[from] job_store::Error),
}

impl RequestError for Error {
    fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidId { .. } => "INVALID_JOB_ID",
            Error::NotFound { .. } => "JOB_NOT_FOUND",
            Error::Conflict { .. } => "JOB_CONFLICT",
            Error::Store(_) => "JOB_STORE_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidId { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
