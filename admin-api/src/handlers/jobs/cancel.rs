//! Jobs cancel handler

use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
    http::StatusCode,
};
use http_common::{BoxRequestError, RequestError};
use job_store::JobId;
use serde_json::{Value as JsonValue, json};

use crate::ctx::Ctx;

/// Handler for the `POST /jobs/{id}/cancel` endpoint
///
/// Cancels a queued or processing job. Terminal jobs cannot be cancelled;
/// a worker still holding a cancelled job finds its completion report
/// ignored by the store.
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

    // the atomic cancel is the authority; the fetched status only makes the
    // conflict message useful
    let cancelled = ctx.store.cancel_job(id).await.map_err(Error::Store)?;
    if !cancelled {
        return Err(Error::Conflict {
            message: format!("cannot cancel job with status '{}'", job.status),
        }
        .into());
    }

    Ok(Json(json!({
        "status": "cancelled",
        "job_id": id,
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
