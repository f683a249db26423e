//! Jobs get by ID handler

use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
    http::StatusCode,
};
use http_common::{BoxRequestError, RequestError};
use job_store::JobId;

use super::JobInfo;
use crate::ctx::Ctx;

/// Handler for the `GET /jobs/{id}` endpoint
#[tracing::instrument(skip_all, err)]
pub async fn handler(
    State(ctx): State<Ctx>,
    path: Result<Path<JobId>, PathRejection>,
) -> Result<Json<JobInfo>, BoxRequestError> {
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

    Ok(Json(JobInfo::from(job)))
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The job ID in the URL path is invalid
    #[error("invalid job ID: {err}")]
    InvalidId { err: PathRejection },

    /// Job not found
    #[error("job '{id}' not found")]
    NotFound { id: JobId },

    /// Job store error
    #[error("job store error: {0}")]
    Store(#[from] job_store::Error),
}

impl RequestError for Error {
    fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidId { .. } => "INVALID_JOB_ID",
            Error::NotFound { .. } => "JOB_NOT_FOUND",
            Error::Store(_) => "JOB_STORE_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidId { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
