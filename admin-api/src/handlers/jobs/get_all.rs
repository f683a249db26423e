//! Jobs get all handler

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use common::BoxError;
use http_common::{BoxRequestError, RequestError};
use job_store::{JobFilter, JobStatus};
use serde::{Deserialize, Serialize};

use super::JobInfo;
use crate::ctx::Ctx;

/// Query parameters for the jobs listing endpoint
#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    /// Restrict to a single status
    #[serde(default)]
    status: Option<String>,

    /// Restrict to a single job type
    #[serde(default)]
    job_type: Option<String>,

    /// Maximum number of jobs to return (default: 50, max: 1000)
    #[serde(default = "default_limit")]
    limit: i64,

    /// Number of jobs to skip
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Handler for the `GET /jobs` endpoint
///
/// Returns jobs newest-first, optionally filtered by status and job type,
/// with limit/offset pagination and a total count for the filter.
#[tracing::instrument(skip_all, err)]
pub async fn handler(
    State(ctx): State<Ctx>,
    Query(query): Query<JobsQuery>,
) -> Result<Json<JobsResponse>, BoxRequestError> {
    if query.limit > 1000 {
        return Err(Error::InvalidRequest("limit cannot be greater than 1000".into()).into());
    }
    if query.limit <= 0 {
        return Err(Error::InvalidRequest("limit must be greater than 0".into()).into());
    }
    if query.offset < 0 {
        return Err(Error::InvalidRequest("offset must not be negative".into()).into());
    }

    let status = match &query.status {
        Some(raw) => Some(raw.parse::<JobStatus>().map_err(|err| {
            Error::InvalidRequest(format!("invalid status filter: {err}").into())
        })?),
        None => None,
    };

    let filter = JobFilter {
        status,
        job_type: query.job_type.clone(),
    };

    let jobs = ctx
        .store
        .list_jobs(&filter, query.limit, query.offset)
        .await
        .map_err(|err| {
            tracing::debug!(error=?err, "failed to list jobs");
            Error::Store(err)
        })?;
    let total = ctx.store.count_jobs(&filter).await.map_err(Error::Store)?;

    Ok(Json(JobsResponse {
        jobs: jobs.into_iter().map(JobInfo::from).collect(),
        total,
        limit: query.limit,
        offset: query.offset,
    }))
}

/// API response containing job information
#[derive(Debug, Serialize)]
pub struct JobsResponse {
    /// Jobs in this page, newest first
    pub jobs: Vec<JobInfo>,
    /// Total number of jobs matching the filter
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Job store error
    #[error("job store error: {0}")]
    Store(#[from] job_store::Error),

    /// Invalid request
    #[error("invalid request: {0}")]
    InvalidRequest(BoxError),
}

impl RequestError for Error {
    fn error_code(&self) -> &'static str {
        match self {
            Error::Store(_) => "JOB_STORE_ERROR",
            Error::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}
