use job_store::{Job, JobId, JobStatus, WorkerId};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Represents job information for the API response
#[derive(Debug, Serialize)]
pub struct JobInfo {
    /// Unique identifier for the job
    pub id: JobId,
    /// Job type string, as registered with the worker
    pub job_type: String,
    /// Current status of the job
    pub status: JobStatus,
    /// Claim priority (higher first)
    pub priority: i32,
    /// Retries consumed so far
    pub retry_count: i32,
    /// Total attempt budget
    pub max_attempts: i32,
    /// Handler payload
    pub payload: JsonValue,
    /// Handler result, present once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    /// Last failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Identity of the worker that last claimed the job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,
    /// Job creation timestamp (ISO 8601 format)
    pub created_at: String,
    /// Claim timestamp (ISO 8601 format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// Terminal-state timestamp (ISO 8601 format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl From<Job> for JobInfo {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            job_type: job.job_type,
            status: job.status,
            priority: job.priority,
            retry_count: job.retry_count,
            max_attempts: job.max_attempts,
            payload: job.payload,
            result: job.result,
            error_message: job.error_message,
            worker_id: job.worker_id,
            created_at: job.created_at.to_rfc3339(),
            started_at: job.started_at.map(|at| at.to_rfc3339()),
            completed_at: job.completed_at.map(|at| at.to_rfc3339()),
        }
    }
}
