//! Job queue rows and atomic queue operations
//!
//! All status mutations go through the SQL functions installed by the
//! migrations; none of the functions here read job state and write it back
//! from the application tier.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, postgres::types::PgInterval, types::JsonValue};
use uuid::Uuid;

/// Maximum stored length of a job error message. Longer messages (stack
/// traces, upstream API dumps) are truncated before they hit the row.
pub const MAX_ERROR_LEN: usize = 1000;

/// Atomically claim up to `limit` queued jobs of the given types.
///
/// Claimed jobs transition to [`JobStatus::Processing`] with `worker_id` and
/// `started_at` stamped in the same statement. Rows locked by a concurrent
/// claimant are skipped, so no two callers ever receive the same job. The
/// batch is ordered by priority descending, then creation time ascending.
pub async fn claim<'c, E>(
    exe: E,
    worker_id: &WorkerId,
    job_types: &[String],
    limit: i64,
) -> Result<Vec<Job>, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        SELECT * FROM claim_jobs($1, $2, $3)
    "#};
    sqlx::query_as(query)
        .bind(worker_id)
        .bind(job_types)
        .bind(limit)
        .fetch_all(exe)
        .await
}

/// Transition a processing job to `completed`, storing its result.
///
/// Returns `false` when the job no longer exists or is not in the
/// processing state (idempotent no-op).
pub async fn complete<'c, E>(exe: E, id: JobId, result: &JsonValue) -> Result<bool, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        SELECT complete_job($1, $2)
    "#};
    sqlx::query_scalar(query)
        .bind(id)
        .bind(result)
        .fetch_one(exe)
        .await
}

/// Report a processing job as failed.
///
/// The store-side policy requeues the job while attempts remain and marks it
/// terminally failed otherwise. The error message is truncated to
/// [`MAX_ERROR_LEN`] characters before storage.
pub async fn fail<'c, E>(exe: E, id: JobId, error: &str) -> Result<bool, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let error = truncate_error(error);
    let query = indoc::indoc! {r#"
        SELECT fail_job($1, $2)
    "#};
    sqlx::query_scalar(query)
        .bind(id)
        .bind(error)
        .fetch_one(exe)
        .await
}

/// Requeue processing jobs whose claim is older than `timeout`.
///
/// Returns the number of jobs swept. See the `requeue_orphaned_jobs` SQL
/// function for the attempt-accounting policy.
pub async fn requeue_orphaned<'c, E>(
    exe: E,
    timeout: std::time::Duration,
) -> Result<i64, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        SELECT requeue_orphaned_jobs($1)
    "#};
    sqlx::query_scalar(query)
        .bind(pg_interval(timeout))
        .fetch_one(exe)
        .await
}

/// Insert a new queued job.
pub async fn insert<'c, E>(exe: E, new_job: &NewJob) -> Result<JobId, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        INSERT INTO jobs (job_type, payload, priority, max_attempts)
        VALUES ($1, $2, $3, $4)
        RETURNING id
    "#};
    sqlx::query_scalar(query)
        .bind(&new_job.job_type)
        .bind(&new_job.payload)
        .bind(new_job.priority)
        .bind(new_job.max_attempts)
        .fetch_one(exe)
        .await
}

/// Get a job by its ID.
pub async fn get_by_id<'c, E>(exe: E, id: JobId) -> Result<Option<Job>, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        SELECT * FROM jobs WHERE id = $1
    "#};
    sqlx::query_as(query).bind(id).fetch_optional(exe).await
}

/// List jobs matching the filter, newest first.
pub async fn list<'c, E>(
    exe: E,
    filter: &JobFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Job>, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let mut query = sqlx::QueryBuilder::<Postgres>::new("SELECT * FROM jobs WHERE TRUE");
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(job_type) = &filter.job_type {
        query.push(" AND job_type = ").push_bind(job_type.as_str());
    }
    query.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);
    query.push(" OFFSET ").push_bind(offset);
    query.build_query_as().fetch_all(exe).await
}

/// Count jobs matching the filter.
pub async fn count<'c, E>(exe: E, filter: &JobFilter) -> Result<i64, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let mut query = sqlx::QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM jobs WHERE TRUE");
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(job_type) = &filter.job_type {
        query.push(" AND job_type = ").push_bind(job_type.as_str());
    }
    query.build_query_scalar().fetch_one(exe).await
}

/// Cancel a job that has not reached a terminal state yet.
///
/// Returns `false` when the job does not exist or is already terminal.
/// A cancelled job that a worker still holds is resolved at completion time:
/// the worker's `complete_job`/`fail_job` calls become no-ops.
pub async fn cancel<'c, E>(exe: E, id: JobId) -> Result<bool, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        WITH updated AS (
            UPDATE jobs
            SET status = 'cancelled', completed_at = now()
            WHERE id = $1 AND status IN ('queued', 'processing')
            RETURNING id
        )
        SELECT EXISTS (SELECT 1 FROM updated)
    "#};
    sqlx::query_scalar(query).bind(id).fetch_one(exe).await
}

/// Create a fresh queued job from a failed one.
///
/// Terminal rows are never reopened; a retry is a new row cloning the failed
/// job's type, payload, priority and attempt budget. Returns `None` when the
/// source job is missing or not in the failed state.
pub async fn retry_as_new<'c, E>(exe: E, id: JobId) -> Result<Option<JobId>, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        INSERT INTO jobs (job_type, payload, priority, max_attempts)
        SELECT job_type, payload, priority, max_attempts
        FROM jobs
        WHERE id = $1 AND status = 'failed'
        RETURNING id
    "#};
    sqlx::query_scalar(query).bind(id).fetch_optional(exe).await
}

fn truncate_error(error: &str) -> &str {
    match error.char_indices().nth(MAX_ERROR_LEN) {
        Some((idx, _)) => &error[..idx],
        None => error,
    }
}

pub(crate) fn pg_interval(duration: std::time::Duration) -> PgInterval {
    PgInterval {
        months: 0,
        days: 0,
        microseconds: duration.as_micros() as i64,
    }
}

/// A unit of asynchronous work in the queue.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Job {
    /// Unique identifier for the job
    pub id: JobId,

    /// Registry key identifying which handler processes this job
    pub job_type: String,

    /// Opaque payload passed verbatim to the handler
    pub payload: JsonValue,

    /// Current status of the job
    pub status: JobStatus,

    /// Higher priority jobs are claimed first; ties break oldest-first
    pub priority: i32,

    /// Retries consumed so far
    pub retry_count: i32,

    /// Total attempt budget before the job fails for good
    pub max_attempts: i32,

    /// Handler result, set on completion
    pub result: Option<JsonValue>,

    /// Last failure message, truncated to [`MAX_ERROR_LEN`]
    pub error_message: Option<String>,

    /// Identity of the worker that last claimed this job. Set on claim,
    /// never cleared; kept for audit, not for unlocking.
    pub worker_id: Option<WorkerId>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Parameters for inserting a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: String,
    pub payload: JsonValue,
    pub priority: i32,
    pub max_attempts: i32,
}

impl NewJob {
    pub fn new(job_type: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            job_type: job_type.into(),
            payload,
            priority: 0,
            max_attempts: 3,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Filter for job listing queries.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub job_type: Option<String>,
}

/// Reference to a job created by a due-check scan, paired with the schedule
/// or anchor row that triggered it.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct CreatedJobRef {
    /// The due schedule or stale anchor that produced the job
    pub source_id: Uuid,
    /// The created job
    pub job_id: JobId,
}

/// A unique identifier for a job
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    sqlx::Type,
    serde::Serialize,
    serde::Deserialize,
)]
#[repr(transparent)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for JobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Identity of a worker process.
///
/// Stamped on jobs at claim time for audit purposes.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, sqlx::Type, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Generates a fresh worker identity, `worker-<8 hex chars>`.
    pub fn random() -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self(format!("worker-{}", &uuid[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when parsing an empty worker ID.
#[derive(Debug, thiserror::Error)]
#[error("worker ID must not be empty")]
pub struct ParseWorkerIdError;

impl std::str::FromStr for WorkerId {
    type Err = ParseWorkerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ParseWorkerIdError);
        }
        Ok(Self(s.to_owned()))
    }
}

/// Represents the current status of a job
///
/// Stored as a `TEXT` column constrained to the values below; decoding an
/// out-of-set value is an error rather than a silent fallback, since this
/// crate owns the schema.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Waiting in the queue for a worker to claim it.
    ///
    /// This is the initial state of a job. A queued job has no `started_at`.
    #[default]
    Queued,

    /// Claimed by a worker and being executed.
    Processing,

    /// Finished successfully, result stored.
    ///
    /// This is a terminal state.
    Completed,

    /// Exhausted its attempts or timed out.
    ///
    /// This is a terminal state. Retrying a failed job creates a new row.
    Failed,

    /// Cancelled before finishing.
    ///
    /// This is a terminal state.
    Cancelled,
}

impl JobStatus {
    /// Check if the job can still make progress.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }

    /// Check if the job reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Convert the [`JobStatus`] to a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown job status.
#[derive(Debug, thiserror::Error)]
#[error("unknown job status: '{0}'")]
pub struct ParseJobStatusError(String);

impl std::str::FromStr for JobStatus {
    type Err = ParseJobStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            s if s.eq_ignore_ascii_case("queued") => Ok(Self::Queued),
            s if s.eq_ignore_ascii_case("processing") => Ok(Self::Processing),
            s if s.eq_ignore_ascii_case("completed") => Ok(Self::Completed),
            s if s.eq_ignore_ascii_case("failed") => Ok(Self::Failed),
            s if s.eq_ignore_ascii_case("cancelled") => Ok(Self::Cancelled),
            other => Err(ParseJobStatusError(other.to_owned())),
        }
    }
}

impl serde::Serialize for JobStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for JobStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: &str = serde::Deserialize::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl sqlx::Type<sqlx::Postgres> for JobStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("TEXT")
    }
}

impl sqlx::postgres::PgHasArrayType for JobStatus {
    fn array_type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("TEXT[]")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for JobStatus {
    fn decode(
        value: <sqlx::Postgres as sqlx::Database>::ValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let value: &str = sqlx::Decode::<sqlx::Postgres>::decode(value)?;
        Ok(value.parse()?)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for JobStatus {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Postgres as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        sqlx::Encode::<sqlx::Postgres>::encode_by_ref(&self.as_str(), buf)
    }
}
