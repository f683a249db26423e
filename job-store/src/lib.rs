//! Durable job store backed by Postgres.
//!
//! Owns the persistent state of the job queue and its trigger sources
//! (schedules, context anchors) plus the work-ticket hand-off table. Every
//! concurrency-sensitive mutation is a single SQL function call, so the
//! atomicity guarantees live in the database and hold across any number of
//! worker processes.

pub mod anchors;
mod conn;
pub mod jobs;
pub mod schedules;
pub mod tickets;

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use sqlx::types::JsonValue;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use self::conn::DbConnPool;
pub use self::{
    anchors::{ContextAnchor, NewAnchor},
    jobs::{
        CreatedJobRef, Job, JobFilter, JobId, JobStatus, MAX_ERROR_LEN, NewJob,
        ParseJobStatusError, ParseWorkerIdError, WorkerId,
    },
    schedules::{NewSchedule, Schedule},
    tickets::{NewWorkTicket, WorkTicket},
};

/// Default pool size for the job store.
pub const DEFAULT_POOL_SIZE: u32 = 10;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Error connecting to job store: {0}")]
    ConnectionError(#[source] sqlx::Error),

    #[error("Error running migrations: {0}")]
    MigrationError(#[source] sqlx::migrate::MigrateError),

    #[error("Error executing database query: {0}")]
    DbError(#[from] sqlx::Error),
}

impl Error {
    /// Returns `true` if the error is likely to be a transient connection
    /// issue, which makes the operation worth retrying.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Error::ConnectionError(_) => true,
            Error::DbError(err) => matches!(
                err,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
            ),
            Error::MigrationError(_) => false,
        }
    }
}

impl From<conn::ConnError> for Error {
    fn from(err: conn::ConnError) -> Self {
        match err {
            conn::ConnError::ConnectionError(err) => Error::ConnectionError(err),
            conn::ConnError::MigrationFailed(err) => Error::MigrationError(err),
        }
    }
}

/// Connection pool to the job store. Clones refer to the same instance.
#[derive(Clone, Debug)]
pub struct JobStore {
    pub pool: DbConnPool,
}

impl JobStore {
    /// Sets up a connection pool to the job store.
    ///
    /// Runs migrations if necessary.
    #[instrument(skip_all, err)]
    pub async fn connect(url: &str, pool_size: u32) -> Result<Self, Error> {
        let pool = DbConnPool::connect(url, pool_size).await?;
        pool.run_migrations().await?;
        Ok(Self { pool })
    }

    /// Sets up a connection pool with retry on transient connection errors,
    /// for daemons that may start before the database is ready.
    ///
    /// Runs migrations once connected.
    #[instrument(skip_all, err)]
    pub async fn connect_with_retry(url: &str, pool_size: u32) -> Result<Self, Error> {
        let retry_policy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(5))
            .with_max_times(10);

        fn notify_retry(err: &Error, dur: Duration) {
            tracing::warn!(
                error = %err,
                "Job store not reachable yet. Retrying in {:.1}s",
                dur.as_secs_f32()
            );
        }

        let pool = (|| async { DbConnPool::connect(url, pool_size).await.map_err(Error::from) })
            .retry(retry_policy)
            .when(Error::is_connection_error)
            .notify(notify_retry)
            .await?;

        pool.run_migrations().await?;
        Ok(Self { pool })
    }

    /// Sets up a lazily-connecting pool. No I/O happens until the first
    /// query, and migrations are not run.
    pub fn connect_lazy(url: &str, pool_size: u32) -> Result<Self, Error> {
        let pool = DbConnPool::connect_lazy(url, pool_size)?;
        Ok(Self { pool })
    }
}

/// Job queue API
impl JobStore {
    /// Atomically claims up to `limit` queued jobs of the given types for
    /// `worker_id`. See [`jobs::claim`].
    #[instrument(skip(self, job_types), err)]
    pub async fn claim_jobs(
        &self,
        worker_id: &WorkerId,
        job_types: &[String],
        limit: i64,
    ) -> Result<Vec<Job>, Error> {
        Ok(jobs::claim(&*self.pool, worker_id, job_types, limit).await?)
    }

    /// Marks a processing job as completed, storing its result.
    ///
    /// Returns `false` when the job is gone or already terminal.
    #[instrument(skip(self, result), err)]
    pub async fn complete_job(&self, id: JobId, result: &JsonValue) -> Result<bool, Error> {
        Ok(jobs::complete(&*self.pool, id, result).await?)
    }

    /// Reports a processing job as failed; the store requeues it while
    /// attempts remain.
    #[instrument(skip(self, error), err)]
    pub async fn fail_job(&self, id: JobId, error: &str) -> Result<bool, Error> {
        Ok(jobs::fail(&*self.pool, id, error).await?)
    }

    /// Requeues processing jobs whose claim went stale. Returns the number
    /// of jobs swept.
    #[instrument(skip(self), err)]
    pub async fn requeue_orphaned_jobs(&self, timeout: Duration) -> Result<i64, Error> {
        Ok(jobs::requeue_orphaned(&*self.pool, timeout).await?)
    }

    /// Inserts a new queued job.
    #[instrument(skip(self, new_job), fields(job_type = %new_job.job_type), err)]
    pub async fn enqueue_job(&self, new_job: &NewJob) -> Result<JobId, Error> {
        Ok(jobs::insert(&*self.pool, new_job).await?)
    }

    /// Returns the job with the given ID.
    pub async fn get_job(&self, id: JobId) -> Result<Option<Job>, Error> {
        Ok(jobs::get_by_id(&*self.pool, id).await?)
    }

    /// Lists jobs matching the filter, newest first.
    pub async fn list_jobs(
        &self,
        filter: &JobFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>, Error> {
        Ok(jobs::list(&*self.pool, filter, limit, offset).await?)
    }

    /// Counts jobs matching the filter.
    pub async fn count_jobs(&self, filter: &JobFilter) -> Result<i64, Error> {
        Ok(jobs::count(&*self.pool, filter).await?)
    }

    /// Cancels a job that has not reached a terminal state.
    #[instrument(skip(self), err)]
    pub async fn cancel_job(&self, id: JobId) -> Result<bool, Error> {
        Ok(jobs::cancel(&*self.pool, id).await?)
    }

    /// Creates a fresh queued job from a failed one. Returns `None` when the
    /// source job is missing or not failed.
    #[instrument(skip(self), err)]
    pub async fn retry_job(&self, id: JobId) -> Result<Option<JobId>, Error> {
        Ok(jobs::retry_as_new(&*self.pool, id).await?)
    }
}

/// Due-check scan API
impl JobStore {
    /// Creates jobs for all due schedules, advancing each schedule's
    /// `next_run_at` atomically with its job.
    #[instrument(skip(self), err)]
    pub async fn check_and_queue_due_schedules(&self) -> Result<Vec<CreatedJobRef>, Error> {
        Ok(schedules::check_and_queue_due(&*self.pool).await?)
    }

    /// Creates refresh jobs for all stale context anchors.
    #[instrument(skip(self), err)]
    pub async fn check_and_queue_stale_anchors(&self) -> Result<Vec<CreatedJobRef>, Error> {
        Ok(anchors::check_and_queue_stale(&*self.pool).await?)
    }
}

/// Handler write paths
impl JobStore {
    /// Inserts a pending work ticket for the orchestration pipeline.
    #[instrument(skip(self, new_ticket), fields(source = %new_ticket.source), err)]
    pub async fn create_work_ticket(&self, new_ticket: &NewWorkTicket) -> Result<Uuid, Error> {
        Ok(tickets::create(&*self.pool, new_ticket).await?)
    }

    /// Stamps a schedule's last-run tracking columns.
    #[instrument(skip(self), err)]
    pub async fn mark_schedule_run(
        &self,
        schedule_id: Uuid,
        status: &str,
        ticket_id: Uuid,
    ) -> Result<(), Error> {
        Ok(schedules::mark_last_run(&*self.pool, schedule_id, status, ticket_id).await?)
    }
}

/// In-tree DB integration tests
#[cfg(all(test, feature = "pg-tests"))]
mod tests {
    mod it_claim;
    mod it_due_checks;
    mod it_lifecycle;
}
