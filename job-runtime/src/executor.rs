//! Executor seam between the worker loop and the job store.
//!
//! The worker depends on the [`JobExecutor`] trait, not on a concrete store:
//! [`StoreExecutor`] is the Postgres-backed implementation, and test code
//! substitutes an in-memory one. The claim/complete/fail scan operations are
//! periodic best-effort calls, so the trait is infallible: the
//! implementation absorbs store errors, logs them, and degrades to "no work
//! this tick" instead of surfacing them to the loop.

use async_trait::async_trait;
use job_store::{CreatedJobRef, Job, JobId, JobStore, WorkerId};
use serde_json::Value as JsonValue;

use crate::config::WorkerConfig;

/// Every operation the worker needs from the job store's
/// concurrency-sensitive state.
#[async_trait]
pub trait JobExecutor: Send + Sync + 'static {
    /// Identity stamped on jobs this executor claims.
    fn worker_id(&self) -> &WorkerId;

    /// Atomically reserve up to `limit` queued jobs of the given types,
    /// ordered by priority descending then creation time ascending.
    ///
    /// Never returns a job another caller has already claimed. Returns an
    /// empty batch on store errors.
    async fn claim_jobs(&self, job_types: &[String], limit: i64) -> Vec<Job>;

    /// Transition a claimed job to completed, storing its result. Returns
    /// `false` when the job is gone or already terminal (idempotent no-op).
    async fn complete_job(&self, job_id: JobId, result: JsonValue) -> bool;

    /// Report a claimed job as failed; store-side policy decides between
    /// requeue and terminal failure. Returns `false` when the job is gone or
    /// already terminal.
    async fn fail_job(&self, job_id: JobId, error: &str) -> bool;

    /// Create jobs for all due schedules. Returns an empty list on store
    /// errors.
    async fn check_schedules(&self) -> Vec<CreatedJobRef>;

    /// Create refresh jobs for all stale anchors. Returns an empty list on
    /// store errors.
    async fn check_stale_anchors(&self) -> Vec<CreatedJobRef>;

    /// Requeue processing jobs whose claim went stale. Returns the number of
    /// jobs swept.
    async fn recover_orphans(&self) -> u64;
}

/// Store-backed executor.
pub struct StoreExecutor {
    store: JobStore,
    worker_id: WorkerId,
    orphan_timeout: std::time::Duration,
}

impl StoreExecutor {
    /// Creates an executor for the given store. A random worker identity is
    /// generated when none is provided.
    pub fn new(store: JobStore, worker_id: Option<WorkerId>, config: &WorkerConfig) -> Self {
        let worker_id = worker_id.unwrap_or_else(WorkerId::random);
        tracing::info!(worker_id = %worker_id, "job executor initialized");
        Self {
            store,
            worker_id,
            orphan_timeout: config.job_orphan_timeout,
        }
    }
}

#[async_trait]
impl JobExecutor for StoreExecutor {
    fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    async fn claim_jobs(&self, job_types: &[String], limit: i64) -> Vec<Job> {
        match self.store.claim_jobs(&self.worker_id, job_types, limit).await {
            Ok(jobs) => jobs,
            Err(error) => {
                tracing::error!(error = %error, "failed to claim jobs");
                Vec::new()
            }
        }
    }

    async fn complete_job(&self, job_id: JobId, result: JsonValue) -> bool {
        match self.store.complete_job(job_id, &result).await {
            Ok(updated) => {
                if !updated {
                    tracing::warn!(%job_id, "job not found or already terminal on completion");
                }
                updated
            }
            Err(error) => {
                tracing::error!(%job_id, error = %error, "failed to complete job");
                false
            }
        }
    }

    async fn fail_job(&self, job_id: JobId, error: &str) -> bool {
        match self.store.fail_job(job_id, error).await {
            Ok(updated) => updated,
            Err(store_error) => {
                tracing::error!(%job_id, error = %store_error, "failed to mark job as failed");
                false
            }
        }
    }

    async fn check_schedules(&self) -> Vec<CreatedJobRef> {
        match self.store.check_and_queue_due_schedules().await {
            Ok(created) => created,
            Err(error) => {
                tracing::error!(error = %error, "failed to check schedules");
                Vec::new()
            }
        }
    }

    async fn check_stale_anchors(&self) -> Vec<CreatedJobRef> {
        match self.store.check_and_queue_stale_anchors().await {
            Ok(created) => created,
            Err(error) => {
                tracing::error!(error = %error, "failed to check stale anchors");
                Vec::new()
            }
        }
    }

    async fn recover_orphans(&self) -> u64 {
        match self.store.requeue_orphaned_jobs(self.orphan_timeout).await {
            Ok(swept) => swept.max(0) as u64,
            Err(error) => {
                tracing::error!(error = %error, "failed to sweep orphaned jobs");
                0
            }
        }
    }
}
