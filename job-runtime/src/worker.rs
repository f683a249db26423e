//! The background worker control loop.
//!
//! One worker per process polls the store for claimable jobs and triggers the
//! periodic schedule/staleness scans on their own timers. The loop is built
//! to survive anything short of process termination: store errors degrade to
//! an idle tick inside the executor, handler failures are converted into
//! `fail_job` calls at the per-job boundary, and a panicking handler is
//! contained by its own task. Only [`JobWorker::stop`] ends the loop.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use chrono::{DateTime, Utc};
use job_store::{Job, WorkerId};
use parking_lot::RwLock;
use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{ConfigSnapshot, WorkerConfig},
    executor::JobExecutor,
    registry::HandlerRegistry,
};

/// Background worker that processes jobs from the queue.
///
/// State machine: `stopped → running → stopped`. [`JobWorker::start`] is
/// idempotent and [`JobWorker::stop`] is safe to call at any time. An
/// in-flight job handler runs to completion on shutdown; the loop exits at
/// the next cancellation check, within one poll tick.
pub struct JobWorker {
    executor: Arc<dyn JobExecutor>,
    registry: Arc<HandlerRegistry>,
    config: WorkerConfig,
    state: Arc<WorkerState>,
    loop_task: Option<LoopTask>,
}

struct LoopTask {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct WorkerState {
    running: AtomicBool,
    last_schedule_check: RwLock<Option<DateTime<Utc>>>,
    last_stale_check: RwLock<Option<DateTime<Utc>>>,
}

impl JobWorker {
    pub fn new(
        executor: Arc<dyn JobExecutor>,
        registry: Arc<HandlerRegistry>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            executor,
            registry,
            config,
            state: Arc::new(WorkerState::default()),
            loop_task: None,
        }
    }

    /// Starts the background loop. A no-op when the worker is already
    /// running; a second loop is never spawned.
    pub fn start(&mut self) {
        if self.state.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("job worker already running");
            return;
        }

        let shutdown = CancellationToken::new();
        let ctx = LoopCtx {
            executor: Arc::clone(&self.executor),
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            shutdown: shutdown.clone(),
        };
        let handle = tokio::spawn(run_loop(ctx));
        self.loop_task = Some(LoopTask { shutdown, handle });
        tracing::info!(worker_id = %self.executor.worker_id(), "job worker started");
    }

    /// Signals the loop to terminate and awaits its exit. Safe to call when
    /// not running.
    pub async fn stop(&mut self) {
        let Some(task) = self.loop_task.take() else {
            return;
        };

        task.shutdown.cancel();
        if let Err(error) = task.handle.await {
            tracing::error!(error = %error, "worker loop task failed");
        }
        self.state.running.store(false, Ordering::SeqCst);
        tracing::info!("job worker stopped");
    }

    /// Read-only status snapshot, safe to call concurrently with the loop.
    pub fn status(&self) -> WorkerStatus {
        WorkerStatus {
            running: self.state.running.load(Ordering::SeqCst),
            worker_id: self.executor.worker_id().clone(),
            last_schedule_check: *self.state.last_schedule_check.read(),
            last_stale_check: *self.state.last_stale_check.read(),
            job_types: self.registry.registered_types(),
            config: ConfigSnapshot::from(&self.config),
        }
    }
}

/// Worker status snapshot for health checks.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WorkerStatus {
    pub running: bool,
    pub worker_id: WorkerId,
    pub last_schedule_check: Option<DateTime<Utc>>,
    pub last_stale_check: Option<DateTime<Utc>>,
    pub job_types: Vec<String>,
    pub config: ConfigSnapshot,
}

struct LoopCtx {
    executor: Arc<dyn JobExecutor>,
    registry: Arc<HandlerRegistry>,
    config: WorkerConfig,
    state: Arc<WorkerState>,
    shutdown: CancellationToken,
}

async fn run_loop(ctx: LoopCtx) {
    // the claim set is fixed at loop start: registration happens during
    // application initialization, before the worker is started
    let job_types = ctx.registry.registered_types();
    let mut last_schedule_check: Option<Instant> = None;
    let mut last_stale_check: Option<Instant> = None;

    tracing::info!(
        worker_id = %ctx.executor.worker_id(),
        poll_interval = ?ctx.config.job_poll_interval,
        schedule_check_interval = ?ctx.config.schedule_check_interval,
        stale_check_interval = ?ctx.config.stale_check_interval,
        batch_size = ctx.config.job_batch_size,
        job_types = ?job_types,
        "worker loop running"
    );

    loop {
        if interval_elapsed(last_schedule_check, ctx.config.schedule_check_interval) {
            let created = ctx.executor.check_schedules().await;
            if !created.is_empty() {
                tracing::info!(count = created.len(), "created jobs from due schedules");
            }
            let swept = ctx.executor.recover_orphans().await;
            if swept > 0 {
                tracing::warn!(count = swept, "requeued orphaned jobs");
            }
            // stamp after the calls return, so a slow or failing scan does
            // not turn into a tight retry storm
            last_schedule_check = Some(Instant::now());
            *ctx.state.last_schedule_check.write() = Some(Utc::now());
        }

        if interval_elapsed(last_stale_check, ctx.config.stale_check_interval) {
            let created = ctx.executor.check_stale_anchors().await;
            if !created.is_empty() {
                tracing::info!(count = created.len(), "created stale refresh jobs");
            }
            last_stale_check = Some(Instant::now());
            *ctx.state.last_stale_check.write() = Some(Utc::now());
        }

        let jobs = ctx
            .executor
            .claim_jobs(&job_types, ctx.config.job_batch_size as i64)
            .await;
        for job in jobs {
            process_job(&ctx, job).await;
        }

        tokio::select! {
            _ = ctx.shutdown.cancelled() => break,
            _ = tokio::time::sleep(ctx.config.job_poll_interval) => {}
        }
    }

    tracing::info!("worker loop exited");
}

/// Processes a single claimed job.
///
/// The dispatch runs on its own task: a handler that panics takes down that
/// task, not the loop, and the join error becomes a failed job like any
/// other handler error.
async fn process_job(ctx: &LoopCtx, job: Job) {
    let job_id = job.id;
    let job_type = job.job_type.clone();

    let registry = Arc::clone(&ctx.registry);
    let dispatch = tokio::spawn(async move { registry.dispatch(&job).await });

    match dispatch.await {
        Ok(Ok(result)) => {
            ctx.executor.complete_job(job_id, result).await;
        }
        Ok(Err(error)) => {
            tracing::error!(%job_id, job_type = %job_type, error = %error, "job failed");
            ctx.executor.fail_job(job_id, &error.to_string()).await;
        }
        Err(join_error) => {
            tracing::error!(%job_id, job_type = %job_type, error = %join_error, "job handler panicked");
            ctx.executor.fail_job(job_id, "job handler panicked").await;
        }
    }
}

fn interval_elapsed(last: Option<Instant>, every: Duration) -> bool {
    last.map_or(true, |at| at.elapsed() >= every)
}
