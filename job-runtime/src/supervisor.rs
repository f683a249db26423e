//! Process-wide worker lifecycle.
//!
//! Exactly one [`JobWorker`] should be active per process. The supervisor is
//! an explicit lifecycle-managed object: the binary constructs it at startup,
//! hands a clone to the health-check handler, and tears it down during
//! shutdown. No global statics involved.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    config::WorkerConfig,
    executor::JobExecutor,
    registry::HandlerRegistry,
    worker::{JobWorker, WorkerStatus},
};

/// Owns at most one running [`JobWorker`]. Clones share the same slot.
#[derive(Clone, Default)]
pub struct WorkerSupervisor {
    slot: Arc<Mutex<Option<JobWorker>>>,
}

impl WorkerSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs and starts a worker. If one is already running (which
    /// indicates a startup-sequencing bug in the host), it is stopped and
    /// replaced.
    pub async fn start(
        &self,
        executor: Arc<dyn JobExecutor>,
        registry: Arc<HandlerRegistry>,
        config: WorkerConfig,
    ) {
        let mut slot = self.slot.lock().await;
        if let Some(mut existing) = slot.take() {
            tracing::warn!("a job worker already exists, stopping it first");
            existing.stop().await;
        }

        let mut worker = JobWorker::new(executor, registry, config);
        worker.start();
        *slot = Some(worker);
    }

    /// Stops and clears the worker. No-op when none is running.
    pub async fn stop(&self) {
        if let Some(mut worker) = self.slot.lock().await.take() {
            worker.stop().await;
        }
    }

    /// Status of the current worker, or `None` when never started.
    pub async fn status(&self) -> Option<WorkerStatus> {
        self.slot.lock().await.as_ref().map(JobWorker::status)
    }
}
