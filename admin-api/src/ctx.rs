use job_runtime::WorkerSupervisor;
use job_store::JobStore;

/// Shared state for the admin API handlers.
#[derive(Clone)]
pub struct Ctx {
    pub store: JobStore,
    pub supervisor: WorkerSupervisor,
}
