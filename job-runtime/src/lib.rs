//! Job scheduling and execution runtime.
//!
//! The moving parts, in dependency order:
//!
//! - [`HandlerRegistry`] maps job-type strings to [`JobHandler`]s: the
//!   domain layer.
//! - [`JobExecutor`] is the infrastructure seam: claiming, completing,
//!   failing, and the periodic due-check scans. [`StoreExecutor`] is the
//!   store-backed implementation.
//! - [`JobWorker`] owns one executor and runs the poll/check/dispatch loop.
//! - [`WorkerSupervisor`] keeps at most one worker alive per process and
//!   feeds the health endpoint.
//!
//! Multiple worker processes may poll the same store concurrently; the
//! store's atomic claim guarantees they never process the same job twice.

pub mod config;
pub mod executor;
pub mod handlers;
pub mod registry;
pub mod supervisor;
pub mod worker;

pub use self::{
    config::WorkerConfig,
    executor::{JobExecutor, StoreExecutor},
    registry::{DispatchError, HandlerError, HandlerRegistry, JobHandler},
    supervisor::WorkerSupervisor,
    worker::{JobWorker, WorkerStatus},
};
