//! Built-in job handlers.
//!
//! Each handler is the domain logic for one job type; the payload contracts
//! mirror what the due-check scans put into the job rows. New job types
//! plug in by implementing [`JobHandler`](crate::registry::JobHandler) and
//! registering during application initialization.

pub mod email_notification;
pub mod llm_batch;
pub mod scheduled_work;
pub mod stale_refresh;

use std::sync::Arc;

use job_store::JobStore;

pub use self::{
    email_notification::EmailNotificationHandler, llm_batch::LlmBatchHandler,
    scheduled_work::ScheduledWorkHandler, stale_refresh::StaleRefreshHandler,
};
use crate::registry::HandlerRegistry;

pub const SCHEDULED_WORK: &str = "scheduled_work";
pub const STALE_REFRESH: &str = "stale_refresh";
pub const EMAIL_NOTIFICATION: &str = "email_notification";
pub const LLM_BATCH: &str = "llm_batch";

/// Builds the registry with all built-in handlers registered.
pub fn default_registry(store: JobStore) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(
        SCHEDULED_WORK,
        Arc::new(ScheduledWorkHandler::new(store.clone())),
    );
    registry.register(STALE_REFRESH, Arc::new(StaleRefreshHandler::new(store)));
    registry.register(EMAIL_NOTIFICATION, Arc::new(EmailNotificationHandler));
    registry.register(LLM_BATCH, Arc::new(LlmBatchHandler));
    registry
}
