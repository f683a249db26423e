//! Job-type dispatch registry.
//!
//! Decouples what a job type does (a [`JobHandler`]) from how jobs are
//! claimed and completed (the executor). Handlers receive only the payload
//! and return only a result; retry and requeue policy is never theirs to
//! decide. A handler that needs follow-up work enqueues it through the
//! store's normal insertion paths rather than mutating its own job.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use job_store::Job;
use serde_json::Value as JsonValue;

/// Domain logic for a single job type.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Executes the job. The payload arrives verbatim from the job row; the
    /// returned mapping is persisted verbatim as the job's result.
    async fn run(&self, payload: &JsonValue) -> Result<JsonValue, HandlerError>;
}

/// Failure raised by a job handler's business logic.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The payload did not match the handler's contract.
    #[error("invalid job payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    /// A store write performed by the handler failed.
    #[error(transparent)]
    Store(#[from] job_store::Error),

    /// Any other handler failure.
    #[error("{0}")]
    Failed(String),
}

/// Error returned by [`HandlerRegistry::dispatch`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No handler is registered for the job's type. Surfaces to the worker
    /// so the job is failed rather than silently dropped.
    #[error("no handler registered for job type '{job_type}'")]
    UnknownJobType { job_type: String },

    /// The handler ran and failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Maps job-type strings to their handlers.
///
/// Populated once during application initialization; the worker treats the
/// registered set as the closed set of types it claims, so a job type
/// without a handler is never pulled off the queue by this process.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates a job type with a handler. Re-registering a type replaces
    /// the previous handler (last registration wins).
    pub fn register(&mut self, job_type: impl Into<String>, handler: Arc<dyn JobHandler>) {
        let job_type = job_type.into();
        tracing::debug!(job_type = %job_type, "registered job handler");
        self.handlers.insert(job_type, handler);
    }

    /// The set of job types this registry can dispatch, sorted for a stable
    /// claim query.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Routes a job to its registered handler.
    pub async fn dispatch(&self, job: &Job) -> Result<JsonValue, DispatchError> {
        let handler = self
            .handlers
            .get(&job.job_type)
            .ok_or_else(|| DispatchError::UnknownJobType {
                job_type: job.job_type.clone(),
            })?;

        tracing::info!(job_id = %job.id, job_type = %job.job_type, "handling job");
        let result = handler.run(&job.payload).await?;
        tracing::info!(job_id = %job.id, job_type = %job.job_type, "job handled");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use job_store::{JobStatus, WorkerId};
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    struct StaticHandler(JsonValue);

    #[async_trait]
    impl JobHandler for StaticHandler {
        async fn run(&self, _payload: &JsonValue) -> Result<JsonValue, HandlerError> {
            Ok(self.0.clone())
        }
    }

    fn job_of_type(job_type: &str) -> Job {
        Job {
            id: Uuid::new_v4().into(),
            job_type: job_type.to_owned(),
            payload: json!({}),
            status: JobStatus::Processing,
            priority: 0,
            retry_count: 0,
            max_attempts: 3,
            result: None,
            error_message: None,
            worker_id: Some(WorkerId::random()),
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn dispatch_routes_to_the_registered_handler() {
        let mut registry = HandlerRegistry::new();
        registry.register("scheduled_work", Arc::new(StaticHandler(json!({"ok": 1}))));

        let result = registry
            .dispatch(&job_of_type("scheduled_work"))
            .await
            .expect("dispatch should succeed");
        assert_eq!(result, json!({"ok": 1}));
    }

    #[tokio::test]
    async fn dispatch_fails_on_unknown_job_type() {
        let registry = HandlerRegistry::new();

        let err = registry
            .dispatch(&job_of_type("ghost_type"))
            .await
            .expect_err("dispatch should fail");
        assert!(matches!(err, DispatchError::UnknownJobType { .. }));
        assert!(err.to_string().contains("ghost_type"));
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let mut registry = HandlerRegistry::new();
        registry.register("scheduled_work", Arc::new(StaticHandler(json!("first"))));
        registry.register("scheduled_work", Arc::new(StaticHandler(json!("second"))));

        let result = registry
            .dispatch(&job_of_type("scheduled_work"))
            .await
            .expect("dispatch should succeed");
        assert_eq!(result, json!("second"));
        assert_eq!(registry.registered_types(), ["scheduled_work"]);
    }

    #[test]
    fn registered_types_are_sorted() {
        let mut registry = HandlerRegistry::new();
        registry.register("stale_refresh", Arc::new(StaticHandler(JsonValue::Null)));
        registry.register("llm_batch", Arc::new(StaticHandler(JsonValue::Null)));
        registry.register("scheduled_work", Arc::new(StaticHandler(JsonValue::Null)));

        assert_eq!(
            registry.registered_types(),
            ["llm_batch", "scheduled_work", "stale_refresh"]
        );
    }
}
