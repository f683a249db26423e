//! Worker health handler

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::ctx::Ctx;

/// Handler for the `GET /health/jobs` endpoint
///
/// Reports the background worker's status: running flag, identity, last
/// scan timestamps, registered job types, and effective configuration.
/// Returns 500 with `{ok: false, error}` when the worker was never
/// initialized, so orchestrators treat a worker-less process as unhealthy.
pub async fn handler(State(ctx): State<Ctx>) -> Response {
    match ctx.supervisor.status().await {
        Some(status) => Json(json!({
            "ok": true,
            "running": status.running,
            "worker_id": status.worker_id,
            "last_schedule_check": status.last_schedule_check,
            "last_stale_check": status.last_stale_check,
            "job_types": status.job_types,
            "config": status.config,
        }))
        .into_response(),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "ok": false,
                "error": "worker not initialized",
            })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use job_runtime::{JobExecutor, WorkerConfig, WorkerSupervisor};
    use job_store::{CreatedJobRef, Job, JobId, JobStore, WorkerId};
    use serde_json::{Value as JsonValue, json};
    use tower::ServiceExt as _;

    use crate::{Ctx, router};

    fn lazy_ctx() -> Ctx {
        // lazy pool: no database is contacted until a jobs route runs a query
        let store = JobStore::connect_lazy("postgres://localhost:5432/unused", 1)
            .expect("lazy pool should build");
        Ctx {
            store,
            supervisor: WorkerSupervisor::new(),
        }
    }

    /// Executor with no store behind it, so the worker loop idles instantly.
    struct IdleExecutor(WorkerId);

    #[async_trait]
    impl JobExecutor for IdleExecutor {
        fn worker_id(&self) -> &WorkerId {
            &self.0
        }

        async fn claim_jobs(&self, _job_types: &[String], _limit: i64) -> Vec<Job> {
            Vec::new()
        }

        async fn complete_job(&self, _job_id: JobId, _result: JsonValue) -> bool {
            false
        }

        async fn fail_job(&self, _job_id: JobId, _error: &str) -> bool {
            false
        }

        async fn check_schedules(&self) -> Vec<CreatedJobRef> {
            Vec::new()
        }

        async fn check_stale_anchors(&self) -> Vec<CreatedJobRef> {
            Vec::new()
        }

        async fn recover_orphans(&self) -> u64 {
            0
        }
    }

    async fn body_json(response: axum::response::Response) -> JsonValue {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    #[tokio::test]
    async fn reports_error_when_worker_never_started() {
        let app = router(lazy_ctx());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/jobs")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["ok"], json!(false));
        assert_eq!(body["error"], json!("worker not initialized"));
    }

    #[tokio::test]
    async fn reports_status_when_worker_is_running() {
        let ctx = lazy_ctx();
        let config = WorkerConfig::default();
        let executor = Arc::new(IdleExecutor(WorkerId::random()));
        // registering handlers performs no I/O, even against a lazy store
        let registry = job_runtime::handlers::default_registry(ctx.store.clone());
        ctx.supervisor
            .start(executor, Arc::new(registry), config)
            .await;

        let app = router(ctx.clone());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/jobs")
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should succeed");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], json!(true));
        assert_eq!(body["running"], json!(true));
        assert_eq!(body["config"]["job_poll_interval"], json!(30));
        let job_types: Vec<&str> = body["job_types"]
            .as_array()
            .expect("job_types should be an array")
            .iter()
            .filter_map(JsonValue::as_str)
            .collect();
        assert!(job_types.contains(&"scheduled_work"));
        assert!(job_types.contains(&"stale_refresh"));

        ctx.supervisor.stop().await;
    }
}
