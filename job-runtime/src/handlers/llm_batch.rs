//! Handler for `llm_batch` jobs.

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};

use crate::registry::{HandlerError, JobHandler};

/// Processes LLM batch API results delivered by provider webhooks.
///
/// Batch submission is not wired up yet; jobs of this type are acknowledged
/// and skipped so the webhook route can already enqueue them.
pub struct LlmBatchHandler;

#[async_trait]
impl JobHandler for LlmBatchHandler {
    async fn run(&self, payload: &JsonValue) -> Result<JsonValue, HandlerError> {
        tracing::info!(
            batch_id = payload["batch_id"].as_str().unwrap_or("<unknown>"),
            "llm batch results received, batch processing not available"
        );

        Ok(json!({
            "status": "skipped",
            "reason": "llm batch processing not available",
        }))
    }
}
