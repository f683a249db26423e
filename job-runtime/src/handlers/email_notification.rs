//! Handler for `email_notification` jobs.

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};

use crate::registry::{HandlerError, JobHandler};

/// Sends an email notification.
///
/// The email provider integration has not landed yet; jobs of this type are
/// acknowledged and skipped so notification producers can already enqueue
/// them.
pub struct EmailNotificationHandler;

#[async_trait]
impl JobHandler for EmailNotificationHandler {
    async fn run(&self, payload: &JsonValue) -> Result<JsonValue, HandlerError> {
        tracing::info!(
            recipient = payload["recipient"].as_str().unwrap_or("<unknown>"),
            "email notification requested, provider integration not available"
        );

        Ok(json!({
            "status": "skipped",
            "reason": "email provider integration not available",
        }))
    }
}
