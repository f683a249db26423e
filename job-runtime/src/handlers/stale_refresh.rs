//! Handler for `stale_refresh` jobs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use job_store::{JobStore, NewWorkTicket};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use crate::registry::{HandlerError, JobHandler};

/// Payload of a `stale_refresh` job, as produced by the stale-anchor scan.
#[derive(Debug, Deserialize)]
struct StaleRefreshPayload {
    block_id: Uuid,
    basket_id: Uuid,
    anchor_role: String,
    #[serde(default)]
    recipe_id: Option<Uuid>,
    #[serde(default)]
    recipe_slug: Option<String>,
    #[serde(default)]
    context_outputs: JsonValue,
    #[serde(default)]
    triggered_at: Option<DateTime<Utc>>,
}

impl StaleRefreshPayload {
    /// Whether an approved refresh should replace the anchor block without
    /// manual review. Defaults to true when the refresh policy is silent.
    fn auto_promote(&self) -> bool {
        self.context_outputs["refresh_policy"]["auto_promote"]
            .as_bool()
            .unwrap_or(true)
    }
}

/// Refreshes a stale context anchor by re-running its producing recipe.
///
/// Creates a work ticket targeting the same context role; the resulting
/// output updates the existing anchor block once approved. Runs at a lower
/// priority than user-initiated work.
pub struct StaleRefreshHandler {
    store: JobStore,
}

impl StaleRefreshHandler {
    pub fn new(store: JobStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JobHandler for StaleRefreshHandler {
    async fn run(&self, payload: &JsonValue) -> Result<JsonValue, HandlerError> {
        let payload: StaleRefreshPayload =
            serde_json::from_value(payload.clone()).map_err(HandlerError::InvalidPayload)?;

        tracing::info!(
            anchor_role = %payload.anchor_role,
            basket = %payload.basket_id,
            stale_block = %payload.block_id,
            "refreshing stale anchor"
        );

        let auto_promote = payload.auto_promote();
        let metadata = json!({
            "source": "stale_refresh",
            "stale_block_id": payload.block_id,
            "anchor_role": payload.anchor_role,
            "recipe_id": payload.recipe_id,
            "recipe_slug": payload.recipe_slug,
            "triggered_at": payload.triggered_at,
            "context_outputs": {
                "target_context_role": payload.anchor_role,
                "auto_promote": auto_promote,
            },
        });

        let ticket_id = self
            .store
            .create_work_ticket(&NewWorkTicket {
                basket_id: payload.basket_id,
                priority: 3,
                source: "stale_refresh".to_owned(),
                metadata,
            })
            .await?;

        tracing::info!(
            anchor_role = %payload.anchor_role,
            work_ticket = %ticket_id,
            "created refresh work ticket"
        );

        Ok(json!({
            "work_ticket_id": ticket_id,
            "status": "queued",
            "anchor_role": payload.anchor_role,
            "stale_block_id": payload.block_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn auto_promote_defaults_to_true() {
        let payload: StaleRefreshPayload = serde_json::from_value(json!({
            "block_id": "8f9d2f1a-7e54-4a3f-9a8b-0cbb8f1c2d3e",
            "basket_id": "1b2c3d4e-5f60-4711-8223-344556677889",
            "anchor_role": "trend_digest",
        }))
        .expect("payload should parse");
        assert!(payload.auto_promote());
    }

    #[test]
    fn auto_promote_honors_refresh_policy() {
        let payload: StaleRefreshPayload = serde_json::from_value(json!({
            "block_id": "8f9d2f1a-7e54-4a3f-9a8b-0cbb8f1c2d3e",
            "basket_id": "1b2c3d4e-5f60-4711-8223-344556677889",
            "anchor_role": "trend_digest",
            "context_outputs": {"refresh_policy": {"auto_promote": false}},
        }))
        .expect("payload should parse");
        assert!(!payload.auto_promote());
    }
}
