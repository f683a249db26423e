//! Handler for `scheduled_work` jobs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use job_store::{JobStore, NewWorkTicket};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use crate::registry::{HandlerError, JobHandler};

/// Payload of a `scheduled_work` job, as produced by the schedule scan.
#[derive(Debug, Deserialize)]
struct ScheduledWorkPayload {
    schedule_id: Uuid,
    #[serde(default)]
    project_id: Option<Uuid>,
    #[serde(default)]
    recipe_id: Option<Uuid>,
    recipe_slug: String,
    basket_id: Uuid,
    #[serde(default)]
    recipe_parameters: JsonValue,
    #[serde(default)]
    context_outputs: Option<JsonValue>,
    #[serde(default)]
    triggered_at: Option<DateTime<Utc>>,
}

/// Executes a scheduled work recipe.
///
/// Creates a pending work ticket for the recipe, to be picked up downstream
/// by the work orchestration pipeline, and stamps the schedule's last-run
/// tracking columns.
pub struct ScheduledWorkHandler {
    store: JobStore,
}

impl ScheduledWorkHandler {
    pub fn new(store: JobStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JobHandler for ScheduledWorkHandler {
    async fn run(&self, payload: &JsonValue) -> Result<JsonValue, HandlerError> {
        let payload: ScheduledWorkPayload =
            serde_json::from_value(payload.clone()).map_err(HandlerError::InvalidPayload)?;

        tracing::info!(
            recipe = %payload.recipe_slug,
            basket = %payload.basket_id,
            schedule = %payload.schedule_id,
            "creating work ticket for scheduled recipe"
        );

        let mut metadata = json!({
            "source": "scheduled",
            "schedule_id": payload.schedule_id,
            "project_id": payload.project_id,
            "recipe_id": payload.recipe_id,
            "recipe_slug": payload.recipe_slug,
            "recipe_parameters": payload.recipe_parameters,
            "triggered_at": payload.triggered_at,
        });
        if let Some(context_outputs) = payload.context_outputs {
            metadata["context_outputs"] = context_outputs;
        }

        let ticket_id = self
            .store
            .create_work_ticket(&NewWorkTicket {
                basket_id: payload.basket_id,
                priority: 5,
                source: "scheduled".to_owned(),
                metadata,
            })
            .await?;

        self.store
            .mark_schedule_run(payload.schedule_id, "success", ticket_id)
            .await?;

        tracing::info!(
            recipe = %payload.recipe_slug,
            work_ticket = %ticket_id,
            "created work ticket"
        );

        Ok(json!({
            "work_ticket_id": ticket_id,
            "status": "queued",
            "recipe_slug": payload.recipe_slug,
        }))
    }
}
