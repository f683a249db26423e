//! Context anchor rows
//!
//! Anchors are owned by the content pipeline; the job core's only interaction
//! is the staleness scan. Insert/touch exist for the integration tests that
//! stand in for that pipeline.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, postgres::types::PgInterval, types::JsonValue};
use uuid::Uuid;

use super::jobs::{CreatedJobRef, pg_interval};

/// Scan for stale anchors, creating one `stale_refresh` job per stale row.
///
/// A row is stale once `updated_at + ttl` has passed and no refresh has been
/// queued for the current content revision. Rows locked by a concurrent scan
/// are skipped.
pub async fn check_and_queue_stale<'c, E>(exe: E) -> Result<Vec<CreatedJobRef>, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        SELECT * FROM check_and_queue_stale_anchors()
    "#};
    sqlx::query_as(query).fetch_all(exe).await
}

/// Insert a new anchor.
pub async fn insert<'c, E>(exe: E, new_anchor: &NewAnchor) -> Result<Uuid, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        INSERT INTO context_anchors
            (basket_id, anchor_role, recipe_id, recipe_slug, context_outputs,
             ttl, refresh_enabled, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
    "#};
    sqlx::query_scalar(query)
        .bind(new_anchor.basket_id)
        .bind(&new_anchor.anchor_role)
        .bind(new_anchor.recipe_id)
        .bind(&new_anchor.recipe_slug)
        .bind(&new_anchor.context_outputs)
        .bind(pg_interval(new_anchor.ttl))
        .bind(new_anchor.refresh_enabled)
        .bind(new_anchor.updated_at)
        .fetch_one(exe)
        .await
}

/// Bump an anchor's `updated_at`, as the content pipeline does when the
/// block is regenerated.
pub async fn touch<'c, E>(exe: E, id: Uuid) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        UPDATE context_anchors SET updated_at = now() WHERE id = $1
    "#};
    sqlx::query(query).bind(id).execute(exe).await?;
    Ok(())
}

/// Get an anchor by its ID.
pub async fn get_by_id<'c, E>(exe: E, id: Uuid) -> Result<Option<ContextAnchor>, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        SELECT * FROM context_anchors WHERE id = $1
    "#};
    sqlx::query_as(query).bind(id).fetch_optional(exe).await
}

/// A TTL'd content block whose staleness triggers a refresh job.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContextAnchor {
    pub id: Uuid,
    pub basket_id: Uuid,
    pub anchor_role: String,
    pub recipe_id: Uuid,
    pub recipe_slug: String,
    pub context_outputs: JsonValue,
    pub ttl: PgInterval,
    pub refresh_enabled: bool,
    pub last_refresh_queued_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for inserting a new anchor.
#[derive(Debug, Clone)]
pub struct NewAnchor {
    pub basket_id: Uuid,
    pub anchor_role: String,
    pub recipe_id: Uuid,
    pub recipe_slug: String,
    pub context_outputs: JsonValue,
    pub ttl: std::time::Duration,
    pub refresh_enabled: bool,
    pub updated_at: DateTime<Utc>,
}
