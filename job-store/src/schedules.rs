//! Project schedule rows
//!
//! Schedules are created and edited by the scheduling CRUD surface, which is
//! not part of this subsystem. The functions here cover what the job core
//! needs: inserting rows (exercised by the integration tests standing in for
//! that surface), the due-check scan, and stamping the last-run columns after
//! a handler hands off a work ticket.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, postgres::types::PgInterval, types::JsonValue};
use uuid::Uuid;

use super::jobs::{CreatedJobRef, pg_interval};

/// Scan for due schedules, creating one `scheduled_work` job per due row and
/// advancing `next_run_at` in the same atomic operation.
///
/// Safe to call concurrently from multiple workers: due rows locked by
/// another scan are skipped, so each due schedule fires exactly once.
pub async fn check_and_queue_due<'c, E>(exe: E) -> Result<Vec<CreatedJobRef>, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        SELECT * FROM check_and_queue_due_schedules()
    "#};
    sqlx::query_as(query).fetch_all(exe).await
}

/// Stamp the schedule's last-run tracking columns.
pub async fn mark_last_run<'c, E>(
    exe: E,
    id: Uuid,
    status: &str,
    ticket_id: Uuid,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        UPDATE project_schedules
        SET last_run_at = now(), last_run_status = $2, last_run_ticket_id = $3
        WHERE id = $1
    "#};
    sqlx::query(query)
        .bind(id)
        .bind(status)
        .bind(ticket_id)
        .execute(exe)
        .await?;
    Ok(())
}

/// Insert a new schedule.
pub async fn insert<'c, E>(exe: E, new_schedule: &NewSchedule) -> Result<Uuid, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        INSERT INTO project_schedules
            (project_id, basket_id, recipe_id, recipe_slug, recipe_parameters,
             context_outputs, cadence, next_run_at, enabled)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
    "#};
    sqlx::query_scalar(query)
        .bind(new_schedule.project_id)
        .bind(new_schedule.basket_id)
        .bind(new_schedule.recipe_id)
        .bind(&new_schedule.recipe_slug)
        .bind(&new_schedule.recipe_parameters)
        .bind(&new_schedule.context_outputs)
        .bind(pg_interval(new_schedule.cadence))
        .bind(new_schedule.next_run_at)
        .bind(new_schedule.enabled)
        .fetch_one(exe)
        .await
}

/// Get a schedule by its ID.
pub async fn get_by_id<'c, E>(exe: E, id: Uuid) -> Result<Option<Schedule>, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        SELECT * FROM project_schedules WHERE id = $1
    "#};
    sqlx::query_as(query).bind(id).fetch_optional(exe).await
}

/// A recurring trigger that produces `scheduled_work` jobs when due.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Schedule {
    pub id: Uuid,
    pub project_id: Uuid,
    pub basket_id: Uuid,
    pub recipe_id: Uuid,
    pub recipe_slug: String,
    pub recipe_parameters: JsonValue,
    pub context_outputs: Option<JsonValue>,
    pub cadence: PgInterval,
    pub next_run_at: DateTime<Utc>,
    pub enabled: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_run_status: Option<String>,
    pub last_run_ticket_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for inserting a new schedule.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub project_id: Uuid,
    pub basket_id: Uuid,
    pub recipe_id: Uuid,
    pub recipe_slug: String,
    pub recipe_parameters: JsonValue,
    pub context_outputs: Option<JsonValue>,
    pub cadence: std::time::Duration,
    pub next_run_at: DateTime<Utc>,
    pub enabled: bool,
}
