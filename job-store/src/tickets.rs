//! Work ticket rows
//!
//! The downstream unit of work handed off to the orchestration pipeline. Job
//! handlers only ever insert tickets; everything after that is out of scope.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, types::JsonValue};
use uuid::Uuid;

/// Insert a new pending work ticket.
pub async fn create<'c, E>(exe: E, new_ticket: &NewWorkTicket) -> Result<Uuid, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        INSERT INTO work_tickets (basket_id, status, priority, source, metadata)
        VALUES ($1, 'pending', $2, $3, $4)
        RETURNING id
    "#};
    sqlx::query_scalar(query)
        .bind(new_ticket.basket_id)
        .bind(new_ticket.priority)
        .bind(&new_ticket.source)
        .bind(&new_ticket.metadata)
        .fetch_one(exe)
        .await
}

/// Get a work ticket by its ID.
pub async fn get_by_id<'c, E>(exe: E, id: Uuid) -> Result<Option<WorkTicket>, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Postgres>,
{
    let query = indoc::indoc! {r#"
        SELECT * FROM work_tickets WHERE id = $1
    "#};
    sqlx::query_as(query).bind(id).fetch_optional(exe).await
}

/// A downstream unit of work created by a job handler.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkTicket {
    pub id: Uuid,
    pub basket_id: Uuid,
    pub status: String,
    pub priority: i32,
    pub source: String,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Parameters for inserting a new work ticket.
#[derive(Debug, Clone)]
pub struct NewWorkTicket {
    pub basket_id: Uuid,
    pub priority: i32,
    pub source: String,
    pub metadata: JsonValue,
}
