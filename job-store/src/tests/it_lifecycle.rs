//! In-tree DB integration tests for the job lifecycle operations

use std::time::Duration;

use pgtemp::PgTempDB;
use serde_json::json;
use sqlx::types::JsonValue;

use crate::{DEFAULT_POOL_SIZE, JobStatus, JobStore, NewJob, WorkerId, jobs};

async fn connect(temp_db: &PgTempDB) -> JobStore {
    JobStore::connect(&temp_db.connection_uri(), DEFAULT_POOL_SIZE)
        .await
        .expect("Failed to connect to job store")
}

async fn enqueue_and_claim(store: &JobStore, worker_id: &WorkerId) -> crate::Job {
    let job_id = store
        .enqueue_job(&NewJob::new("scheduled_work", JsonValue::Null))
        .await
        .expect("Failed to enqueue job");
    let claimed = store
        .claim_jobs(worker_id, &["scheduled_work".to_owned()], 1)
        .await
        .expect("Failed to claim jobs");
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, job_id);
    claimed[0].clone()
}

#[tokio::test]
async fn complete_job_is_idempotent() {
    //* Given
    let temp_db = PgTempDB::new();
    let store = connect(&temp_db).await;
    let worker_id: WorkerId = "test-worker-complete".parse().expect("Invalid worker ID");
    let job = enqueue_and_claim(&store, &worker_id).await;

    //* When
    let first = store
        .complete_job(job.id, &json!({"work_ticket_id": "wt1"}))
        .await
        .expect("Failed to complete job");
    let second = store
        .complete_job(job.id, &json!({"work_ticket_id": "wt2"}))
        .await
        .expect("Failed to complete job twice");

    //* Then
    assert!(first);
    assert!(!second);

    let job = store
        .get_job(job.id)
        .await
        .expect("Failed to get job")
        .expect("Job not found");
    assert_eq!(job.status, JobStatus::Completed);
    // the stored result reflects the first call only
    assert_eq!(job.result, Some(json!({"work_ticket_id": "wt1"})));
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn fail_job_requeues_until_attempts_are_exhausted() {
    //* Given
    let temp_db = PgTempDB::new();
    let store = connect(&temp_db).await;
    let worker_id: WorkerId = "test-worker-fail".parse().expect("Invalid worker ID");

    // max_attempts = 3: two requeues, then terminal failure
    let job = enqueue_and_claim(&store, &worker_id).await;
    assert_eq!(job.max_attempts, 3);

    //* When / Then
    for expected_retry_count in [1, 2] {
        let updated = store
            .fail_job(job.id, "agent invocation failed")
            .await
            .expect("Failed to fail job");
        assert!(updated);

        let current = store
            .get_job(job.id)
            .await
            .expect("Failed to get job")
            .expect("Job not found");
        assert_eq!(current.status, JobStatus::Queued);
        assert_eq!(current.retry_count, expected_retry_count);
        assert!(current.started_at.is_none());

        // claim it again for the next attempt
        let reclaimed = store
            .claim_jobs(&worker_id, &["scheduled_work".to_owned()], 1)
            .await
            .expect("Failed to re-claim job");
        assert_eq!(reclaimed.len(), 1);
    }

    let updated = store
        .fail_job(job.id, "agent invocation failed")
        .await
        .expect("Failed to fail job for the last time");
    assert!(updated);

    let current = store
        .get_job(job.id)
        .await
        .expect("Failed to get job")
        .expect("Job not found");
    assert_eq!(current.status, JobStatus::Failed);
    assert_eq!(
        current.error_message.as_deref(),
        Some("agent invocation failed")
    );
    assert!(current.completed_at.is_some());

    // terminal: failing again is a no-op
    let updated = store
        .fail_job(job.id, "late failure report")
        .await
        .expect("Failed to call fail_job on terminal job");
    assert!(!updated);
}

#[tokio::test]
async fn fail_job_truncates_long_error_messages() {
    //* Given
    let temp_db = PgTempDB::new();
    let store = connect(&temp_db).await;
    let worker_id: WorkerId = "test-worker-truncate".parse().expect("Invalid worker ID");
    let job = enqueue_and_claim(&store, &worker_id).await;

    //* When
    let long_error = "x".repeat(5000);
    for _ in 0..3 {
        store
            .fail_job(job.id, &long_error)
            .await
            .expect("Failed to fail job");
        store
            .claim_jobs(&worker_id, &["scheduled_work".to_owned()], 1)
            .await
            .expect("Failed to re-claim job");
    }

    //* Then
    let current = store
        .get_job(job.id)
        .await
        .expect("Failed to get job")
        .expect("Job not found");
    assert_eq!(
        current.error_message.map(|message| message.len()),
        Some(crate::MAX_ERROR_LEN)
    );
}

#[tokio::test]
async fn cancel_job_only_from_active_states() {
    //* Given
    let temp_db = PgTempDB::new();
    let store = connect(&temp_db).await;
    let worker_id: WorkerId = "test-worker-cancel".parse().expect("Invalid worker ID");

    let queued_id = store
        .enqueue_job(&NewJob::new("scheduled_work", JsonValue::Null))
        .await
        .expect("Failed to enqueue job");

    //* When
    let cancelled = store.cancel_job(queued_id).await.expect("Failed to cancel");

    //* Then
    assert!(cancelled);
    let job = store
        .get_job(queued_id)
        .await
        .expect("Failed to get job")
        .expect("Job not found");
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.completed_at.is_some());

    // cancelling a terminal job is a no-op
    assert!(!store.cancel_job(queued_id).await.expect("Failed to cancel"));

    // a worker still holding a cancelled job gets `false` from complete_job
    let job = enqueue_and_claim(&store, &worker_id).await;
    assert!(store.cancel_job(job.id).await.expect("Failed to cancel"));
    let completed = store
        .complete_job(job.id, &json!({}))
        .await
        .expect("Failed to complete cancelled job");
    assert!(!completed);
}

#[tokio::test]
async fn retry_creates_a_fresh_job_from_a_failed_one() {
    //* Given
    let temp_db = PgTempDB::new();
    let store = connect(&temp_db).await;
    let worker_id: WorkerId = "test-worker-retry".parse().expect("Invalid worker ID");

    let job_id = store
        .enqueue_job(
            &NewJob::new("scheduled_work", json!({"recipe_slug": "exec-summary"}))
                .with_priority(5),
        )
        .await
        .expect("Failed to enqueue job");

    // retrying a non-failed job yields nothing
    assert!(
        store
            .retry_job(job_id)
            .await
            .expect("Failed to call retry_job")
            .is_none()
    );

    // drive the job to terminal failure
    for _ in 0..3 {
        store
            .claim_jobs(&worker_id, &["scheduled_work".to_owned()], 1)
            .await
            .expect("Failed to claim job");
        store
            .fail_job(job_id, "boom")
            .await
            .expect("Failed to fail job");
    }

    //* When
    let new_id = store
        .retry_job(job_id)
        .await
        .expect("Failed to retry job")
        .expect("Expected a fresh job");

    //* Then
    assert_ne!(new_id, job_id);
    let original = store
        .get_job(job_id)
        .await
        .expect("Failed to get job")
        .expect("Job not found");
    // the failed row is untouched
    assert_eq!(original.status, JobStatus::Failed);

    let fresh = store
        .get_job(new_id)
        .await
        .expect("Failed to get job")
        .expect("Fresh job not found");
    assert_eq!(fresh.status, JobStatus::Queued);
    assert_eq!(fresh.job_type, original.job_type);
    assert_eq!(fresh.payload, original.payload);
    assert_eq!(fresh.priority, original.priority);
    assert_eq!(fresh.retry_count, 0);
    assert!(fresh.started_at.is_none());
}

#[tokio::test]
async fn orphaned_processing_jobs_are_requeued() {
    //* Given
    let temp_db = PgTempDB::new();
    let store = connect(&temp_db).await;
    let worker_id: WorkerId = "test-worker-orphan".parse().expect("Invalid worker ID");
    let job = enqueue_and_claim(&store, &worker_id).await;

    // age the claim past the sweep timeout
    sqlx::query("UPDATE jobs SET started_at = now() - interval '1 hour' WHERE id = $1")
        .bind(job.id)
        .execute(&*store.pool)
        .await
        .expect("Failed to age the claim");

    //* When
    let swept = store
        .requeue_orphaned_jobs(Duration::from_secs(600))
        .await
        .expect("Failed to sweep orphans");

    //* Then
    assert_eq!(swept, 1);
    let current = store
        .get_job(job.id)
        .await
        .expect("Failed to get job")
        .expect("Job not found");
    assert_eq!(current.status, JobStatus::Queued);
    assert_eq!(current.retry_count, 1);
    assert!(current.started_at.is_none());
    // the audit stamp of the dead claimant is preserved
    assert_eq!(current.worker_id.as_ref(), Some(&worker_id));

    // a fresh claim is unaffected by the sweep
    let _fresh = enqueue_and_claim(&store, &worker_id).await;
    let swept = store
        .requeue_orphaned_jobs(Duration::from_secs(600))
        .await
        .expect("Failed to sweep orphans");
    assert_eq!(swept, 0);
}

#[tokio::test]
async fn list_jobs_filters_by_status_and_type() {
    //* Given
    let temp_db = PgTempDB::new();
    let store = connect(&temp_db).await;
    let worker_id: WorkerId = "test-worker-list".parse().expect("Invalid worker ID");

    store
        .enqueue_job(&NewJob::new("scheduled_work", JsonValue::Null))
        .await
        .expect("Failed to enqueue job");
    store
        .enqueue_job(&NewJob::new("stale_refresh", JsonValue::Null))
        .await
        .expect("Failed to enqueue job");
    let claimed = store
        .claim_jobs(&worker_id, &["stale_refresh".to_owned()], 1)
        .await
        .expect("Failed to claim job");
    store
        .complete_job(claimed[0].id, &json!({}))
        .await
        .expect("Failed to complete job");

    //* When
    let queued = store
        .list_jobs(
            &jobs::JobFilter {
                status: Some(JobStatus::Queued),
                job_type: None,
            },
            50,
            0,
        )
        .await
        .expect("Failed to list jobs");
    let completed_count = store
        .count_jobs(&jobs::JobFilter {
            status: Some(JobStatus::Completed),
            job_type: Some("stale_refresh".to_owned()),
        })
        .await
        .expect("Failed to count jobs");

    //* Then
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].job_type, "scheduled_work");
    assert_eq!(completed_count, 1);
}
