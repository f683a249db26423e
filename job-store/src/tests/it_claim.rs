//! In-tree DB integration tests for the atomic claim operation

use std::collections::HashSet;

use pgtemp::PgTempDB;
use sqlx::types::JsonValue;

use crate::{DEFAULT_POOL_SIZE, JobId, JobStatus, JobStore, NewJob, WorkerId};

async fn connect(temp_db: &PgTempDB) -> JobStore {
    JobStore::connect(&temp_db.connection_uri(), DEFAULT_POOL_SIZE)
        .await
        .expect("Failed to connect to job store")
}

#[tokio::test]
async fn claim_stamps_worker_and_started_at() {
    //* Given
    let temp_db = PgTempDB::new();
    let store = connect(&temp_db).await;

    let worker_id: WorkerId = "test-worker-claim".parse().expect("Invalid worker ID");
    let job_id = store
        .enqueue_job(&NewJob::new("scheduled_work", JsonValue::Null))
        .await
        .expect("Failed to enqueue job");

    //* When
    let claimed = store
        .claim_jobs(&worker_id, &["scheduled_work".to_owned()], 5)
        .await
        .expect("Failed to claim jobs");

    //* Then
    assert_eq!(claimed.len(), 1);
    let job = &claimed[0];
    assert_eq!(job.id, job_id);
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.worker_id.as_ref(), Some(&worker_id));
    assert!(job.started_at.is_some());
}

#[tokio::test]
async fn claim_orders_by_priority_then_age() {
    //* Given
    let temp_db = PgTempDB::new();
    let store = connect(&temp_db).await;
    let worker_id: WorkerId = "test-worker-priority".parse().expect("Invalid worker ID");

    for priority in [1, 5, 3] {
        store
            .enqueue_job(&NewJob::new("scheduled_work", JsonValue::Null).with_priority(priority))
            .await
            .expect("Failed to enqueue job");
    }

    //* When
    let claimed = store
        .claim_jobs(&worker_id, &["scheduled_work".to_owned()], 3)
        .await
        .expect("Failed to claim jobs");

    //* Then
    let priorities: Vec<i32> = claimed.iter().map(|job| job.priority).collect();
    assert_eq!(priorities, [5, 3, 1]);
}

#[tokio::test]
async fn claim_only_returns_requested_job_types() {
    //* Given
    let temp_db = PgTempDB::new();
    let store = connect(&temp_db).await;
    let worker_id: WorkerId = "test-worker-types".parse().expect("Invalid worker ID");

    store
        .enqueue_job(&NewJob::new("scheduled_work", JsonValue::Null))
        .await
        .expect("Failed to enqueue scheduled_work job");
    store
        .enqueue_job(&NewJob::new("llm_batch", JsonValue::Null))
        .await
        .expect("Failed to enqueue llm_batch job");

    //* When
    let claimed = store
        .claim_jobs(&worker_id, &["scheduled_work".to_owned()], 10)
        .await
        .expect("Failed to claim jobs");

    //* Then
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].job_type, "scheduled_work");
}

/// N concurrent claimers against M shared jobs: the claimed sets must
/// partition the queue with no job handed out twice.
#[tokio::test]
async fn concurrent_claimers_never_share_a_job() {
    //* Given
    const NUM_JOBS: usize = 24;
    const NUM_CLAIMERS: usize = 8;

    let temp_db = PgTempDB::new();
    let store = connect(&temp_db).await;

    let mut all_jobs = HashSet::new();
    for _ in 0..NUM_JOBS {
        let job_id = store
            .enqueue_job(&NewJob::new("scheduled_work", JsonValue::Null))
            .await
            .expect("Failed to enqueue job");
        all_jobs.insert(job_id);
    }

    //* When
    // Each claimer drains the queue in batches of 3 until it comes up empty.
    let mut claimers = Vec::new();
    for n in 0..NUM_CLAIMERS {
        let store = store.clone();
        claimers.push(tokio::spawn(async move {
            let worker_id: WorkerId = format!("test-claimer-{n}").parse().expect("Invalid worker ID");
            let mut claimed: Vec<JobId> = Vec::new();
            loop {
                let batch = store
                    .claim_jobs(&worker_id, &["scheduled_work".to_owned()], 3)
                    .await
                    .expect("Failed to claim jobs");
                if batch.is_empty() {
                    break;
                }
                claimed.extend(batch.into_iter().map(|job| job.id));
            }
            claimed
        }));
    }

    let mut seen: HashSet<JobId> = HashSet::new();
    let mut total = 0;
    for claimer in claimers {
        for job_id in claimer.await.expect("Claimer task panicked") {
            total += 1;
            assert!(seen.insert(job_id), "job {job_id} was claimed twice");
        }
    }

    //* Then
    assert_eq!(total, NUM_JOBS);
    assert_eq!(seen, all_jobs);
}
