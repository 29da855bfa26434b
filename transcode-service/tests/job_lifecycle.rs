//! Exercises the job state machine end to end against an in-memory metadata
//! store: the non-terminal-uniqueness invariant, cooperative cancellation's
//! two branches (a still-waiting job vs. an abandoned active one), retry's
//! failed-only guard, and clear's terminal-only guard.

mod common;

use chrono::Utc;
use uuid::Uuid;

use media_service::error::AppError;
use media_service::jobs::CreateJobSpec;
use media_service::metadata::{JobStatusUpdate, MetadataStore};
use media_service::models::{JobStatus, JobType, Owner};

fn film_spec(film_id: Uuid, client_id: &str) -> CreateJobSpec {
    CreateJobSpec {
        job_type: JobType::Film,
        owner: Owner::Film { film_id },
        file_name: "movie.mp4".to_string(),
        client_id: client_id.to_string(),
    }
}

#[actix_rt::test]
async fn rejects_duplicate_active_job_for_same_resource() {
    let dir = common::scratch_dir("dup-job");
    let (state, _bootstrap) = common::build_state(&dir).await;

    let film_id = Uuid::new_v4();
    let first = state.job_manager.create(film_spec(film_id, "c1")).await.unwrap();
    assert_eq!(first.status, JobStatus::Waiting);

    let err = state
        .job_manager
        .create(film_spec(film_id, "c2"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ExistingJob { .. }));
}

#[actix_rt::test]
async fn cancel_waiting_job_is_immediate() {
    let dir = common::scratch_dir("cancel-waiting");
    let (state, _bootstrap) = common::build_state(&dir).await;

    let job = state
        .job_manager
        .create(film_spec(Uuid::new_v4(), "c1"))
        .await
        .unwrap();

    state.job_manager.cancel(job.id).await.unwrap();
    let reloaded = state.job_manager.get(job.id).await.unwrap();
    assert_eq!(reloaded.status, JobStatus::Cancelled);
    assert!(reloaded.cancelled_at.is_some());
}

#[actix_rt::test]
async fn cancel_active_job_with_no_owning_worker_is_treated_as_abandoned() {
    let dir = common::scratch_dir("cancel-abandoned");
    let (state, _bootstrap) = common::build_state(&dir).await;

    let job = state
        .job_manager
        .create(film_spec(Uuid::new_v4(), "c1"))
        .await
        .unwrap();

    // Simulate a worker having picked the job up without going through
    // `run_job` (which would have registered a cancel token).
    state
        .job_manager
        .store()
        .update_job_status(
            job.id,
            JobStatus::Active,
            JobStatusUpdate {
                started_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    state.job_manager.cancel(job.id).await.unwrap();
    let reloaded = state.job_manager.get(job.id).await.unwrap();
    assert_eq!(reloaded.status, JobStatus::Cancelled);
}

#[actix_rt::test]
async fn cancel_on_terminal_job_conflicts() {
    let dir = common::scratch_dir("cancel-terminal");
    let (state, _bootstrap) = common::build_state(&dir).await;

    let job = state
        .job_manager
        .create(film_spec(Uuid::new_v4(), "c1"))
        .await
        .unwrap();
    state.job_manager.cancel(job.id).await.unwrap();

    let err = state.job_manager.cancel(job.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[actix_rt::test]
async fn retry_only_succeeds_from_failed() {
    let dir = common::scratch_dir("retry");
    let (state, _bootstrap) = common::build_state(&dir).await;

    let job = state
        .job_manager
        .create(film_spec(Uuid::new_v4(), "c1"))
        .await
        .unwrap();

    // Still `waiting` — retry must be rejected.
    let err = state.job_manager.retry(job.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    state
        .job_manager
        .store()
        .update_job_status(
            job.id,
            JobStatus::Failed,
            JobStatusUpdate {
                finished_at: Some(Utc::now()),
                failed_reason: Some("transcode failure at HD during encode".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let retried = state.job_manager.retry(job.id).await.unwrap();
    assert_eq!(retried.status, JobStatus::Waiting);
    assert_eq!(retried.retry_count, 1);
    assert!(retried.failed_reason.is_none());
    assert!(retried.queue_job_id.starts_with("retry-"));
}

#[actix_rt::test]
async fn clear_rejects_non_terminal_statuses() {
    let dir = common::scratch_dir("clear");
    let (state, _bootstrap) = common::build_state(&dir).await;

    let err = state
        .job_manager
        .clear(&[JobStatus::Waiting])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let job = state
        .job_manager
        .create(film_spec(Uuid::new_v4(), "c1"))
        .await
        .unwrap();
    state.job_manager.cancel(job.id).await.unwrap();

    let cleared = state.job_manager.clear(&[JobStatus::Cancelled]).await.unwrap();
    assert_eq!(cleared, 1);
    assert!(state.job_manager.get(job.id).await.is_err());
}

#[actix_rt::test]
async fn fix_stuck_fails_orphaned_active_jobs_at_boot() {
    let dir = common::scratch_dir("fix-stuck");
    let (state, _bootstrap) = common::build_state(&dir).await;

    let job = state
        .job_manager
        .create(film_spec(Uuid::new_v4(), "c1"))
        .await
        .unwrap();
    state
        .job_manager
        .store()
        .update_job_status(
            job.id,
            JobStatus::Active,
            JobStatusUpdate {
                started_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let fixed = state.job_manager.fix_stuck().await.unwrap();
    assert_eq!(fixed, 1);

    let reloaded = state.job_manager.get(job.id).await.unwrap();
    assert_eq!(reloaded.status, JobStatus::Failed);
    assert_eq!(reloaded.failed_reason.as_deref(), Some("Abandoned"));
}
