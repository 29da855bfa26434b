//! Job Manager (C8): the job state machine and the pipeline it drives once a
//! worker picks a job up.

mod pipeline;

pub use pipeline::{run_job, PipelineContext};

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::error::{AppError, Result};
use crate::metadata::{JobStatusUpdate, MetadataStore};
use crate::models::{JobStatus, JobType, Owner, ProcessingJob};
use crate::queue::QueueHandle;

pub struct CreateJobSpec {
    pub job_type: JobType,
    pub owner: Owner,
    pub file_name: String,
    /// caller-supplied progress-bus channel key, from the request's `clientId`.
    pub client_id: String,
}

/// Owns the non-terminal-uniqueness invariant and the cancel-flag registry
/// for jobs currently being executed by a worker.
pub struct JobManager {
    store: Arc<dyn MetadataStore>,
    queue: QueueHandle,
    active_tokens: DashMap<Uuid, CancelToken>,
}

impl JobManager {
    pub fn new(store: Arc<dyn MetadataStore>, queue: QueueHandle) -> Self {
        Self {
            store,
            queue,
            active_tokens: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    /// Pre-checks the non-terminal-uniqueness invariant, then persists and
    /// enqueues the job. A full queue rolls back to no DB write at all.
    ///
    /// The pre-check alone is racy (there's an `await` between it and the
    /// insert), so it's backed by a store-level guard that's atomic with the
    /// insert itself (`idx_processing_jobs_active_uniqueness` in Postgres,
    /// the single lock acquisition in the in-memory store). When two
    /// concurrent `create` calls for the same `(resourceId, type)` both pass
    /// the pre-check, the store rejects the losing insert with `Conflict`
    /// and this re-resolves it into the same `ExistingJob` the pre-check
    /// would have returned had it run second.
    pub async fn create(&self, spec: CreateJobSpec) -> Result<ProcessingJob> {
        let resource_id = spec.owner.resource_id();
        if let Some(existing) = self.store.find_active_job(resource_id, spec.job_type).await? {
            return Err(AppError::ExistingJob {
                job_id: existing.id.to_string(),
                status: existing.status.as_str().to_string(),
            });
        }

        let job = ProcessingJob::new(spec.job_type, spec.owner, spec.file_name, spec.client_id);
        self.queue.enqueue(job.id)?;
        match self.store.create_job(job).await {
            Ok(job) => Ok(job),
            Err(AppError::Conflict(_)) => match self.store.find_active_job(resource_id, spec.job_type).await? {
                Some(existing) => Err(AppError::ExistingJob {
                    job_id: existing.id.to_string(),
                    status: existing.status.as_str().to_string(),
                }),
                None => Err(AppError::Conflict(
                    "a non-terminal job already exists for this resource".to_string(),
                )),
            },
            Err(e) => Err(e),
        }
    }

    pub async fn get(&self, job_id: Uuid) -> Result<ProcessingJob> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))
    }

    pub async fn list(&self, status: Option<JobStatus>, job_type: Option<JobType>) -> Result<Vec<ProcessingJob>> {
        self.store.list_jobs(status, job_type).await
    }

    /// Cancels a job. `waiting` jobs flip to `cancelled` immediately (no
    /// worker owns them yet); `active` jobs only have their cancel flag
    /// raised — the worker running the job writes the terminal status once
    /// it observes the flag, per the cooperative cancellation model.
    pub async fn cancel(&self, job_id: Uuid) -> Result<()> {
        let job = self.get(job_id).await?;
        match job.status {
            JobStatus::Waiting => {
                self.store
                    .update_job_status(
                        job_id,
                        JobStatus::Cancelled,
                        JobStatusUpdate {
                            cancelled_at: Some(Utc::now()),
                            ..Default::default()
                        },
                    )
                    .await
            }
            JobStatus::Active => {
                if let Some(token) = self.active_tokens.get(&job_id) {
                    token.cancel();
                    Ok(())
                } else {
                    // Worker host crashed without releasing the token; the
                    // job is effectively abandoned, so cancel takes effect now.
                    self.store
                        .update_job_status(
                            job_id,
                            JobStatus::Cancelled,
                            JobStatusUpdate {
                                cancelled_at: Some(Utc::now()),
                                ..Default::default()
                            },
                        )
                        .await
                }
            }
            _ => Err(AppError::Conflict("job already finished".to_string())),
        }
    }

    pub async fn retry(&self, job_id: Uuid) -> Result<ProcessingJob> {
        let new_queue_job_id = format!("retry-{}-{}", Utc::now().timestamp(), Uuid::new_v4());
        let job = self.store.retry_job(job_id, new_queue_job_id).await?;
        self.queue.enqueue(job.id)?;
        Ok(job)
    }

    /// Reconciles one job's DB record against whether a worker still holds
    /// its cancel token; an `active` job with no owning worker is abandoned.
    pub async fn sync_status(&self, job_id: Uuid) -> Result<ProcessingJob> {
        let job = self.get(job_id).await?;
        if job.status == JobStatus::Active && !self.active_tokens.contains_key(&job_id) {
            self.store
                .update_job_status(
                    job_id,
                    JobStatus::Failed,
                    JobStatusUpdate {
                        finished_at: Some(Utc::now()),
                        failed_reason: Some("Abandoned".to_string()),
                        ..Default::default()
                    },
                )
                .await?;
            return self.get(job_id).await;
        }
        Ok(job)
    }

    /// Finds every `active` job with no owning worker in this process and
    /// fails it with reason `Abandoned`; run once at boot to reclaim jobs
    /// orphaned by a worker-host crash.
    pub async fn fix_stuck(&self) -> Result<u64> {
        let active = self.store.list_jobs(Some(JobStatus::Active), None).await?;
        let mut fixed = 0;
        for job in active {
            if !self.active_tokens.contains_key(&job.id) {
                self.store
                    .update_job_status(
                        job.id,
                        JobStatus::Failed,
                        JobStatusUpdate {
                            finished_at: Some(Utc::now()),
                            failed_reason: Some("Abandoned".to_string()),
                            ..Default::default()
                        },
                    )
                    .await?;
                fixed += 1;
            }
        }
        Ok(fixed)
    }

    /// Deletes jobs in the given statuses; rejects any non-terminal status
    /// outright so housekeeping can never discard in-flight work.
    pub async fn clear(&self, statuses: &[JobStatus]) -> Result<u64> {
        let allowed: HashSet<JobStatus> = [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled]
            .into_iter()
            .collect();
        if statuses.iter().any(|s| !allowed.contains(s)) {
            return Err(AppError::BadRequest(
                "clear is only permitted for terminal statuses".to_string(),
            ));
        }
        self.store.delete_jobs(statuses).await
    }

    pub(crate) fn register_active(&self, job_id: Uuid) -> CancelToken {
        let token = CancelToken::new();
        self.active_tokens.insert(job_id, token.clone());
        token
    }

    pub(crate) fn unregister_active(&self, job_id: Uuid) {
        self.active_tokens.remove(&job_id);
    }
}
