use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{JobStatusUpdate, MetadataStore};
use crate::error::{AppError, Result};
use crate::models::{JobStatus, JobType, Owner, ProcessingJob, SubtitleTrack, VideoArtifact};

/// Mutex-guarded in-memory backing for unit and integration tests that don't
/// want a real database.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    jobs: Mutex<HashMap<Uuid, ProcessingJob>>,
    artifacts: Mutex<HashMap<Uuid, VideoArtifact>>,
    subtitles: Mutex<HashMap<(Uuid, String), SubtitleTrack>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn create_job(&self, job: ProcessingJob) -> Result<ProcessingJob> {
        let mut jobs = self.jobs.lock().unwrap();
        // Mirrors `idx_processing_jobs_active_uniqueness`: the single lock
        // acquisition makes this check-and-insert atomic, so two racing
        // `create` calls for the same (resource, type) can't both succeed.
        let conflict = jobs.values().any(|j| {
            j.owner.resource_id() == job.owner.resource_id() && j.job_type == job.job_type && !j.status.is_terminal()
        });
        if conflict {
            return Err(AppError::Conflict(
                "a non-terminal job already exists for this resource".to_string(),
            ));
        }
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<ProcessingJob>> {
        Ok(self.jobs.lock().unwrap().get(&id).cloned())
    }

    async fn list_jobs(&self, status: Option<JobStatus>, job_type: Option<JobType>) -> Result<Vec<ProcessingJob>> {
        let jobs = self.jobs.lock().unwrap();
        let mut out: Vec<ProcessingJob> = jobs
            .values()
            .filter(|j| status.map_or(true, |s| j.status == s))
            .filter(|j| job_type.map_or(true, |t| j.job_type == t))
            .cloned()
            .collect();
        out.sort_by_key(|j| j.created_at);
        Ok(out)
    }

    async fn update_job_status(&self, id: Uuid, status: JobStatus, update: JobStatusUpdate) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("job {id}")))?;
        job.status = status;
        if let Some(v) = update.queue_job_id {
            job.queue_job_id = v;
        }
        if let Some(v) = update.progress {
            job.progress = v;
        }
        if update.started_at.is_some() {
            job.started_at = update.started_at;
        }
        if update.finished_at.is_some() {
            job.finished_at = update.finished_at;
        }
        if update.cancelled_at.is_some() {
            job.cancelled_at = update.cancelled_at;
        }
        if update.failed_reason.is_some() {
            job.failed_reason = update.failed_reason;
        }
        if let Some(v) = update.retry_count {
            job.retry_count = v;
        }
        Ok(())
    }

    async fn find_active_job(&self, resource_id: Uuid, job_type: JobType) -> Result<Option<ProcessingJob>> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .values()
            .find(|j| {
                j.owner.resource_id() == resource_id && j.job_type == job_type && !j.status.is_terminal()
            })
            .cloned())
    }

    async fn record_rung_complete(&self, job_id: Uuid, artifact: VideoArtifact, progress: u8) -> Result<()> {
        self.artifacts.lock().unwrap().insert(artifact.id, artifact);
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(&job_id) {
            job.progress = progress;
        }
        Ok(())
    }

    async fn list_artifacts(&self, owner: &Owner) -> Result<Vec<VideoArtifact>> {
        let artifacts = self.artifacts.lock().unwrap();
        let mut out: Vec<VideoArtifact> = artifacts
            .values()
            .filter(|a| a.owner == *owner)
            .cloned()
            .collect();
        out.sort_by_key(|a| a.resolution);
        Ok(out)
    }

    async fn get_artifact(&self, id: Uuid) -> Result<Option<VideoArtifact>> {
        Ok(self.artifacts.lock().unwrap().get(&id).cloned())
    }

    async fn upsert_subtitle(&self, track: SubtitleTrack) -> Result<SubtitleTrack> {
        let mut subtitles = self.subtitles.lock().unwrap();
        subtitles.insert((track.owner.resource_id(), track.language.clone()), track.clone());
        Ok(track)
    }

    async fn list_subtitles(&self, owner: &Owner) -> Result<Vec<SubtitleTrack>> {
        let subtitles = self.subtitles.lock().unwrap();
        Ok(subtitles
            .values()
            .filter(|s| s.owner == *owner)
            .cloned()
            .collect())
    }

    async fn retry_job(&self, job_id: Uuid, new_queue_job_id: String) -> Result<ProcessingJob> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))?;
        if job.status != JobStatus::Failed {
            return Err(AppError::Conflict("only failed jobs can be retried".to_string()));
        }
        job.status = JobStatus::Waiting;
        job.queue_job_id = new_queue_job_id;
        job.progress = 0;
        job.failed_reason = None;
        job.started_at = None;
        job.finished_at = None;
        job.cancelled_at = None;
        job.retry_count += 1;
        Ok(job.clone())
    }

    async fn delete_jobs(&self, statuses: &[JobStatus]) -> Result<u64> {
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|_, j| !statuses.contains(&j.status));
        Ok((before - jobs.len()) as u64)
    }
}
