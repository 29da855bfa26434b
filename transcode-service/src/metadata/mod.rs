//! Metadata Façade (C14): abstracts the external relational store behind a
//! trait so the pipeline logic never depends on `sqlx` directly.

mod memory;
mod postgres;

pub use memory::InMemoryMetadataStore;
pub use postgres::PgMetadataStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{JobStatus, JobType, Owner, ProcessingJob, SubtitleTrack, VideoArtifact};

/// Fields that may change on a job-status transition. `None` leaves the
/// column untouched.
#[derive(Debug, Clone, Default)]
pub struct JobStatusUpdate {
    pub queue_job_id: Option<String>,
    pub progress: Option<u8>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub failed_reason: Option<String>,
    pub retry_count: Option<u32>,
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn create_job(&self, job: ProcessingJob) -> Result<ProcessingJob>;
    async fn get_job(&self, id: Uuid) -> Result<Option<ProcessingJob>>;
    async fn list_jobs(&self, status: Option<JobStatus>, job_type: Option<JobType>) -> Result<Vec<ProcessingJob>>;
    async fn update_job_status(&self, id: Uuid, status: JobStatus, update: JobStatusUpdate) -> Result<()>;
    async fn find_active_job(&self, resource_id: Uuid, job_type: JobType) -> Result<Option<ProcessingJob>>;

    /// Inserts the rung's artifact row and bumps the job's progress as one
    /// atomic step, so the metadata store and the object-store state
    /// referenced by the artifact never disagree about which rungs exist.
    async fn record_rung_complete(&self, job_id: Uuid, artifact: VideoArtifact, progress: u8) -> Result<()>;
    async fn list_artifacts(&self, owner: &Owner) -> Result<Vec<VideoArtifact>>;
    /// Resolves a `trackId` (an artifact id) to its record for the stream server.
    async fn get_artifact(&self, id: Uuid) -> Result<Option<VideoArtifact>>;

    async fn upsert_subtitle(&self, track: SubtitleTrack) -> Result<SubtitleTrack>;
    async fn list_subtitles(&self, owner: &Owner) -> Result<Vec<SubtitleTrack>>;

    /// Resets a failed job to `waiting` under a fresh queue id, clearing
    /// `failedReason` and timestamps. Only valid on a job that is `failed`.
    async fn retry_job(&self, job_id: Uuid, new_queue_job_id: String) -> Result<ProcessingJob>;

    /// Deletes jobs in the given (terminal-only) statuses; callers must not
    /// pass a non-terminal status.
    async fn delete_jobs(&self, statuses: &[JobStatus]) -> Result<u64>;
}
