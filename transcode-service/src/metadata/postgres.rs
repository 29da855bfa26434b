use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{JobStatusUpdate, MetadataStore};
use crate::error::{AppError, Result};
use crate::models::{JobStatus, JobType, Owner, ProcessingJob, SubtitleTrack, VideoArtifact};

pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct JobRow {
    id: Uuid,
    queue_job_id: String,
    status: String,
    job_type: String,
    owner: Json<Owner>,
    file_name: String,
    progress: i32,
    can_cancel: bool,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    failed_reason: Option<String>,
    retry_count: i32,
}

impl TryFrom<JobRow> for ProcessingJob {
    type Error = AppError;

    fn try_from(row: JobRow) -> Result<Self> {
        Ok(ProcessingJob {
            id: row.id,
            queue_job_id: row.queue_job_id,
            status: JobStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Internal(format!("unknown job status {}", row.status)))?,
            job_type: JobType::from_str(&row.job_type)
                .ok_or_else(|| AppError::Internal(format!("unknown job type {}", row.job_type)))?,
            owner: row.owner.0,
            file_name: row.file_name,
            progress: row.progress as u8,
            can_cancel: row.can_cancel,
            created_at: row.created_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
            cancelled_at: row.cancelled_at,
            failed_reason: row.failed_reason,
            retry_count: row.retry_count as u32,
        })
    }
}

#[derive(FromRow)]
struct ArtifactRow {
    id: Uuid,
    owner: Json<Owner>,
    name: String,
    url: String,
    format: String,
    resolution: String,
    encoding: String,
    size: String,
    duration: f64,
    bitrate: String,
    is_trailer: bool,
    hls_playlist_key: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ArtifactRow> for VideoArtifact {
    type Error = AppError;

    fn try_from(row: ArtifactRow) -> Result<Self> {
        Ok(VideoArtifact {
            id: row.id,
            owner: row.owner.0,
            name: row.name,
            url: row.url,
            format: row.format,
            resolution: crate::models::Resolution::from_label(&row.resolution)
                .ok_or_else(|| AppError::Internal(format!("unknown resolution {}", row.resolution)))?,
            encoding: row.encoding,
            size: row.size,
            duration: row.duration,
            bitrate: row.bitrate,
            is_trailer: row.is_trailer,
            hls_playlist_key: row.hls_playlist_key,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct SubtitleRow {
    id: Uuid,
    owner: Json<Owner>,
    language: String,
    label: String,
    is_default: bool,
    key: String,
}

impl From<SubtitleRow> for SubtitleTrack {
    fn from(row: SubtitleRow) -> Self {
        SubtitleTrack {
            id: row.id,
            owner: row.owner.0,
            language: row.language,
            label: row.label,
            is_default: row.is_default,
            key: row.key,
        }
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn create_job(&self, job: ProcessingJob) -> Result<ProcessingJob> {
        sqlx::query(
            "INSERT INTO processing_jobs \
             (id, queue_job_id, status, job_type, owner, file_name, progress, can_cancel, \
              created_at, started_at, finished_at, cancelled_at, failed_reason, retry_count) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(job.id)
        .bind(&job.queue_job_id)
        .bind(job.status.as_str())
        .bind(job.job_type.as_str())
        .bind(Json(&job.owner))
        .bind(&job.file_name)
        .bind(job.progress as i32)
        .bind(job.can_cancel)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(job.cancelled_at)
        .bind(&job.failed_reason)
        .bind(job.retry_count as i32)
        .execute(&self.pool)
        .await
        .map_err(map_job_write_error)?;

        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<ProcessingJob>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM processing_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        row.map(ProcessingJob::try_from).transpose()
    }

    async fn list_jobs(&self, status: Option<JobStatus>, job_type: Option<JobType>) -> Result<Vec<ProcessingJob>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM processing_jobs \
             WHERE ($1::text IS NULL OR status = $1) AND ($2::text IS NULL OR job_type = $2) \
             ORDER BY created_at DESC",
        )
        .bind(status.map(|s| s.as_str()))
        .bind(job_type.map(|t| t.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(ProcessingJob::try_from).collect()
    }

    async fn update_job_status(&self, id: Uuid, status: JobStatus, update: JobStatusUpdate) -> Result<()> {
        let result = sqlx::query(
            "UPDATE processing_jobs SET \
             status = $2, \
             queue_job_id = COALESCE($3, queue_job_id), \
             progress = COALESCE($4, progress), \
             started_at = COALESCE($5, started_at), \
             finished_at = COALESCE($6, finished_at), \
             cancelled_at = COALESCE($7, cancelled_at), \
             failed_reason = COALESCE($8, failed_reason), \
             retry_count = COALESCE($9, retry_count) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(update.queue_job_id)
        .bind(update.progress.map(|v| v as i32))
        .bind(update.started_at)
        .bind(update.finished_at)
        .bind(update.cancelled_at)
        .bind(update.failed_reason)
        .bind(update.retry_count.map(|v| v as i32))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("job {id}")));
        }
        Ok(())
    }

    async fn find_active_job(&self, resource_id: Uuid, job_type: JobType) -> Result<Option<ProcessingJob>> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM processing_jobs \
             WHERE job_type = $1 AND status NOT IN ('completed', 'failed', 'cancelled') \
             AND (owner->>'film_id' = $2::text OR owner->>'episode_id' = $2::text) \
             LIMIT 1",
        )
        .bind(job_type.as_str())
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        row.map(ProcessingJob::try_from).transpose()
    }

    async fn record_rung_complete(&self, job_id: Uuid, artifact: VideoArtifact, progress: u8) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        sqlx::query(
            "INSERT INTO video_artifacts \
             (id, owner, name, url, format, resolution, encoding, size, duration, bitrate, \
              is_trailer, hls_playlist_key, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(artifact.id)
        .bind(Json(&artifact.owner))
        .bind(&artifact.name)
        .bind(&artifact.url)
        .bind(&artifact.format)
        .bind(artifact.resolution.label())
        .bind(&artifact.encoding)
        .bind(&artifact.size)
        .bind(artifact.duration)
        .bind(&artifact.bitrate)
        .bind(artifact.is_trailer)
        .bind(&artifact.hls_playlist_key)
        .bind(artifact.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        sqlx::query("UPDATE processing_jobs SET progress = $2 WHERE id = $1")
            .bind(job_id)
            .bind(progress as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        tx.commit().await.map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    async fn list_artifacts(&self, owner: &Owner) -> Result<Vec<VideoArtifact>> {
        // Matches the full owner identity (kind + id tuple), not just
        // `film_id OR episode_id = resource_id` — an episode row carries its
        // parent's `film_id` too, so that predicate over-matches every
        // episode artifact into a Film owner's result set.
        let rows = sqlx::query_as::<_, ArtifactRow>(
            "SELECT * FROM video_artifacts WHERE owner = $1 ORDER BY resolution",
        )
        .bind(Json(owner))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(VideoArtifact::try_from).collect()
    }

    async fn get_artifact(&self, id: Uuid) -> Result<Option<VideoArtifact>> {
        let row = sqlx::query_as::<_, ArtifactRow>("SELECT * FROM video_artifacts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        row.map(VideoArtifact::try_from).transpose()
    }

    async fn upsert_subtitle(&self, track: SubtitleTrack) -> Result<SubtitleTrack> {
        // Same full-owner-identity match as `list_artifacts`/`list_subtitles`:
        // replaces the existing track for this exact owner+language, not
        // every row that happens to share a `film_id`.
        sqlx::query("DELETE FROM subtitle_tracks WHERE language = $1 AND owner = $2")
            .bind(&track.language)
            .bind(Json(&track.owner))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        sqlx::query(
            "INSERT INTO subtitle_tracks (id, owner, language, label, is_default, key) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(track.id)
        .bind(Json(&track.owner))
        .bind(&track.language)
        .bind(&track.label)
        .bind(track.is_default)
        .bind(&track.key)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(track)
    }

    async fn list_subtitles(&self, owner: &Owner) -> Result<Vec<SubtitleTrack>> {
        let rows = sqlx::query_as::<_, SubtitleRow>("SELECT * FROM subtitle_tracks WHERE owner = $1")
            .bind(Json(owner))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(SubtitleTrack::from).collect())
    }

    async fn retry_job(&self, job_id: Uuid, new_queue_job_id: String) -> Result<ProcessingJob> {
        let row = sqlx::query_as::<_, JobRow>(
            "UPDATE processing_jobs SET \
             status = 'waiting', queue_job_id = $2, progress = 0, failed_reason = NULL, \
             started_at = NULL, finished_at = NULL, cancelled_at = NULL, retry_count = retry_count + 1 \
             WHERE id = $1 AND status = 'failed' \
             RETURNING *",
        )
        .bind(job_id)
        .bind(new_queue_job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_job_write_error)?
        .ok_or_else(|| AppError::Conflict("only failed jobs can be retried".to_string()))?;

        ProcessingJob::try_from(row)
    }

    async fn delete_jobs(&self, statuses: &[JobStatus]) -> Result<u64> {
        let labels: Vec<&'static str> = statuses.iter().map(|s| s.as_str()).collect();
        let result = sqlx::query("DELETE FROM processing_jobs WHERE status = ANY($1)")
            .bind(&labels)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

/// Maps a write to `processing_jobs` that tripped
/// `idx_processing_jobs_active_uniqueness` to a `Conflict`, distinguishing it
/// from an ordinary database error so `JobManager::create` can re-resolve it
/// into `ExistingJob` instead of a generic 500.
fn map_job_write_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::Conflict("a non-terminal job already exists for this resource".to_string());
        }
    }
    AppError::DatabaseError(e.to_string())
}
