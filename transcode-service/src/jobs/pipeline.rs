use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::chunk_store::ChunkStore;
use crate::cleanup;
use crate::error::AppError;
use crate::hls;
use crate::metadata::{JobStatusUpdate, MetadataStore};
use crate::models::{JobStatus, JobType, ProcessingJob, ProgressContent, ProgressEvent, Resolution, VideoArtifact};
use crate::object_store::ObjectStoreClient;
use crate::probe::MediaProbe;
use crate::progress_bus::ProgressBus;
use crate::transcode::{self, TranscodeEngine};

use super::JobManager;

/// Shared dependencies a worker needs to run a job end to end.
pub struct PipelineContext {
    pub store: Arc<dyn MetadataStore>,
    pub chunk_store: Arc<ChunkStore>,
    pub media_probe: Arc<MediaProbe>,
    pub transcode_engine: Arc<TranscodeEngine>,
    pub object_store: Arc<ObjectStoreClient>,
    pub progress_bus: Arc<ProgressBus>,
    pub upload_dir: PathBuf,
}

/// Runs one job to completion. Always leaves the job in a terminal state and
/// always clears its local scratch, regardless of how it ends.
pub async fn run_job(ctx: &PipelineContext, manager: &JobManager, job: ProcessingJob) {
    let token = manager.register_active(job.id);
    let base_name = ChunkStore::sanitize_name(&job.file_name);
    let client_id = job.queue_job_id.clone();

    if let Err(e) = ctx
        .store
        .update_job_status(
            job.id,
            JobStatus::Active,
            JobStatusUpdate {
                started_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await
    {
        error!(job_id = %job.id, error = %e, "failed to mark job active");
        manager.unregister_active(job.id);
        return;
    }

    let outcome = if job.job_type == JobType::Trailer {
        run_trailer(ctx, &job, &base_name, &client_id).await
    } else {
        run_ladder(ctx, &job, &base_name, &client_id, &token).await
    };

    cleanup::cleanup_local(&ctx.chunk_store, &ctx.upload_dir, &base_name).await;
    manager.unregister_active(job.id);

    let update = match outcome {
        Ok(()) => JobStatusUpdate {
            progress: Some(100),
            finished_at: Some(Utc::now()),
            ..Default::default()
        },
        Err(AppError::Cancelled) => JobStatusUpdate {
            cancelled_at: Some(Utc::now()),
            ..Default::default()
        },
        Err(e) => JobStatusUpdate {
            finished_at: Some(Utc::now()),
            failed_reason: Some(e.to_string()),
            ..Default::default()
        },
    };

    let status = match update.failed_reason {
        Some(_) => JobStatus::Failed,
        None if update.cancelled_at.is_some() => JobStatus::Cancelled,
        None => JobStatus::Completed,
    };

    if let Err(e) = ctx.store.update_job_status(job.id, status, update).await {
        error!(job_id = %job.id, error = %e, "failed to write terminal job status");
    }

    crate::metrics::JOBS_TOTAL
        .with_label_values(&[job.job_type.as_str(), status.as_str()])
        .inc();
    let elapsed = (Utc::now() - job.created_at).num_milliseconds().max(0) as f64 / 1000.0;
    crate::metrics::JOB_DURATION_SECONDS
        .with_label_values(&[job.job_type.as_str()])
        .observe(elapsed);

    info!(job_id = %job.id, status = status.as_str(), "job finished");
}

async fn run_trailer(
    ctx: &PipelineContext,
    job: &ProcessingJob,
    base_name: &str,
    client_id: &str,
) -> crate::error::Result<()> {
    let combined_path = ctx.chunk_store.combine(base_name).await?;
    let info = ctx.media_probe.probe(&combined_path).await?;

    let owner_prefix = job.owner.prefix();
    let key = format!("{owner_prefix}/{base_name}.mp4");
    let put = ctx
        .object_store
        .put_multipart(&key, &combined_path, "video/mp4")
        .await?;

    let artifact = VideoArtifact {
        id: uuid::Uuid::new_v4(),
        owner: job.owner,
        name: format!("{base_name}.mp4"),
        url: put.url,
        format: "video/mp4".to_string(),
        resolution: Resolution::Hd,
        encoding: info.video_codec.clone(),
        size: format!("{} bytes", info.size_bytes),
        duration: info.duration_sec,
        bitrate: format!("{} bps", info.bitrate_bps),
        is_trailer: true,
        hls_playlist_key: None,
        created_at: Utc::now(),
    };

    ctx.store.record_rung_complete(job.id, artifact, 100).await?;
    ctx.progress_bus.emit(ProgressEvent {
        client_id: client_id.to_string(),
        progress: 100,
        content: ProgressContent::Trailer,
    });
    Ok(())
}

async fn run_ladder(
    ctx: &PipelineContext,
    job: &ProcessingJob,
    base_name: &str,
    client_id: &str,
    token: &crate::cancel::CancelToken,
) -> crate::error::Result<()> {
    let combined_path = ctx.chunk_store.combine(base_name).await?;
    let info = ctx.media_probe.probe(&combined_path).await?;

    let owner_prefix = job.owner.prefix();
    let existing: Vec<VideoArtifact> = ctx.store.list_artifacts(&job.owner).await?;
    let existing_resolutions: HashSet<Resolution> = existing
        .iter()
        .filter(|a| !a.is_trailer)
        .map(|a| a.resolution)
        .collect();

    let plan = transcode::plan(info.height, &existing_resolutions);
    if plan.is_empty() {
        warn!(job_id = %job.id, "nothing to do, ladder already complete for source height");
    }

    for resolution in plan {
        if token.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let transcode_client_id = client_id.to_string();
        let bus = ctx.progress_bus.clone();
        let rung = match ctx
            .transcode_engine
            .encode_rung(
                &combined_path,
                info.duration_sec,
                &ctx.upload_dir,
                base_name,
                resolution,
                info.width,
                info.height,
                token,
                move |progress| {
                    bus.emit(ProgressEvent {
                        client_id: transcode_client_id.clone(),
                        progress,
                        content: ProgressContent::Transcode {
                            resolution: Some(resolution),
                        },
                    });
                },
            )
            .await
        {
            Ok(rung) => rung,
            Err(e) => {
                if matches!(e, AppError::TranscodeFailure { .. }) {
                    crate::metrics::RUNG_FAILURES_TOTAL
                        .with_label_values(&[resolution.label()])
                        .inc();
                }
                return Err(e);
            }
        };

        let mp4_key = format!("{owner_prefix}/{}_{base_name}.mp4", resolution.label());
        let put = ctx
            .object_store
            .put_multipart(&mp4_key, &rung.mp4_path, "video/mp4")
            .await?;

        emit_upload_progress(ctx, client_id, 50);
        upload_hls_dir(ctx, &rung.hls_dir, &owner_prefix, resolution.label(), base_name).await?;
        emit_upload_progress(ctx, client_id, 100);

        let playlist_key = hls::variant_playlist_key(&owner_prefix, base_name, resolution.label());

        let artifact = VideoArtifact {
            id: uuid::Uuid::new_v4(),
            owner: job.owner,
            name: format!("{}_{base_name}.mp4", resolution.label()),
            url: put.url,
            format: "video/mp4".to_string(),
            resolution,
            encoding: info.video_codec.clone(),
            size: String::new(),
            duration: info.duration_sec,
            bitrate: format!("{} kbps", resolution.video_bitrate_kbps()),
            is_trailer: false,
            hls_playlist_key: Some(playlist_key),
            created_at: Utc::now(),
        };

        let progress = rung_progress(resolution);
        ctx.store.record_rung_complete(job.id, artifact, progress).await?;

        let all_artifacts = ctx.store.list_artifacts(&job.owner).await?;
        let subtitles = ctx.store.list_subtitles(&job.owner).await?;
        hls::rebuild_master_playlist(&ctx.object_store, &owner_prefix, base_name, &all_artifacts, &subtitles).await?;
    }

    Ok(())
}

/// Emits a `type:"upload"` progress event (section 6's event schema) for the
/// rung's MP4 + HLS segment upload phase. `progress` is the percentage
/// across that phase alone, not the whole ladder.
fn emit_upload_progress(ctx: &PipelineContext, client_id: &str, progress: u8) {
    ctx.progress_bus.emit(ProgressEvent {
        client_id: client_id.to_string(),
        progress,
        content: ProgressContent::Upload,
    });
}

async fn upload_hls_dir(
    ctx: &PipelineContext,
    hls_dir: &std::path::Path,
    owner_prefix: &str,
    label: &str,
    base_name: &str,
) -> crate::error::Result<()> {
    let mut entries = tokio::fs::read_dir(hls_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let content_type = if file_name.ends_with(".m3u8") {
            "application/vnd.apple.mpegurl"
        } else {
            "video/mp2t"
        };
        let key = format!("{owner_prefix}/hls_{label}_{base_name}/{file_name}");
        ctx.object_store.put_multipart(&key, &path, content_type).await?;
    }
    Ok(())
}

/// Percentage across the whole ladder once this rung completes, assuming an
/// even split across the four possible rungs.
fn rung_progress(resolution: Resolution) -> u8 {
    match resolution {
        Resolution::Sd => 25,
        Resolution::Hd => 50,
        Resolution::Fhd => 75,
        Resolution::Uhd => 100,
    }
}
