//! Upload surface: chunk ingestion, job creation from a completed chunk set,
//! trailer uploads (which skip the ladder), and subtitle attachment.

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chunk_store::ChunkStore;
use crate::error::{AppError, Result};
use crate::jobs::CreateJobSpec;
use crate::models::{JobType, Owner};
use crate::state::AppState;
use crate::subtitles::{self, UploadSubtitleInput};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadChunkResponse {
    pub chunk_path: String,
}

pub async fn upload_chunk(state: web::Data<AppState>, mut payload: Multipart) -> Result<HttpResponse> {
    let mut file_name: Option<String> = None;
    let mut start: Option<u64> = None;
    let mut data = Vec::new();

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| AppError::BadRequest(format!("multipart error: {e}")))?;
        match field.name() {
            Some("fileName") => file_name = Some(text_field(&mut field).await?),
            Some("start") => start = text_field(&mut field).await?.trim().parse::<u64>().ok(),
            Some("chunk") => data = read_field(&mut field).await?,
            _ => {}
        }
    }

    let file_name = file_name.ok_or_else(|| AppError::BadRequest("fileName is required".to_string()))?;
    let start = start.ok_or_else(|| AppError::BadRequest("start is required".to_string()))?;

    let chunk_path = state.chunk_store.save_chunk(&file_name, start, &data).await?;

    Ok(HttpResponse::Ok().json(UploadChunkResponse {
        chunk_path: chunk_path.to_string_lossy().to_string(),
    }))
}

async fn read_field(field: &mut actix_multipart::Field) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(format!("multipart read error: {e}")))?;
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

async fn text_field(field: &mut actix_multipart::Field) -> Result<String> {
    let bytes = read_field(field).await?;
    Ok(String::from_utf8_lossy(&bytes).to_string())
}

#[derive(Debug, Deserialize)]
pub struct CheckChunkQuery {
    #[serde(rename = "fileName")]
    pub file_name: String,
    pub start: u64,
}

#[derive(Debug, Serialize)]
pub struct CheckChunkResponse {
    pub exists: bool,
}

pub async fn check_upload_chunk(state: web::Data<AppState>, query: web::Query<CheckChunkQuery>) -> HttpResponse {
    let exists = state.chunk_store.has_chunk(&query.file_name, query.start).await;
    HttpResponse::Ok().json(CheckChunkResponse { exists })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub client_id: String,
    pub file_name: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub resource_id: Uuid,
    /// required when `type` is `episode`: the film the episode belongs to.
    pub film_id: Option<Uuid>,
    /// required when `type` is `episode`.
    pub season_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: Uuid,
}

/// Resolves the request's `(type, resourceId, filmId?, seasonId?)` into the
/// owner the job manager needs. A trailer belongs to the film directly, even
/// when the film is episodic — trailers are never tracked per-episode.
fn resolve_owner(req: &CompleteUploadRequest, job_type: JobType) -> Result<Owner> {
    match job_type {
        JobType::Episode => {
            let film_id = req
                .film_id
                .ok_or_else(|| AppError::BadRequest("filmId is required for episode uploads".to_string()))?;
            let season_id = req
                .season_id
                .ok_or_else(|| AppError::BadRequest("seasonId is required for episode uploads".to_string()))?;
            Ok(Owner::Episode {
                film_id,
                season_id,
                episode_id: req.resource_id,
            })
        }
        JobType::Film | JobType::Trailer => Ok(Owner::Film {
            film_id: req.resource_id,
        }),
    }
}

pub async fn complete_upload(state: web::Data<AppState>, body: web::Json<CompleteUploadRequest>) -> Result<HttpResponse> {
    let job_type = JobType::from_str(&body.job_type)
        .ok_or_else(|| AppError::BadRequest(format!("unknown upload type {}", body.job_type)))?;
    let owner = resolve_owner(&body, job_type)?;

    let job = state
        .job_manager
        .create(CreateJobSpec {
            job_type,
            owner,
            file_name: body.file_name.clone(),
            client_id: body.client_id.clone(),
        })
        .await?;

    Ok(HttpResponse::Ok().json(CreateJobResponse { job_id: job.id }))
}

pub async fn trailer_upload(state: web::Data<AppState>, body: web::Json<CompleteUploadRequest>) -> Result<HttpResponse> {
    let owner = resolve_owner(&body, JobType::Trailer)?;

    let job = state
        .job_manager
        .create(CreateJobSpec {
            job_type: JobType::Trailer,
            owner,
            file_name: body.file_name.clone(),
            client_id: body.client_id.clone(),
        })
        .await?;

    Ok(HttpResponse::Ok().json(CreateJobResponse { job_id: job.id }))
}

#[derive(Debug, Serialize)]
pub struct UploadSubtitleResponse {
    pub key: String,
}

pub async fn upload_subtitle(state: web::Data<AppState>, mut payload: Multipart) -> Result<HttpResponse> {
    let mut subtitle_bytes: Option<Vec<u8>> = None;
    let mut owner_kind: Option<String> = None;
    let mut film_id: Option<Uuid> = None;
    let mut season_id: Option<Uuid> = None;
    let mut resource_id: Option<Uuid> = None;
    let mut file_name: Option<String> = None;
    let mut language: Option<String> = None;
    let mut label: Option<String> = None;
    let mut is_default = false;

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| AppError::BadRequest(format!("multipart error: {e}")))?;
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "subtitleFile" => subtitle_bytes = Some(read_field(&mut field).await?),
            "owner" => owner_kind = Some(text_field(&mut field).await?),
            "filmId" => film_id = text_field(&mut field).await?.parse().ok(),
            "seasonId" => season_id = text_field(&mut field).await?.parse().ok(),
            "resourceId" => resource_id = text_field(&mut field).await?.parse().ok(),
            "fileName" => file_name = Some(text_field(&mut field).await?),
            "language" => language = Some(text_field(&mut field).await?),
            "label" => label = Some(text_field(&mut field).await?),
            "default" => is_default = text_field(&mut field).await?.trim() == "true",
            _ => {}
        }
    }

    let bytes = subtitle_bytes.ok_or_else(|| AppError::BadRequest("subtitleFile is required".to_string()))?;
    if bytes.len() > subtitles::MAX_SUBTITLE_BYTES {
        return Err(AppError::BadRequest(format!(
            "subtitle file exceeds {} bytes",
            subtitles::MAX_SUBTITLE_BYTES
        )));
    }
    let resource_id = resource_id.ok_or_else(|| AppError::BadRequest("resourceId is required".to_string()))?;
    let language = language.ok_or_else(|| AppError::BadRequest("language is required".to_string()))?;
    let label = label.unwrap_or_else(|| language.clone());
    let file_name = file_name.ok_or_else(|| AppError::BadRequest("fileName is required".to_string()))?;

    let owner = match owner_kind.as_deref() {
        Some("episode") => Owner::Episode {
            film_id: film_id.ok_or_else(|| AppError::BadRequest("filmId is required for episode subtitles".to_string()))?,
            season_id: season_id
                .ok_or_else(|| AppError::BadRequest("seasonId is required for episode subtitles".to_string()))?,
            episode_id: resource_id,
        },
        _ => Owner::Film { film_id: resource_id },
    };

    let base_name = ChunkStore::sanitize_name(&file_name);
    let track = subtitles::upload_subtitle(
        &state.object_store,
        UploadSubtitleInput {
            owner,
            base_name: base_name.clone(),
            language,
            label,
            is_default,
            bytes,
        },
    )
    .await?;

    let track = state.job_manager.store().upsert_subtitle(track).await?;

    let artifacts = state.job_manager.store().list_artifacts(&owner).await?;
    let subtitle_tracks = state.job_manager.store().list_subtitles(&owner).await?;
    crate::hls::rebuild_master_playlist(&state.object_store, &owner.prefix(), &base_name, &artifacts, &subtitle_tracks)
        .await?;

    Ok(HttpResponse::Ok().json(UploadSubtitleResponse { key: track.key }))
}
