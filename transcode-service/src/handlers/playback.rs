//! Playback surface: byte-range MP4 streaming by artifact id, and HLS
//! playlist/segment/subtitle serving by object-store path.

use actix_web::{web, HttpRequest, HttpResponse};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::stream;

/// `GET /stream/{trackId}` — range-only; a missing `Range` header is a
/// caller error, not an omission this handler fills in.
pub async fn stream_track(state: web::Data<AppState>, path: web::Path<Uuid>, req: HttpRequest) -> Result<HttpResponse> {
    let artifact = state
        .job_manager
        .store()
        .get_artifact(path.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("video artifact".to_string()))?;

    let range_header = req
        .headers()
        .get(actix_web::http::header::RANGE)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::RangeNotSatisfiable)?;

    let key = format!("{}/{}", artifact.owner.prefix(), artifact.name);
    stream::stream_range(&state.object_store, &key, range_header).await
}

/// `GET /hls/{owner}/{path:.*}` — serves any playlist/segment/subtitle object
/// under an owner's prefix, e.g. `hls/{ownerPrefix}/master_movie.m3u8`.
pub async fn stream_hls(state: web::Data<AppState>, path: web::Path<(String, String)>) -> Result<HttpResponse> {
    let (owner, rest) = path.into_inner();
    let key = format!("{owner}/{rest}");
    stream::serve_hls_object(&state.object_store, &key).await
}
