//! Subtitle Manager (C7): validates and stores resolution-independent WebVTT
//! tracks, keyed by `(owner, language)` so re-uploads replace in place.

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Owner, SubtitleTrack};
use crate::object_store::ObjectStoreClient;

pub const MAX_SUBTITLE_BYTES: usize = 5 * 1024 * 1024;

pub fn subtitle_key(base_name: &str, language: &str) -> String {
    format!("subtitles/{base_name}/{base_name}_{language}.vtt")
}

/// Rejects anything whose first non-blank line isn't `WEBVTT`.
pub fn validate_vtt(bytes: &[u8]) -> Result<()> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| AppError::BadRequest("subtitle file is not valid UTF-8".to_string()))?;

    let first_line = text.lines().find(|line| !line.trim().is_empty()).unwrap_or("");
    if first_line.trim_start_matches('\u{feff}').trim() != "WEBVTT" {
        return Err(AppError::BadRequest(
            "subtitle file must start with WEBVTT".to_string(),
        ));
    }
    Ok(())
}

pub struct UploadSubtitleInput {
    pub owner: Owner,
    /// sanitized file name shared by every rung of this owner's ladder.
    pub base_name: String,
    pub language: String,
    pub label: String,
    pub is_default: bool,
    pub bytes: Vec<u8>,
}

/// Validates and uploads one subtitle track. Callers are responsible for
/// persisting the returned `SubtitleTrack` (replacing any existing track for
/// the same owner+language) and triggering a master-playlist rebuild.
pub async fn upload_subtitle(
    object_store: &ObjectStoreClient,
    input: UploadSubtitleInput,
) -> Result<SubtitleTrack> {
    if input.bytes.len() > MAX_SUBTITLE_BYTES {
        return Err(AppError::BadRequest(format!(
            "subtitle file exceeds {MAX_SUBTITLE_BYTES} bytes"
        )));
    }
    validate_vtt(&input.bytes)?;

    let key = subtitle_key(&input.base_name, &input.language);
    object_store.put_bytes(&key, input.bytes, "text/vtt").await?;

    Ok(SubtitleTrack {
        id: Uuid::new_v4(),
        owner: input.owner,
        language: input.language,
        label: input.label,
        is_default: input.is_default,
        key,
    })
}
