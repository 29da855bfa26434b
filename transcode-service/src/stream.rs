//! Stream Server (C10): serves byte-range MP4 requests and HLS
//! playlist/segment/subtitle requests straight out of the object store.

use actix_web::http::header::{CacheControl, CacheDirective, HeaderValue};
use actix_web::HttpResponse;

use crate::error::{AppError, Result};
use crate::object_store::ObjectStoreClient;

pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

/// Parses a single `Range: bytes=a-b` header, clamping `end` to
/// `content_length - 1` and rejecting anything that doesn't describe a
/// non-empty, in-bounds span.
pub fn parse_range(header: &str, content_length: u64) -> Result<ByteRange> {
    let spec = header
        .strip_prefix("bytes=")
        .ok_or(AppError::RangeNotSatisfiable)?;
    // Only a single range is supported; multi-range requests are rejected.
    let spec = spec.split(',').next().unwrap_or(spec).trim();
    let (start_str, end_str) = spec.split_once('-').ok_or(AppError::RangeNotSatisfiable)?;

    if content_length == 0 {
        return Err(AppError::RangeNotSatisfiable);
    }

    let (start, end) = if start_str.is_empty() {
        // suffix range: `bytes=-N` means the last N bytes
        let suffix_len: u64 = end_str.parse().map_err(|_| AppError::RangeNotSatisfiable)?;
        if suffix_len == 0 {
            return Err(AppError::RangeNotSatisfiable);
        }
        let start = content_length.saturating_sub(suffix_len);
        (start, content_length - 1)
    } else {
        let start: u64 = start_str.parse().map_err(|_| AppError::RangeNotSatisfiable)?;
        let end: u64 = if end_str.is_empty() {
            content_length - 1
        } else {
            end_str.parse().map_err(|_| AppError::RangeNotSatisfiable)?
        };
        (start, end.min(content_length - 1))
    };

    if start > end || start >= content_length {
        return Err(AppError::RangeNotSatisfiable);
    }

    Ok(ByteRange { start, end })
}

/// Serves a `206 Partial Content` response for one ranged GET against an
/// object-store key. Callers must have already validated a `Range` header is
/// present — the server is range-only (section 4.10): absent headers are a
/// caller-level `416`, not this function's concern.
pub async fn stream_range(
    object_store: &ObjectStoreClient,
    key: &str,
    range_header: &str,
) -> Result<HttpResponse> {
    let head = object_store.head(key).await?;
    let range = parse_range(range_header, head.content_length)?;

    let body = object_store.get_range(key, range.start, range.end).await?;

    Ok(HttpResponse::PartialContent()
        .insert_header((
            "Content-Range",
            format!("bytes {}-{}/{}", range.start, range.end, head.content_length),
        ))
        .insert_header(("Accept-Ranges", "bytes"))
        .content_type(head.content_type)
        .body(body))
}

/// Content type for an HLS-family key, inferred from its extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    if key.ends_with(".m3u8") {
        "application/vnd.apple.mpegurl"
    } else if key.ends_with(".ts") {
        "video/mp2t"
    } else if key.ends_with(".vtt") {
        "text/vtt"
    } else {
        "application/octet-stream"
    }
}

/// Master and variant playlists mutate as the ladder builds, so they get a
/// short cache lifetime; segments and subtitles are immutable once written.
fn cache_control_for_key(key: &str) -> CacheControl {
    if key.ends_with(".m3u8") {
        CacheControl(vec![CacheDirective::MaxAge(5), CacheDirective::NoCache])
    } else {
        CacheControl(vec![
            CacheDirective::Public,
            CacheDirective::MaxAge(31_536_000),
            CacheDirective::Extension("immutable".to_string(), None),
        ])
    }
}

/// Serves a playlist/segment/subtitle object in full, with the content type
/// and cache policy appropriate to its key.
pub async fn serve_hls_object(object_store: &ObjectStoreClient, key: &str) -> Result<HttpResponse> {
    let head = object_store.head(key).await?;
    let body = object_store.get_range(key, 0, head.content_length.saturating_sub(1)).await?;

    Ok(HttpResponse::Ok()
        .content_type(content_type_for_key(key))
        .insert_header((
            actix_web::http::header::CACHE_CONTROL,
            HeaderValue::from_str(&cache_control_for_key(key).to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("no-cache")),
        ))
        .body(body))
}
