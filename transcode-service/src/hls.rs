//! HLS Packager (C6): assembles and atomically republishes the per-owner
//! master playlist. Variant playlists themselves are produced as a side
//! effect of segmentation in the transcode engine.

use crate::models::{SubtitleTrack, VideoArtifact};
use crate::object_store::ObjectStoreClient;
use crate::error::Result;

pub fn master_playlist_key(owner_prefix: &str, base_name: &str) -> String {
    format!("{owner_prefix}/master_{base_name}.m3u8")
}

/// Object-store key for a variant playlist, owner-prefixed like every other
/// stored key. Used for `VideoArtifact::hls_playlist_key` and for uploads,
/// never written into the master playlist body itself (see
/// `variant_playlist_relative_uri`).
pub fn variant_playlist_key(owner_prefix: &str, base_name: &str, label: &str) -> String {
    format!("{owner_prefix}/hls_{label}_{base_name}/{label}_{base_name}.m3u8")
}

/// URI for a variant playlist *relative to the master playlist*, which lives
/// alongside it under the same owner prefix. The master must reference
/// variants this way (spec §4.6) — prefixing it with `owner_prefix` again
/// double-prefixes when a player resolves it against the master's own URL.
pub fn variant_playlist_relative_uri(base_name: &str, label: &str) -> String {
    format!("hls_{label}_{base_name}/{label}_{base_name}.m3u8")
}

/// Builds the master playlist body. `artifacts` should contain only the rungs
/// completed so far for this owner+name (a partial ladder is valid and
/// resumable); subtitles are resolution-independent and always listed in
/// full regardless of how many rungs exist.
pub fn build_master_playlist(
    base_name: &str,
    artifacts: &[VideoArtifact],
    subtitles: &[SubtitleTrack],
) -> String {
    let mut rungs: Vec<&VideoArtifact> = artifacts.iter().filter(|a| !a.is_trailer).collect();
    rungs.sort_by_key(|a| a.resolution.video_bitrate_kbps());

    let has_subtitles = !subtitles.is_empty();

    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");

    for track in subtitles {
        let default = if track.is_default { "YES" } else { "NO" };
        out.push_str(&format!(
            "#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID=\"subs\",LANGUAGE=\"{}\",NAME=\"{}\",DEFAULT={},URI=\"subtitles/{base_name}/{base_name}_{}.vtt\"\n",
            track.language, track.label, default, track.language,
        ));
    }

    for artifact in rungs {
        let (width, height) = artifact.resolution.standard_dimensions();
        let bandwidth = (artifact.resolution.video_bitrate_kbps() + artifact.resolution.audio_bitrate_kbps()) * 1000;
        let subtitles_attr = if has_subtitles { ",SUBTITLES=\"subs\"" } else { "" };
        out.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={bandwidth},RESOLUTION={width}x{height}{subtitles_attr}\n"
        ));
        out.push_str(&variant_playlist_relative_uri(base_name, artifact.resolution.label()));
        out.push('\n');
    }

    out
}

/// Rebuilds and atomically republishes the master playlist for one owner.
/// Called after every rung completes and after every subtitle upload.
pub async fn rebuild_master_playlist(
    object_store: &ObjectStoreClient,
    owner_prefix: &str,
    base_name: &str,
    artifacts: &[VideoArtifact],
    subtitles: &[SubtitleTrack],
) -> Result<()> {
    let body = build_master_playlist(base_name, artifacts, subtitles);
    let key = master_playlist_key(owner_prefix, base_name);
    object_store
        .put_bytes_atomic(&key, body.into_bytes(), "application/vnd.apple.mpegurl")
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;
    use crate::models::{Owner, Resolution};

    fn artifact(resolution: Resolution) -> VideoArtifact {
        VideoArtifact {
            id: Uuid::new_v4(),
            owner: Owner::Film { film_id: Uuid::new_v4() },
            name: format!("{}_movie.mp4", resolution.label()),
            url: "https://example.com/movie.mp4".to_string(),
            format: "video/mp4".to_string(),
            resolution,
            encoding: "h264".to_string(),
            size: "100 MB".to_string(),
            duration: 90.0,
            bitrate: format!("{} kbps", resolution.video_bitrate_kbps()),
            is_trailer: false,
            hls_playlist_key: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn variant_uri_in_master_is_relative_not_owner_prefixed() {
        let artifacts = vec![artifact(Resolution::Hd)];
        let playlist = build_master_playlist("movie", &artifacts, &[]);
        assert!(playlist.contains("hls_HD_movie/HD_movie.m3u8"));
        assert!(!playlist.contains("F1/hls_HD_movie"));
    }

    #[test]
    fn orders_rungs_by_ascending_bandwidth() {
        let artifacts = vec![artifact(Resolution::Fhd), artifact(Resolution::Sd), artifact(Resolution::Hd)];
        let playlist = build_master_playlist("movie", &artifacts, &[]);
        let sd_pos = playlist.find("RESOLUTION=854x480").unwrap();
        let hd_pos = playlist.find("RESOLUTION=1280x720").unwrap();
        let fhd_pos = playlist.find("RESOLUTION=1920x1080").unwrap();
        assert!(sd_pos < hd_pos && hd_pos < fhd_pos);
    }

    #[test]
    fn includes_subtitle_media_lines_and_attr() {
        let artifacts = vec![artifact(Resolution::Sd)];
        let subtitles = vec![SubtitleTrack {
            id: Uuid::new_v4(),
            owner: Owner::Film { film_id: Uuid::new_v4() },
            language: "en".to_string(),
            label: "English".to_string(),
            is_default: true,
            key: "subtitles/movie/movie_en.vtt".to_string(),
        }];
        let playlist = build_master_playlist("movie", &artifacts, &subtitles);
        assert!(playlist.contains("TYPE=SUBTITLES"));
        assert!(playlist.contains("DEFAULT=YES"));
        assert!(playlist.contains("SUBTITLES=\"subs\""));
    }

    #[test]
    fn omits_subtitles_attr_when_no_tracks() {
        let artifacts = vec![artifact(Resolution::Sd)];
        let playlist = build_master_playlist("movie", &artifacts, &[]);
        assert!(!playlist.contains("SUBTITLES="));
    }
}
