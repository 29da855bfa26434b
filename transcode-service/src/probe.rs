//! Media Probe: extracts duration, resolution, bitrate, and codecs from a
//! reassembled source file via an external probing utility.

use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub duration_sec: f64,
    pub width: u32,
    pub height: u32,
    pub bitrate_bps: u64,
    pub video_codec: String,
    pub audio_codec: Option<String>,
    pub size_bytes: u64,
}

#[derive(Deserialize)]
struct FfprobeOutput {
    streams: Vec<FfprobeStream>,
    format: FfprobeFormat,
}

#[derive(Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    size: Option<String>,
}

pub struct MediaProbe {
    ffprobe_path: String,
}

impl MediaProbe {
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Runs `ffprobe -print_format json -show_format -show_streams` and parses
    /// the JSON report. Fails with `UnreadableMedia` if the input is not a
    /// decodable container or ffprobe exits non-zero.
    pub async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let output = Command::new(&self.ffprobe_path)
            .arg("-v")
            .arg("error")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg("-show_streams")
            .arg(path)
            .output()
            .await
            .map_err(|e| AppError::UnreadableMedia(format!("failed to spawn ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(AppError::UnreadableMedia(format!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| AppError::UnreadableMedia(format!("unparseable ffprobe output: {e}")))?;

        let video = parsed
            .streams
            .iter()
            .find(|s| s.codec_type == "video")
            .ok_or_else(|| AppError::UnreadableMedia("no video stream found".to_string()))?;

        let audio_codec = parsed
            .streams
            .iter()
            .find(|s| s.codec_type == "audio")
            .and_then(|s| s.codec_name.clone());

        let duration_sec: f64 = parsed
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse().ok())
            .ok_or_else(|| AppError::UnreadableMedia("missing duration".to_string()))?;

        let width = video
            .width
            .ok_or_else(|| AppError::UnreadableMedia("missing width".to_string()))?;
        let height = video
            .height
            .ok_or_else(|| AppError::UnreadableMedia("missing height".to_string()))?;

        let bitrate_bps = parsed
            .format
            .bit_rate
            .as_deref()
            .and_then(|b| b.parse().ok())
            .unwrap_or(0);

        let size_bytes = parsed
            .format
            .size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        Ok(MediaInfo {
            duration_sec,
            width,
            height,
            bitrate_bps,
            video_codec: video.codec_name.clone().unwrap_or_default(),
            audio_codec,
            size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ffprobe_json_shape() {
        let raw = r#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
                {"codec_type": "audio", "codec_name": "aac"}
            ],
            "format": {"duration": "90.045000", "bit_rate": "5000000", "size": "56250000"}
        }"#;
        let parsed: FfprobeOutput = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.streams[0].width, Some(1920));
        assert_eq!(parsed.format.duration.as_deref(), Some("90.045000"));
    }
}
