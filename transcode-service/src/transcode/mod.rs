//! Transcode Engine (C5): drives the external encoder to produce a ladder of
//! MP4s and HLS variants, one rung at a time.

mod ladder;
mod progress;

pub use ladder::plan;

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::error::{AppError, Result};
use crate::models::Resolution;

/// Local output of one completed rung: the encoded MP4 plus its HLS variant
/// playlist and segment directory, all still on local disk.
pub struct RungOutput {
    pub resolution: Resolution,
    pub mp4_path: PathBuf,
    pub hls_dir: PathBuf,
    pub playlist_path: PathBuf,
    pub width: u32,
    pub height: u32,
}

pub struct TranscodeEngine {
    ffmpeg_path: String,
    segment_duration_sec: u32,
    /// Gates the transcoder so only one encode runs at a time by default
    /// (`TRANSCODE_CONCURRENCY`), bounding CPU use across concurrent jobs.
    heavy_work: Arc<Semaphore>,
}

impl TranscodeEngine {
    pub fn new(ffmpeg_path: impl Into<String>, segment_duration_sec: u32, concurrency: usize) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            segment_duration_sec,
            heavy_work: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Encodes one rung to `{LABEL}_{name}.mp4` with faststart, then segments
    /// it into a variant HLS playlist. Progress is reported via `on_progress`
    /// as a 0-100 value merging both phases. On cancellation the encoder
    /// subprocess is terminated and partial outputs for this rung are
    /// deleted before returning `Cancelled`.
    pub async fn encode_rung(
        &self,
        source_path: &Path,
        source_duration_sec: f64,
        output_dir: &Path,
        base_name: &str,
        resolution: Resolution,
        source_width: u32,
        source_height: u32,
        cancel: &CancelToken,
        mut on_progress: impl FnMut(u8),
    ) -> Result<RungOutput> {
        let _permit = self
            .heavy_work
            .acquire()
            .await
            .map_err(|_| AppError::Internal("transcode semaphore closed".to_string()))?;

        let label = resolution.label();
        let mp4_path = output_dir.join(format!("{label}_{base_name}.mp4"));
        let hls_dir = output_dir.join(format!("hls_{label}_{base_name}"));
        let playlist_path = hls_dir.join(format!("{label}_{base_name}.m3u8"));

        let (out_width, out_height) = scaled_dimensions(source_width, source_height, resolution);

        if let Err(err) = self
            .run_encode(
                source_path,
                &mp4_path,
                resolution,
                source_duration_sec,
                cancel,
                &mut on_progress,
            )
            .await
        {
            cleanup_rung(&mp4_path, &hls_dir).await;
            return Err(err);
        }

        if cancel.is_cancelled() {
            cleanup_rung(&mp4_path, &hls_dir).await;
            return Err(AppError::Cancelled);
        }

        if let Err(err) = self
            .run_segment(&mp4_path, &hls_dir, &playlist_path, label, base_name)
            .await
        {
            cleanup_rung(&mp4_path, &hls_dir).await;
            return Err(err);
        }

        if cancel.is_cancelled() {
            cleanup_rung(&mp4_path, &hls_dir).await;
            return Err(AppError::Cancelled);
        }

        Ok(RungOutput {
            resolution,
            mp4_path,
            hls_dir,
            playlist_path,
            width: out_width,
            height: out_height,
        })
    }

    async fn run_encode(
        &self,
        source_path: &Path,
        dest_path: &Path,
        resolution: Resolution,
        source_duration_sec: f64,
        cancel: &CancelToken,
        on_progress: &mut impl FnMut(u8),
    ) -> Result<()> {
        let mut child = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(source_path)
            .arg("-vf")
            .arg(format!("scale=-2:{}", resolution.target_height()))
            .arg("-c:v")
            .arg("libx264")
            .arg("-b:v")
            .arg(format!("{}k", resolution.video_bitrate_kbps()))
            .arg("-c:a")
            .arg("aac")
            .arg("-b:a")
            .arg(format!("{}k", resolution.audio_bitrate_kbps()))
            .arg("-movflags")
            .arg("+faststart")
            .arg("-progress")
            .arg("pipe:1")
            .arg("-nostats")
            .arg(dest_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AppError::TranscodeFailure {
                resolution: resolution.label().to_string(),
                stage: format!("spawn: {e}"),
            })?;

        let stdout = child.stdout.take().expect("stdout piped");
        let mut lines = BufReader::new(stdout).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if let Some(elapsed) = progress::parse_progress_line(&line) {
                                on_progress(progress::percent(source_duration_sec, elapsed));
                            }
                            if progress::is_progress_end(&line) {
                                on_progress(100);
                            }
                        }
                        Ok(None) => break,
                        Err(_) => break,
                    }
                }
            }

            if cancel.is_cancelled() {
                child.kill().await.ok();
                return Err(AppError::Cancelled);
            }
        }

        let status = child.wait().await.map_err(|e| AppError::TranscodeFailure {
            resolution: resolution.label().to_string(),
            stage: format!("wait: {e}"),
        })?;

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        if !status.success() {
            return Err(AppError::TranscodeFailure {
                resolution: resolution.label().to_string(),
                stage: "encode".to_string(),
            });
        }

        Ok(())
    }

    async fn run_segment(
        &self,
        mp4_path: &Path,
        hls_dir: &Path,
        playlist_path: &Path,
        label: &str,
        base_name: &str,
    ) -> Result<()> {
        fs::create_dir_all(hls_dir).await?;

        let segment_pattern = hls_dir.join(format!("{label}_{base_name}_%03d.ts"));

        let status = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(mp4_path)
            .arg("-c")
            .arg("copy")
            .arg("-start_number")
            .arg("0")
            .arg("-hls_time")
            .arg(self.segment_duration_sec.to_string())
            .arg("-hls_list_size")
            .arg("0")
            .arg("-hls_segment_type")
            .arg("mpegts")
            .arg("-hls_segment_filename")
            .arg(&segment_pattern)
            .arg("-f")
            .arg("hls")
            .arg(playlist_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| AppError::TranscodeFailure {
                resolution: label.to_string(),
                stage: format!("segment spawn: {e}"),
            })?;

        if !status.success() {
            return Err(AppError::TranscodeFailure {
                resolution: label.to_string(),
                stage: "segment".to_string(),
            });
        }

        Ok(())
    }
}

fn scaled_dimensions(source_width: u32, source_height: u32, resolution: Resolution) -> (u32, u32) {
    let target_height = resolution.target_height();
    if source_height == 0 {
        return (0, target_height);
    }
    // even width, preserving aspect ratio, matching ffmpeg's `scale=-2:H`
    let width = ((source_width as f64) * (target_height as f64) / (source_height as f64)) as u32;
    (width - (width % 2), target_height)
}

async fn cleanup_rung(mp4_path: &Path, hls_dir: &Path) {
    fs::remove_file(mp4_path).await.ok();
    fs::remove_dir_all(hls_dir).await.ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_preserving_aspect_ratio() {
        let (w, h) = scaled_dimensions(1920, 1080, Resolution::Hd);
        assert_eq!(h, 720);
        assert_eq!(w, 1280);
    }
}
