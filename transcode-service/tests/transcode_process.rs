//! Process-level coverage for the probe/transcode external-command boundary:
//! a fake `ffprobe` and `ffmpeg` stand in for the real binaries so these run
//! without either installed, exercising both the happy paths and the
//! failure/cancellation branches that shell out to a real subprocess.

mod common;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use media_service::cancel::CancelToken;
use media_service::error::AppError;
use media_service::models::Resolution;
use media_service::probe::MediaProbe;
use media_service::transcode::TranscodeEngine;

#[tokio::test]
async fn probe_parses_fake_ffprobe_output() {
    let dir = common::scratch_dir("probe-ok");
    let ffprobe = common::fake_ffprobe(&dir, 1920, 1080, 90.0);
    let source = dir.join("source.mp4");
    std::fs::write(&source, b"not a real video").unwrap();

    let probe = MediaProbe::new(ffprobe.to_string_lossy().to_string());
    let info = probe.probe(&source).await.unwrap();

    assert_eq!(info.width, 1920);
    assert_eq!(info.height, 1080);
    assert_eq!(info.duration_sec, 90.0);
    assert_eq!(info.video_codec, "h264");
    assert_eq!(info.audio_codec.as_deref(), Some("aac"));
}

#[tokio::test]
async fn probe_surfaces_unreadable_media_on_nonzero_exit() {
    let dir = common::scratch_dir("probe-fail");
    let ffprobe = common::fake_ffprobe_failing(&dir);
    let source = dir.join("garbage.bin");
    std::fs::write(&source, b"garbage").unwrap();

    let probe = MediaProbe::new(ffprobe.to_string_lossy().to_string());
    let err = probe.probe(&source).await.unwrap_err();
    assert!(matches!(err, AppError::UnreadableMedia(_)));
}

#[tokio::test]
async fn encode_rung_produces_mp4_and_hls_outputs() {
    let dir = common::scratch_dir("encode-ok");
    let ffmpeg = common::fake_ffmpeg(&dir, 0);
    let source = dir.join("source.mp4");
    std::fs::write(&source, b"not a real video").unwrap();
    let output_dir = dir.join("out");
    std::fs::create_dir_all(&output_dir).unwrap();

    let engine = TranscodeEngine::new(ffmpeg.to_string_lossy().to_string(), 2, 1);
    let cancel = CancelToken::new();
    let last_progress = Arc::new(AtomicU8::new(0));
    let last_progress_cb = last_progress.clone();

    let rung = engine
        .encode_rung(
            &source,
            90.0,
            &output_dir,
            "movie.mp4",
            Resolution::Hd,
            1920,
            1080,
            &cancel,
            move |p| last_progress_cb.store(p, Ordering::SeqCst),
        )
        .await
        .unwrap();

    assert_eq!(rung.resolution, Resolution::Hd);
    assert_eq!(rung.width, 1280);
    assert_eq!(rung.height, 720);
    assert!(Path::new(&rung.mp4_path).exists(), "mp4 output should exist");
    assert!(Path::new(&rung.playlist_path).exists(), "hls playlist should exist");
    assert_eq!(last_progress.load(Ordering::SeqCst), 100);
}

#[tokio::test]
async fn encode_rung_fails_and_cleans_up_on_encoder_crash() {
    let dir = common::scratch_dir("encode-fail");
    let ffmpeg = common::fake_ffmpeg_failing(&dir);
    let source = dir.join("source.mp4");
    std::fs::write(&source, b"not a real video").unwrap();
    let output_dir = dir.join("out");
    std::fs::create_dir_all(&output_dir).unwrap();

    let engine = TranscodeEngine::new(ffmpeg.to_string_lossy().to_string(), 2, 1);
    let cancel = CancelToken::new();

    let err = engine
        .encode_rung(
            &source,
            90.0,
            &output_dir,
            "movie.mp4",
            Resolution::Sd,
            1920,
            1080,
            &cancel,
            |_| {},
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::TranscodeFailure { .. }));
    let mp4_path = output_dir.join("SD_movie.mp4.mp4");
    assert!(!mp4_path.exists());
}

#[tokio::test]
async fn encode_rung_honors_cancellation_mid_encode() {
    let dir = common::scratch_dir("encode-cancel");
    // A 400ms sleep between progress lines gives the canceller a window to
    // flip the flag before the encode's `child.wait()` returns.
    let ffmpeg = common::fake_ffmpeg(&dir, 400);
    let source = dir.join("source.mp4");
    std::fs::write(&source, b"not a real video").unwrap();
    let output_dir = dir.join("out");
    std::fs::create_dir_all(&output_dir).unwrap();

    let engine = Arc::new(TranscodeEngine::new(ffmpeg.to_string_lossy().to_string(), 2, 1));
    let cancel = CancelToken::new();

    let encode_cancel = cancel.clone();
    let engine_for_task = engine.clone();
    let source = source.clone();
    let output_dir_for_task = output_dir.clone();
    let handle = tokio::spawn(async move {
        engine_for_task
            .encode_rung(
                &source,
                90.0,
                &output_dir_for_task,
                "movie.mp4",
                Resolution::Fhd,
                1920,
                1080,
                &encode_cancel,
                |_| {},
            )
            .await
    });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    cancel.cancel();

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, AppError::Cancelled));

    let mp4_path = output_dir.join("FHD_movie.mp4.mp4");
    let hls_dir = output_dir.join("hls_FHD_movie.mp4");
    assert!(!mp4_path.exists(), "partial mp4 should be cleaned up");
    assert!(!hls_dir.exists(), "partial hls dir should be cleaned up");
}
