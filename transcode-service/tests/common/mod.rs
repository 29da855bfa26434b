//! Shared integration-test scaffolding: a throwaway scratch directory per
//! test, a `Config` that never touches a real object store, and fake
//! `ffmpeg`/`ffprobe` shell scripts standing in for the real binaries.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use media_service::config::{
    AppConfig, ConcurrencyConfig, Config, CorsConfig, DatabaseConfig, FfmpegConfig,
    ObjectStoreConfig, UploadConfig,
};
use media_service::metadata::{InMemoryMetadataStore, MetadataStore};
use media_service::state::{self, AppState, Bootstrap};

/// A fresh directory under the OS temp root, removed by nothing in
/// particular — integration runs are disposable, matching the crate's own
/// unit-test helper in `chunk_store.rs`.
pub fn scratch_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("media-service-{prefix}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// A `Config` pointed at a local scratch upload dir and an object-store
/// endpoint that is never reachable. Tests that only exercise the upload,
/// job-management, or process-orchestration surface never call
/// `ObjectStoreClient::send`, so the unreachable endpoint is never dialed.
pub fn test_config(upload_dir: &Path) -> Config {
    Config {
        app: AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            env: "test".to_string(),
        },
        cors: CorsConfig {
            allowed_origins: vec!["*".to_string()],
        },
        database: DatabaseConfig {
            url: "postgresql://unused/test".to_string(),
            max_connections: 1,
        },
        object_store: ObjectStoreConfig {
            endpoint: Some("http://127.0.0.1:1".to_string()),
            access_key: "test-access-key".to_string(),
            secret_key: "test-secret-key".to_string(),
            region: "us-east-1".to_string(),
            bucket: "test-bucket".to_string(),
        },
        upload: UploadConfig {
            dir: upload_dir.to_string_lossy().to_string(),
            segment_duration_sec: 2,
        },
        concurrency: ConcurrencyConfig {
            transcode_concurrency: 1,
            queue_concurrency: 1,
            queue_depth_limit: 8,
        },
        ffmpeg: FfmpegConfig {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        },
    }
}

/// Bootstraps a full `AppState` against an `InMemoryMetadataStore`, the
/// same wiring `main.rs` does against Postgres.
pub async fn build_state(upload_dir: &Path) -> (Arc<AppState>, Bootstrap) {
    let config = test_config(upload_dir);
    let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
    let (bootstrap, _queue_rx) = state::bootstrap(config, store).await;
    (bootstrap.state.clone(), bootstrap)
}

/// Writes an executable `/bin/sh` script to `dir/name` and returns its path.
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "#!/bin/sh").unwrap();
    file.write_all(body.as_bytes()).unwrap();
    drop(file);
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// A fake `ffmpeg`: whatever the real binary would have been asked to
/// produce, this touches the last positional argument (the output path for
/// both the encode and segment invocations) and, for the `-progress pipe:1`
/// encode phase, emits a couple of progress lines before exiting. `delay_ms`
/// lets cancellation tests get a window to flip the cancel flag mid-run.
pub fn fake_ffmpeg(dir: &Path, delay_ms: u64) -> PathBuf {
    write_script(
        dir,
        "fake-ffmpeg",
        &format!(
            r#"
out=""
for arg in "$@"; do out="$arg"; done
case "$*" in
  *"-progress pipe:1"*)
    echo "out_time_ms=500000"
    sleep {delay}
    echo "out_time_ms=2000000"
    echo "progress=end"
    ;;
esac
touch "$out"
exit 0
"#,
            delay = (delay_ms as f64) / 1000.0
        ),
    )
}

/// A fake `ffmpeg` that always exits non-zero, simulating an encoder crash.
pub fn fake_ffmpeg_failing(dir: &Path) -> PathBuf {
    write_script(dir, "fake-ffmpeg-fail", "echo 'encode error' 1>&2\nexit 1\n")
}

/// A fake `ffprobe` that ignores its arguments and prints a fixed JSON report.
pub fn fake_ffprobe(dir: &Path, width: u32, height: u32, duration_sec: f64) -> PathBuf {
    write_script(
        dir,
        "fake-ffprobe",
        &format!(
            r#"cat <<'EOF'
{{
  "streams": [
    {{"codec_type": "video", "codec_name": "h264", "width": {width}, "height": {height}}},
    {{"codec_type": "audio", "codec_name": "aac"}}
  ],
  "format": {{"duration": "{duration_sec}", "bit_rate": "5000000", "size": "56250000"}}
}}
EOF
exit 0
"#
        ),
    )
}

/// A fake `ffprobe` that exits non-zero, simulating an undecodable input.
pub fn fake_ffprobe_failing(dir: &Path) -> PathBuf {
    write_script(dir, "fake-ffprobe-fail", "echo 'Invalid data found' 1>&2\nexit 1\n")
}
