/// Configuration management for transcode-service
///
/// Loads configuration from environment variables with sensible defaults.
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
    pub object_store: ObjectStoreConfig,
    pub upload: UploadConfig,
    pub concurrency: ConcurrencyConfig,
    pub ffmpeg: FfmpegConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ObjectStoreConfig {
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub bucket: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UploadConfig {
    /// local scratch root, e.g. `./uploads`
    pub dir: String,
    pub segment_duration_sec: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ConcurrencyConfig {
    /// semaphore size gating the transcoder (default 1)
    pub transcode_concurrency: usize,
    /// queue worker pool size (default 1)
    pub queue_concurrency: usize,
    /// queue depth at which new enqueues return `Busy`
    pub queue_depth_limit: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FfmpegConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                host: std::env::var("TRANSCODE_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("TRANSCODE_SERVICE_PORT")
                    .unwrap_or_else(|_| "8082".to_string())
                    .parse()
                    .unwrap_or(8082),
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("ALLOWED_ORIGINS")
                    .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                    .unwrap_or_else(|_| vec!["*".to_string()]),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/transcode".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            object_store: ObjectStoreConfig {
                endpoint: std::env::var("OBJECT_STORE_ENDPOINT").ok(),
                access_key: std::env::var("OBJECT_STORE_KEY").unwrap_or_default(),
                secret_key: std::env::var("OBJECT_STORE_SECRET").unwrap_or_default(),
                region: std::env::var("OBJECT_STORE_REGION")
                    .unwrap_or_else(|_| "us-east-1".to_string()),
                bucket: std::env::var("OBJECT_STORE_BUCKET")
                    .unwrap_or_else(|_| "media".to_string()),
            },
            upload: UploadConfig {
                dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()),
                segment_duration_sec: std::env::var("SEGMENT_DURATION_SEC")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(6),
            },
            concurrency: ConcurrencyConfig {
                transcode_concurrency: std::env::var("TRANSCODE_CONCURRENCY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1),
                queue_concurrency: std::env::var("QUEUE_CONCURRENCY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1),
                queue_depth_limit: std::env::var("QUEUE_DEPTH_LIMIT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(64),
            },
            ffmpeg: FfmpegConfig {
                ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
                ffprobe_path: std::env::var("FFPROBE_PATH")
                    .unwrap_or_else(|_| "ffprobe".to_string()),
            },
        })
    }
}
