//! Data model for the transcoding pipeline: owners, ladder rungs, subtitles,
//! and processing jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A film, or an episode nested under a season+film.
///
/// Cyclic film/season/episode references from the upstream catalog collapse
/// to plain IDs here; the pipeline never walks the graph, only stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Owner {
    Film {
        film_id: Uuid,
    },
    Episode {
        film_id: Uuid,
        season_id: Uuid,
        episode_id: Uuid,
    },
}

impl Owner {
    /// Object-store key prefix: `{filmId}` for a film, `{filmId}-{seasonId}` for an episode.
    pub fn prefix(&self) -> String {
        match self {
            Owner::Film { film_id } => film_id.to_string(),
            Owner::Episode {
                film_id, season_id, ..
            } => format!("{film_id}-{season_id}"),
        }
    }

    pub fn resource_id(&self) -> Uuid {
        match self {
            Owner::Film { film_id } => *film_id,
            Owner::Episode { episode_id, .. } => *episode_id,
        }
    }
}

/// Resolution label for a ladder rung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Resolution {
    Sd,
    Hd,
    Fhd,
    Uhd,
}

impl Resolution {
    pub const ALL: [Resolution; 4] = [
        Resolution::Sd,
        Resolution::Hd,
        Resolution::Fhd,
        Resolution::Uhd,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Sd => "SD",
            Resolution::Hd => "HD",
            Resolution::Fhd => "FHD",
            Resolution::Uhd => "UHD",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "SD" => Some(Resolution::Sd),
            "HD" => Some(Resolution::Hd),
            "FHD" => Some(Resolution::Fhd),
            "UHD" => Some(Resolution::Uhd),
            _ => None,
        }
    }

    pub fn target_height(&self) -> u32 {
        match self {
            Resolution::Sd => 480,
            Resolution::Hd => 720,
            Resolution::Fhd => 1080,
            Resolution::Uhd => 2160,
        }
    }

    pub fn video_bitrate_kbps(&self) -> u32 {
        match self {
            Resolution::Sd => 1000,
            Resolution::Hd => 2500,
            Resolution::Fhd => 5000,
            Resolution::Uhd => 15000,
        }
    }

    pub fn audio_bitrate_kbps(&self) -> u32 {
        match self {
            Resolution::Sd | Resolution::Hd => 128,
            Resolution::Fhd | Resolution::Uhd => 192,
        }
    }

    /// 16:9 reference dimensions used for the master playlist's `RESOLUTION`
    /// attribute; the encoded asset's actual width may differ slightly for
    /// non-16:9 sources, which the player tolerates.
    pub fn standard_dimensions(&self) -> (u32, u32) {
        match self {
            Resolution::Sd => (854, 480),
            Resolution::Hd => (1280, 720),
            Resolution::Fhd => (1920, 1080),
            Resolution::Uhd => (3840, 2160),
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for Resolution {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Resolution {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Resolution::from_label(s).ok_or_else(|| format!("unknown resolution label {s}").into())
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for Resolution {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.label(), buf)
    }
}

/// A persisted record for one successfully uploaded ladder rung (or a trailer).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoArtifact {
    pub id: Uuid,
    pub owner: Owner,
    /// storage key, e.g. `HD_movie.mp4`
    pub name: String,
    /// resolved CDN/object-store URL
    pub url: String,
    /// MIME type, e.g. `video/mp4`
    pub format: String,
    pub resolution: Resolution,
    /// codec tag, e.g. `h264`
    pub encoding: String,
    /// human-readable size, e.g. "482.3 MB"
    pub size: String,
    pub duration: f64,
    /// human-readable bitrate, e.g. "2500 kbps"
    pub bitrate: String,
    pub is_trailer: bool,
    pub hls_playlist_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A resolution-independent WebVTT subtitle track.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleTrack {
    pub id: Uuid,
    pub owner: Owner,
    pub language: String,
    pub label: String,
    pub is_default: bool,
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Film,
    Episode,
    Trailer,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Film => "film",
            JobType::Episode => "episode",
            JobType::Trailer => "trailer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "film" => Some(JobType::Film),
            "episode" => Some(JobType::Episode),
            "trailer" => Some(JobType::Trailer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Active => "active",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(JobStatus::Waiting),
            "active" => Some(JobStatus::Active),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }
}

/// A processing job row: the persisted half of the job state machine.
///
/// Serializes as the wire shape `{id, queueJobId, status, type, resourceId,
/// fileName, progress, canCancel, createdAt, startedAt?, finishedAt?,
/// cancelledAt?, failedReason?, retryCount}` — `owner` is an internal
/// uniqueness/object-store-prefix key, not a field clients see; `resourceId`
/// is derived from it at serialization time.
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    pub id: Uuid,
    /// the progress-bus channel key for this run: the caller's `clientId` on
    /// first enqueue, replaced with a fresh `retry-{timestamp}-...` id on
    /// each retry (section 4.8) since the original caller may have moved on.
    pub queue_job_id: String,
    pub status: JobStatus,
    pub job_type: JobType,
    pub owner: Owner,
    pub file_name: String,
    pub progress: u8,
    pub can_cancel: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub failed_reason: Option<String>,
    pub retry_count: u32,
}

impl ProcessingJob {
    pub fn new(job_type: JobType, owner: Owner, file_name: String, client_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            queue_job_id: client_id,
            status: JobStatus::Waiting,
            job_type,
            owner,
            file_name,
            progress: 0,
            can_cancel: true,
            created_at: now,
            started_at: None,
            finished_at: None,
            cancelled_at: None,
            failed_reason: None,
            retry_count: 0,
        }
    }
}

impl Serialize for ProcessingJob {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ProcessingJob", 14)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("queueJobId", &self.queue_job_id)?;
        state.serialize_field("status", self.status.as_str())?;
        state.serialize_field("type", self.job_type.as_str())?;
        state.serialize_field("resourceId", &self.owner.resource_id())?;
        state.serialize_field("fileName", &self.file_name)?;
        state.serialize_field("progress", &self.progress)?;
        state.serialize_field("canCancel", &self.can_cancel)?;
        state.serialize_field("createdAt", &self.created_at)?;
        state.serialize_field("startedAt", &self.started_at)?;
        state.serialize_field("finishedAt", &self.finished_at)?;
        state.serialize_field("cancelledAt", &self.cancelled_at)?;
        state.serialize_field("failedReason", &self.failed_reason)?;
        state.serialize_field("retryCount", &self.retry_count)?;
        state.end()
    }
}

/// Progress-event `content` discriminant; mirrors the wire schema's `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressContent {
    Transcode { resolution: Option<Resolution> },
    Upload,
    Poster,
    Trailer,
    DashGeneration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub client_id: String,
    pub progress: u8,
    pub content: ProgressContent,
}
