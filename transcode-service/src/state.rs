//! Config & Bootstrap (C12): the shared, once-initialized bundle of handles
//! injected into every handler via `web::Data`.

use std::path::PathBuf;
use std::sync::Arc;

use crate::chunk_store::ChunkStore;
use crate::config::Config;
use crate::jobs::{JobManager, PipelineContext};
use crate::metadata::MetadataStore;
use crate::object_store::ObjectStoreClient;
use crate::probe::MediaProbe;
use crate::progress_bus::ProgressBus;
use crate::queue::QueueHandle;
use crate::transcode::TranscodeEngine;

pub struct AppState {
    pub config: Config,
    pub chunk_store: Arc<ChunkStore>,
    pub job_manager: Arc<JobManager>,
    pub queue: QueueHandle,
    pub object_store: Arc<ObjectStoreClient>,
    pub progress_bus: Arc<ProgressBus>,
    pub upload_dir: PathBuf,
}

/// Everything `main` needs to both serve HTTP and drive the queue worker
/// pool, built once at boot.
pub struct Bootstrap {
    pub state: Arc<AppState>,
    pub pipeline_ctx: Arc<PipelineContext>,
    pub job_manager: Arc<JobManager>,
}

pub async fn bootstrap(config: Config, store: Arc<dyn MetadataStore>) -> (Bootstrap, tokio::sync::mpsc::Receiver<uuid::Uuid>) {
    let upload_dir = PathBuf::from(&config.upload.dir);
    let chunk_store = Arc::new(ChunkStore::new(&config.upload.dir));
    let object_store = Arc::new(ObjectStoreClient::from_config(&config.object_store).await);
    let progress_bus = Arc::new(ProgressBus::new());
    let media_probe = Arc::new(MediaProbe::new(config.ffmpeg.ffprobe_path.clone()));
    let transcode_engine = Arc::new(TranscodeEngine::new(
        config.ffmpeg.ffmpeg_path.clone(),
        config.upload.segment_duration_sec,
        config.concurrency.transcode_concurrency,
    ));

    let (queue, rx) = crate::queue::bounded(config.concurrency.queue_depth_limit);
    let job_manager = Arc::new(JobManager::new(store.clone(), queue.clone()));

    let pipeline_ctx = Arc::new(PipelineContext {
        store,
        chunk_store: chunk_store.clone(),
        media_probe,
        transcode_engine,
        object_store: object_store.clone(),
        progress_bus: progress_bus.clone(),
        upload_dir: upload_dir.clone(),
    });

    let state = Arc::new(AppState {
        config,
        chunk_store,
        job_manager: job_manager.clone(),
        queue,
        object_store,
        progress_bus,
        upload_dir,
    });

    (
        Bootstrap {
            state,
            pipeline_ctx,
            job_manager,
        },
        rx,
    )
}
