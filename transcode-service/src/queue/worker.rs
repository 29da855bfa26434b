use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::info;
use uuid::Uuid;

use crate::jobs::{run_job, JobManager, PipelineContext};

/// Spawns `worker_count` tasks sharing one receiver, each pulling the next
/// job id and running it to completion. Mirrors the teacher's watch-channel
/// shutdown pattern: every worker exits cleanly once `shutdown` fires.
pub fn run_workers(
    ctx: Arc<PipelineContext>,
    manager: Arc<JobManager>,
    rx: mpsc::Receiver<Uuid>,
    worker_count: usize,
    mut shutdown: watch::Receiver<bool>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let rx = Arc::new(Mutex::new(rx));

    (0..worker_count.max(1))
        .map(|worker_id| {
            let ctx = ctx.clone();
            let manager = manager.clone();
            let rx = rx.clone();
            let mut shutdown = shutdown.clone();

            tokio::spawn(async move {
                info!(worker_id, "queue worker started");
                loop {
                    let job_id = {
                        let mut rx = rx.lock().await;
                        tokio::select! {
                            biased;
                            _ = shutdown.changed() => {
                                if *shutdown.borrow() {
                                    break;
                                }
                                continue;
                            }
                            job_id = rx.recv() => job_id,
                        }
                    };

                    let Some(job_id) = job_id else {
                        break;
                    };
                    crate::metrics::QUEUE_DEPTH.dec();

                    let job = match manager.get(job_id).await {
                        Ok(job) => job,
                        Err(e) => {
                            tracing::warn!(worker_id, %job_id, error = %e, "dropped unknown queued job");
                            continue;
                        }
                    };

                    if job.status != crate::models::JobStatus::Waiting {
                        continue;
                    }

                    run_job(&ctx, &manager, job).await;
                }
                info!(worker_id, "queue worker stopped");
            })
        })
        .collect()
}
