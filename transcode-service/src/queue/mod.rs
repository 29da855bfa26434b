//! Queue Worker (C9): a bounded pool of job ids backing the job state
//! machine's `waiting -> active` transition.

mod worker;

pub use worker::run_workers;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Bounded handle to the queue. `enqueue` never blocks: once the configured
/// depth is exceeded it returns `Busy` immediately (section 5 backpressure).
#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::Sender<Uuid>,
}

impl QueueHandle {
    pub fn enqueue(&self, job_id: Uuid) -> Result<()> {
        self.tx.try_send(job_id).map_err(|_| AppError::Busy)?;
        crate::metrics::QUEUE_DEPTH.inc();
        Ok(())
    }
}

/// Builds a bounded channel of the configured depth and returns the producer
/// handle plus the consumer half for `run_workers`.
pub fn bounded(depth_limit: usize) -> (QueueHandle, mpsc::Receiver<Uuid>) {
    let (tx, rx) = mpsc::channel(depth_limit.max(1));
    (QueueHandle { tx }, rx)
}
