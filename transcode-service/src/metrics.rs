//! Prometheus metrics for the transcode pipeline. Exposes job-lifecycle
//! collectors and an HTTP handler for the `/metrics` endpoint.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};

lazy_static! {
    /// Job outcomes segmented by job type and terminal status.
    pub static ref JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "transcode_jobs_total",
        "Processing jobs segmented by job type and terminal status",
        &["job_type", "status"]
    )
    .expect("failed to register transcode_jobs_total");

    /// End-to-end job duration from `active` to a terminal status.
    pub static ref JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "transcode_job_duration_seconds",
        "Job duration from start to terminal status, segmented by job type",
        &["job_type"]
    )
    .expect("failed to register transcode_job_duration_seconds");

    /// Per-rung encode failures, segmented by resolution.
    pub static ref RUNG_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "transcode_rung_failures_total",
        "Ladder rung encode failures segmented by resolution",
        &["resolution"]
    )
    .expect("failed to register transcode_rung_failures_total");

    /// Jobs currently sitting in the bounded queue.
    pub static ref QUEUE_DEPTH: IntGauge = register_int_gauge!(
        "transcode_queue_depth",
        "Number of jobs currently queued awaiting a worker"
    )
    .expect("failed to register transcode_queue_depth");
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = prometheus::Encoder::encode(&encoder, &metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(prometheus::Encoder::format_type(&encoder))
        .body(buffer)
}
