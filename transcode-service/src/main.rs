//! Transcode Service - HTTP Server
//!
//! Bootstraps the database pool, object store, job manager, and queue worker
//! pool, then serves the upload/job/playback/events HTTP surface.

use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_middleware::CorrelationIdMiddleware;
use actix_web::{middleware::Logger, web, App, HttpServer};
use db_pool::{create_pool, DbConfig};
use media_service::handlers::{events, health, jobs, playback, uploads};
use media_service::metadata::{MetadataStore, PgMetadataStore};
use media_service::{state, Config};
use tokio::sync::watch;
use tokio::task::JoinSet;

#[actix_web::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().expect("failed to load configuration");

    let db_config = DbConfig {
        service_name: "media-service".to_string(),
        database_url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..DbConfig::default()
    };
    let pg_pool = create_pool(db_config)
        .await
        .expect("failed to create database pool");

    sqlx::migrate!("./migrations")
        .run(&pg_pool)
        .await
        .expect("failed to run database migrations");

    let store: Arc<dyn MetadataStore> = Arc::new(PgMetadataStore::new(pg_pool.clone()));

    let (bootstrap, queue_rx) = state::bootstrap(config.clone(), store).await;
    let app_state = bootstrap.state;
    let health_state = web::Data::new(health::HealthState {
        db_pool: Some(pg_pool),
    });

    bootstrap
        .job_manager
        .fix_stuck()
        .await
        .expect("failed to reconcile abandoned jobs at boot");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handles = media_service::queue::run_workers(
        bootstrap.pipeline_ctx,
        bootstrap.job_manager,
        queue_rx,
        config.concurrency.queue_concurrency,
        shutdown_rx,
    );

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!(%bind_address, "transcode-service starting");

    let allowed_origins = config.cors.allowed_origins.clone();
    // `app_state` is already an `Arc<AppState>`; `Data::from` reuses it as the
    // extractor's inner `Arc` instead of wrapping it in a second one, which
    // would register `Data<Arc<AppState>>` and break every `Data<AppState>` extractor.
    let app_state_data = web::Data::from(app_state);

    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "DELETE"])
            .allow_any_header()
            .max_age(3600);
        for origin in &allowed_origins {
            cors = if origin == "*" {
                cors.allow_any_origin()
            } else {
                cors.allowed_origin(origin)
            };
        }

        App::new()
            .app_data(app_state_data.clone())
            .app_data(health_state.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .wrap(CorrelationIdMiddleware)
            .route("/api/v1/health", web::get().to(health::health_summary))
            .route("/health/ready", web::get().to(health::readiness_summary))
            .route("/health/live", web::get().to(health::liveness_summary))
            .route("/metrics", web::get().to(media_service::metrics::serve_metrics))
            .route("/events/{clientId}", web::get().to(events::stream_events))
            .route("/upload-chunk", web::post().to(uploads::upload_chunk))
            .route("/check-upload-chunk", web::get().to(uploads::check_upload_chunk))
            .route("/complete-upload", web::post().to(uploads::complete_upload))
            .route("/trailer-upload", web::post().to(uploads::trailer_upload))
            .route("/upload-subtitle", web::post().to(uploads::upload_subtitle))
            .route("/processing-jobs", web::get().to(jobs::list_jobs))
            .route("/processing-jobs/{id}", web::get().to(jobs::get_job))
            .route("/processing-jobs/{id}/cancel", web::post().to(jobs::cancel_job))
            .route("/processing-jobs/{id}/retry", web::post().to(jobs::retry_job))
            .route("/stream/{trackId}", web::get().to(playback::stream_track))
            .route("/hls/{owner}/{path:.*}", web::get().to(playback::stream_hls))
    })
    .bind(&bind_address)?
    .workers(4)
    .run();

    let mut tasks = JoinSet::new();
    tasks.spawn(async move {
        tracing::info!("HTTP server is running");
        server.await
    });

    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Ok(_)) => tracing::warn!("server completed"),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "server error");
                let _ = shutdown_tx.send(true);
                for handle in &worker_handles {
                    handle.abort();
                }
                return Err(e);
            }
            Err(e) => tracing::error!(error = %e, "task join error"),
        }
    }

    let _ = shutdown_tx.send(true);
    for handle in worker_handles {
        let _ = handle.await;
    }

    Ok(())
}
