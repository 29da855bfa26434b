//! HTTP-surface coverage for the parts of the upload/job API that never
//! touch the object store: health, chunked upload + existence check,
//! `complete-upload` validation and the non-terminal-uniqueness conflict,
//! and subtitle validation rejections (which fail before any upload is
//! attempted).

mod common;

use actix_web::{test, web, App};
use uuid::Uuid;

use media_service::handlers::{health, jobs as job_handlers, uploads};

fn multipart_body(boundary: &str, fields: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

#[actix_web::test]
async fn health_and_readiness_respond_ok_without_a_database() {
    let health_state = web::Data::new(health::HealthState { db_pool: None });
    let app = test::init_service(
        App::new()
            .app_data(health_state.clone())
            .route("/api/v1/health", web::get().to(health::health_summary))
            .route("/health/ready", web::get().to(health::readiness_summary))
            .route("/health/live", web::get().to(health::liveness_summary)),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::get().uri("/health/ready").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn upload_chunk_then_check_reports_existence() {
    let dir = common::scratch_dir("http-chunk");
    let (state, _bootstrap) = common::build_state(&dir).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(state.clone()))
            .route("/upload-chunk", web::post().to(uploads::upload_chunk))
            .route("/check-upload-chunk", web::get().to(uploads::check_upload_chunk)),
    )
    .await;

    let boundary = "test-boundary";
    let body = multipart_body(
        boundary,
        &[("fileName", b"Movie File.mp4"), ("start", b"0"), ("chunk", b"hello world")],
    );

    let req = test::TestRequest::post()
        .uri("/upload-chunk")
        .insert_header(("content-type", format!("multipart/form-data; boundary={boundary}")))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success(), "status was {}", resp.status());

    let req = test::TestRequest::get()
        .uri("/check-upload-chunk?fileName=Movie%20File.mp4&start=0")
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["exists"], true);

    let req = test::TestRequest::get()
        .uri("/check-upload-chunk?fileName=Movie%20File.mp4&start=999")
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["exists"], false);
}

#[actix_web::test]
async fn complete_upload_requires_film_and_season_id_for_episodes() {
    let dir = common::scratch_dir("http-episode-validation");
    let (state, _bootstrap) = common::build_state(&dir).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(state.clone()))
            .route("/complete-upload", web::post().to(uploads::complete_upload)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/complete-upload")
        .set_json(serde_json::json!({
            "clientId": "c1",
            "fileName": "ep1.mp4",
            "type": "episode",
            "resourceId": Uuid::new_v4(),
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn complete_upload_rejects_unknown_type() {
    let dir = common::scratch_dir("http-unknown-type");
    let (state, _bootstrap) = common::build_state(&dir).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(state.clone()))
            .route("/complete-upload", web::post().to(uploads::complete_upload)),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/complete-upload")
        .set_json(serde_json::json!({
            "clientId": "c1",
            "fileName": "movie.mp4",
            "type": "short",
            "resourceId": Uuid::new_v4(),
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn complete_upload_conflicts_on_duplicate_active_job() {
    let dir = common::scratch_dir("http-dedup");
    let (state, _bootstrap) = common::build_state(&dir).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(state.clone()))
            .route("/complete-upload", web::post().to(uploads::complete_upload))
            .route("/processing-jobs/{id}", web::get().to(job_handlers::get_job)),
    )
    .await;

    let film_id = Uuid::new_v4();
    let payload = serde_json::json!({
        "clientId": "c1",
        "fileName": "movie.mp4",
        "type": "film",
        "resourceId": film_id,
    });

    let req = test::TestRequest::post()
        .uri("/complete-upload")
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::post()
        .uri("/complete-upload")
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);
}

#[actix_web::test]
async fn upload_subtitle_rejects_non_vtt_content_before_touching_the_object_store() {
    let dir = common::scratch_dir("http-subtitle-bad-vtt");
    let (state, _bootstrap) = common::build_state(&dir).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(state.clone()))
            .route("/upload-subtitle", web::post().to(uploads::upload_subtitle)),
    )
    .await;

    let boundary = "test-boundary";
    let body = multipart_body(
        boundary,
        &[
            ("subtitleFile", b"1\n00:00:00,000 --> 00:00:01,000\nHi\n"),
            ("owner", b"film"),
            ("resourceId", Uuid::new_v4().to_string().as_bytes()),
            ("fileName", b"movie.mp4"),
            ("language", b"en"),
        ],
    );

    let req = test::TestRequest::post()
        .uri("/upload-subtitle")
        .insert_header(("content-type", format!("multipart/form-data; boundary={boundary}")))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    // If this ever touches the object store it will hang/fail against the
    // unreachable test endpoint instead of returning promptly with 400.
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn upload_subtitle_rejects_oversized_file() {
    let dir = common::scratch_dir("http-subtitle-oversize");
    let (state, _bootstrap) = common::build_state(&dir).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(state.clone()))
            .route("/upload-subtitle", web::post().to(uploads::upload_subtitle)),
    )
    .await;

    let oversized = vec![b'a'; media_service::subtitles::MAX_SUBTITLE_BYTES + 1];
    let boundary = "test-boundary";
    let body = multipart_body(
        boundary,
        &[
            ("subtitleFile", oversized.as_slice()),
            ("owner", b"film"),
            ("resourceId", Uuid::new_v4().to_string().as_bytes()),
            ("fileName", b"movie.mp4"),
            ("language", b"en"),
        ],
    );

    let req = test::TestRequest::post()
        .uri("/upload-subtitle")
        .insert_header(("content-type", format!("multipart/form-data; boundary={boundary}")))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}
