//! `GET /events/{clientId}` — Server-Sent Events push of progress updates for
//! one client's in-flight upload/transcode.

use actix_web::{web, HttpResponse};
use bytes::Bytes;
use futures::stream;
use tokio::sync::broadcast;

use crate::state::AppState;

fn format_event(event: &crate::models::ProgressEvent) -> Bytes {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Bytes::from(format!("data: {payload}\n\n"))
}

pub async fn stream_events(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let client_id = path.into_inner();
    let rx = state.progress_bus.subscribe(&client_id);
    let bus = state.progress_bus.clone();

    let body = stream::unfold((rx, bus, client_id), |(mut rx, bus, client_id)| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((Ok::<_, actix_web::Error>(format_event(&event)), (rx, bus, client_id))),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    bus.sweep(&client_id);
                    return None;
                }
            }
        }
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(body)
}
