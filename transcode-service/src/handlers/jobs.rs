//! Job surface: list processing jobs and drive cancel/retry transitions.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{JobStatus, JobType};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
}

pub async fn list_jobs(state: web::Data<AppState>, query: web::Query<ListJobsQuery>) -> Result<HttpResponse> {
    let status = query.status.as_deref().and_then(JobStatus::from_str);
    let job_type = query.job_type.as_deref().and_then(JobType::from_str);
    let jobs = state.job_manager.list(status, job_type).await?;
    Ok(HttpResponse::Ok().json(jobs))
}

pub async fn get_job(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let job = state.job_manager.get(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(job))
}

pub async fn cancel_job(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
    state.job_manager.cancel(path.into_inner()).await?;
    Ok(HttpResponse::Ok().finish())
}

pub async fn retry_job(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let job = state.job_manager.retry(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(job))
}
