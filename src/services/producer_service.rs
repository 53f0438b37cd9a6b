use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::job::JobId;
use crate::payloads::{ImportJob, Job, RecommendationsJob, TrendingJob};
use crate::registry::QueueRegistry;
use crate::session::Session;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub success: bool,
    pub job_id: JobId,
}

impl EnqueueResponse {
    pub fn new(job_id: JobId) -> Self {
        Self { success: true, job_id }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationsRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub url: String,
    pub binder_id: Option<String>,
}

async fn enqueue<J: Job>(registry: &QueueRegistry, job: &J) -> Result<HttpResponse, ApiError> {
    let id = registry.enqueue(job).await.map_err(ApiError::enqueue)?;
    Ok(HttpResponse::Ok().json(EnqueueResponse::new(id)))
}

// Any signed-in user may trigger these jobs; there is no admin role to check.

pub async fn enqueue_trending(
    session: Session,
    registry: web::Data<QueueRegistry>,
) -> Result<HttpResponse, ApiError> {
    let job = TrendingJob {
        requested_by: session.user_id,
        requested_at: Utc::now(),
    };
    enqueue(&registry, &job).await
}

pub async fn enqueue_recommendations(
    session: Session,
    body: Option<web::Json<RecommendationsRequest>>,
    registry: web::Data<QueueRegistry>,
) -> Result<HttpResponse, ApiError> {
    let request = body.map(web::Json::into_inner).unwrap_or_default();
    let job = RecommendationsJob {
        user_id: request.user_id.unwrap_or_else(|| session.user_id.clone()),
        requested_by: session.user_id,
    };
    enqueue(&registry, &job).await
}

pub async fn enqueue_import(
    session: Session,
    body: web::Json<ImportRequest>,
    registry: web::Data<QueueRegistry>,
) -> Result<HttpResponse, ApiError> {
    let ImportRequest { url, binder_id } = body.into_inner();
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ApiError::BadRequest("url must be an http(s) address".to_string()));
    }
    let job = ImportJob {
        user_id: session.user_id,
        url: url.to_string(),
        binder_id,
    };
    enqueue(&registry, &job).await
}

pub async fn not_found() -> Result<HttpResponse, ApiError> {
    Err(ApiError::NotFound("no such job endpoint".to_string()))
}
