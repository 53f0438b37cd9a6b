use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::dashboard::board::{queue_summaries, render_board};
use crate::error::ApiError;
use crate::job::{JobOptions, JobRecord, JobRow, JobStatus};
use crate::queue::Queue;
use crate::registry::QueueRegistry;
use crate::services::producer_service::EnqueueResponse;
use crate::session::Session;
use crate::utils::pagination::{Pagination, PaginationQuery};

fn resolve<'a>(registry: &'a QueueRegistry, name: &str) -> Result<&'a Queue, ApiError> {
    registry
        .find(name)
        .ok_or_else(|| ApiError::NotFound(format!("unknown queue '{name}'")))
}

fn parse_status(raw: &str) -> Result<JobStatus, ApiError> {
    raw.parse().map_err(|e: crate::job::UnknownStatus| ApiError::BadRequest(e.to_string()))
}

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    pub status: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobsPage {
    pub queue: &'static str,
    pub status: JobStatus,
    pub jobs: Vec<JobRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct AddJobRequest {
    pub name: String,
    #[serde(default)]
    pub data: Value,
    pub opts: Option<JobOptions>,
}

pub async fn overview(
    session: Session,
    registry: web::Data<QueueRegistry>,
) -> Result<HttpResponse, ApiError> {
    let html = render_board(&registry, &session).await?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html))
}

pub async fn list_queues(registry: web::Data<QueueRegistry>) -> Result<HttpResponse, ApiError> {
    let queues = queue_summaries(&registry).await?;
    Ok(HttpResponse::Ok().json(json!({ "queues": queues })))
}

pub async fn list_jobs(
    path: web::Path<String>,
    query: web::Query<JobsQuery>,
    registry: web::Data<QueueRegistry>,
) -> Result<HttpResponse, ApiError> {
    let queue = resolve(&registry, &path)?;
    let status = match query.status.as_deref() {
        Some(raw) => parse_status(raw)?,
        None => JobStatus::Waiting,
    };

    let paging = PaginationQuery {
        page: query.page,
        limit: query.limit,
    };
    let total = queue.counts().await?.get(status) as usize;
    let pagination = Pagination::new(paging.page(), paging.limit(), total);
    let jobs = queue
        .broker()
        .list(queue.name().as_str(), status, pagination.offset(), pagination.last_index())
        .await?;

    Ok(HttpResponse::Ok().json(JobsPage {
        queue: queue.name().as_str(),
        status,
        jobs,
        pagination,
    }))
}

pub async fn get_job(
    path: web::Path<(String, String)>,
    registry: web::Data<QueueRegistry>,
) -> Result<HttpResponse, ApiError> {
    let (queue_name, job_id) = path.into_inner();
    let queue = resolve(&registry, &queue_name)?;
    match queue.broker().get(queue.name().as_str(), &job_id).await? {
        Some(job) => Ok(HttpResponse::Ok().json(job)),
        None => Err(ApiError::NotFound(format!("job {job_id} not found in queue {queue_name}"))),
    }
}

pub async fn export_queue_csv(
    path: web::Path<String>,
    query: web::Query<ExportQuery>,
    registry: web::Data<QueueRegistry>,
) -> Result<HttpResponse, ApiError> {
    let queue = resolve(&registry, &path)?;
    let status = match query.status.as_deref() {
        Some(raw) => parse_status(raw)?,
        None => JobStatus::Failed,
    };

    let total = queue.counts().await?.get(status) as usize;
    let jobs = if total == 0 {
        Vec::new()
    } else {
        queue
            .broker()
            .list(queue.name().as_str(), status, 0, total - 1)
            .await?
    };

    let mut wtr = csv::Writer::from_writer(vec![]);
    for job in &jobs {
        wtr.serialize(JobRow::from(job))
            .map_err(|e| ApiError::Internal(e.into()))?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("csv flush failed: {e}")))?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .append_header((
            "Content-Disposition",
            format!("attachment; filename=queue_{}_{}.csv", queue.name(), status),
        ))
        .body(data))
}

pub async fn add_job(
    session: Session,
    path: web::Path<String>,
    body: web::Json<AddJobRequest>,
    registry: web::Data<QueueRegistry>,
) -> Result<HttpResponse, ApiError> {
    let queue = resolve(&registry, &path)?;
    let AddJobRequest { name, data, opts } = body.into_inner();
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest("job name is required".to_string()));
    }

    let id = queue
        .add_raw(&name, data, opts.unwrap_or_default())
        .await
        .map_err(ApiError::enqueue)?;
    info!(queue = %queue.name(), job_id = %id, user = %session.user_id, "job added from board");
    Ok(HttpResponse::Ok().json(EnqueueResponse::new(id)))
}

#[derive(Debug, Clone, Copy)]
enum JobAction {
    Retry,
    Promote,
    Remove,
}

impl JobAction {
    fn done(&self) -> &'static str {
        match self {
            JobAction::Retry => "retried",
            JobAction::Promote => "promoted",
            JobAction::Remove => "removed",
        }
    }
}

async fn job_action(
    action: JobAction,
    session: Session,
    path: web::Path<(String, String)>,
    registry: web::Data<QueueRegistry>,
) -> Result<HttpResponse, ApiError> {
    let (queue_name, job_id) = path.into_inner();
    let queue = resolve(&registry, &queue_name)?;
    let broker = queue.broker();
    let name = queue.name().as_str();
    match action {
        JobAction::Retry => broker.retry(name, &job_id).await?,
        JobAction::Promote => broker.promote(name, &job_id).await?,
        JobAction::Remove => broker.remove(name, &job_id).await?,
    }
    info!(queue = name, job_id = %job_id, user = %session.user_id, action = action.done(), "board job action");
    Ok(HttpResponse::Ok().json(json!({ "status": action.done(), "jobId": job_id })))
}

pub async fn retry_job(
    session: Session,
    path: web::Path<(String, String)>,
    registry: web::Data<QueueRegistry>,
) -> Result<HttpResponse, ApiError> {
    job_action(JobAction::Retry, session, path, registry).await
}

pub async fn promote_job(
    session: Session,
    path: web::Path<(String, String)>,
    registry: web::Data<QueueRegistry>,
) -> Result<HttpResponse, ApiError> {
    job_action(JobAction::Promote, session, path, registry).await
}

pub async fn remove_job(
    session: Session,
    path: web::Path<(String, String)>,
    registry: web::Data<QueueRegistry>,
) -> Result<HttpResponse, ApiError> {
    job_action(JobAction::Remove, session, path, registry).await
}

pub async fn retry_all(
    session: Session,
    path: web::Path<(String, String)>,
    registry: web::Data<QueueRegistry>,
) -> Result<HttpResponse, ApiError> {
    let (queue_name, status) = path.into_inner();
    let queue = resolve(&registry, &queue_name)?;
    let status = parse_status(&status)?;
    let count = queue.broker().retry_all(queue.name().as_str(), status).await?;
    info!(queue = %queue.name(), %status, count, user = %session.user_id, "board retried jobs");
    Ok(HttpResponse::Ok().json(json!({ "status": "retried", "count": count })))
}

pub async fn clean(
    session: Session,
    path: web::Path<(String, String)>,
    registry: web::Data<QueueRegistry>,
) -> Result<HttpResponse, ApiError> {
    let (queue_name, status) = path.into_inner();
    let queue = resolve(&registry, &queue_name)?;
    let status = parse_status(&status)?;
    let count = queue.broker().clean(queue.name().as_str(), status).await?;
    info!(queue = %queue.name(), %status, count, user = %session.user_id, "board cleaned jobs");
    Ok(HttpResponse::Ok().json(json!({ "status": "cleaned", "count": count })))
}

pub async fn pause(
    session: Session,
    path: web::Path<String>,
    registry: web::Data<QueueRegistry>,
) -> Result<HttpResponse, ApiError> {
    let queue = resolve(&registry, &path)?;
    queue.broker().pause(queue.name().as_str()).await?;
    info!(queue = %queue.name(), user = %session.user_id, "queue paused");
    Ok(HttpResponse::Ok().json(json!({ "status": "paused" })))
}

pub async fn resume(
    session: Session,
    path: web::Path<String>,
    registry: web::Data<QueueRegistry>,
) -> Result<HttpResponse, ApiError> {
    let queue = resolve(&registry, &path)?;
    queue.broker().resume(queue.name().as_str()).await?;
    info!(queue = %queue.name(), user = %session.user_id, "queue resumed");
    Ok(HttpResponse::Ok().json(json!({ "status": "resumed" })))
}

pub async fn not_found() -> Result<HttpResponse, ApiError> {
    Err(ApiError::NotFound("no such board route".to_string()))
}
