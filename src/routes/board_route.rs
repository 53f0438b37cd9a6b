use actix_web::middleware::from_fn;
use actix_web::web;

use crate::services::board_service::{
    add_job, clean, export_queue_csv, get_job, list_jobs, list_queues, not_found, overview, pause,
    promote_job, remove_job, resume, retry_all, retry_job,
};
use crate::session::require_session;
use crate::utils::constants::ADMIN_BASE_PATH;

/// Admin board under `/api/admin/queues`. Every path, including unknown
/// ones, passes the session gate first.
pub fn board_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope(ADMIN_BASE_PATH)
            .wrap(from_fn(require_session))
            .route("", web::get().to(overview))
            .route("/", web::get().to(overview))
            .route("/api/queues", web::get().to(list_queues))
            .route("/api/queues/{queue}/jobs", web::get().to(list_jobs))
            .route("/api/queues/{queue}/jobs/{id}", web::get().to(get_job))
            .route("/api/queues/{queue}/export", web::get().to(export_queue_csv))
            .route("/api/queues/{queue}/add", web::post().to(add_job))
            .route("/api/queues/{queue}/jobs/{id}/retry", web::put().to(retry_job))
            .route("/api/queues/{queue}/jobs/{id}/promote", web::put().to(promote_job))
            .route("/api/queues/{queue}/jobs/{id}/remove", web::put().to(remove_job))
            .route("/api/queues/{queue}/retry/{status}", web::put().to(retry_all))
            .route("/api/queues/{queue}/clean/{status}", web::put().to(clean))
            .route("/api/queues/{queue}/pause", web::put().to(pause))
            .route("/api/queues/{queue}/resume", web::put().to(resume))
            .default_service(web::to(not_found)),
    );
}
