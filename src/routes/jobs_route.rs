use actix_web::middleware::from_fn;
use actix_web::web;

use crate::services::producer_service::{
    enqueue_import, enqueue_recommendations, enqueue_trending, not_found,
};
use crate::session::require_session;

pub fn jobs_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/jobs")
            .wrap(from_fn(require_session))
            .route("/trending", web::post().to(enqueue_trending))
            .route("/recommendations", web::post().to(enqueue_recommendations))
            .route("/import", web::post().to(enqueue_import))
            .default_service(web::to(not_found)),
    );
}
