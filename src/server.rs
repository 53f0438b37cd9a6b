use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::Context;
use serde_json::json;
use tracing::{info, warn};

use crate::broker::JobBroker;
use crate::config::AppConfig;
use crate::registry::QueueRegistry;
use crate::routes::board_route::board_routes;
use crate::routes::jobs_route::jobs_routes;
use crate::session::SessionKeys;

/// Registers every route. Callers provide `web::Data<QueueRegistry>` and
/// `web::Data<SessionKeys>` as app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .configure(jobs_routes)
        .configure(board_routes);
}

async fn health(registry: web::Data<QueueRegistry>) -> HttpResponse {
    match registry.trending().broker().ping().await {
        Ok(()) => HttpResponse::Ok().json(json!({ "status": "ok", "broker": "up" })),
        Err(err) => {
            warn!(error = %err, "broker ping failed");
            HttpResponse::ServiceUnavailable().json(json!({ "status": "degraded", "broker": "down" }))
        }
    }
}

pub async fn run(config: AppConfig, broker: Arc<dyn JobBroker>) -> anyhow::Result<()> {
    let registry = web::Data::new(QueueRegistry::new(broker));
    let keys = web::Data::new(SessionKeys::new(&config.session));

    info!(addr = %config.bind_addr, cookie = keys.cookie_name(), "starting http server");
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(registry.clone())
            .app_data(keys.clone())
            .configure(configure)
    })
    .bind(&config.bind_addr)
    .with_context(|| format!("failed to bind {}", config.bind_addr))?
    .run()
    .await
    .context("http server stopped with an error")?;

    info!("http server stopped");
    Ok(())
}
