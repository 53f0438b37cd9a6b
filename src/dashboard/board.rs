use anyhow::{anyhow, Context as AnyhowContext, Result};
use chrono::Utc;
use futures::future::try_join_all;
use lazy_static::lazy_static;
use serde::Serialize;
use tera::{Context, Tera};

use crate::broker::BrokerError;
use crate::job::JobCounts;
use crate::queue::Queue;
use crate::registry::QueueRegistry;
use crate::session::Session;
use crate::utils::constants::ADMIN_BASE_PATH;

const BOARD_TEMPLATE: &str = "board.html";

lazy_static! {
    // Registered under an .html name so Tera autoescapes it.
    static ref TEMPLATES: Result<Tera, tera::Error> = {
        let mut tera = Tera::default();
        tera.add_raw_template(BOARD_TEMPLATE, include_str!("../templates/board.html.tera"))
            .map(|_| tera)
    };
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueSummary {
    pub name: &'static str,
    pub paused: bool,
    pub counts: JobCounts,
    pub total: u64,
}

async fn summarize(queue: &Queue) -> Result<QueueSummary, BrokerError> {
    let (counts, paused) = futures::try_join!(queue.counts(), queue.is_paused())?;
    Ok(QueueSummary {
        name: queue.name().as_str(),
        paused,
        counts,
        total: counts.total(),
    })
}

/// Counts for every registered queue, fetched concurrently.
pub async fn queue_summaries(registry: &QueueRegistry) -> Result<Vec<QueueSummary>, BrokerError> {
    try_join_all(registry.iter().map(summarize)).await
}

pub async fn render_board(registry: &QueueRegistry, session: &Session) -> Result<String> {
    let tera = TEMPLATES
        .as_ref()
        .map_err(|e| anyhow!("board template failed to load: {e}"))?;
    let queues = queue_summaries(registry).await?;

    let mut totals = JobCounts::default();
    for summary in &queues {
        for status in crate::job::JobStatus::ALL {
            totals.set(status, totals.get(status) + summary.counts.get(status));
        }
    }

    let mut context = Context::new();
    context.insert("queues", &queues);
    context.insert("totals", &totals);
    context.insert("base_path", ADMIN_BASE_PATH);
    context.insert("user_email", &session.email);
    context.insert("generated_at", &Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string());

    tera.render(BOARD_TEMPLATE, &context)
        .with_context(|| "Failed to render board template")
}
