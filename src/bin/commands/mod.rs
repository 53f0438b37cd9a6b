// src/bin/commands/mod.rs
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Duration;
use clap::ArgMatches;
use colored::*;
use serde_json::Value;
use tracing::info;

use binderq::config::AppConfig;
use binderq::job::{JobOptions, JobStatus};
use binderq::{JobBroker, MemoryBroker, QueueName, QueueRegistry, RedisBroker, SessionKeys};

async fn connect(config: &AppConfig) -> Result<Arc<dyn JobBroker>> {
    let broker = RedisBroker::connect(&config.redis.url())
        .await
        .with_context(|| format!("could not reach redis at {}:{}", config.redis.host, config.redis.port))?;
    Ok(Arc::new(broker))
}

fn parse_queue(raw: &str) -> Result<QueueName> {
    raw.parse::<QueueName>().map_err(anyhow::Error::from)
}

// Start the HTTP server
pub async fn serve_command(matches: &ArgMatches) -> Result<()> {
    let config = AppConfig::from_env()?;
    let broker: Arc<dyn JobBroker> = if matches.get_flag("memory") {
        info!("using in-process broker; jobs are lost on exit");
        Arc::new(MemoryBroker::new())
    } else {
        connect(&config).await?
    };
    binderq::server::run(config, broker).await
}

// Show queue statistics
pub async fn stats_command(matches: &ArgMatches) -> Result<()> {
    let config = AppConfig::from_env()?;
    let registry = QueueRegistry::new(connect(&config).await?);

    let only = matches
        .get_one::<String>("queue")
        .map(|q| parse_queue(q))
        .transpose()?;

    println!("{}", "📊 Binder queue statistics".blue().bold());
    println!("{}", "=".repeat(60).blue());
    println!(
        "{:<18} {:>8} {:>8} {:>8} {:>10} {:>8}",
        "QUEUE", "WAITING", "ACTIVE", "DELAYED", "COMPLETED", "FAILED"
    );

    for queue in registry.iter().filter(|q| only.map_or(true, |name| q.name() == name)) {
        let counts = queue.counts().await?;
        let label = if queue.is_paused().await? {
            format!("{} (paused)", queue.name()).yellow()
        } else {
            queue.name().to_string().normal()
        };
        let failed = counts.get(JobStatus::Failed).to_string();
        println!(
            "{:<18} {:>8} {:>8} {:>8} {:>10} {:>8}",
            label,
            counts.waiting,
            counts.active,
            counts.delayed,
            counts.completed,
            if counts.failed > 0 { failed.red() } else { failed.green() }
        );
    }
    Ok(())
}

// Enqueue a job from the command line
pub async fn enqueue_command(matches: &ArgMatches) -> Result<()> {
    let queue_name = parse_queue(matches.get_one::<String>("queue").context("queue is required")?)?;
    let name = matches.get_one::<String>("name").context("name is required")?;
    let raw = matches.get_one::<String>("data").context("data has a default")?;
    let data: Value = serde_json::from_str(raw).context("payload must be valid JSON")?;
    if name.trim().is_empty() {
        bail!("job name must not be empty");
    }

    let mut opts = JobOptions::default();
    if let Some(secs) = matches.get_one::<u64>("delay") {
        opts = opts.with_delay(secs.saturating_mul(1000));
    }

    let config = AppConfig::from_env()?;
    let registry = QueueRegistry::new(connect(&config).await?);
    let id = registry.queue(queue_name).add_raw(name, data, opts).await?;

    println!("{}", format!("✅ Enqueued job {id} on {queue_name}").green());
    Ok(())
}

// Mint a development session token
pub fn token_command(matches: &ArgMatches) -> Result<()> {
    let user = matches.get_one::<String>("user").context("user is required")?;
    let email = matches.get_one::<String>("email").context("email is required")?;
    let ttl = *matches.get_one::<i64>("ttl").context("ttl has a default")?;
    if ttl <= 0 {
        bail!("ttl must be positive");
    }

    let config = AppConfig::from_env()?;
    let keys = SessionKeys::new(&config.session);
    let token = keys.issue(user, email, Duration::hours(ttl))?;

    println!("{token}");
    eprintln!(
        "{}",
        format!("Set it as the '{}' cookie to pass the session gate.", keys.cookie_name()).blue()
    );
    Ok(())
}
