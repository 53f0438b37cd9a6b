//! Background job queues for the recipe binder app.
//!
//! Three Redis-backed queues (recommendations, trending, import), HTTP
//! endpoints that enqueue work into them, and an admin board, all behind a
//! cookie session gate. Job processing happens elsewhere.

pub mod broker;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod job;
pub mod payloads;
pub mod queue;
pub mod redis_pool;
pub mod registry;
pub mod routes;
pub mod server;
pub mod services;
pub mod session;
pub mod telemetry;
pub mod utils;

pub use broker::{BrokerError, JobBroker, MemoryBroker, RedisBroker};
pub use config::AppConfig;
pub use error::ApiError;
pub use job::{Backoff, BackoffStrategy, JobCounts, JobId, JobOptions, JobRecord, JobStatus};
pub use payloads::{ImportJob, Job, RecommendationsJob, TrendingJob};
pub use queue::{Queue, QueueName};
pub use registry::QueueRegistry;
pub use session::{Session, SessionKeys};
