//! The seam between this service and the job broker.

mod memory;
mod redis_broker;

pub use self::memory::MemoryBroker;
pub use self::redis_broker::RedisBroker;

use async_trait::async_trait;
use serde_json::Value;

use crate::job::{JobCounts, JobId, JobOptions, JobRecord, JobStatus};

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("job {id} not found in queue {queue}")]
    NotFound { queue: String, id: String },

    #[error("job {id} is {actual}, expected {expected}")]
    InvalidState {
        id: String,
        expected: &'static str,
        actual: JobStatus,
    },

    #[error("delay of {0} ms is out of range")]
    DelayOutOfRange(u64),

    #[error("operation not supported for {0} jobs")]
    UnsupportedStatus(JobStatus),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt job record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl BrokerError {
    pub(crate) fn not_found(queue: &str, id: &str) -> Self {
        BrokerError::NotFound {
            queue: queue.to_string(),
            id: id.to_string(),
        }
    }
}

#[async_trait]
pub trait JobBroker: Send + Sync {
    async fn add(
        &self,
        queue: &str,
        name: &str,
        data: Value,
        opts: JobOptions,
    ) -> Result<JobId, BrokerError>;

    async fn get(&self, queue: &str, id: &str) -> Result<Option<JobRecord>, BrokerError>;

    /// Jobs in `status`, ordered for display, between the inclusive
    /// indexes `start` and `end`.
    async fn list(
        &self,
        queue: &str,
        status: JobStatus,
        start: usize,
        end: usize,
    ) -> Result<Vec<JobRecord>, BrokerError>;

    async fn counts(&self, queue: &str) -> Result<JobCounts, BrokerError>;

    async fn retry(&self, queue: &str, id: &str) -> Result<(), BrokerError>;

    /// Re-queues every failed or completed job; returns how many moved.
    async fn retry_all(&self, queue: &str, status: JobStatus) -> Result<u64, BrokerError>;

    async fn promote(&self, queue: &str, id: &str) -> Result<(), BrokerError>;

    async fn remove(&self, queue: &str, id: &str) -> Result<(), BrokerError>;

    /// Deletes every job in `status`; returns how many were removed.
    async fn clean(&self, queue: &str, status: JobStatus) -> Result<u64, BrokerError>;

    async fn pause(&self, queue: &str) -> Result<(), BrokerError>;

    async fn resume(&self, queue: &str) -> Result<(), BrokerError>;

    async fn is_paused(&self, queue: &str) -> Result<bool, BrokerError>;

    async fn ping(&self) -> Result<(), BrokerError>;
}

/// Status and sorted-set score for a job added at `now`.
fn initial_placement(opts: &JobOptions, now: i64) -> Result<(JobStatus, i64), BrokerError> {
    if opts.delay_ms == 0 {
        return Ok((JobStatus::Waiting, now));
    }
    let run_at = i64::try_from(opts.delay_ms)
        .ok()
        .and_then(|delay| now.checked_add(delay))
        .ok_or(BrokerError::DelayOutOfRange(opts.delay_ms))?;
    Ok((JobStatus::Delayed, run_at))
}

fn check_retry_status(status: JobStatus) -> Result<(), BrokerError> {
    match status {
        JobStatus::Failed | JobStatus::Completed => Ok(()),
        other => Err(BrokerError::UnsupportedStatus(other)),
    }
}
