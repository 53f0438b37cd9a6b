// src/job.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::constants::{DEFAULT_ATTEMPTS, DEFAULT_BACKOFF_DELAY_MS};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backoff {
    #[serde(rename = "type")]
    pub strategy: BackoffStrategy,
    #[serde(rename = "delay")]
    pub delay_ms: u64,
}

impl Backoff {
    pub fn fixed(delay_ms: u64) -> Self {
        Self { strategy: BackoffStrategy::Fixed, delay_ms }
    }

    pub fn exponential(delay_ms: u64) -> Self {
        Self { strategy: BackoffStrategy::Exponential, delay_ms }
    }

    /// Delay in milliseconds before the next attempt once `attempts_made`
    /// attempts have failed.
    pub fn delay_for(&self, attempts_made: u32) -> u64 {
        if attempts_made == 0 {
            return 0;
        }
        match self.strategy {
            BackoffStrategy::Fixed => self.delay_ms,
            BackoffStrategy::Exponential => {
                let factor = 1u64.checked_shl(attempts_made - 1).unwrap_or(u64::MAX);
                self.delay_ms.saturating_mul(factor)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    pub attempts: u32,
    pub backoff: Backoff,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub remove_on_complete: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff: Backoff::exponential(DEFAULT_BACKOFF_DELAY_MS),
            delay_ms: 0,
            remove_on_complete: false,
        }
    }
}

impl JobOptions {
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Active,
    Delayed,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Waiting,
        JobStatus::Active,
        JobStatus::Delayed,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Active => "active",
            JobStatus::Delayed => "delayed",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Finished jobs are listed newest first.
    pub fn newest_first(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "waiting" | "wait" => Ok(JobStatus::Waiting),
            "active" => Ok(JobStatus::Active),
            "delayed" => Ok(JobStatus::Delayed),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub waiting: u64,
    pub active: u64,
    pub delayed: u64,
    pub completed: u64,
    pub failed: u64,
}

impl JobCounts {
    pub fn get(&self, status: JobStatus) -> u64 {
        match status {
            JobStatus::Waiting => self.waiting,
            JobStatus::Active => self.active,
            JobStatus::Delayed => self.delayed,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
        }
    }

    pub fn set(&mut self, status: JobStatus, count: u64) {
        match status {
            JobStatus::Waiting => self.waiting = count,
            JobStatus::Active => self.active = count,
            JobStatus::Delayed => self.delayed = count,
            JobStatus::Completed => self.completed = count,
            JobStatus::Failed => self.failed = count,
        }
    }

    pub fn total(&self) -> u64 {
        self.waiting + self.active + self.delayed + self.completed + self.failed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    pub queue: String,
    pub name: String,
    pub data: Value,
    pub opts: JobOptions,
    pub status: JobStatus,
    pub attempts_made: u32,
    pub failed_reason: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    pub processed_at: Option<i64>,
    pub finished_at: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct JobRow<'a> {
    pub id: &'a str,
    pub queue: &'a str,
    pub name: &'a str,
    pub status: &'static str,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub created_at: String,
    pub failed_reason: &'a str,
    pub data: String,
}

impl<'a> From<&'a JobRecord> for JobRow<'a> {
    fn from(job: &'a JobRecord) -> Self {
        let created_at = chrono::DateTime::from_timestamp_millis(job.created_at)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        Self {
            id: job.id.as_str(),
            queue: &job.queue,
            name: &job.name,
            status: job.status.as_str(),
            attempts_made: job.attempts_made,
            max_attempts: job.opts.attempts,
            created_at,
            failed_reason: job.failed_reason.as_deref().unwrap_or(""),
            data: job.data.to_string(),
        }
    }
}
