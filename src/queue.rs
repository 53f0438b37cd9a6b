use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::broker::{BrokerError, JobBroker};
use crate::job::{JobCounts, JobId, JobOptions};
use crate::payloads::Job;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueName {
    Recommendations,
    Trending,
    Import,
}

impl QueueName {
    pub const ALL: [QueueName; 3] = [
        QueueName::Recommendations,
        QueueName::Trending,
        QueueName::Import,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Recommendations => "recommendations",
            QueueName::Trending => "trending",
            QueueName::Import => "import",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown queue '{0}'")]
pub struct UnknownQueue(pub String);

impl FromStr for QueueName {
    type Err = UnknownQueue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueName::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| UnknownQueue(s.to_string()))
    }
}

#[derive(Clone)]
pub struct Queue {
    name: QueueName,
    broker: Arc<dyn JobBroker>,
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue").field("name", &self.name).finish()
    }
}

impl Queue {
    pub fn new(name: QueueName, broker: Arc<dyn JobBroker>) -> Self {
        Self { name, broker }
    }

    pub fn name(&self) -> QueueName {
        self.name
    }

    pub fn broker(&self) -> &Arc<dyn JobBroker> {
        &self.broker
    }

    pub async fn add<J: Job>(&self, job: &J) -> Result<JobId, BrokerError> {
        let data = serde_json::to_value(job)?;
        self.add_raw(J::name(), data, J::options()).await
    }

    /// Enqueues an untyped payload. The payload is stored as given.
    pub async fn add_raw(
        &self,
        name: &str,
        data: Value,
        opts: JobOptions,
    ) -> Result<JobId, BrokerError> {
        debug!(queue = %self.name, job = name, "adding job");
        let id = self.broker.add(self.name.as_str(), name, data, opts).await?;
        info!(queue = %self.name, job = name, job_id = %id, "job enqueued");
        Ok(id)
    }

    pub async fn counts(&self) -> Result<JobCounts, BrokerError> {
        self.broker.counts(self.name.as_str()).await
    }

    pub async fn is_paused(&self) -> Result<bool, BrokerError> {
        self.broker.is_paused(self.name.as_str()).await
    }
}
