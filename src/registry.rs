// src/registry.rs
use std::collections::HashMap;
use std::sync::Arc;

use crate::broker::{BrokerError, JobBroker};
use crate::job::JobId;
use crate::payloads::Job;
use crate::queue::{Queue, QueueName};

/// The three queues of the binder app, all sharing one broker connection.
#[derive(Clone, Debug)]
pub struct QueueRegistry {
    queues: HashMap<QueueName, Queue>,
}

impl QueueRegistry {
    pub fn new(broker: Arc<dyn JobBroker>) -> Self {
        let queues = QueueName::ALL
            .into_iter()
            .map(|name| (name, Queue::new(name, Arc::clone(&broker))))
            .collect();
        Self { queues }
    }

    pub fn queue(&self, name: QueueName) -> &Queue {
        // Every QueueName is inserted in `new`.
        &self.queues[&name]
    }

    pub fn recommendations(&self) -> &Queue {
        self.queue(QueueName::Recommendations)
    }

    pub fn trending(&self) -> &Queue {
        self.queue(QueueName::Trending)
    }

    pub fn import(&self) -> &Queue {
        self.queue(QueueName::Import)
    }

    pub fn find(&self, name: &str) -> Option<&Queue> {
        name.parse().ok().map(|name| self.queue(name))
    }

    /// Queues in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Queue> {
        QueueName::ALL.into_iter().map(move |name| self.queue(name))
    }

    /// Routes a typed job to the queue it declares.
    pub async fn enqueue<J: Job>(&self, job: &J) -> Result<JobId, BrokerError> {
        self.queue(J::queue()).add(job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use crate::payloads::ImportJob;

    #[tokio::test]
    async fn queues_share_one_broker() {
        let broker = Arc::new(MemoryBroker::new());
        let registry = QueueRegistry::new(broker.clone());

        let job = ImportJob {
            user_id: "u1".into(),
            url: "https://example.com/pie".into(),
            binder_id: None,
        };
        let id = registry.enqueue(&job).await.unwrap();

        let stored = broker.get("import", id.as_str()).await.unwrap().unwrap();
        assert_eq!(stored.name, "import-recipe");
        assert_eq!(stored.data["url"], "https://example.com/pie");
        assert!(Arc::ptr_eq(registry.trending().broker(), registry.import().broker()));
    }

    #[test]
    fn finds_queues_by_path_name() {
        let registry = QueueRegistry::new(Arc::new(MemoryBroker::new()));
        assert_eq!(registry.find("trending").map(Queue::name), Some(QueueName::Trending));
        assert!(registry.find("emails").is_none());
        let names: Vec<_> = registry.iter().map(Queue::name).collect();
        assert_eq!(names, QueueName::ALL.to_vec());
    }
}
