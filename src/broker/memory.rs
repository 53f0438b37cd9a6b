use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;

use super::{check_retry_status, initial_placement, BrokerError, JobBroker};
use crate::job::{JobCounts, JobId, JobOptions, JobRecord, JobStatus};

struct Entry {
    record: JobRecord,
    score: i64,
    seq: u64,
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<String, Entry>,
    paused: bool,
}

/// In-process broker for `serve --memory` and tests. The `mark_*` methods
/// stand in for a worker reporting back.
#[derive(Default)]
pub struct MemoryBroker {
    queues: RwLock<HashMap<String, QueueState>>,
    seq: AtomicU64,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn transition(
        &self,
        queue: &str,
        id: &str,
        apply: impl FnOnce(&mut JobRecord) -> Result<(), BrokerError>,
    ) -> Result<(), BrokerError> {
        let seq = self.next_seq();
        let mut queues = self.queues.write();
        let entry = queues
            .get_mut(queue)
            .and_then(|q| q.jobs.get_mut(id))
            .ok_or_else(|| BrokerError::not_found(queue, id))?;
        apply(&mut entry.record)?;
        entry.score = Utc::now().timestamp_millis();
        entry.seq = seq;
        Ok(())
    }

    pub fn mark_active(&self, queue: &str, id: &str) -> Result<(), BrokerError> {
        self.transition(queue, id, |job| {
            expect_status(job, JobStatus::Waiting)?;
            job.status = JobStatus::Active;
            job.processed_at = Some(Utc::now().timestamp_millis());
            Ok(())
        })
    }

    pub fn mark_completed(&self, queue: &str, id: &str) -> Result<(), BrokerError> {
        self.transition(queue, id, |job| {
            expect_status(job, JobStatus::Active)?;
            job.status = JobStatus::Completed;
            job.attempts_made += 1;
            job.finished_at = Some(Utc::now().timestamp_millis());
            Ok(())
        })
    }

    pub fn mark_failed(&self, queue: &str, id: &str, reason: &str) -> Result<(), BrokerError> {
        self.transition(queue, id, |job| {
            expect_status(job, JobStatus::Active)?;
            job.status = JobStatus::Failed;
            job.attempts_made += 1;
            job.failed_reason = Some(reason.to_string());
            job.finished_at = Some(Utc::now().timestamp_millis());
            Ok(())
        })
    }
}

fn expect_status(job: &JobRecord, expected: JobStatus) -> Result<(), BrokerError> {
    if job.status == expected {
        Ok(())
    } else {
        Err(BrokerError::InvalidState {
            id: job.id.to_string(),
            expected: expected.as_str(),
            actual: job.status,
        })
    }
}

fn requeue(job: &mut JobRecord) {
    job.status = JobStatus::Waiting;
    job.attempts_made = 0;
    job.failed_reason = None;
    job.processed_at = None;
    job.finished_at = None;
}

#[async_trait]
impl JobBroker for MemoryBroker {
    async fn add(
        &self,
        queue: &str,
        name: &str,
        data: Value,
        opts: JobOptions,
    ) -> Result<JobId, BrokerError> {
        let seq = self.next_seq();
        let now = Utc::now().timestamp_millis();
        let (status, score) = initial_placement(&opts, now)?;
        let id = JobId::new(seq.to_string());
        let record = JobRecord {
            id: id.clone(),
            queue: queue.to_string(),
            name: name.to_string(),
            data,
            opts,
            status,
            attempts_made: 0,
            failed_reason: None,
            created_at: now,
            processed_at: None,
            finished_at: None,
        };
        self.queues
            .write()
            .entry(queue.to_string())
            .or_default()
            .jobs
            .insert(id.to_string(), Entry { record, score, seq });
        Ok(id)
    }

    async fn get(&self, queue: &str, id: &str) -> Result<Option<JobRecord>, BrokerError> {
        Ok(self
            .queues
            .read()
            .get(queue)
            .and_then(|q| q.jobs.get(id))
            .map(|e| e.record.clone()))
    }

    async fn list(
        &self,
        queue: &str,
        status: JobStatus,
        start: usize,
        end: usize,
    ) -> Result<Vec<JobRecord>, BrokerError> {
        let queues = self.queues.read();
        let Some(state) = queues.get(queue) else {
            return Ok(Vec::new());
        };
        let mut entries: Vec<&Entry> = state
            .jobs
            .values()
            .filter(|e| e.record.status == status)
            .collect();
        entries.sort_by_key(|e| (e.score, e.seq));
        if status.newest_first() {
            entries.reverse();
        }
        Ok(entries
            .into_iter()
            .skip(start)
            .take(end.saturating_sub(start) + 1)
            .map(|e| e.record.clone())
            .collect())
    }

    async fn counts(&self, queue: &str) -> Result<JobCounts, BrokerError> {
        let mut counts = JobCounts::default();
        if let Some(state) = self.queues.read().get(queue) {
            for entry in state.jobs.values() {
                let status = entry.record.status;
                counts.set(status, counts.get(status) + 1);
            }
        }
        Ok(counts)
    }

    async fn retry(&self, queue: &str, id: &str) -> Result<(), BrokerError> {
        self.transition(queue, id, |job| {
            expect_status(job, JobStatus::Failed)?;
            requeue(job);
            Ok(())
        })
    }

    async fn retry_all(&self, queue: &str, status: JobStatus) -> Result<u64, BrokerError> {
        check_retry_status(status)?;
        let now = Utc::now().timestamp_millis();
        let mut queues = self.queues.write();
        let Some(state) = queues.get_mut(queue) else {
            return Ok(0);
        };
        let mut moved = 0;
        for entry in state.jobs.values_mut() {
            if entry.record.status == status {
                requeue(&mut entry.record);
                entry.score = now;
                entry.seq = self.next_seq();
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn promote(&self, queue: &str, id: &str) -> Result<(), BrokerError> {
        self.transition(queue, id, |job| {
            expect_status(job, JobStatus::Delayed)?;
            job.status = JobStatus::Waiting;
            Ok(())
        })
    }

    async fn remove(&self, queue: &str, id: &str) -> Result<(), BrokerError> {
        self.queues
            .write()
            .get_mut(queue)
            .and_then(|q| q.jobs.remove(id))
            .map(|_| ())
            .ok_or_else(|| BrokerError::not_found(queue, id))
    }

    async fn clean(&self, queue: &str, status: JobStatus) -> Result<u64, BrokerError> {
        let mut queues = self.queues.write();
        let Some(state) = queues.get_mut(queue) else {
            return Ok(0);
        };
        let before = state.jobs.len();
        state.jobs.retain(|_, e| e.record.status != status);
        Ok((before - state.jobs.len()) as u64)
    }

    async fn pause(&self, queue: &str) -> Result<(), BrokerError> {
        self.queues.write().entry(queue.to_string()).or_default().paused = true;
        Ok(())
    }

    async fn resume(&self, queue: &str) -> Result<(), BrokerError> {
        self.queues.write().entry(queue.to_string()).or_default().paused = false;
        Ok(())
    }

    async fn is_paused(&self, queue: &str) -> Result<bool, BrokerError> {
        Ok(self.queues.read().get(queue).is_some_and(|q| q.paused))
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}
