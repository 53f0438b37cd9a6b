use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use lazy_static::lazy_static;
use nanoid::nanoid;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use serde_json::Value;
use tracing::debug;

use super::{check_retry_status, initial_placement, BrokerError, JobBroker};
use crate::job::{JobCounts, JobId, JobOptions, JobRecord, JobStatus};
use crate::redis_pool::shared_connection;
use crate::utils::constants::KEY_PREFIX;

// Layout:
//   binderq:{queue}:job:{id}  hash with the job fields
//   binderq:{queue}:{status}  sorted set of ids, scored by ms timestamp
//   binderq:{queue}:meta      hash, `paused` = "1" | "0"

// Scripts run atomically: the status check and the writes that depend on it
// cannot interleave with another request touching the same job.
lazy_static! {
    // KEYS: job hash, source set, waiting set. ARGV: expected status, now, reset flag, id.
    // Returns the status found before the move, nil when the job is gone.
    static ref MOVE_TO_WAITING: Script = Script::new(
        r#"
        local status = redis.call('HGET', KEYS[1], 'status')
        if status ~= ARGV[1] then
            return status
        end
        redis.call('ZREM', KEYS[2], ARGV[4])
        redis.call('ZADD', KEYS[3], ARGV[2], ARGV[4])
        redis.call('HSET', KEYS[1], 'status', 'waiting')
        if ARGV[3] == '1' then
            redis.call('HSET', KEYS[1], 'attempts_made', '0')
            redis.call('HDEL', KEYS[1], 'failed_reason', 'processed_at', 'finished_at')
        end
        return status
        "#
    );

    // KEYS: source set, waiting set. ARGV: job key prefix, now.
    static ref REQUEUE_ALL: Script = Script::new(
        r#"
        local ids = redis.call('ZRANGE', KEYS[1], 0, -1)
        for _, id in ipairs(ids) do
            local key = ARGV[1] .. id
            redis.call('ZADD', KEYS[2], ARGV[2], id)
            redis.call('HSET', key, 'status', 'waiting', 'attempts_made', '0')
            redis.call('HDEL', key, 'failed_reason', 'processed_at', 'finished_at')
        end
        redis.call('DEL', KEYS[1])
        return #ids
        "#
    );

    // KEYS: job hash. ARGV: status key prefix, id.
    static ref REMOVE_JOB: Script = Script::new(
        r#"
        local status = redis.call('HGET', KEYS[1], 'status')
        if not status then
            return false
        end
        redis.call('DEL', KEYS[1])
        redis.call('ZREM', ARGV[1] .. status, ARGV[2])
        return status
        "#
    );

    // KEYS: status set. ARGV: job key prefix.
    static ref CLEAN_STATUS: Script = Script::new(
        r#"
        local ids = redis.call('ZRANGE', KEYS[1], 0, -1)
        for _, id in ipairs(ids) do
            redis.call('DEL', ARGV[1] .. id)
        end
        redis.call('DEL', KEYS[1])
        return #ids
        "#
    );
}

fn queue_prefix(queue: &str) -> String {
    format!("{KEY_PREFIX}:{queue}:")
}

fn job_prefix(queue: &str) -> String {
    format!("{KEY_PREFIX}:{queue}:job:")
}

fn job_key(queue: &str, id: &str) -> String {
    format!("{}{id}", job_prefix(queue))
}

fn status_key(queue: &str, status: JobStatus) -> String {
    format!("{}{status}", queue_prefix(queue))
}

fn meta_key(queue: &str) -> String {
    format!("{KEY_PREFIX}:{queue}:meta")
}

#[derive(Clone)]
pub struct RedisBroker {
    conn: MultiplexedConnection,
}

impl RedisBroker {
    pub async fn connect(redis_url: &str) -> Result<Self, BrokerError> {
        let conn = shared_connection(redis_url).await?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    /// Moves one job to waiting if it is still in `from`.
    async fn move_to_waiting(
        &self,
        queue: &str,
        id: &str,
        from: JobStatus,
        reset: bool,
    ) -> Result<(), BrokerError> {
        let now = Utc::now().timestamp_millis();
        let mut conn = self.conn.clone();
        let prior: Option<String> = MOVE_TO_WAITING
            .key(job_key(queue, id))
            .key(status_key(queue, from))
            .key(status_key(queue, JobStatus::Waiting))
            .arg(from.as_str())
            .arg(now)
            .arg(if reset { "1" } else { "0" })
            .arg(id)
            .invoke_async(&mut conn)
            .await?;

        let raw = prior.ok_or_else(|| BrokerError::not_found(queue, id))?;
        let actual = parse_status(queue, id, &raw)?;
        if actual == from {
            Ok(())
        } else {
            Err(BrokerError::InvalidState {
                id: id.to_string(),
                expected: from.as_str(),
                actual,
            })
        }
    }
}

fn parse_status(queue: &str, id: &str, raw: &str) -> Result<JobStatus, BrokerError> {
    raw.parse().map_err(|e: crate::job::UnknownStatus| BrokerError::Corrupt {
        key: job_key(queue, id),
        reason: e.to_string(),
    })
}

fn field<'a>(map: &'a HashMap<String, String>, key: &str, name: &str) -> Result<&'a str, BrokerError> {
    map.get(name).map(String::as_str).ok_or_else(|| BrokerError::Corrupt {
        key: key.to_string(),
        reason: format!("missing field '{name}'"),
    })
}

fn parse_field<T: std::str::FromStr>(
    map: &HashMap<String, String>,
    key: &str,
    name: &str,
) -> Result<Option<T>, BrokerError> {
    match map.get(name) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| BrokerError::Corrupt {
            key: key.to_string(),
            reason: format!("invalid field '{name}': {raw}"),
        }),
    }
}

fn record_from_hash(
    queue: &str,
    id: &str,
    map: &HashMap<String, String>,
) -> Result<JobRecord, BrokerError> {
    let key = job_key(queue, id);
    let status = parse_field::<JobStatus>(map, &key, "status")?.ok_or_else(|| {
        BrokerError::Corrupt {
            key: key.clone(),
            reason: "missing field 'status'".to_string(),
        }
    })?;
    Ok(JobRecord {
        id: JobId::new(id),
        queue: queue.to_string(),
        name: field(map, &key, "name")?.to_string(),
        data: serde_json::from_str(field(map, &key, "data")?)?,
        opts: serde_json::from_str(field(map, &key, "opts")?)?,
        status,
        attempts_made: parse_field(map, &key, "attempts_made")?.unwrap_or(0),
        failed_reason: map.get("failed_reason").cloned(),
        created_at: parse_field(map, &key, "created_at")?.unwrap_or(0),
        processed_at: parse_field(map, &key, "processed_at")?,
        finished_at: parse_field(map, &key, "finished_at")?,
    })
}

#[async_trait]
impl JobBroker for RedisBroker {
    async fn add(
        &self,
        queue: &str,
        name: &str,
        data: Value,
        opts: JobOptions,
    ) -> Result<JobId, BrokerError> {
        let now = Utc::now().timestamp_millis();
        let (status, score) = initial_placement(&opts, now)?;
        let id = nanoid!(10);
        let data = serde_json::to_string(&data)?;
        let opts = serde_json::to_string(&opts)?;
        let created_at = now.to_string();

        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .hset_multiple(
                job_key(queue, &id),
                &[
                    ("name", name),
                    ("data", data.as_str()),
                    ("opts", opts.as_str()),
                    ("status", status.as_str()),
                    ("attempts_made", "0"),
                    ("created_at", created_at.as_str()),
                ],
            )
            .ignore()
            .zadd(status_key(queue, status), &id, score)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        debug!(queue, job_id = %id, %status, "stored job");
        Ok(JobId::new(id))
    }

    async fn get(&self, queue: &str, id: &str) -> Result<Option<JobRecord>, BrokerError> {
        let mut conn = self.conn.clone();
        let map: HashMap<String, String> = conn.hgetall(job_key(queue, id)).await?;
        if map.is_empty() {
            return Ok(None);
        }
        record_from_hash(queue, id, &map).map(Some)
    }

    async fn list(
        &self,
        queue: &str,
        status: JobStatus,
        start: usize,
        end: usize,
    ) -> Result<Vec<JobRecord>, BrokerError> {
        let mut conn = self.conn.clone();
        let key = status_key(queue, status);
        let ids: Vec<String> = if status.newest_first() {
            conn.zrevrange(&key, start as isize, end as isize).await?
        } else {
            conn.zrange(&key, start as isize, end as isize).await?
        };
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.hgetall(job_key(queue, id));
        }
        let maps: Vec<HashMap<String, String>> = pipe.query_async(&mut conn).await?;

        // A job removed between the two round trips leaves an empty hash.
        ids.iter()
            .zip(maps.iter())
            .filter(|(_, map)| !map.is_empty())
            .map(|(id, map)| record_from_hash(queue, id, map))
            .collect()
    }

    async fn counts(&self, queue: &str) -> Result<JobCounts, BrokerError> {
        let mut pipe = redis::pipe();
        for status in JobStatus::ALL {
            pipe.zcard(status_key(queue, status));
        }
        let mut conn = self.conn.clone();
        let sizes: Vec<u64> = pipe.query_async(&mut conn).await?;

        let mut counts = JobCounts::default();
        for (status, size) in JobStatus::ALL.into_iter().zip(sizes) {
            counts.set(status, size);
        }
        Ok(counts)
    }

    async fn retry(&self, queue: &str, id: &str) -> Result<(), BrokerError> {
        self.move_to_waiting(queue, id, JobStatus::Failed, true).await
    }

    async fn retry_all(&self, queue: &str, status: JobStatus) -> Result<u64, BrokerError> {
        check_retry_status(status)?;
        let mut conn = self.conn.clone();
        let moved: u64 = REQUEUE_ALL
            .key(status_key(queue, status))
            .key(status_key(queue, JobStatus::Waiting))
            .arg(job_prefix(queue))
            .arg(Utc::now().timestamp_millis())
            .invoke_async(&mut conn)
            .await?;
        Ok(moved)
    }

    async fn promote(&self, queue: &str, id: &str) -> Result<(), BrokerError> {
        self.move_to_waiting(queue, id, JobStatus::Delayed, false).await
    }

    async fn remove(&self, queue: &str, id: &str) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let removed: Option<String> = REMOVE_JOB
            .key(job_key(queue, id))
            .arg(queue_prefix(queue))
            .arg(id)
            .invoke_async(&mut conn)
            .await?;
        removed
            .map(|_| ())
            .ok_or_else(|| BrokerError::not_found(queue, id))
    }

    async fn clean(&self, queue: &str, status: JobStatus) -> Result<u64, BrokerError> {
        let mut conn = self.conn.clone();
        let removed: u64 = CLEAN_STATUS
            .key(status_key(queue, status))
            .arg(job_prefix(queue))
            .invoke_async(&mut conn)
            .await?;
        Ok(removed)
    }

    async fn pause(&self, queue: &str) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(meta_key(queue), "paused", "1").await?;
        Ok(())
    }

    async fn resume(&self, queue: &str) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(meta_key(queue), "paused", "0").await?;
        Ok(())
    }

    async fn is_paused(&self, queue: &str) -> Result<bool, BrokerError> {
        let mut conn = self.conn.clone();
        let paused: Option<String> = conn.hget(meta_key(queue), "paused").await?;
        Ok(paused.as_deref() == Some("1"))
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await?;
        Ok(())
    }
}
