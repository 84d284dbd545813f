//! Job queue using Redis Streams.
//!
//! Delivery goes through one stream with a consumer group. Each job also has
//! a JSON record keyed by id (the source of truth for state, attempts and
//! progress), an enqueue-ordered index for recent listings, and per-state
//! sorted sets for delayed redelivery and terminal retention.

use std::time::Duration;

use chrono::Utc;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use shortgen_models::{Job, JobId, JobState, VideoConfig, VideoId};

use crate::error::{QueueError, QueueResult};
use crate::health::QueueCounts;
use crate::retention::{overflow, RetentionPolicy};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Delivery attempts per job before terminal failure
    pub max_attempts: u32,
    /// Base delay for redelivery backoff
    pub backoff_base: Duration,
    /// Redelivery backoff cap
    pub backoff_cap: Duration,
    /// Retention of terminal jobs
    pub retention: RetentionPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "shortgen:jobs".to_string(),
            consumer_group: "shortgen:workers".to_string(),
            max_attempts: 2,
            backoff_base: Duration::from_secs(3),
            backoff_cap: Duration::from_secs(60),
            retention: RetentionPolicy::default(),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            stream_name: std::env::var("QUEUE_STREAM")
                .unwrap_or_else(|_| "shortgen:jobs".to_string()),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "shortgen:workers".to_string()),
            max_attempts: std::env::var("QUEUE_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            backoff_base: Duration::from_millis(
                std::env::var("QUEUE_BACKOFF_BASE_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3000),
            ),
            backoff_cap: Duration::from_millis(
                std::env::var("QUEUE_BACKOFF_CAP_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60_000),
            ),
            retention: defaults.retention,
        }
    }

    /// Redelivery delay before attempt `attempt + 1`, given `attempt`
    /// completed deliveries. Deterministic capped exponential, no jitter.
    pub fn redelivery_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.backoff_base.saturating_mul(2u32.pow(exp));
        delay.min(self.backoff_cap)
    }
}

/// Job queue client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn job_key(&self, id: &JobId) -> String {
        format!("{}:job:{}", self.config.stream_name, id)
    }

    fn index_key(&self) -> String {
        format!("{}:index", self.config.stream_name)
    }

    fn delayed_key(&self) -> String {
        format!("{}:delayed", self.config.stream_name)
    }

    fn terminal_key(&self, state: JobState) -> String {
        format!("{}:{}", self.config.stream_name, state.as_str())
    }

    async fn conn(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.conn().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Persist the job record. Terminal records expire with their retention
    /// horizon; waiting/active/delayed records never expire, no matter how
    /// long they sit in a backlog.
    async fn save_job(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        job: &Job,
    ) -> QueueResult<()> {
        let payload = serde_json::to_string(job)?;
        let key = self.job_key(&job.id);
        match self.config.retention.max_age_for(job.state) {
            Some(max_age) => {
                let ttl = max_age.num_seconds().max(1) as u64;
                conn.set_ex::<_, _, ()>(key, payload, ttl).await?;
            }
            None => {
                conn.set::<_, _, ()>(key, payload).await?;
            }
        }
        Ok(())
    }

    async fn load_job(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        id: &JobId,
    ) -> QueueResult<Job> {
        let payload: Option<String> = conn.get(self.job_key(id)).await?;
        let payload = payload.ok_or_else(|| QueueError::job_not_found(id.to_string()))?;
        Ok(serde_json::from_str(&payload)?)
    }

    async fn push_to_stream(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        job: &Job,
    ) -> QueueResult<String> {
        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("id")
            .arg(job.id.as_str())
            .query_async(conn)
            .await?;
        Ok(message_id)
    }

    /// Enqueue a generate-video job.
    pub async fn enqueue(&self, video_id: VideoId, config: Option<VideoConfig>) -> QueueResult<Job> {
        let mut conn = self.conn().await?;

        let mut job = Job::new(video_id, config);
        job.max_attempts = self.config.max_attempts;

        self.save_job(&mut conn, &job).await?;
        conn.zadd::<_, _, _, ()>(
            self.index_key(),
            job.id.as_str(),
            job.enqueued_at.timestamp_millis(),
        )
        .await?;
        let message_id = self.push_to_stream(&mut conn, &job).await?;

        info!(
            job_id = %job.id,
            video_id = %job.video_id,
            "Enqueued job with message ID {}", message_id
        );

        Ok(job)
    }

    /// Consume jobs from the queue. Returns `(message_id, job)` pairs with
    /// each job already marked active and its attempt count bumped.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<(String, Job)>> {
        let mut conn = self.conn().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut jobs = Vec::new();

        for stream_key in result.keys {
            for entry in stream_key.ids {
                let message_id = entry.id.clone();

                let Some(redis::Value::BulkString(raw_id)) = entry.map.get("id") else {
                    warn!("Stream entry {} has no job id, dropping", message_id);
                    self.ack_message(&mut conn, &message_id).await.ok();
                    continue;
                };
                let job_id = JobId::from_string(String::from_utf8_lossy(raw_id).to_string());

                match self.load_job(&mut conn, &job_id).await {
                    Ok(job) => {
                        let job = job.start();
                        self.save_job(&mut conn, &job).await?;
                        debug!(job_id = %job.id, "Consumed job from stream");
                        jobs.push((message_id, job));
                    }
                    Err(e) => {
                        // Record expired or corrupt; ack so it is not redelivered.
                        warn!("Failed to load job {}: {}", job_id, e);
                        self.ack_message(&mut conn, &message_id).await.ok();
                    }
                }
            }
        }

        Ok(jobs)
    }

    async fn ack_message(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        message_id: &str,
    ) -> QueueResult<()> {
        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(conn)
            .await?;
        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(conn)
            .await?;
        Ok(())
    }

    /// Mark a delivered job completed.
    pub async fn ack_completed(&self, message_id: &str, job: Job) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        self.ack_message(&mut conn, message_id).await?;

        let job = job.complete();
        self.save_job(&mut conn, &job).await?;
        self.add_terminal(&mut conn, &job).await?;

        debug!(job_id = %job.id, "Acknowledged completed job");
        Ok(())
    }

    /// Record a failed delivery. Schedules a delayed redelivery while
    /// attempts remain, otherwise moves the job to terminal failed.
    pub async fn nack_failed(&self, message_id: &str, job: Job, error: &str) -> QueueResult<Job> {
        let mut conn = self.conn().await?;
        self.ack_message(&mut conn, message_id).await?;

        let job = job.fail(error);
        self.save_job(&mut conn, &job).await?;

        match job.state {
            JobState::Delayed => {
                let delay = self.config.redelivery_delay(job.attempt_count);
                let ready_at = Utc::now().timestamp_millis() + delay.as_millis() as i64;
                conn.zadd::<_, _, _, ()>(self.delayed_key(), job.id.as_str(), ready_at)
                    .await?;
                info!(
                    job_id = %job.id,
                    attempt = job.attempt_count,
                    "Job failed, redelivery in {:?}: {}", delay, error
                );
            }
            _ => {
                self.add_terminal(&mut conn, &job).await?;
                warn!(
                    job_id = %job.id,
                    attempts = job.attempt_count,
                    "Job failed terminally: {}", error
                );
            }
        }

        Ok(job)
    }

    /// Move due delayed jobs back onto the stream. Returns promoted count.
    pub async fn promote_delayed(&self) -> QueueResult<usize> {
        let mut conn = self.conn().await?;
        let now = Utc::now().timestamp_millis();

        let due: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(self.delayed_key())
            .arg("-inf")
            .arg(now)
            .arg("LIMIT")
            .arg(0)
            .arg(100)
            .query_async(&mut conn)
            .await?;

        let mut promoted = 0;
        for raw_id in due {
            let job_id = JobId::from_string(raw_id.clone());
            conn.zrem::<_, _, ()>(self.delayed_key(), &raw_id).await?;

            match self.load_job(&mut conn, &job_id).await {
                Ok(mut job) => {
                    job.state = JobState::Waiting;
                    self.save_job(&mut conn, &job).await?;
                    self.push_to_stream(&mut conn, &job).await?;
                    promoted += 1;
                }
                Err(e) => warn!("Dropping expired delayed job {}: {}", job_id, e),
            }
        }

        if promoted > 0 {
            debug!("Promoted {} delayed jobs", promoted);
        }
        Ok(promoted)
    }

    /// Update a job's progress percentage.
    pub async fn update_progress(&self, job_id: &JobId, percent: u8) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let job = self.load_job(&mut conn, job_id).await?;
        let job = job.with_progress(percent);
        self.save_job(&mut conn, &job).await?;
        Ok(())
    }

    /// Insert into the terminal set for the job's state and trim it to the
    /// retention count cap, dropping the oldest entries first.
    async fn add_terminal(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        job: &Job,
    ) -> QueueResult<()> {
        let Some(cap) = self.config.retention.cap_for(job.state) else {
            return Ok(());
        };
        let key = self.terminal_key(job.state);
        let finished = job
            .finished_at
            .unwrap_or_else(Utc::now)
            .timestamp_millis();
        conn.zadd::<_, _, _, ()>(&key, job.id.as_str(), finished).await?;

        let len: usize = conn.zcard(&key).await?;
        let drop = overflow(len, cap);
        if drop > 0 {
            let oldest: Vec<String> = conn.zrange(&key, 0, drop as isize - 1).await?;
            for raw_id in &oldest {
                self.remove_job(conn, &JobId::from_string(raw_id.clone()), job.state)
                    .await?;
            }
        }
        Ok(())
    }

    async fn remove_job(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        id: &JobId,
        state: JobState,
    ) -> QueueResult<()> {
        conn.zrem::<_, _, ()>(self.terminal_key(state), id.as_str()).await?;
        conn.zrem::<_, _, ()>(self.index_key(), id.as_str()).await?;
        conn.del::<_, ()>(self.job_key(id)).await?;
        Ok(())
    }

    /// Drop terminal jobs past their retention age horizon. Returns the
    /// number of jobs removed.
    pub async fn prune_terminal(&self) -> QueueResult<usize> {
        let mut conn = self.conn().await?;
        let now = Utc::now();
        let mut removed = 0;

        for state in [JobState::Failed, JobState::Completed] {
            let Some(max_age) = self.config.retention.max_age_for(state) else {
                continue;
            };
            let horizon = (now - max_age).timestamp_millis();
            let expired: Vec<String> = redis::cmd("ZRANGEBYSCORE")
                .arg(self.terminal_key(state))
                .arg("-inf")
                .arg(horizon)
                .query_async(&mut conn)
                .await?;

            for raw_id in expired {
                self.remove_job(&mut conn, &JobId::from_string(raw_id), state)
                    .await?;
                removed += 1;
            }
        }

        if removed > 0 {
            info!("Pruned {} terminal jobs past retention", removed);
        }
        Ok(removed)
    }

    /// Current queue depth per state.
    pub async fn get_counts(&self) -> QueueResult<QueueCounts> {
        let mut conn = self.conn().await?;

        let stream_len: u64 = conn.xlen(&self.config.stream_name).await?;
        let pending: redis::streams::StreamPendingReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .query_async(&mut conn)
            .await?;
        let active = pending.count() as u64;

        let delayed: u64 = conn.zcard(self.delayed_key()).await?;
        let completed: u64 = conn.zcard(self.terminal_key(JobState::Completed)).await?;
        let failed: u64 = conn.zcard(self.terminal_key(JobState::Failed)).await?;

        Ok(QueueCounts {
            waiting: stream_len.saturating_sub(active),
            active,
            completed,
            failed,
            delayed,
        })
    }

    /// Most recent jobs in the given states, newest-first.
    pub async fn list_recent(
        &self,
        states: &[JobState],
        limit: usize,
    ) -> QueueResult<Vec<Job>> {
        let mut conn = self.conn().await?;

        // Sample a window of recent ids from the enqueue-ordered index and
        // filter by state; avoids a per-state scan of the stream.
        let sample = (limit * 4).max(100);
        let ids: Vec<String> = conn
            .zrevrange(self.index_key(), 0, sample as isize - 1)
            .await?;

        let mut jobs = Vec::new();
        for raw_id in ids {
            if jobs.len() >= limit {
                break;
            }
            let job_id = JobId::from_string(raw_id);
            if let Ok(job) = self.load_job(&mut conn, &job_id).await {
                if states.contains(&job.state) {
                    jobs.push(job);
                }
            }
        }

        Ok(jobs)
    }
}
