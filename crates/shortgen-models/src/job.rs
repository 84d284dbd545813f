//! Queue job definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::VideoConfig;
use crate::video::VideoId;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job state in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Job is waiting in the queue
    #[default]
    Waiting,
    /// Job is being processed by a worker
    Active,
    /// Job is waiting out a redelivery backoff
    Delayed,
    /// Job completed successfully
    Completed,
    /// Job failed after exhausting its delivery attempts
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Delayed => "delayed",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    /// Terminal jobs are retained briefly for operability, then pruned.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_max_attempts() -> u32 {
    2
}

/// One queued unit of work: the end-to-end generation of a single video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Video record this job generates
    pub video_id: VideoId,

    /// Optional generation configuration (defaults applied when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<VideoConfig>,

    /// Job state
    #[serde(default)]
    pub state: JobState,

    /// When the job was submitted
    pub enqueued_at: DateTime<Utc>,

    /// When a worker picked the job up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Number of delivery attempts made so far
    #[serde(default)]
    pub attempt_count: u32,

    /// Maximum delivery attempts before the job fails for good
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Progress percentage (0-100)
    #[serde(default)]
    pub progress_percent: u8,

    /// Failure reason (terminal failed jobs only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_reason: Option<String>,
}

impl Job {
    /// Create a new waiting job for a video.
    pub fn new(video_id: VideoId, config: Option<VideoConfig>) -> Self {
        Self {
            id: JobId::new(),
            video_id,
            config,
            state: JobState::Waiting,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            attempt_count: 0,
            max_attempts: default_max_attempts(),
            progress_percent: 0,
            failed_reason: None,
        }
    }

    /// Mark the job active; increments the delivery attempt count. Progress
    /// restarts from zero for each delivery; monotonicity only holds within
    /// one attempt.
    pub fn start(mut self) -> Self {
        self.state = JobState::Active;
        self.started_at = Some(Utc::now());
        self.attempt_count += 1;
        self.progress_percent = 0;
        self
    }

    /// Mark the job completed.
    pub fn complete(mut self) -> Self {
        self.state = JobState::Completed;
        self.finished_at = Some(Utc::now());
        self.progress_percent = 100;
        self
    }

    /// Record a failed delivery attempt. Moves to `Delayed` when attempts
    /// remain, otherwise to terminal `Failed`.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.failed_reason = Some(error.into());
        if self.attempt_count < self.max_attempts {
            self.state = JobState::Delayed;
        } else {
            self.state = JobState::Failed;
            self.finished_at = Some(Utc::now());
        }
        self
    }

    /// Whether another delivery attempt is allowed.
    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.max_attempts
    }

    /// Update progress; clamped to 100 and never moved backwards.
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress_percent = progress.min(100).max(self.progress_percent);
        self
    }

    /// Wall-clock processing time for finished jobs.
    pub fn processing_millis(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_lifecycle_success() {
        let job = Job::new(VideoId::new(), None);
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(job.attempt_count, 0);

        let job = job.start();
        assert_eq!(job.state, JobState::Active);
        assert_eq!(job.attempt_count, 1);

        let job = job.complete();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.progress_percent, 100);
        assert!(job.state.is_terminal());
        assert!(job.processing_millis().is_some());
    }

    #[test]
    fn job_redelivery_then_terminal_failure() {
        let job = Job::new(VideoId::new(), None).start();
        let job = job.fail("image generation failed");
        assert_eq!(job.state, JobState::Delayed);
        assert!(job.can_retry());

        let job = job.start();
        assert_eq!(job.attempt_count, 2);
        let job = job.fail("image generation failed");
        assert_eq!(job.state, JobState::Failed);
        assert!(!job.can_retry());
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn redelivery_starts_progress_over() {
        let job = Job::new(VideoId::new(), None).start().with_progress(70);
        let job = job.fail("audio synthesis failed");
        assert_eq!(job.state, JobState::Delayed);
        assert_eq!(job.progress_percent, 70);

        let job = job.start();
        assert_eq!(job.progress_percent, 0);
    }

    #[test]
    fn progress_never_decreases() {
        let job = Job::new(VideoId::new(), None).with_progress(40);
        let job = job.with_progress(20);
        assert_eq!(job.progress_percent, 40);
        let job = job.with_progress(150);
        assert_eq!(job.progress_percent, 100);
    }

    #[test]
    fn job_serde_roundtrip() {
        let job = Job::new(VideoId::from("v1"), Some(VideoConfig::default()));
        let json = serde_json::to_string(&job).unwrap();
        let decoded: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.id, job.id);
        assert_eq!(decoded.video_id, job.video_id);
        assert_eq!(decoded.config, job.config);
    }
}
