//! Queue health and metrics snapshots.

use chrono::Utc;
use serde::Serialize;

use shortgen_models::{Job, JobState};

use crate::queue::JobQueue;

/// Queue depth per state.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct QueueCounts {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
}

/// Coarse health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<QueueCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

/// Queue metrics over a recent sample window.
#[derive(Debug, Clone, Serialize)]
pub struct QueueMetrics {
    pub counts: QueueCounts,
    /// Mean wall-clock processing time of finished sampled jobs, ms
    pub avg_processing_ms: f64,
    /// Completed / (completed + failed), in percent; 100 when nothing finished
    pub success_rate: f64,
    pub recent_jobs: Vec<Job>,
}

/// Compute aggregate metrics from a job sample.
pub fn compute_metrics(counts: QueueCounts, sample: &[Job]) -> QueueMetrics {
    let finished: Vec<i64> = sample
        .iter()
        .filter_map(|job| job.processing_millis())
        .collect();
    let avg_processing_ms = if finished.is_empty() {
        0.0
    } else {
        finished.iter().sum::<i64>() as f64 / finished.len() as f64
    };

    let total_terminal = counts.completed + counts.failed;
    let success_rate = if total_terminal > 0 {
        counts.completed as f64 / total_terminal as f64 * 100.0
    } else {
        100.0
    };

    QueueMetrics {
        counts,
        avg_processing_ms,
        success_rate,
        recent_jobs: sample.iter().take(10).cloned().collect(),
    }
}

impl JobQueue {
    /// Health snapshot; queue errors map to `unhealthy` instead of
    /// propagating, so monitoring never takes the caller down.
    pub async fn get_queue_health(&self) -> QueueHealth {
        match self.get_counts().await {
            Ok(counts) => QueueHealth {
                status: "healthy",
                counts: Some(counts),
                error: None,
                timestamp: Utc::now().to_rfc3339(),
            },
            Err(e) => QueueHealth {
                status: "unhealthy",
                counts: None,
                error: Some(e.to_string()),
                timestamp: Utc::now().to_rfc3339(),
            },
        }
    }

    /// Metrics over the most recent jobs.
    pub async fn get_queue_metrics(&self) -> crate::error::QueueResult<QueueMetrics> {
        let counts = self.get_counts().await?;
        let sample = self
            .list_recent(
                &[
                    JobState::Waiting,
                    JobState::Active,
                    JobState::Completed,
                    JobState::Failed,
                ],
                100,
            )
            .await?;
        Ok(compute_metrics(counts, &sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use shortgen_models::VideoId;

    fn finished_job(state: JobState, millis: i64) -> Job {
        let mut job = Job::new(VideoId::new(), None);
        job.state = state;
        let end = Utc::now();
        job.started_at = Some(end - Duration::milliseconds(millis));
        job.finished_at = Some(end);
        job
    }

    #[test]
    fn metrics_average_over_finished_jobs_only() {
        let counts = QueueCounts {
            completed: 2,
            failed: 0,
            ..Default::default()
        };
        let sample = vec![
            finished_job(JobState::Completed, 1000),
            finished_job(JobState::Completed, 3000),
            Job::new(VideoId::new(), None), // still waiting, excluded
        ];

        let metrics = compute_metrics(counts, &sample);
        assert!((metrics.avg_processing_ms - 2000.0).abs() < 50.0);
        assert_eq!(metrics.success_rate, 100.0);
    }

    #[test]
    fn success_rate_counts_failures() {
        let counts = QueueCounts {
            completed: 3,
            failed: 1,
            ..Default::default()
        };
        let metrics = compute_metrics(counts, &[]);
        assert_eq!(metrics.success_rate, 75.0);
        assert_eq!(metrics.avg_processing_ms, 0.0);
    }

    #[test]
    fn empty_queue_is_fully_successful() {
        let metrics = compute_metrics(QueueCounts::default(), &[]);
        assert_eq!(metrics.success_rate, 100.0);
    }
}
