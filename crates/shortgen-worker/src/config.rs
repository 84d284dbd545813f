//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// How often to sample progress for an in-flight job
    pub progress_sample_interval: Duration,
    /// How often to promote delayed jobs back onto the stream
    pub promote_interval: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Age past which a processing video counts as stuck
    pub stuck_threshold: Duration,
    /// Interval between reaper sweeps
    pub reap_interval: Duration,
    /// Delay before the first reaper sweep after startup
    pub reap_initial_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            progress_sample_interval: Duration::from_secs(10),
            promote_interval: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(30),
            stuck_threshold: Duration::from_secs(20 * 60),
            reap_interval: Duration::from_secs(30 * 60),
            reap_initial_delay: Duration::from_secs(60),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            progress_sample_interval: Duration::from_secs(
                std::env::var("WORKER_PROGRESS_SAMPLE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            promote_interval: Duration::from_secs(
                std::env::var("WORKER_PROMOTE_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            stuck_threshold: Duration::from_secs(
                std::env::var("WORKER_STUCK_THRESHOLD_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(20 * 60),
            ),
            reap_interval: Duration::from_secs(
                std::env::var("WORKER_REAP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30 * 60),
            ),
            reap_initial_delay: Duration::from_secs(
                std::env::var("WORKER_REAP_INITIAL_DELAY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }
}
