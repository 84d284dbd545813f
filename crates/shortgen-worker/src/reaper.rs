//! Background reaper for stuck videos and expired jobs.
//!
//! A video still marked processing long past any plausible pipeline runtime
//! means its worker died between heartbeats; the reaper fails it so the
//! owner sees an error instead of a spinner. The same sweep prunes terminal
//! jobs past their retention horizon.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use shortgen_queue::JobQueue;
use shortgen_store::{VideoPatch, VideoStore};

use crate::config::WorkerConfig;

const STUCK_FAILURE_REASON: &str =
    "Processing timed out. The worker may have crashed. Please try again.";

/// Mark processing videos older than `stuck_threshold` as failed.
/// Returns how many records were reaped.
pub async fn sweep_stuck_videos(
    store: &dyn VideoStore,
    stuck_threshold: Duration,
) -> anyhow::Result<usize> {
    let cutoff = Utc::now() - chrono::Duration::from_std(stuck_threshold)?;
    let stuck = store.find_stuck(cutoff).await?;

    let mut reaped = 0;
    for record in stuck {
        warn!(
            video_id = %record.video_id,
            created_at = %record.created_at,
            last_step = record.last_processing_step.as_deref().unwrap_or("none"),
            "Reaping stuck video"
        );
        let patch = VideoPatch::new()
            .processing(false)
            .failed(true)
            .failure_reason(STUCK_FAILURE_REASON);
        match store.update(&record.video_id, patch).await {
            Ok(()) => reaped += 1,
            Err(e) => error!(video_id = %record.video_id, "Failed to reap video: {}", e),
        }
    }

    if reaped > 0 {
        info!("Reaped {} stuck videos", reaped);
        metrics::counter!("worker.reaper.stuck_videos").increment(reaped as u64);
    }
    Ok(reaped)
}

/// Periodic cleanup task.
pub struct Reaper {
    store: Arc<dyn VideoStore>,
    queue: Arc<JobQueue>,
    stuck_threshold: Duration,
    interval: Duration,
    initial_delay: Duration,
}

impl Reaper {
    pub fn new(store: Arc<dyn VideoStore>, queue: Arc<JobQueue>, config: &WorkerConfig) -> Self {
        Self {
            store,
            queue,
            stuck_threshold: config.stuck_threshold,
            interval: config.reap_interval,
            initial_delay: config.reap_initial_delay,
        }
    }

    /// Run the reaper loop until shutdown.
    pub async fn run(&self, mut shutdown_rx: tokio::sync::watch::Receiver<bool>) {
        info!(
            "Starting reaper (initial delay {:?}, interval {:?})",
            self.initial_delay, self.interval
        );

        tokio::select! {
            _ = tokio::time::sleep(self.initial_delay) => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return;
                }
            }
        }

        let mut ticker = tokio::time::interval(self.interval);
        loop {
            self.check_once().await;

            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Reaper stopped");
                        return;
                    }
                }
            }
        }
    }

    /// Run one sweep: reap stuck videos, then prune expired terminal jobs.
    pub async fn check_once(&self) {
        if let Err(e) = sweep_stuck_videos(self.store.as_ref(), self.stuck_threshold).await {
            error!("Stuck video sweep failed: {}", e);
        }
        match self.queue.prune_terminal().await {
            Ok(pruned) if pruned > 0 => {
                metrics::counter!("worker.reaper.pruned_jobs").increment(pruned as u64);
            }
            Ok(_) => {}
            Err(e) => error!("Terminal job pruning failed: {}", e),
        }
    }
}
