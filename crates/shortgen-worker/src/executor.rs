//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shortgen_models::Job;
use shortgen_pipeline::{estimate_progress, PipelineRunner};
use shortgen_queue::JobQueue;
use shortgen_store::{VideoPatch, VideoStore};

use shortgen_models::VideoId;
use shortgen_store::StoreResult;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::JobLogger;

/// Per-tick progress sample. `None` means the record is gone and sampling
/// should stop.
async fn sample_progress(
    store: &dyn VideoStore,
    video_id: &VideoId,
) -> StoreResult<Option<u8>> {
    Ok(store
        .find_one(video_id)
        .await?
        .map(|record| estimate_progress(&record)))
}

/// Release the record after a successful run. The pipeline never clears the
/// processing flag on success; this write is what establishes the terminal
/// `processing=false, failed=false` shape.
async fn release_record(store: &dyn VideoStore, video_id: &VideoId) -> StoreResult<()> {
    store
        .update(video_id, VideoPatch::new().processing(false).failed(false))
        .await
}

/// Mark the record failed at the job boundary. Idempotent with the
/// pipeline's own failure-path write; catches the case where that write
/// itself failed. Leaves `failure_reason`/`last_processing_step` untouched.
async fn mark_record_failed(store: &dyn VideoStore, video_id: &VideoId) -> StoreResult<()> {
    store
        .update(video_id, VideoPatch::new().processing(false).failed(true))
        .await
}

/// Job executor that processes generation jobs from the queue.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    store: Arc<dyn VideoStore>,
    runner: Arc<PipelineRunner>,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(
        config: WorkerConfig,
        queue: JobQueue,
        store: Arc<dyn VideoStore>,
        runner: PipelineRunner,
    ) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            store,
            runner: Arc::new(runner),
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Start the executor.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();

        // Periodically move delayed jobs whose backoff has elapsed back onto
        // the stream.
        let queue_clone = Arc::clone(&self.queue);
        let promote_interval = self.config.promote_interval;
        let mut shutdown_rx_promote = self.shutdown.subscribe();
        let promote_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(promote_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx_promote.changed() => {
                        if *shutdown_rx_promote.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        if let Err(e) = queue_clone.promote_delayed().await {
                            warn!("Failed to promote delayed jobs: {}", e);
                        }
                    }
                }
            }
        });

        // Main job consumption loop
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        // Back off on error
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        promote_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        let _ = tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs()).await;

        info!("Job executor stopped");
        Ok(())
    }

    /// Consume and process jobs from the queue.
    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            // All slots busy, wait a bit
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(
                &self.consumer_name,
                1000, // Block for 1 second
                available,
            )
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from queue", jobs.len());

        for (message_id, job) in jobs {
            let queue = Arc::clone(&self.queue);
            let store = Arc::clone(&self.store);
            let runner = Arc::clone(&self.runner);
            let sample_interval = self.config.progress_sample_interval;
            let permit = self
                .job_semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| crate::error::WorkerError::job_failed("Semaphore closed"))?;

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(queue, store, runner, sample_interval, message_id, job).await;
            });
        }

        Ok(())
    }

    /// Execute a single job end to end.
    async fn execute_job(
        queue: Arc<JobQueue>,
        store: Arc<dyn VideoStore>,
        runner: Arc<PipelineRunner>,
        sample_interval: Duration,
        message_id: String,
        job: Job,
    ) {
        let job_id = job.id.clone();
        let video_id = job.video_id.clone();
        let logger = JobLogger::new(&job_id, &video_id);
        logger.start(&format!("attempt {}", job.attempt_count));
        metrics::counter!("worker.job.started").increment(1);

        if let Err(e) = queue.update_progress(&job_id, 0).await {
            warn!(job_id = %job_id, "Failed to reset progress: {}", e);
        }

        // Sample artifact-derived progress onto the job record while the
        // pipeline runs.
        let sampler = {
            let queue = Arc::clone(&queue);
            let store = Arc::clone(&store);
            let job_id = job_id.clone();
            let video_id = video_id.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(sample_interval);
                interval.tick().await; // first tick fires immediately
                loop {
                    interval.tick().await;
                    match sample_progress(store.as_ref(), &video_id).await {
                        Ok(Some(percent)) => {
                            if let Err(e) = queue.update_progress(&job_id, percent).await {
                                debug!(job_id = %job_id, "Progress update failed: {}", e);
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            debug!(video_id = %video_id, "Progress sample failed: {}", e)
                        }
                    }
                }
            })
        };

        let result = runner.run(&video_id, job.config).await;
        sampler.abort();

        match result {
            Ok(outcome) => {
                logger.completion(&outcome.video_url);
                metrics::counter!("worker.job.completed").increment(1);

                if let Err(e) = release_record(store.as_ref(), &video_id).await {
                    error!(video_id = %video_id, "Failed to finalize record: {}", e);
                }
                if let Err(e) = queue.ack_completed(&message_id, job).await {
                    error!(job_id = %job_id, "Failed to ack job: {}", e);
                }
            }
            Err(e) => {
                logger.error(&e.to_string());
                metrics::counter!("worker.job.failed", "step" => e.step.as_str()).increment(1);

                if let Err(store_err) = mark_record_failed(store.as_ref(), &video_id).await {
                    warn!(video_id = %video_id, "Failed to mark record failed: {}", store_err);
                }

                // The queue decides redelivery from the remaining attempts.
                match queue.nack_failed(&message_id, job, &e.to_string()).await {
                    Ok(failed_job) if failed_job.state == shortgen_models::JobState::Delayed => {
                        info!(
                            job_id = %job_id,
                            attempt = failed_job.attempt_count,
                            max_attempts = failed_job.max_attempts,
                            "Job scheduled for redelivery"
                        );
                    }
                    Ok(_) => {}
                    Err(nack_err) => {
                        error!(job_id = %job_id, "Failed to nack job: {}", nack_err);
                    }
                }
            }
        }
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        loop {
            let available = self.job_semaphore.available_permits();
            if available == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use shortgen_models::VideoRecord;
    use shortgen_pipeline::mock::mock_collaborators;
    use shortgen_store::MemoryVideoStore;

    async fn seeded(id: &str, prompt: &str) -> (MemoryVideoStore, VideoId) {
        let store = MemoryVideoStore::new();
        let video_id = VideoId::from(id);
        store
            .create(VideoRecord::new(video_id.clone(), prompt))
            .await
            .unwrap();
        (store, video_id)
    }

    #[tokio::test]
    async fn successful_run_releases_the_record() {
        let (store, video_id) = seeded("v-ok", "a short about the borrow checker").await;

        let runner = PipelineRunner::new(Arc::new(store.clone()), mock_collaborators());
        let outcome = runner.run(&video_id, None).await.unwrap();

        release_record(&store, &video_id).await.unwrap();

        let record = store.find_one(&video_id).await.unwrap().unwrap();
        assert!(!record.processing);
        assert!(!record.failed);
        assert_eq!(record.video_url.as_deref(), Some(outcome.video_url.as_str()));
    }

    #[tokio::test]
    async fn failure_write_keeps_the_pipeline_diagnosis() {
        let (store, video_id) = seeded("v-failed", "p").await;

        // The pipeline's own failure-path write already landed.
        store
            .update(
                &video_id,
                VideoPatch::new()
                    .processing(false)
                    .failed(true)
                    .failure_reason("image generation failed")
                    .last_processing_step("generate_images"),
            )
            .await
            .unwrap();

        mark_record_failed(&store, &video_id).await.unwrap();

        let record = store.find_one(&video_id).await.unwrap().unwrap();
        assert!(!record.processing);
        assert!(record.failed);
        assert_eq!(
            record.failure_reason.as_deref(),
            Some("image generation failed")
        );
        assert_eq!(
            record.last_processing_step.as_deref(),
            Some("generate_images")
        );
    }

    #[tokio::test]
    async fn failure_write_lands_when_the_pipeline_write_never_did() {
        let (store, video_id) = seeded("v-orphan", "p").await;

        mark_record_failed(&store, &video_id).await.unwrap();

        let record = store.find_one(&video_id).await.unwrap().unwrap();
        assert!(!record.processing);
        assert!(record.failed);
    }

    #[tokio::test]
    async fn progress_samples_track_artifacts_and_stop_on_deletion() {
        let (store, video_id) = seeded("v-progress", "p").await;

        assert_eq!(sample_progress(&store, &video_id).await.unwrap(), Some(0));

        store
            .update(&video_id, VideoPatch::new().content("narration"))
            .await
            .unwrap();
        let after_content = sample_progress(&store, &video_id).await.unwrap().unwrap();
        assert!(after_content > 0);

        store
            .update(
                &video_id,
                VideoPatch::new().image_links(vec!["https://mock.local/i1.png".into()]),
            )
            .await
            .unwrap();
        let after_images = sample_progress(&store, &video_id).await.unwrap().unwrap();
        assert!(after_images > after_content);

        store.delete(&video_id).await.unwrap();
        assert_eq!(sample_progress(&store, &video_id).await.unwrap(), None);
    }
}
