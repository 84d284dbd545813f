//! The nine-step pipeline orchestrator.
//!
//! One runner serves both configured and unconfigured jobs; a missing
//! `VideoConfig` means the defaults. Each step persists only its own output
//! field on the video record, so a crash between steps leaves a record the
//! progress estimator and a later re-drive can both make sense of.

use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use tracing::{info, warn};

use shortgen_models::{CaptionWord, VideoConfig, VideoId};
use shortgen_store::{VideoPatch, VideoStore};

use crate::collaborators::{CaptionError, Collaborators};
use crate::duration::calculate_duration_frames;
use crate::error::{PipelineError, PipelineResult};
use crate::script::parse_script;
use crate::state::{ProcessingState, StepName};
use crate::step::{run_step, run_step_with_retry, RetryPolicy};

/// Result of a successful pipeline run.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub video_id: VideoId,
    pub video_url: String,
    pub duration_frames: u32,
    /// False when the caption provider finished without a transcript.
    pub captioned: bool,
    pub state: ProcessingState,
}

/// Drives one video through all nine steps.
pub struct PipelineRunner {
    store: Arc<dyn VideoStore>,
    collaborators: Collaborators,
    script_retry: RetryPolicy,
    media_retry: RetryPolicy,
    caption_transport_attempts: u32,
    persist_timeout: Duration,
    failure_report_timeout: Duration,
}

impl PipelineRunner {
    pub fn new(store: Arc<dyn VideoStore>, collaborators: Collaborators) -> Self {
        Self {
            store,
            collaborators,
            script_retry: RetryPolicy::with_max_retries(3),
            media_retry: RetryPolicy::with_max_retries(2),
            caption_transport_attempts: 3,
            persist_timeout: Duration::from_secs(30),
            failure_report_timeout: Duration::from_secs(15),
        }
    }

    /// Override the persist and failure-report timeouts.
    pub fn with_timeouts(mut self, persist: Duration, failure_report: Duration) -> Self {
        self.persist_timeout = persist;
        self.failure_report_timeout = failure_report;
        self
    }

    /// Override the script and media retry policies.
    pub fn with_retry_policies(mut self, script: RetryPolicy, media: RetryPolicy) -> Self {
        self.script_retry = script;
        self.media_retry = media;
        self
    }

    /// Run the full pipeline for one video.
    ///
    /// On failure the record is marked failed (best effort, bounded) and the
    /// original step error is returned for the worker's retry decision.
    pub async fn run(
        &self,
        video_id: &VideoId,
        config: Option<VideoConfig>,
    ) -> PipelineResult<PipelineOutcome> {
        let config = config.unwrap_or_default();
        let mut state = ProcessingState::new(video_id.clone());
        info!(video_id = %video_id, duration = %config.duration, "pipeline started");

        match self.run_steps(&mut state, video_id, &config).await {
            Ok(outcome) => {
                info!(
                    video_id = %video_id,
                    elapsed_ms = state.elapsed_millis(),
                    captioned = outcome.captioned,
                    "pipeline completed"
                );
                metrics::counter!("pipeline.run.completed").increment(1);
                Ok(outcome)
            }
            Err(err) => {
                warn!(
                    video_id = %video_id,
                    step = err.step.as_str(),
                    elapsed_ms = state.elapsed_millis(),
                    step_durations = ?state.step_durations(),
                    errors = ?state.error_messages(),
                    "pipeline failed"
                );
                metrics::counter!("pipeline.run.failed", "step" => err.step.as_str())
                    .increment(1);
                self.report_failure(video_id, &err).await;
                Err(err)
            }
        }
    }

    async fn run_steps(
        &self,
        state: &mut ProcessingState,
        video_id: &VideoId,
        config: &VideoConfig,
    ) -> PipelineResult<PipelineOutcome> {
        // 1. retrieve_prompt
        let mut record = run_step(state, StepName::RetrievePrompt, || async {
            let record = self
                .store
                .find_one(video_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("video record not found"))?;
            anyhow::ensure!(
                record.prompt.as_deref().is_some_and(|p| !p.trim().is_empty()),
                "video record has no prompt"
            );
            Ok(record)
        })
        .await?;
        let prompt = record.prompt.clone().unwrap_or_default();

        // 2. generate_script
        let raw_script = run_step_with_retry(
            state,
            StepName::GenerateScript,
            self.script_retry,
            || async {
                self.collaborators
                    .script
                    .generate_script(&prompt, config)
                    .await
            },
        )
        .await?;

        // 3. parse_script
        let expected = config.expected_scene_count();
        let script = run_step(state, StepName::ParseScript, || async {
            parse_script(&raw_script, expected).map_err(anyhow::Error::from)
        })
        .await?;
        let content = script.full_content();

        // 4. persist_parsed_data
        run_step(state, StepName::PersistParsedData, || async {
            let patch = VideoPatch::new()
                .content(content.clone())
                .image_prompts(script.image_prompts.clone());
            tokio::time::timeout(self.persist_timeout, self.store.update(video_id, patch))
                .await
                .map_err(|_| anyhow::anyhow!("persisting parsed script timed out"))??;
            Ok(())
        })
        .await?;
        record.content = Some(content.clone());
        record.image_prompts = script.image_prompts.clone();

        // 5. generate_images: fan out, commit all or nothing
        let image_count = config.image_count.as_usize();
        let aspect_ratio = config.aspect_ratio;
        let image_links = run_step_with_retry(
            state,
            StepName::GenerateImages,
            self.media_retry,
            || {
                // Prompts cycle when the configured image count exceeds the
                // scene count.
                let tasks: Vec<_> = script
                    .image_prompts
                    .iter()
                    .cycle()
                    .take(image_count)
                    .enumerate()
                    .map(|(index, prompt)| {
                        self.collaborators
                            .images
                            .generate_image(video_id, prompt, index, aspect_ratio)
                    })
                    .collect();
                async move {
                    let links = try_join_all(tasks).await?;
                    let thumbnail = links
                        .first()
                        .cloned()
                        .ok_or_else(|| anyhow::anyhow!("no images were generated"))?;
                    self.store
                        .update(
                            video_id,
                            VideoPatch::new()
                                .image_links(links.clone())
                                .thumbnail(thumbnail),
                        )
                        .await?;
                    Ok(links)
                }
            },
        )
        .await?;
        record.thumbnail = image_links.first().cloned();
        record.image_links = image_links;

        // 6. generate_audio
        let audio_url = run_step_with_retry(
            state,
            StepName::GenerateAudio,
            self.media_retry,
            || async {
                let url = self
                    .collaborators
                    .audio
                    .synthesize(video_id, &content)
                    .await?;
                self.store
                    .update(video_id, VideoPatch::new().audio_url(url.clone()))
                    .await?;
                Ok(url)
            },
        )
        .await?;
        record.audio_url = Some(audio_url.clone());

        // 7. generate_captions
        let captions = run_step(state, StepName::GenerateCaptions, || async {
            let words = self
                .transcribe_with_transport_retry(video_id, &audio_url)
                .await?;
            if let Some(words) = &words {
                if !words.is_empty() {
                    self.store
                        .update(video_id, VideoPatch::new().captions(words.clone()))
                        .await?;
                }
            }
            Ok(words)
        })
        .await?;
        match &captions {
            Some(words) if !words.is_empty() => record.captions = Some(words.clone()),
            _ => {
                warn!(video_id = %video_id, "no transcript produced, continuing without captions")
            }
        }

        // 8. calculate_duration
        let duration_frames = run_step(state, StepName::CalculateDuration, || async {
            let frames = calculate_duration_frames(record.captions.as_deref(), config);
            self.store
                .update(video_id, VideoPatch::new().duration_frames(frames))
                .await?;
            Ok(frames)
        })
        .await?;
        record.duration_frames = Some(duration_frames);

        // 9. render_video: writes video_url and nothing else
        let render_input = record.clone();
        let video_url = run_step(state, StepName::RenderVideo, || async {
            let url = self
                .collaborators
                .renderer
                .render(video_id, &render_input)
                .await?;
            self.store
                .update(video_id, VideoPatch::new().video_url(url.clone()))
                .await?;
            Ok(url)
        })
        .await?;

        Ok(PipelineOutcome {
            video_id: video_id.clone(),
            video_url,
            duration_frames,
            captioned: captions.as_deref().is_some_and(|w| !w.is_empty()),
            state: state.clone(),
        })
    }

    /// Caption transcription with a bounded retry on transport failures only.
    /// Provider-level refusals are final; an empty transcript is a soft
    /// success.
    async fn transcribe_with_transport_retry(
        &self,
        video_id: &VideoId,
        audio_url: &str,
    ) -> anyhow::Result<Option<Vec<CaptionWord>>> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self
                .collaborators
                .captions
                .transcribe(video_id, audio_url)
                .await
            {
                Ok(words) => return Ok(words),
                Err(err @ CaptionError::Transport(_))
                    if attempt < self.caption_transport_attempts =>
                {
                    warn!(
                        video_id = %video_id,
                        attempt,
                        error = %err,
                        "caption transport error, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Persist the failure onto the record, bounded so a hung store cannot
    /// pin the worker. Persist failures are logged and swallowed; the step
    /// error is what the caller must see.
    async fn report_failure(&self, video_id: &VideoId, err: &PipelineError) {
        let patch = VideoPatch::new()
            .processing(false)
            .failed(true)
            .failure_reason(err.message.clone())
            .last_processing_step(err.step.as_str());

        match tokio::time::timeout(
            self.failure_report_timeout,
            self.store.update(video_id, patch),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(store_err)) => {
                warn!(
                    video_id = %video_id,
                    error = %store_err,
                    "failed to persist pipeline failure"
                );
            }
            Err(_) => {
                warn!(video_id = %video_id, "persisting pipeline failure timed out");
            }
        }
    }
}
