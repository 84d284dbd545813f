//! End-to-end pipeline scenarios against the in-memory store and mock
//! providers, with targeted fault injection per step.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use shortgen_models::{
    AspectRatio, CaptionWord, ClipDuration, ImageCount, VideoConfig, VideoId, VideoRecord,
};
use shortgen_pipeline::mock::mock_collaborators;
use shortgen_pipeline::{
    estimate_progress, CaptionError, CaptionProvider, ImageGenerator, PipelineRunner,
    RetryPolicy, ScriptGenerator, StepName, StepStatus,
};
use shortgen_store::{MemoryVideoStore, StoreResult, VideoPatch, VideoStore};

async fn seed(store: &MemoryVideoStore, prompt: &str) -> VideoId {
    let id = VideoId::new();
    store
        .create(VideoRecord::new(id.clone(), prompt))
        .await
        .unwrap();
    id
}

fn fast_retries() -> (RetryPolicy, RetryPolicy) {
    let policy = RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
    };
    (policy, policy)
}

#[tokio::test]
async fn full_run_completes_every_step_in_order() {
    let store = Arc::new(MemoryVideoStore::new());
    let id = seed(&store, "why the ocean is salty").await;

    let runner = PipelineRunner::new(store.clone(), mock_collaborators());
    let outcome = runner.run(&id, None).await.unwrap();

    assert!(outcome.video_url.ends_with(".mp4"));
    assert!(outcome.captioned);
    assert!(outcome.state.all_completed());

    // Steps ran in pipeline order with sane timing.
    let steps = outcome.state.steps();
    for step in steps {
        assert_eq!(step.status, StepStatus::Completed, "{}", step.name);
        assert!(step.ended_at.unwrap() >= step.started_at.unwrap());
    }
    for pair in steps.windows(2) {
        assert!(pair[1].started_at.unwrap() >= pair[0].started_at.unwrap());
    }

    // Every artifact landed on the record.
    let record = store.find_one(&id).await.unwrap().unwrap();
    assert!(record.content.is_some());
    assert_eq!(record.image_prompts.len(), 5);
    assert_eq!(record.image_links.len(), 5);
    assert_eq!(record.thumbnail.as_deref(), record.image_links.first().map(String::as_str));
    assert!(record.audio_url.is_some());
    assert!(record.captions.as_deref().is_some_and(|w| !w.is_empty()));
    assert!(record.duration_frames.is_some());
    assert!(record.video_url.is_some());
    assert!(!record.failed);
    assert_eq!(estimate_progress(&record), 100);
}

#[tokio::test]
async fn configured_run_respects_scene_and_image_counts() {
    let store = Arc::new(MemoryVideoStore::new());
    let id = seed(&store, "a history of tea").await;

    let config = VideoConfig {
        duration: ClipDuration::Seconds60,
        image_count: ImageCount::Eight,
        aspect_ratio: AspectRatio::Landscape,
    };
    let runner = PipelineRunner::new(store.clone(), mock_collaborators());
    runner.run(&id, Some(config)).await.unwrap();

    let record = store.find_one(&id).await.unwrap().unwrap();
    assert_eq!(record.image_prompts.len(), 8);
    assert_eq!(record.image_links.len(), 8);
}

struct FailingImageGenerator {
    fail_index: usize,
}

#[async_trait]
impl ImageGenerator for FailingImageGenerator {
    async fn generate_image(
        &self,
        video_id: &VideoId,
        _prompt: &str,
        index: usize,
        _aspect_ratio: AspectRatio,
    ) -> anyhow::Result<String> {
        if index == self.fail_index {
            anyhow::bail!("image provider rejected prompt");
        }
        Ok(format!("https://img.local/{video_id}/{index}.png"))
    }
}

#[tokio::test(start_paused = true)]
async fn image_failure_is_all_or_nothing() {
    let store = Arc::new(MemoryVideoStore::new());
    let id = seed(&store, "volcanoes").await;

    let mut collaborators = mock_collaborators();
    collaborators.images = Arc::new(FailingImageGenerator { fail_index: 2 });
    let (script, media) = fast_retries();
    let runner =
        PipelineRunner::new(store.clone(), collaborators).with_retry_policies(script, media);

    let err = runner.run(&id, None).await.unwrap_err();
    assert_eq!(err.step, StepName::GenerateImages);

    let record = store.find_one(&id).await.unwrap().unwrap();
    assert!(record.failed);
    assert!(!record.processing);
    assert_eq!(record.last_processing_step.as_deref(), Some("generate_images"));
    assert!(record.failure_reason.is_some());
    // No partial image set was committed.
    assert!(record.image_links.is_empty());
    assert!(record.thumbnail.is_none());
    // Earlier steps' outputs survive the failure.
    assert!(record.content.is_some());
}

struct FlakyScriptGenerator {
    failures: u32,
    calls: AtomicU32,
}

#[async_trait]
impl ScriptGenerator for FlakyScriptGenerator {
    async fn generate_script(
        &self,
        prompt: &str,
        config: &VideoConfig,
    ) -> anyhow::Result<String> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            anyhow::bail!("model overloaded");
        }
        shortgen_pipeline::mock::MockScriptGenerator
            .generate_script(prompt, config)
            .await
    }
}

#[tokio::test(start_paused = true)]
async fn flaky_script_generation_recovers_within_retry_budget() {
    let store = Arc::new(MemoryVideoStore::new());
    let id = seed(&store, "deep sea creatures").await;

    let mut collaborators = mock_collaborators();
    let flaky = Arc::new(FlakyScriptGenerator {
        failures: 2,
        calls: AtomicU32::new(0),
    });
    collaborators.script = flaky.clone();
    let (script, media) = fast_retries();
    let runner =
        PipelineRunner::new(store.clone(), collaborators).with_retry_policies(script, media);

    let outcome = runner.run(&id, None).await.unwrap();
    assert!(outcome.state.all_completed());
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
}

struct InvalidScriptGenerator;

#[async_trait]
impl ScriptGenerator for InvalidScriptGenerator {
    async fn generate_script(
        &self,
        _prompt: &str,
        _config: &VideoConfig,
    ) -> anyhow::Result<String> {
        Ok("Sure, here is the script you asked for!".into())
    }
}

#[tokio::test]
async fn unparseable_script_fails_at_parse_step() {
    let store = Arc::new(MemoryVideoStore::new());
    let id = seed(&store, "glaciers").await;

    let mut collaborators = mock_collaborators();
    collaborators.script = Arc::new(InvalidScriptGenerator);
    let runner = PipelineRunner::new(store.clone(), collaborators);

    let err = runner.run(&id, None).await.unwrap_err();
    assert_eq!(err.step, StepName::ParseScript);

    let record = store.find_one(&id).await.unwrap().unwrap();
    assert_eq!(record.last_processing_step.as_deref(), Some("parse_script"));
    assert!(record.content.is_none());
}

struct SilentCaptionProvider;

#[async_trait]
impl CaptionProvider for SilentCaptionProvider {
    async fn transcribe(
        &self,
        _video_id: &VideoId,
        _audio_url: &str,
    ) -> Result<Option<Vec<CaptionWord>>, CaptionError> {
        Ok(None)
    }
}

#[tokio::test]
async fn missing_transcript_is_a_soft_success() {
    let store = Arc::new(MemoryVideoStore::new());
    let id = seed(&store, "northern lights").await;

    let mut collaborators = mock_collaborators();
    collaborators.captions = Arc::new(SilentCaptionProvider);
    let runner = PipelineRunner::new(store.clone(), collaborators);

    let outcome = runner.run(&id, None).await.unwrap();
    assert!(!outcome.captioned);
    assert!(outcome.state.all_completed());

    let record = store.find_one(&id).await.unwrap().unwrap();
    assert!(record.captions.is_none());
    // Duration falls back to the configured preset at 30fps.
    assert_eq!(record.duration_frames, Some(30 * 30));
    assert!(record.video_url.is_some());
}

struct FlakyCaptionProvider {
    transport_failures: u32,
    calls: AtomicU32,
}

#[async_trait]
impl CaptionProvider for FlakyCaptionProvider {
    async fn transcribe(
        &self,
        _video_id: &VideoId,
        _audio_url: &str,
    ) -> Result<Option<Vec<CaptionWord>>, CaptionError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.transport_failures {
            return Err(CaptionError::Transport("connection reset".into()));
        }
        Ok(Some(vec![CaptionWord::from_millis("hello", 0, 400)]))
    }
}

#[tokio::test(start_paused = true)]
async fn caption_transport_errors_retry_in_place() {
    let store = Arc::new(MemoryVideoStore::new());
    let id = seed(&store, "migration of monarch butterflies").await;

    let mut collaborators = mock_collaborators();
    let flaky = Arc::new(FlakyCaptionProvider {
        transport_failures: 2,
        calls: AtomicU32::new(0),
    });
    collaborators.captions = flaky.clone();
    let runner = PipelineRunner::new(store.clone(), collaborators);

    let outcome = runner.run(&id, None).await.unwrap();
    assert!(outcome.captioned);
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
}

struct RefusingCaptionProvider;

#[async_trait]
impl CaptionProvider for RefusingCaptionProvider {
    async fn transcribe(
        &self,
        _video_id: &VideoId,
        _audio_url: &str,
    ) -> Result<Option<Vec<CaptionWord>>, CaptionError> {
        Err(CaptionError::Provider("unsupported audio codec".into()))
    }
}

#[tokio::test]
async fn caption_provider_refusal_fails_the_step() {
    let store = Arc::new(MemoryVideoStore::new());
    let id = seed(&store, "coral reefs").await;

    let mut collaborators = mock_collaborators();
    collaborators.captions = Arc::new(RefusingCaptionProvider);
    let runner = PipelineRunner::new(store.clone(), collaborators);

    let err = runner.run(&id, None).await.unwrap_err();
    assert_eq!(err.step, StepName::GenerateCaptions);

    let record = store.find_one(&id).await.unwrap().unwrap();
    assert!(record.failed);
    assert_eq!(
        record.last_processing_step.as_deref(),
        Some("generate_captions")
    );
}

/// Store wrapper that never finishes persisting parsed script data.
struct HangingPersistStore {
    inner: MemoryVideoStore,
}

#[async_trait]
impl VideoStore for HangingPersistStore {
    async fn find_one(&self, video_id: &VideoId) -> StoreResult<Option<VideoRecord>> {
        self.inner.find_one(video_id).await
    }

    async fn create(&self, record: VideoRecord) -> StoreResult<()> {
        self.inner.create(record).await
    }

    async fn update(&self, video_id: &VideoId, patch: VideoPatch) -> StoreResult<()> {
        if patch.content.is_some() {
            futures::future::pending::<()>().await;
        }
        self.inner.update(video_id, patch).await
    }

    async fn delete(&self, video_id: &VideoId) -> StoreResult<()> {
        self.inner.delete(video_id).await
    }

    async fn find_stuck(
        &self,
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> StoreResult<Vec<VideoRecord>> {
        self.inner.find_stuck(cutoff).await
    }
}

#[tokio::test(start_paused = true)]
async fn hung_persist_times_out_instead_of_pinning_the_job() {
    let inner = MemoryVideoStore::new();
    let id = VideoId::new();
    inner
        .create(VideoRecord::new(id.clone(), "the water cycle"))
        .await
        .unwrap();
    let store = Arc::new(HangingPersistStore { inner });

    let runner = PipelineRunner::new(store.clone(), mock_collaborators())
        .with_timeouts(Duration::from_millis(100), Duration::from_millis(100));

    let err = runner.run(&id, None).await.unwrap_err();
    assert_eq!(err.step, StepName::PersistParsedData);
    assert!(err.message.contains("timed out"));

    // The failure itself was still recorded (that patch carries no content).
    let record = store.find_one(&id).await.unwrap().unwrap();
    assert!(record.failed);
    assert!(!record.processing);
}
