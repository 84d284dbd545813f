//! Deterministic mock providers.
//!
//! Used by the dev worker binary and by pipeline tests. Every mock is pure:
//! same inputs, same outputs, no I/O.

use async_trait::async_trait;
use std::sync::Arc;

use shortgen_models::{AspectRatio, CaptionWord, VideoConfig, VideoId, VideoRecord};

use crate::collaborators::{
    AudioSynthesizer, CaptionError, CaptionProvider, Collaborators, ImageGenerator,
    ScriptGenerator, VideoRenderer,
};

/// Emits a valid script document with exactly the expected scene count.
#[derive(Debug, Default)]
pub struct MockScriptGenerator;

#[async_trait]
impl ScriptGenerator for MockScriptGenerator {
    async fn generate_script(
        &self,
        prompt: &str,
        config: &VideoConfig,
    ) -> anyhow::Result<String> {
        let scenes: Vec<serde_json::Value> = (0..config.expected_scene_count())
            .map(|i| {
                serde_json::json!({
                    "contentText": format!("Scene {} about {}.", i + 1, prompt),
                    "imagePrompt": format!("illustration {} for: {}", i + 1, prompt),
                })
            })
            .collect();
        Ok(serde_json::json!({ "content": scenes }).to_string())
    }
}

/// Returns placeholder image URLs keyed by video and index.
#[derive(Debug, Default)]
pub struct MockImageGenerator;

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate_image(
        &self,
        video_id: &VideoId,
        _prompt: &str,
        index: usize,
        aspect_ratio: AspectRatio,
    ) -> anyhow::Result<String> {
        Ok(format!(
            "https://mock.local/images/{video_id}/{index}-{}.png",
            aspect_ratio.as_str().replace(':', "x")
        ))
    }
}

#[derive(Debug, Default)]
pub struct MockAudioSynthesizer;

#[async_trait]
impl AudioSynthesizer for MockAudioSynthesizer {
    async fn synthesize(&self, video_id: &VideoId, _content: &str) -> anyhow::Result<String> {
        Ok(format!("https://mock.local/audio/{video_id}.mp3"))
    }
}

/// Produces one caption word per narration word, 300ms apart.
#[derive(Debug, Default)]
pub struct MockCaptionProvider;

const MOCK_WORD_MILLIS: u32 = 300;

#[async_trait]
impl CaptionProvider for MockCaptionProvider {
    async fn transcribe(
        &self,
        _video_id: &VideoId,
        audio_url: &str,
    ) -> Result<Option<Vec<CaptionWord>>, CaptionError> {
        if audio_url.is_empty() {
            return Err(CaptionError::Provider("empty audio url".into()));
        }
        // The mock has no audio to decode; it fabricates a fixed cadence.
        let words = (0..10)
            .map(|i| {
                CaptionWord::from_millis(
                    format!("word{}", i + 1),
                    i * MOCK_WORD_MILLIS,
                    (i + 1) * MOCK_WORD_MILLIS,
                )
            })
            .collect();
        Ok(Some(words))
    }
}

#[derive(Debug, Default)]
pub struct MockVideoRenderer;

#[async_trait]
impl VideoRenderer for MockVideoRenderer {
    async fn render(&self, video_id: &VideoId, record: &VideoRecord) -> anyhow::Result<String> {
        anyhow::ensure!(
            !record.image_links.is_empty(),
            "cannot render without images"
        );
        anyhow::ensure!(record.audio_url.is_some(), "cannot render without audio");
        Ok(format!("https://mock.local/videos/{video_id}.mp4"))
    }
}

/// The full mock provider set.
pub fn mock_collaborators() -> Collaborators {
    Collaborators {
        script: Arc::new(MockScriptGenerator),
        images: Arc::new(MockImageGenerator),
        audio: Arc::new(MockAudioSynthesizer),
        captions: Arc::new(MockCaptionProvider),
        renderer: Arc::new(MockVideoRenderer),
    }
}
