//! Collaborator traits for the generation providers.
//!
//! The orchestrator talks to every external system through these traits;
//! a concrete provider set is assembled at the composition root. All
//! collaborators take the data they need explicitly, never a bare id they
//! would have to re-fetch.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use shortgen_models::{AspectRatio, CaptionWord, VideoConfig, VideoId, VideoRecord};

/// Generates the raw script document for a prompt.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate_script(&self, prompt: &str, config: &VideoConfig)
        -> anyhow::Result<String>;
}

/// Generates one scene image and returns its public URL.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(
        &self,
        video_id: &VideoId,
        prompt: &str,
        index: usize,
        aspect_ratio: AspectRatio,
    ) -> anyhow::Result<String>;
}

/// Synthesizes narration audio and returns its public URL.
#[async_trait]
pub trait AudioSynthesizer: Send + Sync {
    async fn synthesize(&self, video_id: &VideoId, content: &str) -> anyhow::Result<String>;
}

/// Caption provider failures, split by whether a retry can help.
#[derive(Debug, Error)]
pub enum CaptionError {
    /// Connection-level failure; retrying against the same audio may succeed.
    #[error("caption transport error: {0}")]
    Transport(String),
    /// The provider processed the audio and refused it; retrying is useless.
    #[error("caption provider error: {0}")]
    Provider(String),
}

impl CaptionError {
    pub fn is_transport(&self) -> bool {
        matches!(self, CaptionError::Transport(_))
    }
}

/// Produces word-level captions from the narration audio.
///
/// `Ok(None)` means the provider finished without a usable transcript; the
/// pipeline treats that as a video without captions, not a failure.
#[async_trait]
pub trait CaptionProvider: Send + Sync {
    async fn transcribe(
        &self,
        video_id: &VideoId,
        audio_url: &str,
    ) -> Result<Option<Vec<CaptionWord>>, CaptionError>;
}

/// Renders the final video from the assembled record and returns its URL.
#[async_trait]
pub trait VideoRenderer: Send + Sync {
    async fn render(&self, video_id: &VideoId, record: &VideoRecord) -> anyhow::Result<String>;
}

/// The full provider set the orchestrator runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub script: Arc<dyn ScriptGenerator>,
    pub images: Arc<dyn ImageGenerator>,
    pub audio: Arc<dyn AudioSynthesizer>,
    pub captions: Arc<dyn CaptionProvider>,
    pub renderer: Arc<dyn VideoRenderer>,
}
