//! Video record models.
//!
//! The video record lives in the external record store; the pipeline treats
//! it as shared mutable state with narrow, single-purpose updates per step.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
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

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One timed caption word, with 30fps frame bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CaptionWord {
    pub text: String,
    pub start_frame: u32,
    pub end_frame: u32,
}

impl CaptionWord {
    /// Build a caption word from millisecond timestamps at 30fps.
    pub fn from_millis(text: impl Into<String>, start_ms: u32, end_ms: u32) -> Self {
        Self {
            text: text.into(),
            start_frame: (start_ms as f64 / 1000.0 * 30.0).round() as u32,
            end_frame: (end_ms as f64 / 1000.0 * 30.0).round() as u32,
        }
    }
}

/// The video record as seen by the pipeline.
///
/// Invariant: at most one of `processing == true` and
/// `failed == true` / `video_url` set holds at any observation. The worker
/// owns the `processing`/`failed` flags at job boundaries; each step writes
/// only its own output field.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    pub video_id: VideoId,

    /// Input prompt supplied on creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// A worker currently holds this record
    #[serde(default)]
    pub processing: bool,

    /// Generation failed terminally
    #[serde(default)]
    pub failed: bool,

    /// Message of the error that failed the pipeline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Name of the last pipeline step that ran (for failure attribution)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_processing_step: Option<String>,

    /// Full narration text (parse_script output)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Image prompts, one per image (parse_script output)
    #[serde(default)]
    pub image_prompts: Vec<String>,

    /// Generated image URLs (generate_images output, all-or-nothing)
    #[serde(default)]
    pub image_links: Vec<String>,

    /// First image link, surfaced for listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,

    /// Narration audio URL (generate_audio output)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    /// Timed caption words (generate_captions output, optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captions: Option<Vec<CaptionWord>>,

    /// Total duration in frames at 30fps (calculate_duration output)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_frames: Option<u32>,

    /// Final rendered video URL (render_video output)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Create a fresh record for a submitted prompt, marked processing.
    pub fn new(video_id: VideoId, prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            video_id,
            prompt: Some(prompt.into()),
            processing: true,
            failed: false,
            failure_reason: None,
            last_processing_step: None,
            content: None,
            image_prompts: Vec::new(),
            image_links: Vec::new(),
            thumbnail: None,
            audio_url: None,
            captions: None,
            duration_frames: None,
            video_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}
