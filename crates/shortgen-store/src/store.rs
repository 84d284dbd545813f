//! The `VideoStore` trait and partial-update shape.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use shortgen_models::{CaptionWord, VideoId, VideoRecord};

use crate::error::StoreResult;

/// A narrow partial update of a video record.
///
/// Each pipeline step writes only its own output columns; the record store's
/// native single-row update keeps this last-writer-wins without locking.
#[derive(Debug, Clone, Default)]
pub struct VideoPatch {
    pub processing: Option<bool>,
    pub failed: Option<bool>,
    pub failure_reason: Option<String>,
    pub last_processing_step: Option<String>,
    pub content: Option<String>,
    pub image_prompts: Option<Vec<String>>,
    pub image_links: Option<Vec<String>>,
    pub thumbnail: Option<String>,
    pub audio_url: Option<String>,
    pub captions: Option<Vec<CaptionWord>>,
    pub duration_frames: Option<u32>,
    pub video_url: Option<String>,
}

impl VideoPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processing(mut self, processing: bool) -> Self {
        self.processing = Some(processing);
        self
    }

    pub fn failed(mut self, failed: bool) -> Self {
        self.failed = Some(failed);
        self
    }

    pub fn failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    pub fn last_processing_step(mut self, step: impl Into<String>) -> Self {
        self.last_processing_step = Some(step.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn image_prompts(mut self, prompts: Vec<String>) -> Self {
        self.image_prompts = Some(prompts);
        self
    }

    pub fn image_links(mut self, links: Vec<String>) -> Self {
        self.image_links = Some(links);
        self
    }

    pub fn thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail = Some(url.into());
        self
    }

    pub fn audio_url(mut self, url: impl Into<String>) -> Self {
        self.audio_url = Some(url.into());
        self
    }

    pub fn captions(mut self, captions: Vec<CaptionWord>) -> Self {
        self.captions = Some(captions);
        self
    }

    pub fn duration_frames(mut self, frames: u32) -> Self {
        self.duration_frames = Some(frames);
        self
    }

    pub fn video_url(mut self, url: impl Into<String>) -> Self {
        self.video_url = Some(url.into());
        self
    }

    /// Apply this patch to a record in place, bumping `updated_at`.
    pub fn apply(self, record: &mut VideoRecord) {
        if let Some(v) = self.processing {
            record.processing = v;
        }
        if let Some(v) = self.failed {
            record.failed = v;
        }
        if let Some(v) = self.failure_reason {
            record.failure_reason = Some(v);
        }
        if let Some(v) = self.last_processing_step {
            record.last_processing_step = Some(v);
        }
        if let Some(v) = self.content {
            record.content = Some(v);
        }
        if let Some(v) = self.image_prompts {
            record.image_prompts = v;
        }
        if let Some(v) = self.image_links {
            record.image_links = v;
        }
        if let Some(v) = self.thumbnail {
            record.thumbnail = Some(v);
        }
        if let Some(v) = self.audio_url {
            record.audio_url = Some(v);
        }
        if let Some(v) = self.captions {
            record.captions = Some(v);
        }
        if let Some(v) = self.duration_frames {
            record.duration_frames = Some(v);
        }
        if let Some(v) = self.video_url {
            record.video_url = Some(v);
        }
        record.updated_at = Utc::now();
    }
}

/// Single-row access to video records.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Fetch one record by id.
    async fn find_one(&self, video_id: &VideoId) -> StoreResult<Option<VideoRecord>>;

    /// Create a record; errors if the id already exists.
    async fn create(&self, record: VideoRecord) -> StoreResult<()>;

    /// Apply a partial update to one record.
    async fn update(&self, video_id: &VideoId, patch: VideoPatch) -> StoreResult<()>;

    /// Delete one record.
    async fn delete(&self, video_id: &VideoId) -> StoreResult<()>;

    /// Records still marked processing whose creation time is older than
    /// `cutoff` (used by the reaper to catch crashed workers).
    async fn find_stuck(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<VideoRecord>>;
}
