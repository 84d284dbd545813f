//! Pipeline error type.

use thiserror::Error;

use shortgen_models::VideoId;

use crate::state::StepName;

/// A pipeline failure, tagged with the step that raised it.
///
/// Every step failure becomes one of these; callers branch on `step` rather
/// than on error subtypes. The original cause is kept in the source chain
/// for logging.
#[derive(Debug, Error)]
#[error("step {step} failed for video {video_id}: {message}")]
pub struct PipelineError {
    pub step: StepName,
    pub video_id: VideoId,
    pub message: String,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl PipelineError {
    pub fn new(step: StepName, video_id: VideoId, message: impl Into<String>) -> Self {
        Self {
            step,
            video_id,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        step: StepName,
        video_id: VideoId,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            step,
            video_id,
            message: cause.to_string(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Wrap an `anyhow` error, preserving its chain as the message.
    pub fn from_anyhow(step: StepName, video_id: VideoId, err: anyhow::Error) -> Self {
        Self {
            step,
            video_id,
            message: format!("{err:#}"),
            cause: Some(err.into()),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
