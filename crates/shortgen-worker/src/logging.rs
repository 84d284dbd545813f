//! Structured job logging.

use tracing::{error, info, warn, Span};

use shortgen_models::{JobId, VideoId};

/// Logger carrying the job and video ids so every lifecycle line is
/// attributable without repeating the fields at each call site.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    video_id: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, video_id: &VideoId) -> Self {
        Self {
            job_id: job_id.to_string(),
            video_id: video_id.to_string(),
        }
    }

    pub fn start(&self, message: &str) {
        info!(job_id = %self.job_id, video_id = %self.video_id, "Job started: {}", message);
    }

    pub fn progress(&self, message: &str) {
        info!(job_id = %self.job_id, video_id = %self.video_id, "Job progress: {}", message);
    }

    pub fn warning(&self, message: &str) {
        warn!(job_id = %self.job_id, video_id = %self.video_id, "Job warning: {}", message);
    }

    pub fn error(&self, message: &str) {
        error!(job_id = %self.job_id, video_id = %self.video_id, "Job error: {}", message);
    }

    pub fn completion(&self, message: &str) {
        info!(job_id = %self.job_id, video_id = %self.video_id, "Job completed: {}", message);
    }

    /// Span for attaching the job context to nested work.
    pub fn span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, video_id = %self.video_id)
    }
}
