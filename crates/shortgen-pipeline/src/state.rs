//! Per-job processing state machine.
//!
//! Created fresh at orchestrator entry, mutated step by step, discarded at
//! job end. Only the failing step's name and error ever outlive a run (via
//! the video record's failure fields).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use shortgen_models::VideoId;

/// The ordered pipeline steps. No step is skipped; each step's output is
/// required input to at least one later step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    RetrievePrompt,
    GenerateScript,
    ParseScript,
    PersistParsedData,
    GenerateImages,
    GenerateAudio,
    GenerateCaptions,
    CalculateDuration,
    RenderVideo,
}

/// Pipeline step order.
pub const STEP_ORDER: [StepName; 9] = [
    StepName::RetrievePrompt,
    StepName::GenerateScript,
    StepName::ParseScript,
    StepName::PersistParsedData,
    StepName::GenerateImages,
    StepName::GenerateAudio,
    StepName::GenerateCaptions,
    StepName::CalculateDuration,
    StepName::RenderVideo,
];

impl StepName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::RetrievePrompt => "retrieve_prompt",
            StepName::GenerateScript => "generate_script",
            StepName::ParseScript => "parse_script",
            StepName::PersistParsedData => "persist_parsed_data",
            StepName::GenerateImages => "generate_images",
            StepName::GenerateAudio => "generate_audio",
            StepName::GenerateCaptions => "generate_captions",
            StepName::CalculateDuration => "calculate_duration",
            StepName::RenderVideo => "render_video",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Step status within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

/// Timing and outcome record for one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: StepName,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl StepRecord {
    fn pending(name: StepName) -> Self {
        Self {
            name,
            status: StepStatus::Pending,
            started_at: None,
            ended_at: None,
            error_message: None,
        }
    }

    /// Elapsed milliseconds for started steps.
    pub fn duration_millis(&self) -> Option<i64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// In-memory state for one pipeline execution.
#[derive(Debug, Clone)]
pub struct ProcessingState {
    pub video_id: VideoId,
    pub started_at: DateTime<Utc>,
    pub current_step: Option<StepName>,
    steps: Vec<StepRecord>,
}

impl ProcessingState {
    /// Fresh state with every step pending, in pipeline order.
    pub fn new(video_id: VideoId) -> Self {
        Self {
            video_id,
            started_at: Utc::now(),
            current_step: None,
            steps: STEP_ORDER.iter().map(|&name| StepRecord::pending(name)).collect(),
        }
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn step(&self, name: StepName) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub(crate) fn step_mut(&mut self, name: StepName) -> Option<&mut StepRecord> {
        self.steps.iter_mut().find(|s| s.name == name)
    }

    /// The first failed step, if any.
    pub fn failed_step(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.status == StepStatus::Failed)
    }

    /// True when every step completed.
    pub fn all_completed(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }

    /// Cumulative per-step durations in pipeline order, ms.
    pub fn step_durations(&self) -> Vec<(StepName, i64)> {
        self.steps
            .iter()
            .filter_map(|s| s.duration_millis().map(|ms| (s.name, ms)))
            .collect()
    }

    /// Ordered error messages from failed steps.
    pub fn error_messages(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter_map(|s| s.error_message.clone())
            .collect()
    }

    /// Total wall time since orchestrator entry, ms.
    pub fn elapsed_millis(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }
}
