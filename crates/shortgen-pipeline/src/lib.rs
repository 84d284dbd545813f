//! Per-job video generation pipeline.
//!
//! This crate provides:
//! - The per-job `ProcessingState` step state machine
//! - The step executor that normalizes failures into `PipelineError`
//! - The bounded-backoff retry wrapper for externally flaky steps
//! - Collaborator traits for the AI generation calls
//! - The nine-step orchestrator

pub mod collaborators;
pub mod duration;
pub mod error;
pub mod mock;
pub mod orchestrator;
pub mod progress;
pub mod script;
pub mod state;
pub mod step;

pub use collaborators::{
    AudioSynthesizer, CaptionError, CaptionProvider, Collaborators, ImageGenerator,
    ScriptGenerator, VideoRenderer,
};
pub use error::PipelineError;
pub use orchestrator::{PipelineOutcome, PipelineRunner};
pub use progress::estimate_progress;
pub use script::{parse_script, ParsedScript, ScriptError};
pub use state::{ProcessingState, StepName, StepRecord, StepStatus};
pub use step::{run_step, run_step_with_retry, RetryPolicy};
