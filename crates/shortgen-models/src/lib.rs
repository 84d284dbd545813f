//! Shared data models for the shortgen backend.
//!
//! This crate provides Serde-serializable types for:
//! - Queue jobs and their lifecycle states
//! - Video records and per-step output fields
//! - Generation configuration presets (duration, image count, aspect ratio)

pub mod config;
pub mod job;
pub mod video;

// Re-export common types
pub use config::{AspectRatio, ClipDuration, ImageCount, VideoConfig};
pub use job::{Job, JobId, JobState};
pub use video::{CaptionWord, VideoId, VideoRecord};
