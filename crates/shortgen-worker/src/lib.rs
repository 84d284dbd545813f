//! Video generation worker.
//!
//! Consumes jobs from the Redis Streams queue, drives each through the
//! generation pipeline with bounded concurrency, samples progress onto the
//! job record, and sweeps stuck videos in the background.

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod reaper;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use reaper::Reaper;
