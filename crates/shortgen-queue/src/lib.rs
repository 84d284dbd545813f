//! Redis Streams job queue.
//!
//! This crate provides:
//! - Durable enqueueing of video generation jobs
//! - Worker consumption with bounded redelivery and backoff
//! - Retention pruning of terminal jobs
//! - Health and metrics snapshots for monitoring

pub mod error;
pub mod health;
pub mod queue;
pub mod retention;

pub use error::{QueueError, QueueResult};
pub use health::{compute_metrics, QueueCounts, QueueHealth, QueueMetrics};
pub use queue::{JobQueue, QueueConfig};
pub use retention::RetentionPolicy;
