//! Step execution helpers.
//!
//! `run_step` wraps a single step body: marks the state record running,
//! times it, and normalizes any failure into a `PipelineError` tagged with
//! the step name. `run_step_with_retry` adds bounded exponential backoff for
//! steps whose failures are dominated by transient provider errors.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::state::{ProcessingState, StepName, StepStatus};

/// Bounded exponential backoff for step-level retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt. 0 means run once.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay before retrying attempt `attempt` (1-based count of failures
    /// so far): base * 2^(attempt-1), capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run one step, recording timing and outcome in `state`.
pub async fn run_step<T, F, Fut>(
    state: &mut ProcessingState,
    step: StepName,
    body: F,
) -> PipelineResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    state.current_step = Some(step);
    if let Some(record) = state.step_mut(step) {
        record.status = StepStatus::Running;
        record.started_at = Some(Utc::now());
    }
    metrics::counter!("pipeline.step.attempt", "step" => step.as_str()).increment(1);

    let result = body().await;
    let ended_at = Utc::now();
    if let Some(duration_ms) = state
        .step(step)
        .and_then(|r| r.started_at)
        .map(|start| (ended_at - start).num_milliseconds())
    {
        metrics::histogram!("pipeline.step.duration_ms", "step" => step.as_str())
            .record(duration_ms as f64);
    }

    match result {
        Ok(value) => {
            if let Some(record) = state.step_mut(step) {
                record.status = StepStatus::Completed;
                record.ended_at = Some(ended_at);
            }
            info!(
                video_id = %state.video_id,
                step = step.as_str(),
                "step completed"
            );
            Ok(value)
        }
        Err(err) => {
            let message = format!("{err:#}");
            if let Some(record) = state.step_mut(step) {
                record.status = StepStatus::Failed;
                record.ended_at = Some(ended_at);
                record.error_message = Some(message.clone());
            }
            metrics::counter!("pipeline.step.failure", "step" => step.as_str()).increment(1);
            Err(PipelineError::from_anyhow(step, state.video_id.clone(), err))
        }
    }
}

/// Run one step with bounded retries. The factory is invoked once per
/// attempt; state records reflect the final attempt only.
pub async fn run_step_with_retry<T, F, Fut>(
    state: &mut ProcessingState,
    step: StepName,
    policy: RetryPolicy,
    mut factory: F,
) -> PipelineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match run_step(state, step, &mut factory).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt <= policy.max_retries => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    video_id = %state.video_id,
                    step = step.as_str(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "step failed, retrying"
                );
                metrics::counter!("pipeline.step.retry", "step" => step.as_str()).increment(1);
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
