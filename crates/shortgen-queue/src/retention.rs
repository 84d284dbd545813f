//! Retention policy for terminal jobs.
//!
//! Terminal jobs are kept for operability (recent-failure debugging, success
//! listings) up to a per-state count cap, and pruned entirely after an age
//! horizon. Waiting/active/delayed jobs are never touched by retention.

use chrono::{DateTime, Duration, Utc};

use shortgen_models::{Job, JobState};

/// Retention horizons for terminal jobs.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Keep at most this many completed jobs
    pub keep_completed: usize,
    /// Keep at most this many failed jobs
    pub keep_failed: usize,
    /// Drop completed jobs older than this
    pub completed_max_age: Duration,
    /// Drop failed jobs older than this
    pub failed_max_age: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_completed: 20,
            keep_failed: 10,
            completed_max_age: Duration::hours(48),
            failed_max_age: Duration::hours(24),
        }
    }
}

impl RetentionPolicy {
    /// Count cap for a terminal state. `None` for non-terminal states.
    pub fn cap_for(&self, state: JobState) -> Option<usize> {
        match state {
            JobState::Completed => Some(self.keep_completed),
            JobState::Failed => Some(self.keep_failed),
            _ => None,
        }
    }

    /// Age horizon for a terminal state. `None` for non-terminal states.
    pub fn max_age_for(&self, state: JobState) -> Option<Duration> {
        match state {
            JobState::Completed => Some(self.completed_max_age),
            JobState::Failed => Some(self.failed_max_age),
            _ => None,
        }
    }
}

/// Jobs whose retention age horizon has passed. Non-terminal jobs are never
/// selected.
pub fn expired_jobs<'a>(
    jobs: impl IntoIterator<Item = &'a Job>,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> Vec<&'a Job> {
    jobs.into_iter()
        .filter(|job| {
            let Some(max_age) = policy.max_age_for(job.state) else {
                return false;
            };
            match job.finished_at {
                Some(finished) => now - finished > max_age,
                None => false,
            }
        })
        .collect()
}

/// Number of oldest entries to drop so a terminal set stays within its count
/// cap.
pub fn overflow(current_len: usize, cap: usize) -> usize {
    current_len.saturating_sub(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortgen_models::VideoId;

    fn terminal_job(state: JobState, finished_hours_ago: i64) -> Job {
        let mut job = Job::new(VideoId::new(), None);
        job.state = state;
        job.finished_at = Some(Utc::now() - Duration::hours(finished_hours_ago));
        job
    }

    #[test]
    fn expired_respects_per_state_horizons() {
        let policy = RetentionPolicy::default();
        let jobs = vec![
            terminal_job(JobState::Failed, 25),    // past 24h horizon
            terminal_job(JobState::Failed, 1),     // fresh
            terminal_job(JobState::Completed, 49), // past 48h horizon
            terminal_job(JobState::Completed, 25), // within 48h
        ];

        let expired = expired_jobs(&jobs, &policy, Utc::now());
        assert_eq!(expired.len(), 2);
        assert!(expired.iter().any(|j| j.state == JobState::Failed));
        assert!(expired.iter().any(|j| j.state == JobState::Completed));
    }

    #[test]
    fn waiting_and_active_jobs_never_expire() {
        let policy = RetentionPolicy::default();
        let mut waiting = Job::new(VideoId::new(), None);
        waiting.enqueued_at = Utc::now() - Duration::days(30);
        let mut active = waiting.clone().start();
        active.started_at = Some(Utc::now() - Duration::days(30));

        let jobs = vec![waiting, active];
        assert!(expired_jobs(&jobs, &policy, Utc::now()).is_empty());
    }

    #[test]
    fn only_terminal_states_have_retention_horizons() {
        let policy = RetentionPolicy::default();
        // Non-terminal records must never be given an expiry; a waiting job
        // sitting in a backlog for days is still deliverable.
        for state in [JobState::Waiting, JobState::Active, JobState::Delayed] {
            assert_eq!(policy.max_age_for(state), None, "{state}");
            assert_eq!(policy.cap_for(state), None, "{state}");
        }
        assert_eq!(
            policy.max_age_for(JobState::Completed),
            Some(Duration::hours(48))
        );
        assert_eq!(
            policy.max_age_for(JobState::Failed),
            Some(Duration::hours(24))
        );
    }

    #[test]
    fn overflow_counts_oldest_entries_to_drop() {
        assert_eq!(overflow(25, 20), 5);
        assert_eq!(overflow(20, 20), 0);
        assert_eq!(overflow(3, 10), 0);
    }
}
