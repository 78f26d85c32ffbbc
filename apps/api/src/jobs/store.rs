//! Job Store — in-memory registry of generation jobs keyed by job id.
//!
//! The only shared mutable state in the service. Every write touches a single
//! key through `DashMap`'s per-shard locking; there is no cross-job lock.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;

use crate::models::job::{GenerationJob, JobFailure, JobId, JobState};

#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {job_id} is already {state}")]
    AlreadyTerminal { job_id: JobId, state: &'static str },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<DashMap<JobId, GenerationJob>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: GenerationJob) {
        self.jobs.insert(job.job_id, job);
    }

    /// Returns a snapshot of the record; later transitions do not affect it.
    pub fn get(&self, job_id: &JobId) -> Option<GenerationJob> {
        self.jobs.get(job_id).map(|entry| entry.value().clone())
    }

    pub fn complete(
        &self,
        job_id: &JobId,
        artifact_path: String,
    ) -> Result<GenerationJob, TransitionError> {
        self.transition(job_id, JobState::Completed { artifact_path })
    }

    pub fn fail(
        &self,
        job_id: &JobId,
        failure: JobFailure,
    ) -> Result<GenerationJob, TransitionError> {
        self.transition(job_id, JobState::Failed { error: failure })
    }

    /// processing → terminal, exactly once. Terminal records are never rewritten.
    fn transition(
        &self,
        job_id: &JobId,
        next: JobState,
    ) -> Result<GenerationJob, TransitionError> {
        let mut entry = self
            .jobs
            .get_mut(job_id)
            .ok_or(TransitionError::NotFound(*job_id))?;
        let job = entry.value_mut();

        if job.state.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                job_id: *job_id,
                state: job.state.label(),
            });
        }

        // Clamp so completedAt never precedes createdAt even if the wall clock steps back.
        let now = Utc::now().max(job.metadata.created_at);
        job.state = next;
        job.metadata.completed_at = Some(now);
        Ok(job.clone())
    }

    pub fn counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for entry in self.jobs.iter() {
            match entry.value().state {
                JobState::Processing => counts.processing += 1,
                JobState::Completed { .. } => counts.completed += 1,
                JobState::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Removes terminal records that finished at least `retention` before `now`
    /// and returns them. Processing records are never evicted.
    pub fn evict_expired(&self, retention: Duration, now: DateTime<Utc>) -> Vec<GenerationJob> {
        let is_expired = |job: &GenerationJob| {
            job.state.is_terminal()
                && job
                    .metadata
                    .completed_at
                    .and_then(|done| done.checked_add_signed(retention))
                    .map(|expiry| expiry <= now)
                    .unwrap_or(false)
        };

        // Collect first: removing while iterating a DashMap deadlocks the shard.
        let candidates: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|entry| is_expired(entry.value()))
            .map(|entry| *entry.key())
            .collect();

        candidates
            .into_iter()
            .filter_map(|id| self.jobs.remove_if(&id, |_, job| is_expired(job)))
            .map(|(_, job)| job)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{FailureKind, OutputFormat};

    fn processing() -> GenerationJob {
        GenerationJob::processing(JobId::new(), "modern", "blue", OutputFormat::Pdf)
    }

    #[test]
    fn test_complete_sets_path_and_timestamp() {
        let store = JobStore::new();
        let job = processing();
        let id = job.job_id;
        store.insert(job);

        let done = store.complete(&id, "generated/a.pdf".to_string()).unwrap();

        assert_eq!(done.artifact_path(), Some("generated/a.pdf"));
        let completed_at = done.metadata.completed_at.unwrap();
        assert!(completed_at >= done.metadata.created_at);
        assert_eq!(store.get(&id).unwrap(), done);
    }

    #[test]
    fn test_terminal_state_is_never_left() {
        let store = JobStore::new();
        let job = processing();
        let id = job.job_id;
        store.insert(job);

        store
            .fail(&id, JobFailure::new(FailureKind::Render, "browser crashed"))
            .unwrap();
        let err = store.complete(&id, "generated/late.pdf".to_string()).unwrap_err();

        assert_eq!(
            err,
            TransitionError::AlreadyTerminal {
                job_id: id,
                state: "failed"
            }
        );
        assert!(store.get(&id).unwrap().artifact_path().is_none());
    }

    #[test]
    fn test_repeated_reads_of_terminal_job_are_identical() {
        let store = JobStore::new();
        let job = processing();
        let id = job.job_id;
        store.insert(job);
        store.complete(&id, "generated/a.pdf".to_string()).unwrap();

        assert_eq!(store.get(&id), store.get(&id));
    }

    #[test]
    fn test_unknown_job_transition_is_not_found() {
        let store = JobStore::new();
        let id = JobId::new();
        assert_eq!(
            store.fail(&id, JobFailure::cancelled()).unwrap_err(),
            TransitionError::NotFound(id)
        );
    }

    #[test]
    fn test_counts_by_status() {
        let store = JobStore::new();
        let ids: Vec<JobId> = (0..3)
            .map(|_| {
                let job = processing();
                let id = job.job_id;
                store.insert(job);
                id
            })
            .collect();
        store.complete(&ids[0], "a".to_string()).unwrap();
        store.fail(&ids[1], JobFailure::cancelled()).unwrap();

        assert_eq!(
            store.counts(),
            JobCounts {
                processing: 1,
                completed: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn test_eviction_drops_only_expired_terminal_records() {
        let store = JobStore::new();
        let running = processing();
        let running_id = running.job_id;
        store.insert(running);

        let finished = processing();
        let finished_id = finished.job_id;
        store.insert(finished);
        store.complete(&finished_id, "a".to_string()).unwrap();

        // Not yet past the retention window.
        let kept = store.evict_expired(Duration::hours(1), Utc::now());
        assert!(kept.is_empty());
        assert_eq!(store.len(), 2);

        let evicted = store.evict_expired(Duration::hours(1), Utc::now() + Duration::hours(2));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].job_id, finished_id);
        assert!(store.get(&finished_id).is_none());
        assert!(store.get(&running_id).is_some());
    }

    #[test]
    fn test_retention_past_the_calendar_never_expires() {
        let store = JobStore::new();
        let job = processing();
        let id = job.job_id;
        store.insert(job);
        store.fail(&id, JobFailure::cancelled()).unwrap();

        // completed_at + retention is beyond the last representable date.
        let evicted = store.evict_expired(Duration::days(365 * 1_000_000), Utc::now());
        assert!(evicted.is_empty());
        assert!(store.get(&id).is_some());
    }
}
