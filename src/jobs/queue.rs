use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::{Job, JobContext, JobReport, Readiness};
use crate::config::JobsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Queued,
    /// A job with the same id was already submitted.
    Duplicate,
}

/// Final record of a job after its last attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub job_id: String,
    pub attempts: u32,
    pub report: JobReport,
}

#[derive(Default)]
struct QueueState {
    /// Ids of pending, running and finished jobs
    seen: HashSet<String>,
    pending: VecDeque<Job>,
    finished: HashMap<String, JobRecord>,
}

/// In-process job executor.
///
/// Deduplicates submissions by job id, runs ready jobs with bounded
/// concurrency, and re-runs a job from the start while its report carries a
/// retryable error, up to `max_attempts` attempts.
///
/// Submitted ids and finished records are kept for the life of the queue so
/// that re-submissions stay duplicates. A long-lived queue should call
/// [`JobQueue::forget_finished`] once the records have been consumed.
pub struct JobQueue {
    ctx: Arc<JobContext>,
    config: JobsConfig,
    state: Mutex<QueueState>,
    /// Limits concurrently running attempts to `workers`
    workers: Semaphore,
    cancel: CancellationToken,
}

impl JobQueue {
    pub fn new(ctx: Arc<JobContext>, config: JobsConfig) -> Self {
        Self {
            workers: Semaphore::new(config.workers.max(1)),
            ctx,
            config,
            state: Mutex::new(QueueState::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Token observed by running jobs; cancelling it aborts in-flight status
    /// lookups and suppresses retries.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn submit(&self, job: impl Into<Job>) -> SubmitOutcome {
        let job = job.into();
        let mut state = self.state.lock();
        if !state.seen.insert(job.id().to_string()) {
            tracing::debug!(job_id = job.id(), "Ignoring duplicate job submission");
            return SubmitOutcome::Duplicate;
        }
        tracing::debug!(job_id = job.id(), job_type = job.job_type(), "Job queued");
        state.pending.push_back(job);
        SubmitOutcome::Queued
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn record(&self, job_id: &str) -> Option<JobRecord> {
        self.state.lock().finished.get(job_id).cloned()
    }

    /// Drop finished records and their ids, returning how many were dropped.
    ///
    /// A forgotten id may be submitted again. Pending jobs are unaffected.
    pub fn forget_finished(&self) -> usize {
        let mut state = self.state.lock();
        let QueueState { seen, finished, .. } = &mut *state;
        for job_id in finished.keys() {
            seen.remove(job_id);
        }
        let dropped = finished.len();
        finished.clear();
        dropped
    }

    /// Run every queued job that is ready, returning their final records.
    ///
    /// Jobs that are not ready stay queued for a later call.
    pub async fn run_pending(&self) -> Vec<JobRecord> {
        let ready: Vec<Job> = {
            let mut state = self.state.lock();
            let (ready, waiting): (Vec<Job>, Vec<Job>) = state
                .pending
                .drain(..)
                .partition(|job| job.readiness() == Readiness::Ready);
            state.pending.extend(waiting);
            ready
        };

        if ready.is_empty() {
            return Vec::new();
        }

        tracing::info!(
            jobs = ready.len(),
            workers = self.config.workers,
            "Running queued jobs"
        );

        let records =
            futures::future::join_all(ready.into_iter().map(|job| self.run_with_retries(job)))
                .await;

        let mut state = self.state.lock();
        for record in &records {
            state
                .finished
                .insert(record.job_id.clone(), record.clone());
        }
        records
    }

    async fn run_with_retries(&self, job: Job) -> JobRecord {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let report = {
                // The semaphore is never closed; a permit is held for the whole attempt
                let _permit = self.workers.acquire().await;
                job.run(&self.ctx, &self.cancel).await
            };

            let retry = report.retryable && attempts < max_attempts && !self.cancel.is_cancelled();
            if !retry {
                return JobRecord {
                    job_id: job.id().to_string(),
                    attempts,
                    report,
                };
            }

            tracing::warn!(
                job_id = job.id(),
                attempt = attempts,
                max_attempts,
                errors = ?report.errors,
                "Job failed with retryable error, retrying"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return JobRecord {
                        job_id: job.id().to_string(),
                        attempts,
                        report,
                    };
                }
                _ = tokio::time::sleep(self.config.retry_delay()) => {}
            }
        }
    }
}
