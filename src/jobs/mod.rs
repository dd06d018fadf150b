//! Reconciliation jobs and the in-process queue that runs them.
//!
//! A job runs once per (build, task) pair after the CI task finishes:
//!
//! 1. Ask the task-status authority for the task's final status
//! 2. On success, cascade-delete the build's tests and logs
//! 3. Otherwise flag the build's tests as failed so retention keeps them
//! 4. Report exactly once, to the log and the [`EventBus`]
//!
//! Execution is at-least-once: every store mutation is idempotent, and the
//! [`JobQueue`] re-runs a job whose report carries a retryable error.

mod cleanup_old_log_data;
mod queue;

use std::sync::Arc;

pub use cleanup_old_log_data::{CLEANUP_OLD_LOG_DATA_JOB_TYPE, CleanupOldLogData};
pub use queue::{JobQueue, JobRecord, SubmitOutcome};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    db::DbPool,
    events::EventBus,
    retention::BatchError,
    status::{StatusError, TaskStatusSource},
};

/// Shared collaborators handed to every job run.
pub struct JobContext {
    pub db: Arc<DbPool>,
    pub status_source: Arc<dyn TaskStatusSource>,
    pub events: Arc<EventBus>,
    /// Task status that releases a build's logs for deletion.
    pub success_status: String,
}

impl JobContext {
    pub fn new(
        db: Arc<DbPool>,
        status_source: Arc<dyn TaskStatusSource>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            db,
            status_source,
            events,
            success_status: "success".to_string(),
        }
    }

    pub fn with_success_status(mut self, status: impl Into<String>) -> Self {
        self.success_status = status.into();
        self
    }
}

/// Whether a job's dependencies allow it to run now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Waiting,
}

/// Every kind of job the queue knows how to run.
#[derive(Debug, Clone)]
pub enum Job {
    CleanupOldLogData(CleanupOldLogData),
}

impl Job {
    /// Deterministic identity used for de-duplication.
    pub fn id(&self) -> &str {
        match self {
            Job::CleanupOldLogData(job) => job.id(),
        }
    }

    pub fn job_type(&self) -> &'static str {
        match self {
            Job::CleanupOldLogData(_) => CLEANUP_OLD_LOG_DATA_JOB_TYPE,
        }
    }

    pub fn readiness(&self) -> Readiness {
        match self {
            // No upstream dependency
            Job::CleanupOldLogData(_) => Readiness::Ready,
        }
    }

    pub async fn run(&self, ctx: &JobContext, cancel: &CancellationToken) -> JobReport {
        match self {
            Job::CleanupOldLogData(job) => job.run(ctx, cancel).await,
        }
    }
}

impl From<CleanupOldLogData> for Job {
    fn from(job: CleanupOldLogData) -> Self {
        Job::CleanupOldLogData(job)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("task status lookup failed: {0}")]
    StatusLookup(#[source] StatusError),

    #[error("task status decode failed: {0}")]
    Decode(#[source] StatusError),

    #[error("store operation failed: {0}")]
    Store(#[from] BatchError),

    #[error("job cancelled")]
    Cancelled,
}

impl JobError {
    /// Whether re-running the job from the start may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            JobError::StatusLookup(e) => e.is_retryable(),
            JobError::Store(_) => true,
            JobError::Decode(_) | JobError::Cancelled => false,
        }
    }
}

impl From<StatusError> for JobError {
    fn from(e: StatusError) -> Self {
        match e {
            StatusError::Cancelled => JobError::Cancelled,
            StatusError::Decode(_) => JobError::Decode(e),
            other => JobError::StatusLookup(other),
        }
    }
}

/// Result of one step of a job run.
#[derive(Debug, Default)]
pub struct StepResult {
    /// Records mutated by the step.
    pub affected: u64,
    pub error: Option<JobError>,
}

impl StepResult {
    pub fn ok(affected: u64) -> Self {
        Self {
            affected,
            error: None,
        }
    }

    pub fn failed(affected: u64, error: JobError) -> Self {
        Self {
            affected,
            error: Some(error),
        }
    }
}

/// What a cleanup run did to the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupOutcome {
    /// Task succeeded; tests and logs were deleted.
    Deleted,
    /// Task did not succeed; tests were flagged failed.
    MarkedFailed,
    /// The authority does not know the task; nothing to reconcile.
    Skipped,
    /// Stopped before touching the store.
    Aborted,
}

impl CleanupOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupOutcome::Deleted => "deleted",
            CleanupOutcome::MarkedFailed => "marked_failed",
            CleanupOutcome::Skipped => "skipped",
            CleanupOutcome::Aborted => "aborted",
        }
    }
}

/// The single completion record of a job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    pub job_type: String,
    pub build_id: String,
    pub task_id: String,
    /// Task status as observed; empty when none was obtained.
    pub status: String,
    pub outcome: CleanupOutcome,
    /// Tests deleted or flagged.
    pub num: u64,
    pub has_errors: bool,
    pub errors: Vec<String>,
    /// Whether any recorded error is worth another attempt.
    pub retryable: bool,
    pub duration_ms: u64,
}
