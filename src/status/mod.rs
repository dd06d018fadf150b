//! Lookup of a CI task's final status from the external authority.
//!
//! Cleanup jobs consult the authority before touching the store: a task that
//! finished successfully releases its build's logs for deletion, anything
//! else keeps them.

mod http;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

pub use http::HttpTaskStatusClient;

/// Outcome of a status lookup that reached the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskLookup {
    /// The authority does not know the task.
    NotFound,
    /// Raw response body of a successful lookup.
    Found(Bytes),
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("Status request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Status authority returned HTTP {0}")]
    UnexpectedStatus(u16),

    #[error("Status request timed out")]
    Timeout,

    #[error("Status request cancelled")]
    Cancelled,

    #[error("Failed to read status response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("Failed to decode task status: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid task status URL: {0}")]
    InvalidUrl(String),
}

impl StatusError {
    /// Whether running the lookup again may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            StatusError::Cancelled | StatusError::Decode(_) | StatusError::InvalidUrl(_)
        )
    }
}

/// Source of task completion status.
#[async_trait]
pub trait TaskStatusSource: Send + Sync {
    /// Fetch the status document for `task_id`.
    ///
    /// Resolves to `Err(StatusError::Cancelled)` as soon as `cancel` fires.
    async fn lookup(
        &self,
        task_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TaskLookup, StatusError>;
}

/// The subset of the task document that retention cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskStatus {
    /// Final status string; empty when the document carries none.
    #[serde(default)]
    pub status: String,
}

impl TaskStatus {
    pub fn decode(body: &[u8]) -> Result<Self, StatusError> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn is(&self, expected: &str) -> bool {
        self.status == expected
    }
}
