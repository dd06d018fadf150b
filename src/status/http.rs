use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tokio_util::sync::CancellationToken;

use super::{StatusError, TaskLookup, TaskStatusSource};
use crate::config::TaskStatusConfig;

/// [`TaskStatusSource`] backed by the authority's REST API.
///
/// Issues `GET {base_url}/{task_id}` with `Api-User` / `Api-Key` headers.
#[derive(Debug, Clone)]
pub struct HttpTaskStatusClient {
    http_client: Client,
    base_url: Url,
    api_user: Option<String>,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpTaskStatusClient {
    pub fn new(config: &TaskStatusConfig) -> Result<Self, StatusError> {
        let http_client = Client::builder().build().map_err(StatusError::Transport)?;
        Self::with_client(http_client, config)
    }

    /// Use an existing HTTP client (shares its connection pool).
    pub fn with_client(http_client: Client, config: &TaskStatusConfig) -> Result<Self, StatusError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| StatusError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(StatusError::InvalidUrl(config.base_url.clone()));
        }

        Ok(Self {
            http_client,
            base_url,
            api_user: config.api_user.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout(),
        })
    }

    /// URL of the task document; the id is percent-encoded as one path segment.
    fn task_url(&self, task_id: &str) -> Result<Url, StatusError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StatusError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(task_id);
        Ok(url)
    }

    async fn fetch(&self, url: Url) -> Result<TaskLookup, StatusError> {
        let mut request = self.http_client.get(url).timeout(self.timeout);
        if let Some(user) = &self.api_user {
            request = request.header("Api-User", user);
        }
        if let Some(key) = &self.api_key {
            request = request.header("Api-Key", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                StatusError::Timeout
            } else {
                StatusError::Transport(e)
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(TaskLookup::NotFound);
        }
        if !status.is_success() {
            return Err(StatusError::UnexpectedStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                StatusError::Timeout
            } else {
                StatusError::Body(e)
            }
        })?;
        Ok(TaskLookup::Found(body))
    }
}

#[async_trait]
impl TaskStatusSource for HttpTaskStatusClient {
    async fn lookup(
        &self,
        task_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TaskLookup, StatusError> {
        if cancel.is_cancelled() {
            return Err(StatusError::Cancelled);
        }
        let url = self.task_url(task_id)?;

        tracing::debug!(task_id, url = %url, "Looking up task status");

        tokio::select! {
            _ = cancel.cancelled() => Err(StatusError::Cancelled),
            result = self.fetch(url) => result,
        }
    }
}
