//! Connection settings for the task-status authority.
//!
//! ```toml
//! [task_status]
//! base_url = "https://evergreen.mongodb.com/rest/v2/tasks"
//! api_user = "${TASK_API_USER}"
//! api_key = "${TASK_API_KEY}"
//! timeout_secs = 30
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskStatusConfig {
    /// Collection URL; the task id is appended as the final path segment.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sent as the `Api-User` header when set.
    #[serde(default)]
    pub api_user: Option<String>,

    /// Sent as the `Api-Key` header when set.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Status value that means the task completed successfully.
    /// Any other value keeps the build's tests.
    #[serde(default = "default_success_status")]
    pub success_status: String,
}

impl Default for TaskStatusConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_user: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
            success_status: default_success_status(),
        }
    }
}

fn default_base_url() -> String {
    "https://evergreen.mongodb.com/rest/v2/tasks".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_success_status() -> String {
    "success".to_string()
}

impl TaskStatusConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            ConfigError::Validation(format!(
                "task_status.base_url '{}' is not a valid URL: {e}",
                self.base_url
            ))
        })?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::Validation(format!(
                "task_status.base_url '{}' cannot be used as a base URL",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "task_status.timeout_secs must be at least 1".into(),
            ));
        }
        if self.success_status.is_empty() {
            return Err(ConfigError::Validation(
                "task_status.success_status cannot be empty".into(),
            ));
        }
        Ok(())
    }
}
