//! Retention configuration.
//!
//! Configures the periodic sweep that removes old tests and their logs.
//!
//! # Example
//!
//! ```toml
//! [retention]
//! enabled = true
//! interval_hours = 24
//! cutoff_days = 30
//!
//! [retention.safety]
//! dry_run = false
//! max_deletes_per_run = 100000
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Retention configuration.
///
/// Tests that started more than `cutoff_days` ago and are not flagged as
/// failed are eligible for deletion. When enabled, a background worker
/// periodically deletes them together with their logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Whether the background sweep is enabled.
    /// Default: false (must be explicitly enabled)
    #[serde(default)]
    pub enabled: bool,

    /// How often to run the sweep (in hours).
    /// Default: 24 (once per day)
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    /// Age in days after which a non-failed test becomes eligible.
    /// Default: 30
    #[serde(default = "default_cutoff_days")]
    pub cutoff_days: u32,

    /// Safety settings to prevent accidental data loss.
    #[serde(default)]
    pub safety: RetentionSafety,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_hours: default_interval_hours(),
            cutoff_days: default_cutoff_days(),
            safety: RetentionSafety::default(),
        }
    }
}

fn default_interval_hours() -> u64 {
    24
}

fn default_cutoff_days() -> u32 {
    30
}

/// Safety settings for the sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionSafety {
    /// If true, log what would be deleted without actually deleting.
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,

    /// Maximum number of tests to delete per run.
    /// Set to 0 for unlimited.
    /// Default: 100000
    #[serde(default = "default_max_deletes_per_run")]
    pub max_deletes_per_run: u64,
}

impl Default for RetentionSafety {
    fn default() -> Self {
        Self {
            dry_run: false,
            max_deletes_per_run: default_max_deletes_per_run(),
        }
    }
}

fn default_max_deletes_per_run() -> u64 {
    100_000
}

/// Upper bound for `cutoff_days` (100 years).
pub const MAX_CUTOFF_DAYS: u32 = 36_500;

/// Upper bound for `interval_hours` (one year).
pub const MAX_INTERVAL_HOURS: u64 = 24 * 365;

impl RetentionConfig {
    /// Get the interval as a Duration.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_hours.saturating_mul(3600))
    }

    /// The cutoff window as a chrono duration.
    pub fn cutoff_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.cutoff_days))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cutoff_days == 0 {
            return Err(ConfigError::Validation(
                "retention.cutoff_days must be at least 1".into(),
            ));
        }
        if self.cutoff_days > MAX_CUTOFF_DAYS {
            return Err(ConfigError::Validation(format!(
                "retention.cutoff_days must be at most {MAX_CUTOFF_DAYS}, got {}",
                self.cutoff_days
            )));
        }
        if self.interval_hours > MAX_INTERVAL_HOURS {
            return Err(ConfigError::Validation(format!(
                "retention.interval_hours must be at most {MAX_INTERVAL_HOURS}, got {}",
                self.interval_hours
            )));
        }
        if self.enabled && self.interval_hours == 0 {
            return Err(ConfigError::Validation(
                "retention.interval_hours must be at least 1 when retention is enabled".into(),
            ));
        }
        Ok(())
    }
}
