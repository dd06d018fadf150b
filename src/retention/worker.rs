//! Background sweep that deletes tests past the retention cutoff.

use std::{sync::Arc, time::Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{RetentionPolicy, delete_test_and_logs};
use crate::{
    config::{RetentionConfig, RetentionSafety},
    db::{DbPool, DbResult},
    events::{EventBus, RetentionEvent},
};

/// Results from a single sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepRunResult {
    /// Tests eligible when the sweep started.
    pub eligible: u64,
    /// Tests removed together with their logs.
    pub tests_deleted: u64,
    /// Tests whose cascade failed; they stay eligible for the next sweep.
    pub failures: u64,
    pub dry_run: bool,
    pub duration_ms: u64,
}

impl SweepRunResult {
    pub fn has_deletions(&self) -> bool {
        self.tests_deleted > 0
    }
}

/// Run one sweep: select eligible tests and cascade-delete them.
///
/// At most `max_deletes_per_run` tests are processed (0 means unlimited).
/// A failed cascade is logged and counted; the sweep moves on to the next
/// test. Only a failing selection query aborts the sweep.
pub async fn run_sweep(
    db: &DbPool,
    policy: &RetentionPolicy,
    safety: &RetentionSafety,
) -> DbResult<SweepRunResult> {
    let start = Instant::now();
    let eligible = policy.select_eligible(db).await?;

    let limit = if safety.max_deletes_per_run == 0 {
        usize::MAX
    } else {
        usize::try_from(safety.max_deletes_per_run).unwrap_or(usize::MAX)
    };

    let mut result = SweepRunResult {
        eligible: eligible.len() as u64,
        dry_run: safety.dry_run,
        ..Default::default()
    };

    if eligible.len() > limit {
        tracing::info!(
            eligible = eligible.len(),
            max_deletes_per_run = safety.max_deletes_per_run,
            "Eligible tests exceed per-run limit, remainder deferred to next sweep"
        );
    }

    for test in eligible.iter().take(limit) {
        if safety.dry_run {
            tracing::info!(
                test_id = %test.id,
                build_id = %test.build_id,
                started = %test.started,
                "DRY RUN: Would delete test and logs"
            );
            continue;
        }

        match delete_test_and_logs(db, test.id).await {
            Ok(()) => result.tests_deleted += 1,
            Err(e) => {
                result.failures += 1;
                tracing::warn!(
                    test_id = %test.id,
                    build_id = %test.build_id,
                    error = %e,
                    "Failed to delete test and logs"
                );
            }
        }
    }

    result.duration_ms = start.elapsed().as_millis() as u64;
    Ok(result)
}

/// Starts the retention sweep as a background task.
///
/// Runs a sweep immediately and then every `interval_hours` until `shutdown`
/// fires. Sweep errors are logged and never stop the worker. Each completed
/// sweep is published on `events`.
pub async fn start_retention_worker(
    db: Arc<DbPool>,
    config: RetentionConfig,
    events: Arc<EventBus>,
    shutdown: CancellationToken,
) {
    if !config.enabled {
        tracing::info!("Retention worker disabled by configuration");
        return;
    }

    let dry_run_msg = if config.safety.dry_run {
        " (DRY RUN)"
    } else {
        ""
    };

    tracing::info!(
        interval_hours = config.interval_hours,
        cutoff_days = config.cutoff_days,
        max_deletes_per_run = config.safety.max_deletes_per_run,
        dry_run = config.safety.dry_run,
        "Starting retention worker{}",
        dry_run_msg
    );

    let policy = RetentionPolicy::from_config(&config);
    let interval = config.interval();

    loop {
        match run_sweep(&db, &policy, &config.safety).await {
            Ok(result) => {
                if result.has_deletions() || result.failures > 0 {
                    tracing::info!(
                        eligible = result.eligible,
                        tests_deleted = result.tests_deleted,
                        failures = result.failures,
                        duration_ms = result.duration_ms,
                        dry_run = result.dry_run,
                        "Retention sweep complete{}",
                        dry_run_msg
                    );
                } else {
                    tracing::debug!(
                        eligible = result.eligible,
                        "Retention sweep complete, nothing deleted"
                    );
                }
                events.publish(RetentionEvent::SweepCompleted(result));
            }
            Err(e) => {
                tracing::error!(error = %e, "Error running retention sweep");
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Retention worker shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
