//! Retention and garbage collection of tests and their logs.
//!
//! - [`RetentionPolicy`] decides which tests are old enough to remove.
//! - The cascade removes a test together with every log that references it,
//!   logs first so that an interrupted cascade leaves a retryable test
//!   record rather than unreachable logs.
//! - The marker flags tests whose CI task did not succeed; flagged tests are
//!   never selected by the policy.
//! - The sweep periodically applies the policy and cascades each eligible test.

mod cascade;
mod marker;
mod policy;
mod worker;

pub use cascade::{delete_test_and_logs, delete_tests_and_logs_by_build};
pub use marker::{mark_build_tests_failed, mark_test_failed};
pub use policy::{RetentionPolicy, is_eligible};
pub use worker::{SweepRunResult, run_sweep, start_retention_worker};

use crate::db::DbError;

/// Failure of a build-wide operation part way through.
///
/// `affected` counts the tests already processed when `source` occurred.
#[derive(Debug, thiserror::Error)]
#[error("{source} (after {affected} tests)")]
pub struct BatchError {
    pub affected: u64,
    #[source]
    pub source: DbError,
}

impl BatchError {
    pub(crate) fn at(affected: u64) -> impl FnOnce(DbError) -> BatchError {
        move |source| BatchError { affected, source }
    }
}
