use uuid::Uuid;

use super::BatchError;
use crate::db::{DbPool, DbResult};

/// Flag a test as failed, exempting it from time-based retention.
///
/// Idempotent; a missing test is not an error.
pub async fn mark_test_failed(db: &DbPool, test_id: Uuid) -> DbResult<()> {
    let found = db.tests().mark_failed(test_id).await?;
    tracing::debug!(test_id = %test_id, found, "Marked test failed");
    Ok(())
}

/// Flag every test of a build as failed.
///
/// Returns the number of tests in the build, including ones already flagged.
pub async fn mark_build_tests_failed(db: &DbPool, build_id: &str) -> Result<u64, BatchError> {
    let marked = db
        .tests()
        .mark_failed_by_build(build_id)
        .await
        .map_err(BatchError::at(0))?;
    tracing::debug!(build_id, marked, "Marked build tests failed");
    Ok(marked)
}
