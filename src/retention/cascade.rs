use uuid::Uuid;

use super::BatchError;
use crate::db::{DbPool, DbResult};

/// Delete a test and every log that references it.
///
/// Logs go first. Deleting a test that does not exist succeeds.
pub async fn delete_test_and_logs(db: &DbPool, test_id: Uuid) -> DbResult<()> {
    cascade_test(db, test_id).await.map(|_| ())
}

/// Cascade-delete every test of a build.
///
/// Returns the number of test records removed. Stops at the first store
/// failure, reporting how many tests were removed before it.
pub async fn delete_tests_and_logs_by_build(db: &DbPool, build_id: &str) -> Result<u64, BatchError> {
    let tests = db
        .tests()
        .list_by_build(build_id)
        .await
        .map_err(BatchError::at(0))?;

    let mut removed = 0;
    for test in &tests {
        if cascade_test(db, test.id)
            .await
            .map_err(BatchError::at(removed))?
        {
            removed += 1;
        }
    }

    tracing::debug!(build_id, tests = tests.len(), removed, "Deleted build tests and logs");
    Ok(removed)
}

/// Logs first, then the test record. Returns whether the test record existed.
async fn cascade_test(db: &DbPool, test_id: Uuid) -> DbResult<bool> {
    let logs_deleted = db.logs().delete_by_test(test_id).await?;
    let removed = db.tests().delete(test_id).await?;

    tracing::debug!(
        test_id = %test_id,
        logs_deleted,
        test_removed = removed,
        "Deleted test and logs"
    );
    Ok(removed)
}
