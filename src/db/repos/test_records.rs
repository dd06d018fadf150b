use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::error::DbResult,
    models::{CreateTest, Test},
};

#[async_trait]
pub trait TestRepo: Send + Sync {
    /// Record a new test. `failed` starts out false.
    async fn create(&self, input: CreateTest) -> DbResult<Test>;

    /// Get a test by ID
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Test>>;

    /// List every test belonging to a build
    async fn list_by_build(&self, build_id: &str) -> DbResult<Vec<Test>>;

    /// Count all stored tests
    async fn count(&self) -> DbResult<i64>;

    // ==================== Retention Operations ====================

    /// List tests that are not failed and started strictly before `cutoff`.
    async fn list_started_before(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Test>>;

    /// Delete a single test record.
    ///
    /// Returns false if no such test existed. Does not touch logs.
    async fn delete(&self, id: Uuid) -> DbResult<bool>;

    /// Set `failed = true` on a single test.
    ///
    /// Returns false if no such test existed. Re-marking is a no-op.
    async fn mark_failed(&self, id: Uuid) -> DbResult<bool>;

    /// Set `failed = true` on every test of a build.
    ///
    /// Returns the number of tests in the build, including ones already failed.
    async fn mark_failed_by_build(&self, build_id: &str) -> DbResult<u64>;
}
