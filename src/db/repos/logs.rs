use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::error::DbResult,
    models::{CreateLog, Log},
};

#[async_trait]
pub trait LogRepo: Send + Sync {
    /// Store a log segment. The referenced test is not required to exist.
    async fn create(&self, input: CreateLog) -> DbResult<Log>;

    /// List log segments of a test, ordered by `seq`
    async fn list_by_test(&self, test_id: Uuid) -> DbResult<Vec<Log>>;

    /// Count all stored log segments
    async fn count(&self) -> DbResult<i64>;

    // ==================== Retention Operations ====================

    /// Delete every log segment referencing `test_id`.
    ///
    /// Returns the number of segments removed; zero is not an error.
    async fn delete_by_test(&self, test_id: Uuid) -> DbResult<u64>;
}
