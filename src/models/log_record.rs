use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A log segment attached to a test.
///
/// `test_id` is a plain value reference: the owning test may already be gone,
/// in which case the log is an orphan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub id: Uuid,
    pub test_id: Uuid,
    pub build_id: String,
    /// Position of this segment within the test's output
    pub seq: i32,
    pub lines: Vec<String>,
}

/// Input for ingesting a log segment
#[derive(Debug, Clone)]
pub struct CreateLog {
    pub test_id: Uuid,
    pub build_id: String,
    pub seq: i32,
    pub lines: Vec<String>,
}

impl CreateLog {
    pub fn for_test(test_id: Uuid) -> Self {
        Self {
            test_id,
            build_id: String::new(),
            seq: 0,
            lines: Vec::new(),
        }
    }
}
