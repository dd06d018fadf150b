use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A logical test: a unit of CI work that produced logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Test {
    /// Unique identifier, assigned at creation
    pub id: Uuid,
    /// Opaque token grouping the tests of one build
    pub build_id: String,
    /// Human-readable test name
    pub name: String,
    /// When the test started
    pub started: DateTime<Utc>,
    /// Set once the owning task is known not to have succeeded.
    /// Failed tests are never selected for time-based deletion.
    pub failed: bool,
}

/// Input for recording a new test
#[derive(Debug, Clone)]
pub struct CreateTest {
    pub build_id: String,
    pub name: String,
    pub started: DateTime<Utc>,
}

impl CreateTest {
    pub fn new(build_id: impl Into<String>, started: DateTime<Utc>) -> Self {
        Self {
            build_id: build_id.into(),
            name: String::new(),
            started,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
