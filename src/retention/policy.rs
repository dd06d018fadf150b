use chrono::{DateTime, Duration, Utc};

use crate::{
    config::RetentionConfig,
    db::{DbPool, DbResult},
    models::Test,
};

/// A test is eligible for deletion when it is not flagged failed and started
/// more than `cutoff_window` before `now`.
pub fn is_eligible(test: &Test, now: DateTime<Utc>, cutoff_window: Duration) -> bool {
    !test.failed && now - test.started > cutoff_window
}

/// Time-based retention rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    cutoff_window: Duration,
}

impl RetentionPolicy {
    pub fn new(cutoff_window: Duration) -> Self {
        Self { cutoff_window }
    }

    pub fn from_config(config: &RetentionConfig) -> Self {
        Self::new(config.cutoff_window())
    }

    pub fn cutoff_window(&self) -> Duration {
        self.cutoff_window
    }

    pub fn is_eligible(&self, test: &Test, now: DateTime<Utc>) -> bool {
        is_eligible(test, now, self.cutoff_window)
    }

    /// Every stored test that is eligible right now, in no particular order.
    ///
    /// A window reaching before the earliest representable instant selects
    /// nothing.
    pub async fn select_eligible(&self, db: &DbPool) -> DbResult<Vec<Test>> {
        let Some(cutoff) = Utc::now().checked_sub_signed(self.cutoff_window) else {
            tracing::debug!(
                cutoff_window_days = self.cutoff_window.num_days(),
                "Cutoff precedes representable time, nothing eligible"
            );
            return Ok(Vec::new());
        };
        let tests = db.tests().list_started_before(cutoff).await?;
        tracing::debug!(cutoff = %cutoff, eligible = tests.len(), "Selected eligible tests");
        Ok(tests)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;
    use uuid::Uuid;

    use super::*;

    fn test_started(started: DateTime<Utc>, failed: bool) -> Test {
        Test {
            id: Uuid::new_v4(),
            build_id: "build".into(),
            name: String::new(),
            started,
            failed,
        }
    }

    #[rstest]
    #[case::old(Duration::days(31), false, true)]
    #[case::old_failed(Duration::days(31), true, false)]
    #[case::recent(Duration::days(29), false, false)]
    #[case::exactly_at_cutoff(Duration::days(30), false, false)]
    #[case::just_past_cutoff(Duration::days(30) + Duration::milliseconds(1), false, true)]
    fn test_is_eligible(#[case] age: Duration, #[case] failed: bool, #[case] expected: bool) {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let test = test_started(now - age, failed);
        assert_eq!(is_eligible(&test, now, Duration::days(30)), expected);
    }

    #[test]
    fn test_policy_from_config() {
        let config = RetentionConfig {
            cutoff_days: 14,
            ..Default::default()
        };
        let policy = RetentionPolicy::from_config(&config);
        assert_eq!(policy.cutoff_window(), Duration::days(14));

        let now = Utc::now();
        assert!(policy.is_eligible(&test_started(now - Duration::days(15), false), now));
        assert!(!policy.is_eligible(&test_started(now - Duration::days(13), false), now));
    }

    #[cfg(feature = "database-sqlite")]
    mod sqlite {
        use super::*;
        use crate::{
            db::tests::harness::create_sqlite_db,
            models::CreateTest,
        };

        #[tokio::test]
        async fn test_select_eligible_returns_only_old_tests() {
            let db = create_sqlite_db().await;
            let cutoff_window = Duration::days(30);
            let now = Utc::now();
            let started = [
                Utc.with_ymd_and_hms(2016, 1, 15, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2016, 2, 15, 0, 0, 0).unwrap(),
                now - cutoff_window + Duration::minutes(1),
                now,
            ];
            for (i, started) in started.into_iter().enumerate() {
                db.tests()
                    .create(CreateTest::new(format!("build-{i}"), started))
                    .await
                    .unwrap();
            }

            let eligible = RetentionPolicy::new(cutoff_window)
                .select_eligible(&db)
                .await
                .unwrap();

            assert_eq!(eligible.len(), 2);
            assert!(eligible.iter().all(|t| t.started.format("%Y").to_string() == "2016"));
        }

        #[tokio::test]
        async fn test_select_eligible_has_no_side_effects() {
            let db = create_sqlite_db().await;
            db.tests()
                .create(CreateTest::new("b", Utc::now() - Duration::days(90)))
                .await
                .unwrap();
            let policy = RetentionPolicy::new(Duration::days(30));

            let first = policy.select_eligible(&db).await.unwrap();
            let second = policy.select_eligible(&db).await.unwrap();

            assert_eq!(first, second);
            assert_eq!(db.tests().count().await.unwrap(), 1);
        }

        #[tokio::test]
        async fn test_select_eligible_with_unrepresentable_cutoff() {
            let db = create_sqlite_db().await;
            db.tests()
                .create(CreateTest::new("b", Utc.with_ymd_and_hms(2016, 1, 15, 0, 0, 0).unwrap()))
                .await
                .unwrap();
            let config = RetentionConfig {
                cutoff_days: 1_000_000_000,
                ..Default::default()
            };

            let eligible = RetentionPolicy::from_config(&config)
                .select_eligible(&db)
                .await
                .unwrap();

            assert!(eligible.is_empty());
            assert_eq!(db.tests().count().await.unwrap(), 1);
        }
    }
}
