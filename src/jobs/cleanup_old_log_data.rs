//! Per-build reconciliation of stored logs against the CI task's outcome.

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use super::{CleanupOutcome, JobContext, JobError, JobReport, StepResult};
use crate::{
    events::RetentionEvent,
    retention::{delete_tests_and_logs_by_build, mark_build_tests_failed},
    status::{TaskLookup, TaskStatus},
};

pub const CLEANUP_OLD_LOG_DATA_JOB_TYPE: &str = "cleanup-old-log-data-job";

/// Delete or retain the logs of one build depending on its task's final status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupOldLogData {
    id: String,
    build_id: String,
    task_id: String,
}

impl CleanupOldLogData {
    /// `correlation_id` distinguishes deliberate re-submissions of the same
    /// (build, task) pair; identical inputs yield identical job ids.
    pub fn new(
        build_id: impl Into<String>,
        task_id: impl Into<String>,
        correlation_id: impl AsRef<str>,
    ) -> Self {
        let build_id = build_id.into();
        let task_id = task_id.into();
        let id = format!(
            "{CLEANUP_OLD_LOG_DATA_JOB_TYPE}.{build_id}.{task_id}.oid={}",
            correlation_id.as_ref()
        );
        Self {
            id,
            build_id,
            task_id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Run the job once and report the result.
    ///
    /// Never fails: every error ends up in the returned report, which is also
    /// logged and published.
    pub async fn run(&self, ctx: &JobContext, cancel: &CancellationToken) -> JobReport {
        let start = Instant::now();
        let mut steps = Vec::with_capacity(2);

        let lookup = ctx.status_source.lookup(&self.task_id, cancel).await;
        let (status, outcome) = match lookup {
            Err(e) => {
                steps.push(StepResult::failed(0, e.into()));
                (String::new(), CleanupOutcome::Aborted)
            }
            Ok(TaskLookup::NotFound) => {
                tracing::debug!(
                    task_id = %self.task_id,
                    build_id = %self.build_id,
                    "Task unknown to status authority, nothing to reconcile"
                );
                (String::new(), CleanupOutcome::Skipped)
            }
            Ok(TaskLookup::Found(body)) => {
                // An undecodable body counts as a non-success status
                let status = match TaskStatus::decode(&body) {
                    Ok(status) => status,
                    Err(e) => {
                        steps.push(StepResult::failed(0, e.into()));
                        TaskStatus::default()
                    }
                };

                if cancel.is_cancelled() {
                    steps.push(StepResult::failed(0, JobError::Cancelled));
                    (status.status, CleanupOutcome::Aborted)
                } else if status.is(&ctx.success_status) {
                    steps.push(
                        match delete_tests_and_logs_by_build(&ctx.db, &self.build_id).await {
                            Ok(removed) => StepResult::ok(removed),
                            Err(e) => StepResult::failed(e.affected, e.into()),
                        },
                    );
                    (status.status, CleanupOutcome::Deleted)
                } else {
                    steps.push(
                        match mark_build_tests_failed(&ctx.db, &self.build_id).await {
                            Ok(marked) => StepResult::ok(marked),
                            Err(e) => StepResult::failed(e.affected, e.into()),
                        },
                    );
                    (status.status, CleanupOutcome::MarkedFailed)
                }
            }
        };

        let report = self.report(status, outcome, steps, start);
        tracing::info!(
            job_type = %report.job_type,
            op = "deletion complete",
            job = %report.job_id,
            task = %report.task_id,
            build = %report.build_id,
            status = %report.status,
            outcome = report.outcome.as_str(),
            num = report.num,
            errors = report.has_errors,
            error_messages = ?report.errors,
            duration_ms = report.duration_ms,
            "Cleanup job finished"
        );
        ctx.events
            .publish(RetentionEvent::CleanupCompleted(report.clone()));
        report
    }

    fn report(
        &self,
        status: String,
        outcome: CleanupOutcome,
        steps: Vec<StepResult>,
        start: Instant,
    ) -> JobReport {
        let num = steps.iter().map(|s| s.affected).sum();
        let errors: Vec<JobError> = steps.into_iter().filter_map(|s| s.error).collect();

        JobReport {
            job_id: self.id.clone(),
            job_type: CLEANUP_OLD_LOG_DATA_JOB_TYPE.to_string(),
            build_id: self.build_id.clone(),
            task_id: self.task_id.clone(),
            status,
            outcome,
            num,
            has_errors: !errors.is_empty(),
            retryable: errors.iter().any(JobError::is_retryable),
            errors: errors.iter().map(ToString::to_string).collect(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(all(test, feature = "database-sqlite"))]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::Duration;
    use rstest::rstest;
    use tokio::sync::broadcast::error::TryRecvError;
    use uuid::Uuid;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;
    use crate::{
        config::TaskStatusConfig,
        db::{
            DbPool,
            tests::harness::{create_sqlite_db, seed_test},
        },
        events::EventBus,
        status::{HttpTaskStatusClient, StatusError, TaskStatusSource},
    };

    type Respond = dyn Fn(&CancellationToken) -> Result<TaskLookup, StatusError> + Send + Sync;

    /// Status source answering every lookup with the same canned response.
    struct FakeSource {
        respond: Box<Respond>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(
            respond: impl Fn(&CancellationToken) -> Result<TaskLookup, StatusError>
            + Send
            + Sync
            + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                respond: Box::new(respond),
                calls: AtomicUsize::new(0),
            })
        }

        fn body(json: &'static str) -> Arc<Self> {
            Self::new(move |_| Ok(TaskLookup::Found(Bytes::from_static(json.as_bytes()))))
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaskStatusSource for FakeSource {
        async fn lookup(
            &self,
            _task_id: &str,
            cancel: &CancellationToken,
        ) -> Result<TaskLookup, StatusError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.respond)(cancel)
        }
    }

    struct Fixture {
        db: Arc<DbPool>,
        events: Arc<EventBus>,
        build_tests: [Uuid; 2],
        other_test: Uuid,
    }

    impl Fixture {
        /// Two tests with logs in `build-1`, one in `build-2`.
        async fn new() -> Self {
            let db = Arc::new(create_sqlite_db().await);
            let a = seed_test(&db, "build-1", Duration::days(1), 2).await;
            let b = seed_test(&db, "build-1", Duration::days(40), 1).await;
            let other = seed_test(&db, "build-2", Duration::days(40), 1).await;
            Self {
                db,
                events: Arc::new(EventBus::new()),
                build_tests: [a.id, b.id],
                other_test: other.id,
            }
        }

        fn context(&self, source: Arc<dyn TaskStatusSource>) -> JobContext {
            JobContext::new(self.db.clone(), source, self.events.clone())
        }

        async fn failed_flags(&self) -> Vec<bool> {
            let mut flags = Vec::new();
            for id in self.build_tests {
                let test = self.db.tests().get_by_id(id).await.unwrap().unwrap();
                flags.push(test.failed);
            }
            flags
        }

        async fn assert_untouched(&self) {
            assert_eq!(self.db.tests().count().await.unwrap(), 3);
            assert_eq!(self.db.logs().count().await.unwrap(), 4);
            assert_eq!(self.failed_flags().await, vec![false, false]);
        }
    }

    fn job() -> CleanupOldLogData {
        CleanupOldLogData::new("build-1", "task-1", "oid-1")
    }

    #[tokio::test]
    async fn test_successful_task_deletes_build() {
        let fx = Fixture::new().await;
        let source = FakeSource::body(r#"{"task_id":"task-1","status":"success"}"#);
        let ctx = fx.context(source.clone());

        let report = job().run(&ctx, &CancellationToken::new()).await;

        assert_eq!(report.outcome, CleanupOutcome::Deleted);
        assert_eq!(report.status, "success");
        assert_eq!(report.num, 2);
        assert!(!report.has_errors);
        assert!(report.errors.is_empty());
        assert_eq!(report.job_id, "cleanup-old-log-data-job.build-1.task-1.oid=oid-1");
        assert_eq!(source.calls(), 1);

        assert!(fx.db.tests().list_by_build("build-1").await.unwrap().is_empty());
        assert_eq!(fx.db.logs().count().await.unwrap(), 1);
        assert!(fx.db.tests().get_by_id(fx.other_test).await.unwrap().is_some());
    }

    #[rstest]
    #[case::failed(r#"{"status":"failed"}"#, "failed")]
    #[case::empty(r#"{"status":""}"#, "")]
    #[case::undispatched(r#"{"status":"undispatched"}"#, "undispatched")]
    #[case::missing_field(r#"{"task_id":"task-1"}"#, "")]
    #[tokio::test]
    async fn test_unsuccessful_task_marks_build_failed(
        #[case] body: &'static str,
        #[case] expected_status: &str,
    ) {
        let fx = Fixture::new().await;
        let ctx = fx.context(FakeSource::body(body));

        let report = job().run(&ctx, &CancellationToken::new()).await;

        assert_eq!(report.outcome, CleanupOutcome::MarkedFailed);
        assert_eq!(report.status, expected_status);
        assert_eq!(report.num, 2);
        assert!(!report.has_errors);

        assert_eq!(fx.failed_flags().await, vec![true, true]);
        assert_eq!(fx.db.tests().count().await.unwrap(), 3);
        assert_eq!(fx.db.logs().count().await.unwrap(), 4);
        let other = fx.db.tests().get_by_id(fx.other_test).await.unwrap().unwrap();
        assert!(!other.failed);
    }

    #[tokio::test]
    async fn test_undecodable_status_marks_failed_and_records_error() {
        let fx = Fixture::new().await;
        let ctx = fx.context(FakeSource::body("<html>gateway</html>"));

        let report = job().run(&ctx, &CancellationToken::new()).await;

        assert_eq!(report.outcome, CleanupOutcome::MarkedFailed);
        assert_eq!(report.status, "");
        assert_eq!(report.num, 2);
        assert!(report.has_errors);
        assert!(!report.retryable);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("decode"), "{:?}", report.errors);
        assert_eq!(fx.failed_flags().await, vec![true, true]);
    }

    #[tokio::test]
    async fn test_unknown_task_is_skipped() {
        let fx = Fixture::new().await;
        let ctx = fx.context(FakeSource::new(|_| Ok(TaskLookup::NotFound)));

        let report = job().run(&ctx, &CancellationToken::new()).await;

        assert_eq!(report.outcome, CleanupOutcome::Skipped);
        assert_eq!(report.num, 0);
        assert!(!report.has_errors);
        fx.assert_untouched().await;
    }

    #[rstest]
    #[case::server_error(|| StatusError::UnexpectedStatus(503))]
    #[case::timeout(|| StatusError::Timeout)]
    #[tokio::test]
    async fn test_lookup_failure_aborts_without_mutation(
        #[case] error: fn() -> StatusError,
    ) {
        let fx = Fixture::new().await;
        let ctx = fx.context(FakeSource::new(move |_| Err(error())));

        let report = job().run(&ctx, &CancellationToken::new()).await;

        assert_eq!(report.outcome, CleanupOutcome::Aborted);
        assert_eq!(report.num, 0);
        assert!(report.has_errors);
        assert!(report.retryable);
        fx.assert_untouched().await;
    }

    #[tokio::test]
    async fn test_cancellation_after_lookup_aborts() {
        let fx = Fixture::new().await;
        let ctx = fx.context(FakeSource::new(|cancel| {
            cancel.cancel();
            Ok(TaskLookup::Found(Bytes::from_static(br#"{"status":"success"}"#)))
        }));

        let report = job().run(&ctx, &CancellationToken::new()).await;

        assert_eq!(report.outcome, CleanupOutcome::Aborted);
        assert_eq!(report.status, "success");
        assert!(report.has_errors);
        assert!(!report.retryable);
        fx.assert_untouched().await;
    }

    #[tokio::test]
    async fn test_cancelled_lookup_aborts() {
        let fx = Fixture::new().await;
        let ctx = fx.context(FakeSource::new(|_| Err(StatusError::Cancelled)));

        let report = job().run(&ctx, &CancellationToken::new()).await;

        assert_eq!(report.outcome, CleanupOutcome::Aborted);
        assert_eq!(report.errors, vec!["job cancelled".to_string()]);
        assert!(!report.retryable);
        fx.assert_untouched().await;
    }

    #[tokio::test]
    async fn test_store_failure_is_retryable() {
        let fx = Fixture::new().await;
        let ctx = fx.context(FakeSource::body(r#"{"status":"success"}"#));
        fx.db.close().await;

        let report = job().run(&ctx, &CancellationToken::new()).await;

        assert_eq!(report.outcome, CleanupOutcome::Deleted);
        assert_eq!(report.num, 0);
        assert!(report.has_errors);
        assert!(report.retryable);
    }

    #[tokio::test]
    async fn test_custom_success_status() {
        let fx = Fixture::new().await;
        let ctx = fx
            .context(FakeSource::body(r#"{"status":"passed"}"#))
            .with_success_status("passed");

        let report = job().run(&ctx, &CancellationToken::new()).await;

        assert_eq!(report.outcome, CleanupOutcome::Deleted);
        assert_eq!(report.num, 2);
    }

    #[tokio::test]
    async fn test_each_run_publishes_one_event() {
        let fx = Fixture::new().await;
        let mut rx = fx.events.subscribe();
        let ctx = fx.context(FakeSource::body(r#"{"status":"failed"}"#));

        let report = job().run(&ctx, &CancellationToken::new()).await;

        let RetentionEvent::CleanupCompleted(published) = rx.recv().await.unwrap() else {
            panic!("expected cleanup event");
        };
        assert_eq!(published, report);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        // Re-running is harmless and reports again
        let again = job().run(&ctx, &CancellationToken::new()).await;
        assert_eq!(again.outcome, CleanupOutcome::MarkedFailed);
        assert_eq!(again.num, 2);
        assert_eq!(fx.events.events_published(), 2);
    }

    #[tokio::test]
    async fn test_end_to_end_with_http_client() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v2/tasks/task-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"task_id": "task-1", "status": "success"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpTaskStatusClient::new(&TaskStatusConfig {
            base_url: format!("{}/rest/v2/tasks", server.uri()),
            ..Default::default()
        })
        .unwrap();

        let fx = Fixture::new().await;
        let ctx = fx.context(Arc::new(client));

        let report = job().run(&ctx, &CancellationToken::new()).await;

        assert_eq!(report.outcome, CleanupOutcome::Deleted);
        assert_eq!(report.num, 2);
        assert_eq!(fx.db.tests().count().await.unwrap(), 1);
    }
}
