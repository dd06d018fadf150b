use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    db::{
        error::DbResult,
        repos::{TestRepo, ceil_to_millis, truncate_to_millis},
    },
    models::{CreateTest, Test},
};

/// Tests repository backed by PostgreSQL.
///
/// All queries go to the primary: a stale replica read could hand the sweep a
/// test that was just marked failed.
pub struct PostgresTestRepo {
    pool: PgPool,
}

impl PostgresTestRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_test(row: &PgRow) -> Test {
        Test {
            id: row.get("id"),
            build_id: row.get("build_id"),
            name: row.get("name"),
            started: row.get("started"),
            failed: row.get("failed"),
        }
    }
}

#[async_trait]
impl TestRepo for PostgresTestRepo {
    async fn create(&self, input: CreateTest) -> DbResult<Test> {
        let row = sqlx::query(
            r#"
            INSERT INTO tests (id, build_id, name, started, failed)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING id, build_id, name, started, failed
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.build_id)
        .bind(&input.name)
        .bind(truncate_to_millis(input.started))
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::parse_test(&row))
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Test>> {
        let row = sqlx::query(
            r#"
            SELECT id, build_id, name, started, failed
            FROM tests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::parse_test))
    }

    async fn list_by_build(&self, build_id: &str) -> DbResult<Vec<Test>> {
        let rows = sqlx::query(
            r#"
            SELECT id, build_id, name, started, failed
            FROM tests
            WHERE build_id = $1
            ORDER BY started ASC, id ASC
            "#,
        )
        .bind(build_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::parse_test).collect())
    }

    async fn count(&self) -> DbResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM tests")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }

    async fn list_started_before(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Test>> {
        let rows = sqlx::query(
            r#"
            SELECT id, build_id, name, started, failed
            FROM tests
            WHERE failed = FALSE AND started < $1
            "#,
        )
        .bind(ceil_to_millis(cutoff))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::parse_test).collect())
    }

    async fn delete(&self, id: Uuid) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM tests WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(&self, id: Uuid) -> DbResult<bool> {
        let result = sqlx::query("UPDATE tests SET failed = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed_by_build(&self, build_id: &str) -> DbResult<u64> {
        let result = sqlx::query("UPDATE tests SET failed = TRUE WHERE build_id = $1")
            .bind(build_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
