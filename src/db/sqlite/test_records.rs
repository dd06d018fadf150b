use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use uuid::Uuid;

use super::common::parse_uuid;
use crate::{
    db::{
        error::DbResult,
        repos::{TestRepo, ceil_to_millis, truncate_to_millis},
    },
    models::{CreateTest, Test},
};

pub struct SqliteTestRepo {
    pool: SqlitePool,
}

impl SqliteTestRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_test(row: &SqliteRow) -> DbResult<Test> {
        Ok(Test {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            build_id: row.get("build_id"),
            name: row.get("name"),
            started: row.get("started"),
            failed: row.get("failed"),
        })
    }
}

#[async_trait]
impl TestRepo for SqliteTestRepo {
    async fn create(&self, input: CreateTest) -> DbResult<Test> {
        let id = Uuid::new_v4();
        let started = truncate_to_millis(input.started);

        sqlx::query(
            r#"
            INSERT INTO tests (id, build_id, name, started, failed)
            VALUES (?, ?, ?, ?, 0)
            "#,
        )
        .bind(id.to_string())
        .bind(&input.build_id)
        .bind(&input.name)
        .bind(started)
        .execute(&self.pool)
        .await?;

        Ok(Test {
            id,
            build_id: input.build_id,
            name: input.name,
            started,
            failed: false,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Test>> {
        let row = sqlx::query(
            r#"
            SELECT id, build_id, name, started, failed
            FROM tests
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_test).transpose()
    }

    async fn list_by_build(&self, build_id: &str) -> DbResult<Vec<Test>> {
        let rows = sqlx::query(
            r#"
            SELECT id, build_id, name, started, failed
            FROM tests
            WHERE build_id = ?
            ORDER BY started ASC, id ASC
            "#,
        )
        .bind(build_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::parse_test).collect()
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
            WHERE failed = 0 AND started < ?
            "#,
        )
        .bind(ceil_to_millis(cutoff))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::parse_test).collect()
    }

    async fn delete(&self, id: Uuid) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM tests WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(&self, id: Uuid) -> DbResult<bool> {
        let result = sqlx::query("UPDATE tests SET failed = 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed_by_build(&self, build_id: &str) -> DbResult<u64> {
        let result = sqlx::query("UPDATE tests SET failed = 1 WHERE build_id = ?")
            .bind(build_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
