use async_trait::async_trait;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use uuid::Uuid;

use super::common::parse_uuid;
use crate::{
    db::{error::DbResult, repos::LogRepo},
    models::{CreateLog, Log},
};

pub struct SqliteLogRepo {
    pool: SqlitePool,
}

impl SqliteLogRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_log(row: &SqliteRow) -> DbResult<Log> {
        let lines: String = row.get("lines");
        Ok(Log {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            test_id: parse_uuid(&row.get::<String, _>("test_id"))?,
            build_id: row.get("build_id"),
            seq: row.get("seq"),
            lines: serde_json::from_str(&lines)?,
        })
    }
}

#[async_trait]
impl LogRepo for SqliteLogRepo {
    async fn create(&self, input: CreateLog) -> DbResult<Log> {
        let id = Uuid::new_v4();
        let lines_json = serde_json::to_string(&input.lines)?;

        sqlx::query(
            r#"
            INSERT INTO logs (id, test_id, build_id, seq, lines)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(input.test_id.to_string())
        .bind(&input.build_id)
        .bind(input.seq)
        .bind(&lines_json)
        .execute(&self.pool)
        .await?;

        Ok(Log {
            id,
            test_id: input.test_id,
            build_id: input.build_id,
            seq: input.seq,
            lines: input.lines,
        })
    }

    async fn list_by_test(&self, test_id: Uuid) -> DbResult<Vec<Log>> {
        let rows = sqlx::query(
            r#"
            SELECT id, test_id, build_id, seq, lines
            FROM logs
            WHERE test_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(test_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::parse_log).collect()
    }

    async fn count(&self) -> DbResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM logs")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }

    async fn delete_by_test(&self, test_id: Uuid) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM logs WHERE test_id = ?")
            .bind(test_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
