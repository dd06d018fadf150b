use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow, types::Json};
use uuid::Uuid;

use crate::{
    db::{error::DbResult, repos::LogRepo},
    models::{CreateLog, Log},
};

pub struct PostgresLogRepo {
    pool: PgPool,
}

impl PostgresLogRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_log(row: &PgRow) -> Log {
        let Json(lines): Json<Vec<String>> = row.get("lines");
        Log {
            id: row.get("id"),
            test_id: row.get("test_id"),
            build_id: row.get("build_id"),
            seq: row.get("seq"),
            lines,
        }
    }
}

#[async_trait]
impl LogRepo for PostgresLogRepo {
    async fn create(&self, input: CreateLog) -> DbResult<Log> {
        let row = sqlx::query(
            r#"
            INSERT INTO logs (id, test_id, build_id, seq, lines)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, test_id, build_id, seq, lines
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.test_id)
        .bind(&input.build_id)
        .bind(input.seq)
        .bind(Json(&input.lines))
        .fetch_one(&self.pool)
        .await?;

        Ok(Self::parse_log(&row))
    }

    async fn list_by_test(&self, test_id: Uuid) -> DbResult<Vec<Log>> {
        let rows = sqlx::query(
            r#"
            SELECT id, test_id, build_id, seq, lines
            FROM logs
            WHERE test_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::parse_log).collect())
    }

    async fn count(&self) -> DbResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM logs")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }

    async fn delete_by_test(&self, test_id: Uuid) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM logs WHERE test_id = $1")
            .bind(test_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
