//! Shared tests for LogRepo implementations

use uuid::Uuid;

use crate::{db::repos::LogRepo, models::CreateLog};

fn create_log_input(test_id: Uuid, seq: i32) -> CreateLog {
    CreateLog {
        test_id,
        build_id: "build-1".to_string(),
        seq,
        lines: vec![format!("[{seq}] starting"), format!("[{seq}] done")],
    }
}

pub async fn test_create_and_list(repo: &dyn LogRepo) {
    let test_id = Uuid::new_v4();
    repo.create(create_log_input(test_id, 1)).await.unwrap();
    let first = repo.create(create_log_input(test_id, 0)).await.unwrap();

    let logs = repo.list_by_test(test_id).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0], first);
    assert_eq!(logs[0].lines, vec!["[0] starting", "[0] done"]);
    assert_eq!(logs[1].seq, 1);
}

pub async fn test_empty_lines_round_trip(repo: &dyn LogRepo) {
    let test_id = Uuid::new_v4();
    repo.create(CreateLog::for_test(test_id)).await.unwrap();

    let logs = repo.list_by_test(test_id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].lines.is_empty());
}

pub async fn test_delete_by_test(repo: &dyn LogRepo) {
    let target = Uuid::new_v4();
    let other = Uuid::new_v4();
    for seq in 0..3 {
        repo.create(create_log_input(target, seq)).await.unwrap();
    }
    repo.create(create_log_input(other, 0)).await.unwrap();

    assert_eq!(repo.delete_by_test(target).await.unwrap(), 3);
    assert!(repo.list_by_test(target).await.unwrap().is_empty());
    assert_eq!(repo.list_by_test(other).await.unwrap().len(), 1);
    assert_eq!(repo.count().await.unwrap(), 1);
}

pub async fn test_delete_by_test_none(repo: &dyn LogRepo) {
    assert_eq!(repo.delete_by_test(Uuid::new_v4()).await.unwrap(), 0);
}

#[cfg(feature = "database-sqlite")]
mod sqlite_tests {
    use crate::db::{
        sqlite::SqliteLogRepo,
        tests::harness::{create_sqlite_pool, run_sqlite_migrations},
    };

    macro_rules! sqlite_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let pool = create_sqlite_pool().await;
                run_sqlite_migrations(&pool).await;
                let repo = SqliteLogRepo::new(pool);
                super::$name(&repo).await;
            }
        };
    }

    sqlite_test!(test_create_and_list);
    sqlite_test!(test_empty_lines_round_trip);
    sqlite_test!(test_delete_by_test);
    sqlite_test!(test_delete_by_test_none);
}

#[cfg(all(test, feature = "database-postgres"))]
mod postgres_tests {
    use crate::db::{
        postgres::PostgresLogRepo,
        tests::harness::postgres::create_postgres_pool,
    };

    macro_rules! postgres_test {
        ($name:ident) => {
            #[tokio::test]
            #[ignore = "Requires Docker - run with `cargo test -- --ignored`"]
            async fn $name() {
                let repo = PostgresLogRepo::new(create_postgres_pool().await);
                super::$name(&repo).await;
            }
        };
    }

    postgres_test!(test_create_and_list);
    postgres_test!(test_empty_lines_round_trip);
    postgres_test!(test_delete_by_test);
    postgres_test!(test_delete_by_test_none);
}
