mod logs;
mod test_records;

pub use logs::PostgresLogRepo;
pub use test_records::PostgresTestRepo;
