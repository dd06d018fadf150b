mod common;
mod logs;
mod test_records;

pub use logs::SqliteLogRepo;
pub use test_records::SqliteTestRepo;
