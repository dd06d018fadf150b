mod log_record;
mod test_record;

pub use log_record::*;
pub use test_record::*;
