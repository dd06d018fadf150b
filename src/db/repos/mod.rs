mod logs;
mod test_records;

use chrono::{DateTime, Utc};
pub use logs::*;
pub use test_records::*;

/// Truncate a timestamp to millisecond precision.
///
/// SQLite stores timestamps as RFC 3339 text, so values are normalised before
/// they are written or compared to keep both backends agreeing on ordering.
pub fn truncate_to_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(dt.timestamp_millis()).unwrap_or(dt)
}

/// Round a timestamp up to the next whole millisecond.
///
/// For a millisecond-precision `started`, `started < cutoff` holds exactly when
/// `started < ceil_to_millis(cutoff)`.
pub fn ceil_to_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    let floor = truncate_to_millis(dt);
    if floor == dt {
        dt
    } else {
        floor + chrono::Duration::milliseconds(1)
    }
}

#[cfg(test)]
mod truncate_tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_truncate_to_millis_drops_sub_millisecond_precision() {
        let dt = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let truncated = truncate_to_millis(dt);
        assert_eq!(truncated.timestamp_subsec_nanos(), 123_000_000);
        assert_eq!(truncated.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_ceil_to_millis() {
        let dt = Utc.timestamp_opt(1_700_000_000, 123_000_001).unwrap();
        assert_eq!(ceil_to_millis(dt).timestamp_subsec_nanos(), 124_000_000);

        let aligned = Utc.timestamp_opt(1_700_000_000, 123_000_000).unwrap();
        assert_eq!(ceil_to_millis(aligned), aligned);
    }

    #[test]
    fn test_truncate_to_millis_is_idempotent() {
        let dt = truncate_to_millis(Utc::now());
        assert_eq!(truncate_to_millis(dt), dt);
    }
}
