pub mod amount;
pub mod event;
pub mod gas;

pub use event::{Event, EventTable};
pub use gas::GasPrice;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{AppError, AppResult};

/// Parses the naive ISO timestamps the marketplace API emits
/// (`2021-10-05T03:25:00` with optional fractional seconds) as UTC. RFC 3339
/// strings with an explicit offset are accepted as well.
pub fn parse_timestamp(raw: &str) -> AppResult<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::InvalidArgument(format!("not a timestamp: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_naive_and_offset_timestamps() {
        let expected = Utc.with_ymd_and_hms(2021, 10, 5, 3, 25, 0).unwrap();
        assert_eq!(parse_timestamp("2021-10-05T03:25:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2021-10-05T05:25:00+02:00").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2021-10-05T03:25:00.250000").unwrap(),
            expected + chrono::Duration::milliseconds(250)
        );
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(AppError::InvalidArgument(_))
        ));
    }
}
