//! Issue-timestamp handling
//!
//! An invoice carries a single UTC issue timestamp. The QR payload renders it
//! as one `yyyy-MM-ddTHH:mm:ssZ` value while the XML document splits it into
//! separate date and time elements; both views are produced here so they can
//! never drift apart.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::CoreError;

/// Timestamp layout used in the QR payload
pub const QR_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Date layout of the `IssueDate` element
pub const ISSUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Time layout of the `IssueTime` element
pub const ISSUE_TIME_FORMAT: &str = "%H:%M:%S";

/// Formats a timestamp for the QR payload (`2024-03-01T10:15:00Z`)
pub fn format_qr_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(QR_TIMESTAMP_FORMAT).to_string()
}

/// Parses a QR timestamp back into a UTC datetime
pub fn parse_qr_timestamp(text: &str) -> Result<DateTime<Utc>, CoreError> {
    NaiveDateTime::parse_from_str(text, QR_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| CoreError::invalid_timestamp(format!("{}: {}", text, e)))
}

/// Formats the date part of an issue timestamp
pub fn format_issue_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format(ISSUE_DATE_FORMAT).to_string()
}

/// Formats the time part of an issue timestamp
pub fn format_issue_time(timestamp: DateTime<Utc>) -> String {
    timestamp.format(ISSUE_TIME_FORMAT).to_string()
}

/// Whole days elapsed between `issued_at` and `now` (negative when in the future)
pub fn age_in_days(issued_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - issued_at).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap()
    }

    #[test]
    fn test_qr_timestamp_format() {
        assert_eq!(format_qr_timestamp(sample()), "2024-03-01T09:05:07Z");
    }

    #[test]
    fn test_qr_timestamp_parses_back() {
        let parsed = parse_qr_timestamp("2024-03-01T09:05:07Z").unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_qr_timestamp_rejects_other_layouts() {
        assert!(parse_qr_timestamp("01/03/2024 09:05").is_err());
    }

    #[test]
    fn test_issue_date_and_time_split() {
        assert_eq!(format_issue_date(sample()), "2024-03-01");
        assert_eq!(format_issue_time(sample()), "09:05:07");
    }

    #[test]
    fn test_age_in_days() {
        let issued = sample();
        assert_eq!(age_in_days(issued, issued + Duration::days(10)), 10);
        assert_eq!(age_in_days(issued, issued - Duration::days(2)), -2);
    }
}
