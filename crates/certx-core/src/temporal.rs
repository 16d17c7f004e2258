//! # Date Rules
//!
//! Certificates carry calendar dates (issued, expiration), not instants.
//! An expiration date is inclusive: a certificate expiring on 2026-03-01 is
//! still valid at 2026-03-01T23:59:59.999Z and expired one millisecond
//! later. All comparisons are made in UTC.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// The last representable millisecond of `date`, in UTC.
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last_ms = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    date.and_time(last_ms).and_utc()
}

/// Whether a certificate with the given expiration date has expired at `now`.
pub fn is_expired_at(expiration: NaiveDate, now: DateTime<Utc>) -> bool {
    now > end_of_day(expiration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn end_of_day_is_last_millisecond() {
        let eod = end_of_day(date(2026, 3, 1));
        assert_eq!(eod.to_rfc3339(), "2026-03-01T23:59:59.999+00:00");
    }

    #[test]
    fn expiring_today_is_not_expired() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 23, 59, 59).unwrap();
        assert!(!is_expired_at(date(2026, 3, 1), now));
    }

    #[test]
    fn expired_yesterday_is_expired() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        assert!(is_expired_at(date(2026, 3, 1), now));
    }

    #[test]
    fn boundary_is_exclusive_of_next_millisecond() {
        let eod = end_of_day(date(2026, 3, 1));
        assert!(!is_expired_at(date(2026, 3, 1), eod));
        assert!(is_expired_at(date(2026, 3, 1), eod + Duration::milliseconds(1)));
    }
}
