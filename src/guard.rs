//! Stops runs once the configured search window has started.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

/// Result of comparing the current time against the search start date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WindowStatus {
    Open,
    /// More than a day has passed since the start date; nothing left to book.
    Expired,
}

/// Checks whether `now` is more than one day after `start_date` (taken as
/// midnight UTC).
pub(crate) fn check_window(start_date: NaiveDate, now: DateTime<Utc>) -> WindowStatus {
    let start = start_date.and_time(chrono::NaiveTime::MIN).and_utc();
    if now.signed_duration_since(start) > TimeDelta::days(1) {
        WindowStatus::Expired
    } else {
        WindowStatus::Open
    }
}
