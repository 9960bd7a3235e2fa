//! Time and timestamp helpers.

use chrono::{DateTime, Local, Utc};

/// UTC timestamp used for log entries and channel events.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Local wall-clock time of day with millisecond precision (`HH:MM:SS.mmm`).
#[must_use]
pub fn time_of_day() -> String {
    Local::now().format("%H:%M:%S%.3f").to_string()
}
