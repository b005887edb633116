use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Source of "now" for record mutations.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time from the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| {
                Timestamp::try_from(elapsed.as_millis()).unwrap_or(Timestamp::MAX)
            })
    }
}

/// Formats a timestamp as ISO-8601 UTC with millisecond precision,
/// e.g. `2024-05-01T08:00:00.000Z`.
///
/// Returns `None` when the timestamp is outside the representable range.
#[must_use]
pub fn format_timestamp(timestamp: Timestamp) -> Option<String> {
    let millis = i64::try_from(timestamp).ok()?;
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|datetime| datetime.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Parses an RFC 3339 / ISO-8601 string into a timestamp.
///
/// Returns `None` for malformed input or instants before the epoch.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<Timestamp> {
    let datetime = DateTime::parse_from_rfc3339(value).ok()?;
    Timestamp::try_from(datetime.timestamp_millis()).ok()
}
