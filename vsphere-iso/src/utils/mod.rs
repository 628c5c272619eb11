//! Timestamps and identifiers shared by events and run identities.

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

/// Current UTC time in RFC 3339 with microseconds, e.g.
/// `2024-05-01T12:00:00.123456Z`.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A time-ordered (v7) id, so run ids sort by start time in log stores.
#[must_use]
pub fn run_uuid() -> Uuid {
    Uuid::now_v7()
}
