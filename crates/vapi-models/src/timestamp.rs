//! Epoch timestamps with sub-second precision.

use chrono::{DateTime, Utc};

/// Current time as seconds since the Unix epoch, with microsecond precision.
pub fn epoch_seconds() -> f64 {
    to_epoch_seconds(Utc::now())
}

/// Convert a UTC datetime to fractional epoch seconds.
pub fn to_epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}
