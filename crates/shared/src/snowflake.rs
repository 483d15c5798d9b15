//! Snowflake id decoding.
//!
//! Platform ids embed their creation time in the upper 42 bits, counted in
//! milliseconds from the platform epoch.

use chrono::{DateTime, TimeZone, Utc};

/// Platform epoch (2015-01-01T00:00:00Z) in milliseconds since the Unix epoch.
pub const PLATFORM_EPOCH_MS: i64 = 1_420_070_400_000;

/// Returns the creation time encoded in a snowflake id, or `None` if the id
/// is not a decimal `u64`.
pub fn snowflake_timestamp(id: &str) -> Option<DateTime<Utc>> {
    let raw: u64 = id.trim().parse().ok()?;
    let offset_ms = i64::try_from(raw >> 22).ok()?;
    Utc.timestamp_millis_opt(PLATFORM_EPOCH_MS + offset_ms).single()
}
