//! Time utilities and policy constants.

use chrono::{DateTime, Duration, Utc};

/// Rate policy constants.
pub mod constants {
    use super::Duration;

    /// Default base currency when a caller does not name one.
    pub const DEFAULT_BASE_CURRENCY: &str = "EUR";

    /// Fractional digits kept for stored rates.
    pub const RATE_SCALE: u32 = 6;

    /// Cache TTL in seconds for rate snapshots.
    pub const RATE_CACHE_TTL_SECS: i64 = 3600;

    /// Cache TTL for rate snapshots (1 hour).
    pub fn rate_cache_ttl() -> Duration {
        Duration::seconds(RATE_CACHE_TTL_SECS)
    }
}

/// A timestamp, always UTC.
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Check if a timestamp has expired (is in the past).
pub fn is_expired(expiry: Timestamp) -> bool {
    now() > expiry
}

/// Calculate expiry time from now.
pub fn expires_in(duration: Duration) -> Timestamp {
    now() + duration
}
