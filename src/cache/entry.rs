//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// == Cache Entry ==
/// Represents a single cache entry: a value plus its absolute expiry instant.
///
/// Entries are immutable once created; an overwrite replaces the entry
/// wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry<V> {
    /// The stored value
    pub value: V,
    /// Absolute expiry instant. The snapshot field is named `ttl` for
    /// compatibility with earlier dumps, but it always holds an absolute
    /// timestamp, not a duration.
    #[serde(rename = "ttl")]
    pub expires_at: DateTime<Utc>,
}

impl<V> Entry<V> {
    // == Constructor ==
    /// Creates a new entry expiring `ttl` from now.
    ///
    /// TTLs too large to represent saturate at the maximum representable
    /// instant instead of overflowing.
    pub fn new(value: V, ttl: Duration) -> Self {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self { value, expires_at }
    }

    // == Is Expired ==
    /// Checks whether the entry has expired as of `now`.
    ///
    /// Boundary condition: an entry is expired when `now` is at or past its
    /// expiry instant, so a zero TTL expires immediately.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Checks whether the entry has expired as of the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
