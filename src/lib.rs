//! Memocache - a thread-safe in-process key-value cache
//!
//! Provides a generic memoization layer with per-entry TTL expiry, usage
//! metrics, eviction hooks and point-in-time snapshot serialization.
//! Expired entries are removed lazily by reads and eagerly by a background
//! sweeper task; every operation has a cancellable variant gated on a
//! [`CancellationToken`].
//!
//! ```no_run
//! use std::time::Duration;
//! use memocache::Cache;
//!
//! # async fn demo() -> memocache::Result<()> {
//! let cache: Cache<String> = Cache::builder()
//!     .sweep_interval(Duration::from_secs(30))
//!     .build();
//!
//! cache.set("greeting", "hello".to_string(), Duration::from_secs(60)).await?;
//! let value = cache.get("greeting").await?;
//! assert_eq!(value, "hello");
//!
//! cache.close().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;

mod tasks;

pub use cache::{Cache, CacheBuilder, CacheStats, Entry, DEFAULT_SWEEP_INTERVAL};
pub use error::{CacheError, Result};

// Cancellable operations take this token type; re-exported so callers need
// not depend on tokio-util directly.
pub use tokio_util::sync::CancellationToken;
