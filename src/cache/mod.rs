//! Cache Module
//!
//! Generic in-process caching with per-entry TTL, lazy and sweeper-driven
//! expiry, eviction hooks and snapshot serialization.

use std::time::Duration;

mod codec;
mod engine;
mod entry;
mod stats;
mod store;


// Re-export public types
pub use engine::{Cache, CacheBuilder};
pub use entry::Entry;
pub use stats::CacheStats;

pub(crate) use engine::Shared;

// == Public Constants ==
/// Default interval between background sweep cycles.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);
