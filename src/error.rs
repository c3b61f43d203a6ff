//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache
    #[error("key not found: {0}")]
    NotFound(String),

    /// Key was present but its TTL had elapsed; the entry has been evicted
    #[error("key expired: {0}")]
    Expired(String),

    /// The cache has been closed; no further operations are possible
    #[error("cache is closed")]
    Closed,

    /// The supplied cancellation token was already triggered
    #[error("operation cancelled")]
    Cancelled,

    /// Snapshot encoding or decoding failed
    #[error("snapshot codec error: {0}")]
    Decode(#[from] serde_json::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
